use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mosaicsim::matrix::Matrix;
use mosaicsim::{HardwareProfile, ParallelDriver, ProblemSize};
use rand::SeedableRng;
use rand::rngs::StdRng;

const SIZES: &[usize] = &[32, 64, 128];

fn bench_square(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate_square");
    let mut rng = StdRng::seed_from_u64(42);

    for &size in SIZES {
        let problem = ProblemSize::square(size);
        let w = Matrix::random_integers(size, size, 10, &mut rng);
        let x = Matrix::random_integers(size, size, 10, &mut rng);
        group.throughput(Throughput::Elements(problem.total_flops()));

        for workers in [1usize, 4] {
            let driver = ParallelDriver::new(HardwareProfile::v100()).with_workers(workers);
            group.bench_with_input(BenchmarkId::new(format!("workers_{}", workers), size), &problem, |b, problem| {
                let mut y = Matrix::zeros(size, size);
                b.iter(|| black_box(driver.simulate(&w, &x, &mut y, problem).map(|r| r.total_cycles())))
            });
        }
    }
    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let profile = HardwareProfile::hpc1024();
    c.bench_function("partition_1024", |b| {
        b.iter(|| {
            mosaicsim::partition(
                black_box(&ProblemSize::square(1024)),
                profile.max_procs,
                profile.max_proc_mem_kb,
            )
        })
    });
}

criterion_group!(benches, bench_square, bench_partition);
criterion_main!(benches);
