/// Parallel driver. Plans a run, splits the PE grid and Y into disjoint
/// row-bands, and runs one TileExecutor per band on a dedicated thread pool.
///
/// Bands are whole exchange groups: the band width is a multiple of Xc, so a
/// rotation never crosses a band boundary. The last band absorbs the
/// remainder. The run's cycle count is the critical (slowest) worker's.
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Result, SimError};
use crate::exchange::{ExchangeCostModel, ExchangeEngine};
use crate::executor::{ComputeCyclePolicy, CycleCounters, TileExecutor};
use crate::grid::{PeGrid, RowBand, ScratchRow};
use crate::matrix::Matrix;
use crate::objective::ObjectivePolicy;
use crate::partition::{Partitioner, TilingPlan};
use crate::problem::ProblemSize;
use crate::profile::HardwareProfile;
use crate::reduce::ReductionEngine;

/// Outcome of one simulated multiply.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub plan: TilingPlan,
    /// Active processors, Mg·Pg·Ng
    pub active_procs: usize,
    /// Per-PE memory of the plan in KB
    pub active_mem_kb: usize,
    /// Workers actually used (may be fewer than requested)
    pub workers: usize,
    /// Counters of the slowest worker
    pub critical: CycleCounters,
    pub per_worker: Vec<CycleCounters>,
}

impl SimulationResult {
    pub fn total_cycles(&self) -> u64 {
        self.critical.total()
    }
}

/// Split Mg row-groups into at most `requested` bands, each a multiple of Xc wide.
/// Falls back to fewer workers until every band gets at least one exchange group.
pub fn band_layout(mg: usize, xc: usize, requested: usize) -> Vec<RowBand> {
    let mut workers = requested.max(1);
    let width = |workers: usize| xc * (mg / (workers * xc));
    let mut band_width = width(workers);
    while band_width == 0 && workers > 1 {
        workers -= 1;
        band_width = width(workers);
    }

    (0..workers)
        .map(|t| {
            let end = if t + 1 == workers { mg } else { (t + 1) * band_width };
            RowBand::new(t * band_width, end)
        })
        .collect()
}

/// Index of the first worker with the largest total.
fn critical_worker(per_worker: &[CycleCounters]) -> usize {
    let mut critical = 0;
    for (t, counters) in per_worker.iter().enumerate() {
        if counters.total() > per_worker[critical].total() {
            critical = t;
        }
    }
    critical
}

pub struct ParallelDriver {
    pub profile: HardwareProfile,
    pub workers: usize,
    pub objective: ObjectivePolicy,
    pub compute_policy: ComputeCyclePolicy,
    pub exchange_model: ExchangeCostModel,
}

impl ParallelDriver {
    pub fn new(profile: HardwareProfile) -> Self {
        ParallelDriver {
            profile,
            workers: 1,
            objective: ObjectivePolicy::default(),
            compute_policy: ComputeCyclePolicy::default(),
            exchange_model: ExchangeCostModel::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_objective(mut self, objective: ObjectivePolicy) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_compute_policy(mut self, policy: ComputeCyclePolicy) -> Self {
        self.compute_policy = policy;
        self
    }

    pub fn with_exchange_model(mut self, model: ExchangeCostModel) -> Self {
        self.exchange_model = model;
        self
    }

    /// Derive the tiling plan for `problem` under this driver's profile.
    pub fn plan(&self, problem: &ProblemSize) -> Result<TilingPlan> {
        self.profile.validate()?;
        Partitioner::new(self.objective).partition(problem, self.profile.max_procs, self.profile.max_proc_mem_kb)
    }

    /// Plan and simulate W·X, writing the blocked result into `y`.
    pub fn simulate(&self, w: &Matrix, x: &Matrix, y: &mut Matrix, problem: &ProblemSize) -> Result<SimulationResult> {
        problem.validate()?;
        check_dims(w, x, y, problem)?;
        let plan = self.plan(problem)?;
        self.execute(&plan, w, x, y, problem)
    }

    /// Simulate a given plan. The plan is checked against the problem and
    /// profile first, so plans loaded from elsewhere are safe to pass in.
    pub fn execute(
        &self,
        plan: &TilingPlan,
        w: &Matrix,
        x: &Matrix,
        y: &mut Matrix,
        problem: &ProblemSize,
    ) -> Result<SimulationResult> {
        problem.validate()?;
        self.profile.validate()?;
        check_dims(w, x, y, problem)?;
        plan.check(problem, self.profile.max_procs, self.profile.max_proc_mem_kb)?;
        if plan.mg1 * plan.m != problem.m || plan.ng * plan.n != problem.n || plan.pg * plan.xc * plan.p < problem.p {
            return Err(SimError::DimensionMismatch(format!("plan [{}] does not tile {}", plan, problem)));
        }

        log::info!(
            "[{}] {} -> {} ({} objective)",
            self.profile.name,
            problem,
            plan,
            self.objective.name()
        );

        let bands = band_layout(plan.mg, plan.xc, self.workers);
        if bands.len() < self.workers.max(1) {
            log::info!("{} workers requested, {} feasible for Mg={} Xc={}", self.workers, bands.len(), plan.mg, plan.xc);
        }

        let executor = TileExecutor::new(
            *plan,
            problem.p,
            ReductionEngine::new(self.profile.bandwidth, self.profile.fmacs_per_cycle),
            ExchangeEngine::new(self.profile.bandwidth, plan.xc, self.exchange_model),
            self.compute_policy,
        );

        let row_ranges: Vec<(usize, usize)> = bands
            .iter()
            .map(|b| (b.start.min(plan.mg1) * plan.m, b.end.min(plan.mg1) * plan.m))
            .collect();

        let mut grid = PeGrid::allocate(plan, self.profile.fmacs_per_cycle, self.profile.efficiency);
        let pe_bands = grid.split_bands(&bands);
        let out_rows = y.split_rows_mut(&row_ranges);
        let work: Vec<_> = pe_bands
            .into_iter()
            .zip(out_rows)
            .map(|(band, rows)| (band, rows, ScratchRow::new(plan.ng)))
            .collect();

        let per_worker: Vec<CycleCounters> = if work.len() == 1 {
            work.into_iter()
                .map(|(mut band, mut rows, mut scratch)| executor.run(&mut band, &mut rows, &mut scratch, w, x))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(work.len())
                .thread_name(|i| format!("mosaic-band-{}", i))
                .build()?;
            pool.install(|| {
                work.into_par_iter()
                    .map(|(mut band, mut rows, mut scratch)| executor.run(&mut band, &mut rows, &mut scratch, w, x))
                    .collect()
            })
        };

        let critical = per_worker[critical_worker(&per_worker)];
        log::info!(
            "simulated {} on {} workers: compute={} reduce={} exchange={} total={}",
            problem,
            per_worker.len(),
            critical.compute,
            critical.reduce,
            critical.exchange,
            critical.total()
        );

        Ok(SimulationResult {
            plan: *plan,
            active_procs: plan.n_procs,
            active_mem_kb: plan.proc_mem_kb,
            workers: per_worker.len(),
            critical,
            per_worker,
        })
    }
}

fn check_dims(w: &Matrix, x: &Matrix, y: &Matrix, problem: &ProblemSize) -> Result<()> {
    let ProblemSize { m, n, p } = *problem;
    let shapes = [("W", w, m, n), ("X", x, n, p), ("Y", y, m, p)];
    for (name, matrix, rows, cols) in shapes {
        if matrix.rows != rows || matrix.cols != cols {
            return Err(SimError::DimensionMismatch(format!(
                "{} is {}x{}, expected {}x{} for {}",
                name, matrix.rows, matrix.cols, rows, cols, problem
            )));
        }
    }
    Ok(())
}

/// Simulate with the default objective and cycle models.
///
/// Y is computed in f32 and rounded to integers as it is written. The result
/// is exact for integer inputs only while every partial sum, bounded by
/// N·max|w|·max|x|, stays below 2^24; see `verify::worst_case_sum`.
pub fn simulate(
    w: &Matrix,
    x: &Matrix,
    y: &mut Matrix,
    problem: &ProblemSize,
    profile: &HardwareProfile,
    workers: usize,
) -> Result<SimulationResult> {
    ParallelDriver::new(profile.clone()).with_workers(workers).simulate(w, x, y, problem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_whole_exchange_groups() {
        assert_eq!(band_layout(4, 1, 8), (0..4).map(|t| RowBand::new(t, t + 1)).collect::<Vec<_>>());
        assert_eq!(band_layout(2, 2, 4), vec![RowBand::new(0, 2)]);
        assert_eq!(band_layout(4, 2, 3), vec![RowBand::new(0, 2), RowBand::new(2, 4)]);
        // remainder goes to the last band
        assert_eq!(band_layout(7, 1, 2), vec![RowBand::new(0, 3), RowBand::new(3, 7)]);
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(band_layout(6, 3, 0), vec![RowBand::new(0, 6)]);
    }

    #[test]
    fn first_slowest_worker_is_critical() {
        let c = |compute| CycleCounters { compute, reduce: 0, exchange: 0 };
        assert_eq!(critical_worker(&[c(3), c(9), c(9), c(1)]), 1);
        assert_eq!(critical_worker(&[c(5)]), 0);
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let problem = ProblemSize::new(4, 4, 4);
        let w = Matrix::zeros(4, 4);
        let x = Matrix::zeros(4, 3);
        let mut y = Matrix::zeros(4, 4);
        let err = simulate(&w, &x, &mut y, &problem, &HardwareProfile::v100(), 1).unwrap_err();
        assert!(matches!(err, SimError::DimensionMismatch(_)));
    }

    #[test]
    fn rejects_plan_over_budget() {
        let problem = ProblemSize::new(4, 4, 4);
        let driver = ParallelDriver::new(HardwareProfile::v100());
        let mut plan = driver.plan(&problem).unwrap();
        plan.n_procs = 10_000;
        let (w, x) = (Matrix::zeros(4, 4), Matrix::zeros(4, 4));
        let mut y = Matrix::zeros(4, 4);
        let err = driver.execute(&plan, &w, &x, &mut y, &problem).unwrap_err();
        assert!(matches!(err, SimError::ConfigurationInfeasible(_)));
    }
}
