//! mosaicsim - blocked matrix-multiply simulator for PE arrays
//!
//! Usage:
//!   mosaicsim simulate M N P [OPTIONS]      Simulate one W[MxN]·X[NxP] product
//!   mosaicsim sweep LOW HIGH STEP [OPTIONS] Simulate square sizes LOW..=HIGH
//!   mosaicsim profiles                      List hardware presets

use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use mosaicsim::exchange::ExchangeCostModel;
use mosaicsim::executor::ComputeCyclePolicy;
use mosaicsim::matrix::Matrix;
use mosaicsim::metrics::{self, LiveMetrics, SweepPoint};
use mosaicsim::objective::ObjectivePolicy;
use mosaicsim::report::PerfReport;
use mosaicsim::sweep::{INPUT_VALUE_BOUND, Sweep};
use mosaicsim::verify::{self, Verification};
use mosaicsim::{HardwareProfile, ParallelDriver, ProblemSize, Result, SimulationResult};

#[derive(Parser)]
#[command(name = "mosaicsim")]
#[command(about = "Estimate blocked matrix-multiply performance on an array of processing elements")]
#[command(version)]
struct Cli {
    /// Hardware preset (v100, hpc1024); unknown names fall back to generic
    #[arg(short, long, global = true, default_value = "v100")]
    config: String,

    /// Load the hardware profile from a JSON file instead of a preset
    #[arg(long, global = true)]
    profile_file: Option<String>,

    /// Partition objective: max-procs or min-mem
    #[arg(long, global = true, default_value = "max-procs")]
    objective: ObjectivePolicy,

    /// Output results in JSON format (for machine parsing)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one product with random integer inputs
    Simulate {
        m: usize,
        n: usize,
        p: usize,

        /// Worker threads (falls back to fewer if the grid is too small)
        #[arg(short, long, default_value = "1")]
        workers: usize,

        /// Seed for the random inputs
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Compare the result against a dense reference multiply
        #[arg(short, long)]
        verify: bool,

        /// Compute-cycle representative per round: last-slice or summed
        #[arg(long, default_value = "last-slice")]
        compute_policy: ComputeCyclePolicy,

        /// Exchange cost model: uniform or per-peer
        #[arg(long, default_value = "uniform")]
        exchange_model: ExchangeCostModel,
    },

    /// Simulate square sizes from LOW up to and including HIGH
    Sweep {
        low: usize,
        high: usize,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        step: u64,

        #[arg(short, long, default_value = "1")]
        workers: usize,

        #[arg(short, long, default_value = "0")]
        seed: u64,
    },

    /// List the hardware presets
    Profiles,
}

#[derive(Serialize)]
struct SimulateOutput {
    report: PerfReport,
    result: SimulationResult,
    verification: Option<Verification>,
    wall_clock_seconds: f64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Profiles => {
            show_profiles(cli.json);
            Ok(())
        }
        Commands::Simulate { m, n, p, workers, seed, verify, compute_policy, exchange_model } => {
            load_profile(&cli).and_then(|profile| {
                let driver = ParallelDriver::new(profile)
                    .with_workers(*workers)
                    .with_objective(cli.objective)
                    .with_compute_policy(*compute_policy)
                    .with_exchange_model(*exchange_model);
                run_simulation(&driver, ProblemSize::new(*m, *n, *p), *seed, *verify, cli.json)
            })
        }
        Commands::Sweep { low, high, step, workers, seed } => load_profile(&cli).and_then(|profile| {
            let driver = ParallelDriver::new(profile).with_workers(*workers).with_objective(cli.objective);
            run_sweep(&driver, *low, *high, *step as usize, *seed, cli.json)
        }),
    };

    if let Err(e) = outcome {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn load_profile(cli: &Cli) -> Result<HardwareProfile> {
    match &cli.profile_file {
        Some(path) => HardwareProfile::from_json_file(path),
        None => Ok(HardwareProfile::from_name(&cli.config)),
    }
}

fn print_profile(profile: &HardwareProfile, objective: ObjectivePolicy) {
    println!("[mosaicsim] Configuration is {}", profile.name);
    println!(
        "[mosaicsim] Maximum processors {}, memory per processor {} KB, {} B/cycle, {} FMACs/cycle @ {} GHz",
        profile.max_procs, profile.max_proc_mem_kb, profile.bandwidth, profile.fmacs_per_cycle, profile.clock_ghz
    );
    println!("[mosaicsim] Partition objective: {}", objective);
}

fn run_simulation(driver: &ParallelDriver, problem: ProblemSize, seed: u64, check: bool, json_output: bool) -> Result<()> {
    let profile = &driver.profile;
    if !json_output {
        print_profile(profile, driver.objective);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let w = Matrix::random_integers(problem.m, problem.n, INPUT_VALUE_BOUND, &mut rng);
    let x = Matrix::random_integers(problem.n, problem.p, INPUT_VALUE_BOUND, &mut rng);
    let mut y = Matrix::zeros(problem.m, problem.p);

    let mut live = LiveMetrics::running(profile, driver.objective.name(), 1);
    metrics::write_metrics(&live);

    let start = Instant::now();
    let result = match driver.simulate(&w, &x, &mut y, &problem) {
        Ok(result) => result,
        Err(e) => {
            live.status = "failed".to_string();
            live.error = Some(e.to_string());
            live.timestamp_ms = metrics::now_ms();
            metrics::write_metrics(&live);
            return Err(e);
        }
    };
    let elapsed = start.elapsed();

    let report = PerfReport::new(&problem, profile, &result);
    live.points.push(SweepPoint::from_report(format!("{}x{}x{}", problem.m, problem.n, problem.p), &report));
    live.status = "complete".to_string();
    live.timestamp_ms = metrics::now_ms();
    metrics::write_metrics(&live);

    let verification = if check { Some(verify::verify(&w, &x, &y)?) } else { None };

    if json_output {
        let output = SimulateOutput {
            report,
            result,
            verification,
            wall_clock_seconds: elapsed.as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let plan = &result.plan;
    println!("[mosaicsim] M is {}, N is {}, P is {}", problem.m, problem.n, problem.p);
    println!(
        "[mosaicsim] Active processors: {}, memory per processor: {} KB",
        result.active_procs, result.active_mem_kb
    );
    println!(
        "[mosaicsim] Mg (row-groups): {} (real {}), Ng (reduction): {}, Pg (column-groups): {}, Xc (exchanges): {}",
        plan.mg, plan.mg1, plan.ng, plan.pg, plan.xc
    );
    println!("[mosaicsim] Block m={} n={} p={}, workers {}", plan.m, plan.n, plan.p, result.workers);
    println!("{}", report);
    println!("[mosaicsim] Wall clock time for simulation: {:.3}s", elapsed.as_secs_f64());

    if let Some(verification) = verification {
        println!("[mosaicsim] Wall clock time for reference multiply: {:.3}s", verification.reference_ms / 1000.0);
        if !verification.exact {
            println!("[mosaicsim] Warning: partial sums exceed 2^24, f32 rounding may cause mismatches");
        }
        match &verification.first_mismatch {
            None => println!("[mosaicsim] Verification PASSED: simulated Y matches the reference product"),
            Some(first) => println!(
                "[mosaicsim] Verification FAILED: {} mismatches, first at ({}, {}): got {}, expected {}",
                verification.mismatches, first.row, first.col, first.actual, first.expected
            ),
        }
    }
    Ok(())
}

fn run_sweep(driver: &ParallelDriver, low: usize, high: usize, step: usize, seed: u64, json_output: bool) -> Result<()> {
    let sweep = Sweep::new(low, high, step).with_seed(seed).with_metrics_path(metrics::METRICS_PATH);
    if !json_output {
        print_profile(&driver.profile, driver.objective);
        println!(
            "[mosaicsim] Sweeping square matrices from {} to {} (step {}), {} sizes",
            low,
            high,
            step,
            sweep.sizes.len()
        );
    }

    let start = Instant::now();
    let reports = sweep.run(driver)?;
    let elapsed = start.elapsed();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!(
        "{:>8} {:>12} {:>12} {:>10} {:>10} {:>8} {:>8}",
        "size", "cycles", "compute", "reduce", "exchange", "PEs", "TFLOPS"
    );
    for report in &reports {
        println!(
            "{:>8} {:>12} {:>12} {:>10} {:>10} {:>8} {:>8.3}",
            report.problem.m,
            report.total_cycles,
            report.compute_cycles,
            report.reduce_cycles,
            report.exchange_cycles,
            report.active_procs,
            report.effective_tflops
        );
    }
    println!("[mosaicsim] Wall clock time for sweep: {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn show_profiles(json_output: bool) {
    let presets = HardwareProfile::presets();
    if json_output {
        match serde_json::to_string_pretty(&presets) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("error: {}", e),
        }
        return;
    }
    println!(
        "{:<10} {:>6} {:>10} {:>8} {:>8} {:>6} {:>6} {:>10}",
        "name", "PEs", "mem KB", "B/cycle", "FMACs", "GHz", "eff", "peak TF"
    );
    for p in presets {
        println!(
            "{:<10} {:>6} {:>10} {:>8} {:>8} {:>6.1} {:>6.2} {:>10.2}",
            p.name, p.max_procs, p.max_proc_mem_kb, p.bandwidth, p.fmacs_per_cycle, p.clock_ghz, p.efficiency,
            p.peak_tflops()
        );
    }
}
