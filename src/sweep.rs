/// Square-size sweep: simulate M = N = P = s for a range of sizes and
/// publish each point to the live metrics snapshot as it completes.
use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::driver::ParallelDriver;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::metrics::{self, LiveMetrics, SweepPoint};
use crate::problem::ProblemSize;
use crate::report::PerfReport;

/// Input values are drawn from [0, INPUT_VALUE_BOUND)
pub const INPUT_VALUE_BOUND: u32 = 10;

/// Sizes low, low+step, ... up to and including `high`. A zero step is treated as 1.
pub fn sweep_sizes(low: usize, high: usize, step: usize) -> Vec<usize> {
    (low..=high).step_by(step.max(1)).collect()
}

pub struct Sweep {
    pub sizes: Vec<usize>,
    pub seed: u64,
    /// Where to publish snapshots; None disables publishing
    pub metrics_path: Option<PathBuf>,
}

impl Sweep {
    pub fn new(low: usize, high: usize, step: usize) -> Self {
        Sweep { sizes: sweep_sizes(low, high, step), seed: 0, metrics_path: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_metrics_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    fn publish(&self, live: &mut LiveMetrics) {
        if let Some(path) = &self.metrics_path {
            live.timestamp_ms = metrics::now_ms();
            metrics::write_metrics_to(path, live);
        }
    }

    /// Run every size in order. The first failing size aborts the sweep.
    pub fn run(&self, driver: &ParallelDriver) -> Result<Vec<PerfReport>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut live = LiveMetrics::running(&driver.profile, driver.objective.name(), self.sizes.len());
        self.publish(&mut live);

        let mut reports = Vec::with_capacity(self.sizes.len());
        for &size in &self.sizes {
            let problem = ProblemSize::square(size);
            let w = Matrix::random_integers(size, size, INPUT_VALUE_BOUND, &mut rng);
            let x = Matrix::random_integers(size, size, INPUT_VALUE_BOUND, &mut rng);
            let mut y = Matrix::zeros(size, size);

            let result = match driver.simulate(&w, &x, &mut y, &problem) {
                Ok(result) => result,
                Err(e) => {
                    live.status = "failed".to_string();
                    live.error = Some(format!("size {}: {}", size, e));
                    self.publish(&mut live);
                    return Err(e);
                }
            };

            let report = PerfReport::new(&problem, &driver.profile, &result);
            log::info!("sweep size {}: {} cycles, {:.4} TFLOPS", size, report.total_cycles, report.effective_tflops);
            live.points.push(SweepPoint::from_report(size.to_string(), &report));
            self.publish(&mut live);
            reports.push(report);
        }

        live.status = "complete".to_string();
        self.publish(&mut live);
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::profile::HardwareProfile;

    #[test]
    fn sizes_include_the_upper_bound() {
        assert_eq!(sweep_sizes(64, 128, 64), vec![64, 128]);
        assert_eq!(sweep_sizes(16, 64, 16), vec![16, 32, 48, 64]);
        assert_eq!(sweep_sizes(16, 60, 16), vec![16, 32, 48]);
        assert_eq!(sweep_sizes(4, 7, 0), vec![4, 5, 6, 7]);
        assert_eq!(sweep_sizes(8, 8, 1), vec![8]);
        assert!(sweep_sizes(9, 8, 1).is_empty());
    }

    #[test]
    fn sweep_reports_every_size_and_publishes() {
        let path = std::env::temp_dir().join(format!("mosaicsim_sweep_test_{}.json", std::process::id()));
        let driver = ParallelDriver::new(HardwareProfile::v100()).with_workers(2);
        let reports = Sweep::new(8, 32, 8).with_seed(7).with_metrics_path(&path).run(&driver).unwrap();

        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.total_cycles > 0 && r.effective_tflops > 0.0));

        let live = metrics::read_metrics_from(&path).unwrap();
        assert_eq!(live.status, "complete");
        let labels: Vec<_> = live.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["8", "16", "24", "32"]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn infeasible_size_aborts() {
        let mut profile = HardwareProfile::v100();
        profile.max_proc_mem_kb = 3;
        let driver = ParallelDriver::new(profile);
        let err = Sweep::new(4, 12, 4).run(&driver).unwrap_err();
        assert!(matches!(err, SimError::ConfigurationInfeasible(_)));
    }
}
