/// Derived performance figures for one simulated run.
use serde::Serialize;

use crate::driver::SimulationResult;
use crate::problem::ProblemSize;
use crate::profile::HardwareProfile;

#[derive(Debug, Clone, Serialize)]
pub struct PerfReport {
    pub problem: ProblemSize,
    pub profile: String,
    pub total_cycles: u64,
    pub compute_cycles: u64,
    pub reduce_cycles: u64,
    pub exchange_cycles: u64,
    pub active_procs: usize,
    pub active_mem_kb: usize,
    pub workers: usize,
    /// clock · M·P·(2N−1) / total / 1000
    pub effective_tflops: f64,
    /// clock · 2·fmacs · max_procs / 1000
    pub peak_tflops: f64,
}

/// Effective TFLOPS for `flops` executed in `cycles` at `clock_ghz`. Zero cycles gives zero.
pub fn effective_tflops(clock_ghz: f64, flops: u64, cycles: u64) -> f64 {
    if cycles == 0 {
        return 0.0;
    }
    clock_ghz * flops as f64 / cycles as f64 / 1000.0
}

impl PerfReport {
    pub fn new(problem: &ProblemSize, profile: &HardwareProfile, result: &SimulationResult) -> Self {
        let total_cycles = result.total_cycles();
        PerfReport {
            problem: *problem,
            profile: profile.name.clone(),
            total_cycles,
            compute_cycles: result.critical.compute,
            reduce_cycles: result.critical.reduce,
            exchange_cycles: result.critical.exchange,
            active_procs: result.active_procs,
            active_mem_kb: result.active_mem_kb,
            workers: result.workers,
            effective_tflops: effective_tflops(profile.clock_ghz, problem.total_flops(), total_cycles),
            peak_tflops: profile.peak_tflops(),
        }
    }

    /// Fraction of peak throughput achieved
    pub fn utilization(&self) -> f64 {
        if self.peak_tflops > 0.0 { self.effective_tflops / self.peak_tflops } else { 0.0 }
    }
}

impl std::fmt::Display for PerfReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total cycles: {}", self.total_cycles)?;
        writeln!(
            f,
            "  compute={} | reduce={} | exchange={}",
            self.compute_cycles, self.reduce_cycles, self.exchange_cycles
        )?;
        writeln!(
            f,
            "  {} active PEs @ {} KB | {} worker(s)",
            self.active_procs, self.active_mem_kb, self.workers
        )?;
        write!(
            f,
            "  effective {:.4} TFLOPS | peak {:.2} TFLOPS ({:.2}%)",
            self.effective_tflops,
            self.peak_tflops,
            self.utilization() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tflops_from_cycles() {
        // 7x7x7: 637 flops in 23 cycles at 1.2 GHz
        let t = effective_tflops(1.2, 637, 23);
        assert!((t - 1.2 * 637.0 / 23.0 / 1000.0).abs() < 1e-12);
        assert_eq!(effective_tflops(1.2, 637, 0), 0.0);
    }

    #[test]
    fn peak_matches_profile() {
        // 1.2 · 2 · 64 · 800 / 1000
        assert!((HardwareProfile::v100().peak_tflops() - 122.88).abs() < 1e-9);
    }
}
