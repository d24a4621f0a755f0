/// Partitioning. Derives a tiling plan for W[M×N]·X[N×P] on a PE array,
/// given the processor count and per-PE memory limits.
///
/// Main objective: keep as many PEs busy as possible (pluggable, see objective.rs).
/// Secondary: avoid X exchanges by replicating X blocks while memory allows.
/// When a PE cannot hold its blocks, the P-dimension block is shrunk and
/// exchange rounds are added so fewer physical column-groups cover P over time.
///
/// Inputs and staged outputs are 2-byte elements; the partial-sum
/// accumulator is a 4-byte element.
use serde::{Deserialize, Serialize};

use crate::error::{Infeasibility, Result};
use crate::objective::{Candidate, ObjectivePolicy, PartitionObjective};
use crate::problem::ProblemSize;

/// Bytes per W, X, and staged output element
pub const INPUT_ELEMENT_BYTES: usize = 2;
/// Bytes per partial-sum accumulator element
pub const ACCUM_ELEMENT_BYTES: usize = 4;

/// Per-PE footprint in bytes: w[m×n], x[n×p], staged s[m×p], and the accumulator.
pub fn proc_mem_bytes(m: usize, n: usize, p: usize) -> usize {
    INPUT_ELEMENT_BYTES * (m * n + n * p + m * p) + ACCUM_ELEMENT_BYTES * m * p
}

/// Per-PE footprint in whole KB (rounded down).
pub fn proc_mem_kb(m: usize, n: usize, p: usize) -> usize {
    proc_mem_bytes(m, n, p) / 1024
}

/// Grid shape and block sizes for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingPlan {
    /// Row-groups carrying real data
    pub mg1: usize,
    /// Row-groups including padding, a multiple of `xc`
    pub mg: usize,
    /// Reduction depth (column-groups of W)
    pub ng: usize,
    /// Physical output column-groups
    pub pg: usize,
    /// Exchange rounds (1 = no exchanges)
    pub xc: usize,
    /// Block rows of W
    pub m: usize,
    /// Block depth
    pub n: usize,
    /// Block columns of X
    pub p: usize,
    /// Active processors, mg·pg·ng
    pub n_procs: usize,
    /// Per-PE memory in KB
    pub proc_mem_kb: usize,
}

impl TilingPlan {
    /// Row-groups added only to align `mg` to `xc`
    pub fn padding_rows(&self) -> usize {
        self.mg - self.mg1
    }

    /// Number of PE tiles in the full grid
    pub fn grid_tiles(&self) -> usize {
        self.mg * self.pg * self.ng
    }

    /// Check every invariant a plan must satisfy before it can be simulated.
    pub fn check(&self, problem: &ProblemSize, max_procs: usize, max_proc_mem_kb: usize) -> Result<()> {
        if self.mg == 0 || self.ng == 0 || self.pg == 0 || self.mg1 == 0 || self.p == 0 {
            return Err(Infeasibility::EmptyGroup { mg: self.mg, ng: self.ng, pg: self.pg }.into());
        }
        if problem.m % self.mg1 != 0 {
            return Err(Infeasibility::RowDivisibility { m: problem.m, mg1: self.mg1 }.into());
        }
        if problem.n % self.ng != 0 {
            return Err(Infeasibility::ReductionDivisibility { n: problem.n, ng: self.ng }.into());
        }
        if problem.p % self.p != 0 {
            return Err(Infeasibility::ColumnDivisibility { p: problem.p, block: self.p }.into());
        }
        if self.n_procs > max_procs {
            return Err(Infeasibility::ProcessorBudget { n_procs: self.n_procs, max_procs }.into());
        }
        if self.proc_mem_kb > max_proc_mem_kb {
            return Err(Infeasibility::MemoryBudget {
                proc_mem_kb: self.proc_mem_kb,
                max_proc_mem_kb,
            }
            .into());
        }
        if self.mg < self.xc || self.mg % self.xc != 0 {
            return Err(Infeasibility::ExchangeAlignment { mg: self.mg, xc: self.xc }.into());
        }
        Ok(())
    }
}

impl std::fmt::Display for TilingPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Mg={} (real {}) Ng={} Pg={} Xc={} | block {}x{}x{} | {} PEs @ {} KB",
            self.mg, self.mg1, self.ng, self.pg, self.xc, self.m, self.n, self.p, self.n_procs,
            self.proc_mem_kb,
        )
    }
}

/// Largest divisor of `dim` no greater than a quarter of the memory budget allows.
/// The quarter budget is sized for square FP32 blocks: p = floor(sqrt(1024·(kb/4)/4)).
fn initial_block_width(dim: usize, max_proc_mem_kb: usize) -> Result<usize> {
    let quarter_kb = max_proc_mem_kb / 4;
    let p = (256 * quarter_kb).isqrt();
    if p == 0 {
        return Err(Infeasibility::NoBlockWidth { max_proc_mem_kb }.into());
    }
    // every value above `dim` fails to divide it, so start there
    let mut p = p.min(dim);
    while dim % p != 0 {
        p -= 1;
    }
    Ok(p)
}

/// Next divisor of `dim` strictly below `p`, if any.
fn next_smaller_divisor(dim: usize, p: usize) -> Option<usize> {
    let mut q = p.checked_sub(1).filter(|&q| q > 0)?;
    while dim % q != 0 {
        q -= 1;
    }
    Some(q)
}

/// Greedy constraint solver over the processor grid.
pub struct Partitioner {
    objective: Box<dyn PartitionObjective>,
}

impl Partitioner {
    pub fn new(policy: ObjectivePolicy) -> Self {
        Partitioner { objective: policy.build() }
    }

    pub fn objective_name(&self) -> &'static str {
        self.objective.name()
    }

    pub fn partition(
        &self,
        problem: &ProblemSize,
        max_procs: usize,
        max_proc_mem_kb: usize,
    ) -> Result<TilingPlan> {
        let ProblemSize { m: m_dim, n: n_dim, p: p_dim } = *problem;
        problem.validate()?;

        let mut p = initial_block_width(p_dim, max_proc_mem_kb)?;
        let mut pg = p_dim / p;

        // Search (Nv, Mv) with Mv·Nv·Pg bounded by the processor budget.
        let mut best: Option<Candidate> = None;
        for nv in (1..max_procs).filter(|nv| n_dim % nv == 0) {
            let mv_end = (max_procs + 1) / (nv * pg);
            for mv in (1..mv_end).filter(|mv| m_dim % mv == 0) {
                let candidate = Candidate {
                    mv,
                    nv,
                    pg,
                    proc_mem_bytes: proc_mem_bytes(m_dim / mv, n_dim / nv, p),
                };
                let replace = match &best {
                    None => true,
                    Some(incumbent) => self.objective.prefers(&candidate, incumbent),
                };
                if replace {
                    best = Some(candidate);
                }
            }
        }
        let (mut mg, ng) = best.map(|c| (c.mv, c.nv)).unwrap_or((1, 1));

        let m = m_dim / mg;
        let n = n_dim / ng;

        // Over the memory budget: narrow p, then add exchange rounds until the
        // wider column grid fits in the processor budget again.
        let mut xc = 1;
        let mut mem_kb = proc_mem_kb(m, n, p);
        while mem_kb > max_proc_mem_kb {
            p = next_smaller_divisor(p_dim, p).ok_or(Infeasibility::BlockWidthExhausted { p })?;
            mem_kb = proc_mem_kb(m, n, p);

            pg = p_dim / p;
            let pi = pg;
            while mg * pg * ng > max_procs {
                xc += 1;
                pg = pi.div_ceil(xc);
                if xc >= pi {
                    break;
                }
            }

            let n_procs = mg * pg * ng;
            if n_procs >= max_procs {
                return Err(Infeasibility::ExchangeEscalation { n_procs, max_procs }.into());
            }
        }

        // Pad Mg so exchange groups are regular. May overshoot the budget;
        // `check` reports that below.
        let mg1 = mg;
        while mg % xc != 0 {
            mg += 1;
            if mg * ng * pg > max_procs {
                break;
            }
        }

        let plan = TilingPlan {
            mg1,
            mg,
            ng,
            pg,
            xc,
            m: m_dim / mg1,
            n,
            p,
            n_procs: mg * pg * ng,
            proc_mem_kb: proc_mem_kb(m_dim / mg1, n, p),
        };
        log::debug!("partition[{}] {} -> {}", self.objective.name(), problem, plan);

        plan.check(problem, max_procs, max_proc_mem_kb)?;
        Ok(plan)
    }
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new(ObjectivePolicy::default())
    }
}

/// Partition with the default objective (maximize active processors).
pub fn partition(problem: &ProblemSize, max_procs: usize, max_proc_mem_kb: usize) -> Result<TilingPlan> {
    Partitioner::default().partition(problem, max_procs, max_proc_mem_kb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use proptest::prelude::*;

    fn plan(m: usize, n: usize, p: usize, procs: usize, mem: usize) -> TilingPlan {
        partition(&ProblemSize::new(m, n, p), procs, mem).unwrap()
    }

    fn infeasibility(m: usize, n: usize, p: usize, procs: usize, mem: usize) -> Infeasibility {
        match partition(&ProblemSize::new(m, n, p), procs, mem) {
            Err(SimError::ConfigurationInfeasible(reason)) => reason,
            other => panic!("expected infeasible configuration, got {:?}", other),
        }
    }

    #[test]
    fn footprint_formula() {
        // 2·(32·64 + 64·16 + 32·16) + 4·32·16 = 9216 bytes
        assert_eq!(proc_mem_bytes(32, 64, 16), 9216);
        assert_eq!(proc_mem_kb(32, 64, 16), 9);
    }

    #[test]
    fn small_square_spreads_rows() {
        let p = plan(4, 4, 4, 4, 1000);
        assert_eq!((p.mg1, p.mg, p.ng, p.pg, p.xc), (4, 4, 1, 1, 1));
        assert_eq!((p.m, p.n, p.p), (1, 4, 4));
        assert_eq!(p.n_procs, 4);
        assert_eq!(p.proc_mem_kb, 0);
    }

    #[test]
    fn prime_on_one_processor_degrades_to_single_block() {
        let p = plan(7, 7, 7, 1, 4096);
        assert_eq!((p.mg, p.ng, p.pg, p.xc), (1, 1, 1, 1));
        assert_eq!((p.m, p.n, p.p), (7, 7, 7));
    }

    #[test]
    fn memory_pressure_adds_exchange_rounds() {
        let p = plan(64, 64, 64, 15, 6);
        assert_eq!((p.mg1, p.mg, p.ng, p.pg, p.xc), (2, 2, 1, 4, 2));
        assert_eq!((p.m, p.n, p.p), (32, 64, 8));
        assert_eq!((p.n_procs, p.proc_mem_kb), (8, 6));
    }

    #[test]
    fn padding_rows_align_row_groups_to_exchanges() {
        let p = plan(96, 96, 24, 24, 4);
        assert_eq!((p.mg1, p.mg, p.ng, p.pg, p.xc), (3, 4, 3, 2, 2));
        assert_eq!((p.m, p.n, p.p), (32, 32, 8));
        assert_eq!(p.padding_rows(), 1);
        assert_eq!((p.n_procs, p.proc_mem_kb), (24, 4));
    }

    #[test]
    fn deep_reduction_when_rows_are_scarce() {
        let p = plan(1, 8, 1, 8, 1000);
        assert_eq!((p.mg, p.ng, p.pg), (1, 4, 1));
    }

    #[test]
    fn escalation_must_stay_below_processor_limit() {
        assert_eq!(
            infeasibility(64, 64, 64, 16, 6),
            Infeasibility::ExchangeEscalation { n_procs: 16, max_procs: 16 }
        );
    }

    #[test]
    fn tiny_memory_has_no_block_width() {
        assert_eq!(infeasibility(7, 7, 7, 1, 3), Infeasibility::NoBlockWidth { max_proc_mem_kb: 3 });
    }

    #[test]
    fn shape_is_checked_first() {
        let err = partition(&ProblemSize::new(8, 4, 4), 16, 1000).unwrap_err();
        assert!(matches!(err, SimError::InputShapeInvalid { .. }));
    }

    #[test]
    fn min_mem_objective_picks_leaner_blocks() {
        // (Mv=2, Nv=1) and (Mv=1, Nv=2) both use 2 PEs; the first found wins
        // for max-procs, the smaller footprint wins for min-mem.
        let problem = ProblemSize::new(2, 16, 2);
        let max = Partitioner::new(ObjectivePolicy::MaxProcs).partition(&problem, 4, 1000).unwrap();
        let lean = Partitioner::new(ObjectivePolicy::MinProcMem).partition(&problem, 4, 1000).unwrap();
        assert_eq!((max.mg, max.ng), (2, 1));
        assert_eq!((lean.mg, lean.ng), (1, 2));
        assert!(proc_mem_bytes(lean.m, lean.n, lean.p) < proc_mem_bytes(max.m, max.n, max.p));
    }

    #[test]
    fn divisor_helpers() {
        assert_eq!(initial_block_width(30, 4).unwrap(), 15);
        assert_eq!(next_smaller_divisor(30, 15), Some(10));
        assert_eq!(next_smaller_divisor(30, 1), None);
    }

    proptest! {
        /// Whenever a plan comes back, every invariant holds.
        #[test]
        fn feasible_plans_satisfy_invariants(
            m in 1usize..=48,
            extra_n in 0usize..=48,
            p in 1usize..=48,
            procs in 1usize..=64,
            mem in 1usize..=64,
        ) {
            let n = m.max(p) + extra_n;
            let problem = ProblemSize::new(m, n, p);
            if let Ok(plan) = partition(&problem, procs, mem) {
                prop_assert_eq!(m % plan.mg1, 0);
                prop_assert_eq!(n % plan.ng, 0);
                prop_assert_eq!(p % plan.p, 0);
                prop_assert!(plan.n_procs <= procs);
                prop_assert!(plan.proc_mem_kb <= mem);
                prop_assert!(plan.mg >= plan.xc);
                prop_assert_eq!(plan.mg % plan.xc, 0);
                prop_assert!(plan.ng > 0 && plan.pg > 0);
                prop_assert_eq!(plan.n_procs, plan.mg * plan.pg * plan.ng);
                prop_assert!(plan.pg * plan.xc * plan.p >= p);
            }
        }
    }
}
