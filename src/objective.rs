/// Partition objectives.
///
/// The partitioner enumerates (Nv, Mv) divisor pairs of N and M in ascending
/// order (Nv outer, Mv inner) and asks an objective whether each candidate
/// beats the current incumbent. A candidate only wins when it is strictly
/// better, so among equally scored candidates the lexicographically smallest
/// (Nv, Mv) is kept.
///
/// Two objectives are implemented:
///   - MaxProcs: maximize active processors Mv·Nv·Pg (default)
///   - MinProcMem: minimize the per-PE memory footprint
use std::str::FromStr;

/// One grid shape considered by the greedy search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Row-groups (divides M)
    pub mv: usize,
    /// Reduction depth (divides N)
    pub nv: usize,
    /// Column-groups, fixed for the whole search
    pub pg: usize,
    /// Per-PE footprint in bytes for this shape
    pub proc_mem_bytes: usize,
}

impl Candidate {
    pub fn n_procs(&self) -> usize {
        self.mv * self.nv * self.pg
    }
}

/// Trait for partition objectives.
pub trait PartitionObjective: Send + Sync {
    /// True if `candidate` should replace `incumbent`. Must be strict:
    /// equal candidates return false so the earlier one is kept.
    fn prefers(&self, candidate: &Candidate, incumbent: &Candidate) -> bool;

    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Maximize processors
// ---------------------------------------------------------------------------

/// Use as many PEs as the budget allows. More PEs means smaller blocks and
/// shorter per-round compute, at the price of deeper reductions.
pub struct MaxProcs;

impl PartitionObjective for MaxProcs {
    fn prefers(&self, candidate: &Candidate, incumbent: &Candidate) -> bool {
        candidate.n_procs() > incumbent.n_procs()
    }

    fn name(&self) -> &'static str {
        "max-procs"
    }
}

// ---------------------------------------------------------------------------
// Minimize per-PE memory
// ---------------------------------------------------------------------------

/// Pick the shape with the smallest local footprint, which leaves the most
/// room before the partitioner has to fall back to exchange rounds.
pub struct MinProcMem;

impl PartitionObjective for MinProcMem {
    fn prefers(&self, candidate: &Candidate, incumbent: &Candidate) -> bool {
        candidate.proc_mem_bytes < incumbent.proc_mem_bytes
    }

    fn name(&self) -> &'static str {
        "min-mem"
    }
}

// ---------------------------------------------------------------------------
// Policy selector
// ---------------------------------------------------------------------------

/// Selectable partition objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectivePolicy {
    #[default]
    MaxProcs,
    MinProcMem,
}

impl ObjectivePolicy {
    pub fn build(self) -> Box<dyn PartitionObjective> {
        match self {
            ObjectivePolicy::MaxProcs => Box::new(MaxProcs),
            ObjectivePolicy::MinProcMem => Box::new(MinProcMem),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObjectivePolicy::MaxProcs => "max-procs",
            ObjectivePolicy::MinProcMem => "min-mem",
        }
    }
}

impl FromStr for ObjectivePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max-procs" => Ok(ObjectivePolicy::MaxProcs),
            "min-mem" => Ok(ObjectivePolicy::MinProcMem),
            other => Err(format!("unknown objective '{}' (expected max-procs or min-mem)", other)),
        }
    }
}

impl std::fmt::Display for ObjectivePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(mv: usize, nv: usize, mem: usize) -> Candidate {
        Candidate { mv, nv, pg: 2, proc_mem_bytes: mem }
    }

    #[test]
    fn ties_keep_incumbent() {
        let first = cand(4, 1, 100);
        let same_procs = cand(2, 2, 50);
        assert!(!MaxProcs.prefers(&same_procs, &first));
        assert!(!MinProcMem.prefers(&cand(1, 1, 100), &first));
    }

    #[test]
    fn objectives_disagree_on_shape() {
        let big = cand(4, 2, 900);
        let lean = cand(2, 2, 400);
        assert!(MaxProcs.prefers(&big, &lean));
        assert!(MinProcMem.prefers(&lean, &big));
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("min-mem".parse::<ObjectivePolicy>(), Ok(ObjectivePolicy::MinProcMem));
        assert_eq!(ObjectivePolicy::default().build().name(), "max-procs");
        assert!("fastest".parse::<ObjectivePolicy>().is_err());
    }
}
