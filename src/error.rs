//! Error types for planning and simulation.

use thiserror::Error;

/// The constraint a tiling plan could not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Infeasibility {
    /// A quarter of the per-PE memory budget cannot hold a single column.
    NoBlockWidth { max_proc_mem_kb: usize },
    /// Shrinking the P-dimension block reached zero before memory fit.
    BlockWidthExhausted { p: usize },
    /// More processors needed than the hardware provides.
    ProcessorBudget { n_procs: usize, max_procs: usize },
    /// Adding exchange rounds did not bring the active processors below the limit.
    ExchangeEscalation { n_procs: usize, max_procs: usize },
    /// Per-PE footprint exceeds the memory budget.
    MemoryBudget { proc_mem_kb: usize, max_proc_mem_kb: usize },
    /// Fewer row-groups than exchange rounds, or row-groups not a multiple of them.
    ExchangeAlignment { mg: usize, xc: usize },
    /// M is not split evenly across the real row-groups.
    RowDivisibility { m: usize, mg1: usize },
    /// N is not split evenly across the reduction depth.
    ReductionDivisibility { n: usize, ng: usize },
    /// P is not a whole number of column blocks.
    ColumnDivisibility { p: usize, block: usize },
    /// One of Mg, Ng, Pg came out as zero.
    EmptyGroup { mg: usize, ng: usize, pg: usize },
}

impl std::fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Infeasibility::NoBlockWidth { max_proc_mem_kb } => write!(
                f,
                "no block width fits in a quarter of {} KB per-PE memory",
                max_proc_mem_kb
            ),
            Infeasibility::BlockWidthExhausted { p } => write!(
                f,
                "block width shrank to {} before the per-PE memory budget was met",
                p
            ),
            Infeasibility::ProcessorBudget { n_procs, max_procs } => {
                write!(f, "plan needs {} processors, limit is {}", n_procs, max_procs)
            }
            Infeasibility::ExchangeEscalation { n_procs, max_procs } => write!(
                f,
                "{} processors still active after adding exchange rounds, must stay below {}",
                n_procs, max_procs
            ),
            Infeasibility::MemoryBudget { proc_mem_kb, max_proc_mem_kb } => write!(
                f,
                "plan needs {} KB per PE, limit is {} KB",
                proc_mem_kb, max_proc_mem_kb
            ),
            Infeasibility::ExchangeAlignment { mg, xc } => write!(
                f,
                "{} row-groups cannot be aligned to {} exchange rounds",
                mg, xc
            ),
            Infeasibility::RowDivisibility { m, mg1 } => {
                write!(f, "M={} is not divisible by {} row-groups", m, mg1)
            }
            Infeasibility::ReductionDivisibility { n, ng } => {
                write!(f, "N={} is not divisible by reduction depth {}", n, ng)
            }
            Infeasibility::ColumnDivisibility { p, block } => {
                write!(f, "P={} is not divisible by block width {}", p, block)
            }
            Infeasibility::EmptyGroup { mg, ng, pg } => {
                write!(f, "empty grid dimension (Mg={}, Ng={}, Pg={})", mg, ng, pg)
            }
        }
    }
}

/// Errors that can occur while planning or simulating a matrix multiply.
#[derive(Debug, Error)]
pub enum SimError {
    /// The problem cannot be tiled under the given hardware limits.
    #[error("configuration infeasible: {0}")]
    ConfigurationInfeasible(Infeasibility),

    /// Contraction dimension smaller than an output dimension, or a zero dimension.
    #[error(
        "input shape invalid: W is {m}x{n}, X is {n}x{p}; \
         the middle dimension must be non-zero and at least as large as both outer dimensions"
    )]
    InputShapeInvalid { m: usize, n: usize, p: usize },

    /// Hardware profile with out-of-range parameters.
    #[error("invalid hardware profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    /// Matrix buffers do not match the declared problem size.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Profile file could not be read.
    #[error("profile file error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile file is not valid JSON for a hardware profile.
    #[error("profile parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be started.
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<Infeasibility> for SimError {
    fn from(reason: Infeasibility) -> Self {
        SimError::ConfigurationInfeasible(reason)
    }
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
