pub mod driver;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod grid;
pub mod matrix;
pub mod metrics;
pub mod objective;
pub mod partition;
pub mod pe;
pub mod problem;
pub mod profile;
pub mod reduce;
pub mod report;
pub mod sweep;
pub mod verify;

pub use driver::{ParallelDriver, SimulationResult, simulate};
pub use error::{Infeasibility, Result, SimError};
pub use partition::{TilingPlan, partition};
pub use problem::ProblemSize;
pub use profile::HardwareProfile;
