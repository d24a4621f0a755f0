/// Problem shape for a blocked multiply W[M×N] · X[N×P] = Y[M×P].
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSize {
    /// Rows of W and Y
    pub m: usize,
    /// Contraction dimension: columns of W, rows of X
    pub n: usize,
    /// Columns of X and Y
    pub p: usize,
}

impl ProblemSize {
    pub fn new(m: usize, n: usize, p: usize) -> Self {
        ProblemSize { m, n, p }
    }

    /// Convenience constructor for square problems (used by the sweep)
    pub fn square(n: usize) -> Self {
        ProblemSize { m: n, n, p: n }
    }

    /// The simulator only models shapes where the contraction dimension is at
    /// least as large as both outer dimensions.
    pub fn validate(&self) -> Result<()> {
        let zero = self.m == 0 || self.n == 0 || self.p == 0;
        if zero || self.n < self.m || self.n < self.p {
            return Err(SimError::InputShapeInvalid { m: self.m, n: self.n, p: self.p });
        }
        Ok(())
    }

    /// Scalar FLOPs of the full product: M·P·(2N−1). Zero for an empty shape.
    pub fn total_flops(&self) -> u64 {
        (self.m as u64) * (self.p as u64) * (2 * self.n as u64).saturating_sub(1)
    }
}

impl std::fmt::Display for ProblemSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} · {}x{}", self.m, self.n, self.n, self.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_narrow_contraction() {
        assert!(ProblemSize::new(8, 4, 4).validate().is_err());
        assert!(ProblemSize::new(4, 4, 8).validate().is_err());
        assert!(ProblemSize::new(0, 4, 4).validate().is_err());
        assert!(ProblemSize::new(4, 8, 2).validate().is_ok());
    }

    #[test]
    fn flop_count() {
        // 2x3 · 3x4: each of 8 outputs needs 3 multiplies and 2 adds
        assert_eq!(ProblemSize::new(2, 3, 4).total_flops(), 40);
    }

    #[test]
    fn empty_shapes_have_no_flops() {
        assert_eq!(ProblemSize::new(0, 0, 0).total_flops(), 0);
        assert_eq!(ProblemSize::new(3, 0, 2).total_flops(), 0);
        assert_eq!(ProblemSize::new(0, 5, 2).total_flops(), 0);
    }
}
