/// Numerical verification of a simulated product against a dense reference.
/// Both sides are rounded to integers before comparison.
use std::time::Instant;

use serde::Serialize;

use crate::error::{Result, SimError};
use crate::matrix::Matrix;

/// Integers up to 2^24 are exactly representable in f32.
pub const F32_EXACT_LIMIT: f64 = 16_777_216.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub row: usize,
    pub col: usize,
    pub actual: f32,
    pub expected: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub mismatches: usize,
    pub first_mismatch: Option<Mismatch>,
    /// Wall time of the reference multiply
    pub reference_ms: f64,
    /// False when a partial sum may exceed `F32_EXACT_LIMIT`; mismatches are
    /// then expected from f32 rounding alone.
    pub exact: bool,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compare `actual` against `expected` element by element after rounding.
pub fn compare(actual: &Matrix, expected: &Matrix) -> (usize, Option<Mismatch>) {
    let mut count = 0;
    let mut first = None;
    for row in 0..expected.rows.min(actual.rows) {
        for col in 0..expected.cols.min(actual.cols) {
            let (a, e) = (actual.get(row, col), expected.get(row, col));
            if a.round() != e.round() {
                count += 1;
                first.get_or_insert(Mismatch { row, col, actual: a, expected: e });
            }
        }
    }
    (count, first)
}

/// Upper bound on |partial sum| of W·X: N · max|w| · max|x|.
pub fn worst_case_sum(w: &Matrix, x: &Matrix) -> f64 {
    let max_abs = |m: &Matrix| m.as_slice().iter().fold(0.0f64, |acc, v| acc.max(v.abs() as f64));
    w.cols as f64 * max_abs(w) * max_abs(x)
}

/// Multiply W·X densely and compare with the simulated Y.
pub fn verify(w: &Matrix, x: &Matrix, y: &Matrix) -> Result<Verification> {
    let start = Instant::now();
    let expected = w.multiply(x)?;
    let reference_ms = start.elapsed().as_secs_f64() * 1000.0;
    if (y.rows, y.cols) != (expected.rows, expected.cols) {
        return Err(SimError::DimensionMismatch(format!(
            "Y is {}x{}, reference is {}x{}",
            y.rows, y.cols, expected.rows, expected.cols
        )));
    }

    let bound = worst_case_sum(w, x);
    let exact = bound < F32_EXACT_LIMIT;
    if !exact {
        log::warn!("partial sums may reach {:.0}, beyond exact f32 integers; mismatches may be rounding", bound);
    }

    let (mismatches, first_mismatch) = compare(y, &expected);
    Ok(Verification { mismatches, first_mismatch, reference_ms, exact })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_hides_float_noise() {
        let a = Matrix::from_vec(1, 2, vec![3.0001, 5.0]).unwrap();
        let b = Matrix::from_vec(1, 2, vec![3.0, 5.0]).unwrap();
        assert_eq!(compare(&a, &b), (0, None));
    }

    #[test]
    fn reports_first_mismatch() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 9.0, 8.0]).unwrap();
        let b = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let (count, first) = compare(&a, &b);
        assert_eq!(count, 2);
        assert_eq!(first, Some(Mismatch { row: 1, col: 0, actual: 9.0, expected: 3.0 }));
    }

    #[test]
    fn identity_product_verifies() {
        let w = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let x = Matrix::from_vec(2, 2, vec![4.0, 5.0, 6.0, 7.0]).unwrap();
        let verification = verify(&w, &x, &x).unwrap();
        assert!(verification.passed());
        assert!(verification.exact);
    }

    #[test]
    fn large_inputs_are_flagged_inexact() {
        // 4 · 3000 · 2000 = 2.4e7 > 2^24
        let w = Matrix::from_vec(1, 4, vec![3000.0, 1.0, -2.0, 0.0]).unwrap();
        let x = Matrix::from_vec(4, 1, vec![2000.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(worst_case_sum(&w, &x), 24_000_000.0);

        let y = w.multiply(&x).unwrap();
        let verification = verify(&w, &x, &y).unwrap();
        assert!(verification.passed());
        assert!(!verification.exact);
    }
}
