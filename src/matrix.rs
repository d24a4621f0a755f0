/// Dense row-major matrices and disjoint mutable row views.
///
/// Values are stored as f32 (the accumulation format of a PE). Integer-valued
/// products and sums stay exact while every partial sum is below 2^24 in
/// magnitude; larger inputs can differ from the f64 reference by rounding.
use rand::Rng;

use crate::error::{Result, SimError};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SimError::DimensionMismatch(format!(
                "{} values cannot fill a {}x{} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Random integers in [0, bound), stored as f32.
    pub fn random_integers<R: Rng>(rows: usize, cols: usize, bound: u32, rng: &mut R) -> Self {
        let data = (0..rows * cols)
            .map(|_| rng.random_range(0..bound) as f32)
            .collect();
        Matrix { rows, cols, data }
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copy the `rows × cols` block starting at (row0, col0) into `dst` (row-major).
    pub fn copy_block_into(&self, row0: usize, col0: usize, rows: usize, cols: usize, dst: &mut [f32]) {
        assert!(row0 + rows <= self.rows && col0 + cols <= self.cols);
        assert_eq!(dst.len(), rows * cols);
        for (r, dst_row) in dst.chunks_exact_mut(cols).enumerate() {
            let start = (row0 + r) * self.cols + col0;
            dst_row.copy_from_slice(&self.data[start..start + cols]);
        }
    }

    /// Dense reference product, accumulated in f64.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(SimError::DimensionMismatch(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        let mut acc = vec![0.0f64; other.cols];
        for i in 0..self.rows {
            acc.iter_mut().for_each(|a| *a = 0.0);
            for l in 0..self.cols {
                let a = self.get(i, l) as f64;
                let b_row = &other.data[l * other.cols..(l + 1) * other.cols];
                for (sum, &b) in acc.iter_mut().zip(b_row) {
                    *sum += a * b as f64;
                }
            }
            for (j, &sum) in acc.iter().enumerate() {
                out.set(i, j, sum as f32);
            }
        }
        Ok(out)
    }

    /// Split into contiguous row ranges, one mutable view per range.
    /// Ranges must be ascending, contiguous from row 0, and end at or before `self.rows`.
    pub fn split_rows_mut(&mut self, ranges: &[(usize, usize)]) -> Vec<RowsMut<'_>> {
        let cols = self.cols;
        let mut rest: &mut [f32] = &mut self.data;
        let mut cursor = 0;
        let mut views = Vec::with_capacity(ranges.len());
        for &(start, end) in ranges {
            assert_eq!(start, cursor, "row ranges must be contiguous");
            assert!(end >= start && end <= self.rows, "row range out of bounds");
            let (head, tail) = std::mem::take(&mut rest).split_at_mut((end - start) * cols);
            views.push(RowsMut { data: head, first_row: start, cols });
            rest = tail;
            cursor = end;
        }
        views
    }
}

/// Exclusive view of a contiguous band of matrix rows.
pub struct RowsMut<'a> {
    data: &'a mut [f32],
    first_row: usize,
    cols: usize,
}

impl RowsMut<'_> {
    /// Rows covered by this view, in global coordinates
    pub fn row_range(&self) -> std::ops::Range<usize> {
        let rows = if self.cols == 0 { 0 } else { self.data.len() / self.cols };
        self.first_row..self.first_row + rows
    }

    /// Write a row-major `rows × cols` block at global (row0, col0), rounding
    /// each value to the nearest integer.
    pub fn write_block(&mut self, row0: usize, col0: usize, rows: usize, cols: usize, src: &[f32]) {
        let range = self.row_range();
        assert!(row0 >= range.start && row0 + rows <= range.end, "block outside row band");
        assert!(col0 + cols <= self.cols);
        assert_eq!(src.len(), rows * cols);
        for (r, src_row) in src.chunks_exact(cols).enumerate() {
            let start = (row0 - self.first_row + r) * self.cols + col0;
            for (dst, &v) in self.data[start..start + cols].iter_mut().zip(src_row) {
                *dst = v.round();
            }
        }
    }
}
