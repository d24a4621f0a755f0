/// Processing element (PE): one compute unit with private local memory.
/// Each PE owns its W, X and partial-sum buffers and performs one block
/// multiply s = w·x per round.
use crate::matrix::Matrix;

/// Cycle estimate for an m×n by n×p block product:
/// ceil( m·p·(2n−1) / (2·fmacs) / efficiency ).
/// Efficiency < 1 accounts for cycles lost loading the block working set.
pub fn block_product_cycles(m: usize, n: usize, p: usize, fmacs_per_cycle: u64, efficiency: f64) -> u64 {
    if m == 0 || n == 0 || p == 0 {
        return 0;
    }
    let flops = (m * p * (2 * n - 1)) as f64;
    let flops_per_cycle = (2 * fmacs_per_cycle) as f64;
    (flops / flops_per_cycle / efficiency).ceil() as u64
}

#[derive(Debug, Clone)]
pub struct ProcessingElement {
    pub m: usize,
    pub n: usize,
    pub p: usize,
    /// Local W block, m×n row-major
    w: Vec<f32>,
    /// Local X block, n×p row-major. Moves between PEs during exchange.
    x: Vec<f32>,
    /// Partial sums, m×p row-major. Overwritten by every compute.
    s: Vec<f32>,
    fmacs_per_cycle: u64,
    efficiency: f64,
}

impl ProcessingElement {
    pub fn new(m: usize, n: usize, p: usize, fmacs_per_cycle: u64, efficiency: f64) -> Self {
        ProcessingElement {
            m,
            n,
            p,
            w: vec![0.0; m * n],
            x: vec![0.0; n * p],
            s: vec![0.0; m * p],
            fmacs_per_cycle,
            efficiency,
        }
    }

    pub fn load_w(&mut self, src: &Matrix, row0: usize, col0: usize) {
        src.copy_block_into(row0, col0, self.m, self.n, &mut self.w);
    }

    pub fn load_x(&mut self, src: &Matrix, row0: usize, col0: usize) {
        src.copy_block_into(row0, col0, self.n, self.p, &mut self.x);
    }

    /// Zero the X block (a column group beyond the edge of X).
    pub fn clear_x(&mut self) {
        self.x.fill(0.0);
    }

    /// Hand the X block to the exchange engine.
    pub fn take_x(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.x)
    }

    pub fn put_x(&mut self, x: Vec<f32>) {
        debug_assert_eq!(x.len(), self.n * self.p);
        self.x = x;
    }

    pub fn x(&self) -> &[f32] {
        &self.x
    }

    pub fn partial_sums(&self) -> &[f32] {
        &self.s
    }

    /// Fold another PE's partial sums into this one's.
    pub fn accumulate(&mut self, other: &ProcessingElement) {
        debug_assert_eq!(self.s.len(), other.s.len());
        for (acc, &v) in self.s.iter_mut().zip(&other.s) {
            *acc += v;
        }
    }

    /// s = w · x, returning the modelled cycle cost of the block product.
    pub fn compute_local_product(&mut self) -> u64 {
        let (m, n, p) = (self.m, self.n, self.p);
        self.s.fill(0.0);
        for i in 0..m {
            let s_row = &mut self.s[i * p..(i + 1) * p];
            for l in 0..n {
                let a = self.w[i * n + l];
                if a == 0.0 {
                    continue;
                }
                let x_row = &self.x[l * p..(l + 1) * p];
                for (acc, &b) in s_row.iter_mut().zip(x_row) {
                    *acc += a * b;
                }
            }
        }
        block_product_cycles(m, n, p, self.fmacs_per_cycle, self.efficiency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_model() {
        // 7·7·13 = 637 flops / 128 per cycle / 0.8 = 6.22 -> 7
        assert_eq!(block_product_cycles(7, 7, 7, 64, 0.8), 7);
        // 32·8·127 = 32512 / 128 = 254 / 0.8 = 317.5 -> 318
        assert_eq!(block_product_cycles(32, 64, 8, 64, 0.8), 318);
        // perfect efficiency, exact division
        assert_eq!(block_product_cycles(2, 2, 2, 3, 1.0), 2);
    }

    #[test]
    fn local_product_matches_reference() {
        let w = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let x = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let mut pe = ProcessingElement::new(2, 3, 2, 64, 0.8);
        pe.load_w(&w, 0, 0);
        pe.load_x(&x, 0, 0);
        pe.compute_local_product();
        assert_eq!(pe.partial_sums(), w.multiply(&x).unwrap().as_slice());
    }

    #[test]
    fn compute_overwrites_previous_sums() {
        let ones = Matrix::from_vec(1, 1, vec![1.0]).unwrap();
        let mut pe = ProcessingElement::new(1, 1, 1, 1, 1.0);
        pe.load_w(&ones, 0, 0);
        pe.load_x(&ones, 0, 0);
        pe.compute_local_product();
        pe.compute_local_product();
        assert_eq!(pe.partial_sums(), &[1.0]);
        pe.clear_x();
        pe.compute_local_product();
        assert_eq!(pe.partial_sums(), &[0.0]);
    }
}
