/// Partial-sum reduction along the Ng (reduction-depth) dimension.
///
/// The Ng PEs that share an output tile combine their partial sums with a
/// binary tree: ⌈log₂(Ng)⌉ steps, and in step r every slice j that is a
/// multiple of 2^(r+1) absorbs slice j + 2^r. Slice 0 ends up holding the
/// full sum; the slices folded into it are stale afterwards.
///
/// Cost per step = transfer of one m×p tile over the link + the additions
/// (multipliers sit idle, so only one op per FMA slot):
///   16 + ⌈log₂(Ng)⌉ · ( ⌈elem·m·p / bw⌉ + ⌈m·p / fmacs⌉ )
use crate::pe::ProcessingElement;

/// Fixed setup overhead of a reduction, in cycles
pub const REDUCTION_SETUP_CYCLES: u64 = 16;

/// Bytes per partial-sum element on the wire (sums travel as 16-bit values)
pub const REDUCTION_ELEMENT_BYTES: u64 = 2;

/// ⌈log₂(n)⌉ for n ≥ 1, without going through floating point.
pub fn tree_steps(n: usize) -> u32 {
    if n <= 1 { 0 } else { n.next_power_of_two().trailing_zeros() }
}

#[derive(Debug, Clone, Copy)]
pub struct ReductionEngine {
    /// Bytes per element on the wire
    pub element_bytes: u64,
    /// Link bandwidth in bytes per cycle
    pub bandwidth: u64,
    /// Adds per cycle
    pub fmacs_per_cycle: u64,
}

impl ReductionEngine {
    pub fn new(bandwidth: u64, fmacs_per_cycle: u64) -> Self {
        ReductionEngine { element_bytes: REDUCTION_ELEMENT_BYTES, bandwidth, fmacs_per_cycle }
    }

    /// Modelled cycles to reduce `depth` m×p tiles.
    pub fn cost(&self, depth: usize, m: usize, p: usize) -> u64 {
        let tile = (m * p) as u64;
        let transfer = (self.element_bytes * tile).div_ceil(self.bandwidth);
        let adds = tile.div_ceil(self.fmacs_per_cycle);
        REDUCTION_SETUP_CYCLES + tree_steps(depth) as u64 * (transfer + adds)
    }

    /// Fold all slices of one output tile into slice 0 and return the cycle cost.
    pub fn reduce(&self, slices: &mut [ProcessingElement]) -> u64 {
        let depth = slices.len();
        for r in 0..tree_steps(depth) {
            let stride = 1usize << r;
            for j in (0..depth).step_by(stride * 2) {
                let partner = j + stride;
                if partner < depth {
                    let (lower, upper) = slices.split_at_mut(partner);
                    lower[j].accumulate(&upper[0]);
                }
            }
        }

        match slices.first() {
            Some(pe) => self.cost(depth, pe.m, pe.p),
            None => REDUCTION_SETUP_CYCLES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use proptest::prelude::*;

    /// `depth` 1×1×1 PEs whose partial sums are the given values.
    fn slices_with(values: &[f32]) -> Vec<ProcessingElement> {
        let one = Matrix::from_vec(1, 1, vec![1.0]).unwrap();
        values
            .iter()
            .map(|&v| {
                let mut pe = ProcessingElement::new(1, 1, 1, 1, 1.0);
                pe.load_w(&one, 0, 0);
                pe.load_x(&Matrix::from_vec(1, 1, vec![v]).unwrap(), 0, 0);
                pe.compute_local_product();
                pe
            })
            .collect()
    }

    #[test]
    fn steps_are_ceil_log2() {
        let steps: Vec<u32> = (1..=9).map(tree_steps).collect();
        assert_eq!(steps, vec![0, 1, 2, 2, 3, 3, 3, 3, 4]);
    }

    #[test]
    fn single_slice_is_setup_only_and_untouched() {
        let engine = ReductionEngine::new(4, 64);
        let mut slices = slices_with(&[5.0]);
        assert_eq!(engine.reduce(&mut slices), REDUCTION_SETUP_CYCLES);
        assert_eq!(slices[0].partial_sums(), &[5.0]);
    }

    #[test]
    fn non_power_of_two_depth_sums_everything() {
        let engine = ReductionEngine::new(4, 64);
        let mut slices = slices_with(&[1.0, 2.0, 3.0]);
        engine.reduce(&mut slices);
        assert_eq!(slices[0].partial_sums(), &[6.0]);
    }

    #[test]
    fn cost_model() {
        // m·p = 256: transfer ⌈512/4⌉ = 128, adds ⌈256/64⌉ = 4, two steps for Ng=3
        let engine = ReductionEngine::new(4, 64);
        assert_eq!(engine.cost(3, 32, 8), 16 + 2 * 132);
        // m·p = 1: transfer ⌈2/4⌉ = 1, adds ⌈1/64⌉ = 1
        assert_eq!(engine.cost(4, 1, 1), 20);
    }

    proptest! {
        #[test]
        fn slice_zero_holds_the_total(values in proptest::collection::vec(0u8..100, 1..=33)) {
            let values: Vec<f32> = values.into_iter().map(f32::from).collect();
            let mut slices = slices_with(&values);
            ReductionEngine::new(8, 4).reduce(&mut slices);
            prop_assert_eq!(slices[0].partial_sums()[0], values.iter().sum::<f32>());
        }
    }
}
