/// PE grid: every processing element of one run, allocated together and
/// freed together.
///
/// Layout is a flat arena indexed by (row-group i, column-group k, slice j):
///   index = (i·Pg + k)·Ng + j
/// so one output tile's Ng slices are contiguous, and one row-group's tiles
/// are a contiguous run of Pg·Ng elements. A band of row-groups is therefore
/// a contiguous sub-slice, which lets the grid be split into disjoint
/// mutable views, one per worker.
use crate::partition::TilingPlan;
use crate::pe::ProcessingElement;

/// Half-open range of row-groups [start, end) handled by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBand {
    pub start: usize,
    pub end: usize,
}

impl RowBand {
    pub fn new(start: usize, end: usize) -> Self {
        RowBand { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

pub struct PeGrid {
    tiles: Vec<ProcessingElement>,
    row_groups: usize,
    col_groups: usize,
    depth: usize,
}

impl PeGrid {
    /// Allocate Mg·Pg·Ng PEs, each owning zeroed m×n, n×p, m×p buffers.
    pub fn allocate(plan: &TilingPlan, fmacs_per_cycle: u64, efficiency: f64) -> Self {
        let tiles = (0..plan.grid_tiles())
            .map(|_| ProcessingElement::new(plan.m, plan.n, plan.p, fmacs_per_cycle, efficiency))
            .collect();
        PeGrid { tiles, row_groups: plan.mg, col_groups: plan.pg, depth: plan.ng }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn linear_index(&self, row_group: usize, col_group: usize, slice: usize) -> usize {
        assert!(row_group < self.row_groups && col_group < self.col_groups && slice < self.depth);
        (row_group * self.col_groups + col_group) * self.depth + slice
    }

    pub fn tile(&self, row_group: usize, col_group: usize, slice: usize) -> &ProcessingElement {
        &self.tiles[self.linear_index(row_group, col_group, slice)]
    }

    /// Split the grid into one exclusive view per band. Bands must be ascending,
    /// contiguous from row-group 0, and cover the whole grid.
    pub fn split_bands(&mut self, bands: &[RowBand]) -> Vec<PeBand<'_>> {
        let per_row = self.col_groups * self.depth;
        let (col_groups, depth, row_groups) = (self.col_groups, self.depth, self.row_groups);
        let mut rest: &mut [ProcessingElement] = &mut self.tiles;
        let mut cursor = 0;
        let mut views = Vec::with_capacity(bands.len());
        for band in bands {
            assert_eq!(band.start, cursor, "bands must be contiguous and non-overlapping");
            assert!(band.end >= band.start && band.end <= row_groups, "band out of range");
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(band.len() * per_row);
            views.push(PeBand { tiles: head, band: *band, col_groups, depth });
            rest = tail;
            cursor = band.end;
        }
        assert_eq!(cursor, row_groups, "bands must cover every row-group");
        views
    }
}

/// Exclusive view of the PEs of a contiguous band of row-groups.
pub struct PeBand<'a> {
    tiles: &'a mut [ProcessingElement],
    band: RowBand,
    col_groups: usize,
    depth: usize,
}

impl PeBand<'_> {
    pub fn band(&self) -> RowBand {
        self.band
    }

    pub fn col_groups(&self) -> usize {
        self.col_groups
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn offset(&self, row_group: usize, col_group: usize) -> usize {
        assert!(
            row_group >= self.band.start && row_group < self.band.end,
            "row-group {} outside band {:?}",
            row_group,
            self.band
        );
        assert!(col_group < self.col_groups);
        ((row_group - self.band.start) * self.col_groups + col_group) * self.depth
    }

    /// All Ng slices of the output tile at (row_group, col_group).
    pub fn output_tile(&self, row_group: usize, col_group: usize) -> &[ProcessingElement] {
        let start = self.offset(row_group, col_group);
        &self.tiles[start..start + self.depth]
    }

    pub fn output_tile_mut(&mut self, row_group: usize, col_group: usize) -> &mut [ProcessingElement] {
        let start = self.offset(row_group, col_group);
        &mut self.tiles[start..start + self.depth]
    }

    pub fn tile_mut(&mut self, row_group: usize, col_group: usize, slice: usize) -> &mut ProcessingElement {
        assert!(slice < self.depth);
        &mut self.output_tile_mut(row_group, col_group)[slice]
    }
}

/// Holding slots for one X block per reduction slice, used while rotating X
/// around an exchange group. Each band owns its own.
pub struct ScratchRow {
    slots: Vec<Vec<f32>>,
}

impl ScratchRow {
    pub fn new(depth: usize) -> Self {
        ScratchRow { slots: vec![Vec::new(); depth] }
    }

    pub fn stash(&mut self, slice: usize, x: Vec<f32>) {
        self.slots[slice] = x;
    }

    pub fn take(&mut self, slice: usize) -> Vec<f32> {
        std::mem::take(&mut self.slots[slice])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(mg: usize, pg: usize, ng: usize) -> TilingPlan {
        TilingPlan {
            mg1: mg,
            mg,
            ng,
            pg,
            xc: 1,
            m: 1,
            n: 1,
            p: 1,
            n_procs: mg * pg * ng,
            proc_mem_kb: 0,
        }
    }

    #[test]
    fn linear_index_layout() {
        let grid = PeGrid::allocate(&plan(3, 2, 4), 1, 1.0);
        assert_eq!(grid.len(), 24);
        assert_eq!(grid.linear_index(0, 0, 0), 0);
        assert_eq!(grid.linear_index(0, 1, 0), 4);
        assert_eq!(grid.linear_index(1, 0, 3), 11);
        assert_eq!(grid.linear_index(2, 1, 3), 23);
    }

    #[test]
    fn bands_address_their_own_row_groups() {
        let mut grid = PeGrid::allocate(&plan(4, 2, 3), 1, 1.0);
        let mut bands = grid.split_bands(&[RowBand::new(0, 1), RowBand::new(1, 4)]);
        assert_eq!(bands[0].output_tile(0, 1).len(), 3);
        assert_eq!(bands[1].output_tile_mut(3, 1).len(), 3);
        assert_eq!(bands[1].band(), RowBand::new(1, 4));
    }

    #[test]
    #[should_panic(expected = "outside band")]
    fn band_rejects_foreign_rows() {
        let mut grid = PeGrid::allocate(&plan(4, 1, 1), 1, 1.0);
        let mut bands = grid.split_bands(&[RowBand::new(0, 2), RowBand::new(2, 4)]);
        bands[0].tile_mut(2, 0, 0);
    }

    #[test]
    #[should_panic(expected = "contiguous")]
    fn overlapping_bands_are_rejected() {
        let mut grid = PeGrid::allocate(&plan(4, 1, 1), 1, 1.0);
        grid.split_bands(&[RowBand::new(0, 3), RowBand::new(2, 4)]);
    }

    #[test]
    #[should_panic(expected = "cover")]
    fn partial_cover_is_rejected() {
        let mut grid = PeGrid::allocate(&plan(4, 1, 1), 1, 1.0);
        grid.split_bands(&[RowBand::new(0, 2)]);
    }

    #[test]
    fn scratch_slots_move_buffers() {
        let mut scratch = ScratchRow::new(2);
        scratch.stash(1, vec![1.0, 2.0]);
        assert_eq!(scratch.take(1), vec![1.0, 2.0]);
        assert!(scratch.take(1).is_empty());
    }
}
