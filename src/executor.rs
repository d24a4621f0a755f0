/// Tile execution engine.
/// Drives one band of row-groups through staging, then Xc rounds of
/// compute → reduce → write-back → exchange. Each output tile (i, k) ends a
/// round with its reduced block in slice 0, which is copied into Y at the
/// column block its X currently belongs to.
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::exchange::ExchangeEngine;
use crate::grid::{PeBand, ScratchRow};
use crate::matrix::{Matrix, RowsMut};
use crate::partition::TilingPlan;
use crate::reduce::ReductionEngine;

/// Cycle totals for one worker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounters {
    pub compute: u64,
    pub reduce: u64,
    pub exchange: u64,
}

impl CycleCounters {
    pub fn total(&self) -> u64 {
        self.compute + self.reduce + self.exchange
    }
}

/// How the compute cycles of one round are represented.
///
/// Every PE of a round computes in parallel with identical block shapes, so
/// one slice's cost stands for the whole round by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeCyclePolicy {
    /// Cost of the last slice computed in the round
    #[default]
    LastSlice,
    /// Sum over the Ng slices of the last tile computed in the round
    Summed,
}

impl ComputeCyclePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ComputeCyclePolicy::LastSlice => "last-slice",
            ComputeCyclePolicy::Summed => "summed",
        }
    }
}

impl FromStr for ComputeCyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-slice" => Ok(ComputeCyclePolicy::LastSlice),
            "summed" => Ok(ComputeCyclePolicy::Summed),
            other => Err(format!("unknown compute policy '{}' (expected last-slice or summed)", other)),
        }
    }
}

/// Runs the rounds of one band. Shared read-only between workers.
#[derive(Debug, Clone, Copy)]
pub struct TileExecutor {
    pub plan: TilingPlan,
    /// Columns of X and Y
    pub cols: usize,
    pub reduction: ReductionEngine,
    pub exchange: ExchangeEngine,
    pub policy: ComputeCyclePolicy,
}

impl TileExecutor {
    pub fn new(
        plan: TilingPlan,
        cols: usize,
        reduction: ReductionEngine,
        exchange: ExchangeEngine,
        policy: ComputeCyclePolicy,
    ) -> Self {
        TileExecutor { plan, cols, reduction, exchange, policy }
    }

    /// Column block of X held by row-group `row` for column-group `k` after `round` exchanges.
    fn column_block(&self, row: usize, k: usize, round: usize) -> usize {
        k * self.plan.xc + (row + round) % self.plan.xc
    }

    /// Load W and X blocks for every PE of the band.
    /// Padding row-groups keep a zero W; column blocks past the edge of X are zeroed.
    pub fn stage(&self, band: &mut PeBand<'_>, w: &Matrix, x: &Matrix) {
        let TilingPlan { mg1, pg, ng, m, n, p, .. } = self.plan;
        let rows = band.band();
        for i in rows.start..rows.end {
            for k in 0..pg {
                let k1 = self.column_block(i, k, 0);
                for j in 0..ng {
                    let pe = band.tile_mut(i, k, j);
                    if k1 * p < self.cols {
                        pe.load_x(x, j * n, k1 * p);
                    } else {
                        pe.clear_x();
                    }
                    if i < mg1 {
                        pe.load_w(w, i * m, j * n);
                    }
                }
            }
        }
    }

    /// Stage the band, run all Xc rounds, and write results into `out`.
    pub fn run(
        &self,
        band: &mut PeBand<'_>,
        out: &mut RowsMut<'_>,
        scratch: &mut ScratchRow,
        w: &Matrix,
        x: &Matrix,
    ) -> CycleCounters {
        self.stage(band, w, x);

        let TilingPlan { mg1, pg, xc, m, p, .. } = self.plan;
        let rows = band.band();
        let mut counters = CycleCounters::default();

        for round in 0..xc {
            let mut compute = 0;
            let mut reduce = 0;
            let mut exchange = 0;

            for i in rows.start..rows.end {
                for k in 0..pg {
                    let slices = band.output_tile_mut(i, k);
                    let per_slice = slices.iter_mut().map(|pe| pe.compute_local_product());
                    compute = match self.policy {
                        ComputeCyclePolicy::LastSlice => per_slice.fold(0, |_, cycles| cycles),
                        ComputeCyclePolicy::Summed => per_slice.sum(),
                    };
                    reduce = self.reduction.reduce(slices);

                    let k1 = self.column_block(i, k, round);
                    if i < mg1 && k1 * p < self.cols {
                        out.write_block(i * m, k1 * p, m, p, slices[0].partial_sums());
                    }
                }
            }

            if round + 1 < xc {
                exchange = self.exchange.rotate(band, scratch);
            }

            counters.compute += compute;
            counters.reduce += reduce;
            counters.exchange += exchange;
        }

        log::debug!(
            "band [{}, {}): compute={} reduce={} exchange={}",
            rows.start,
            rows.end,
            counters.compute,
            counters.reduce,
            counters.exchange
        );
        counters
    }
}
