//! Parallel iterative PageRank.
//!
//! Every iteration normalizes the ranks by out-degree, pools the rank of sinks, accumulates
//! the normalized ranks of each group's sources into its destination (one task per
//! partition), then applies damping and measures the change.

pub use config::{DeltaReference, PageRankConfig, Teleport, DAMPING_FACTOR, THRESHOLD};
pub use engine::{normalize, IterationStats, PageRank, Ranks, State};
pub use output::{write_ranks, write_ranks_file};

mod config;
mod engine;
mod output;

use crate::{error::Result, helpers::HelperArrays, partition::Partition, rle::RecordStream};

/// Runs PageRank to convergence.
pub fn run(
    stream: &RecordStream,
    helpers: &HelperArrays,
    partitions: &[Partition],
    config: &PageRankConfig,
) -> Result<Ranks> {
    PageRank::new(stream, helpers, partitions, config)?.run()
}
