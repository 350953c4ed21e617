use crate::{helpers::HelperArrays, rle::RecordStream};
use derive_more::Display;

/// Summary of a graph file.
#[derive(Debug, Display, PartialEq, Eq)]
#[display(
    fmt = "records: {}\ngroups: {}\nedges: {}\nmax node id: {}\nvalid nodes: {}\nsinks: {}",
    num_records,
    num_groups,
    num_edges,
    max_node_id,
    num_valid,
    num_sinks
)]
pub struct GraphInfo {
    num_records: usize,
    num_groups: usize,
    num_edges: usize,
    max_node_id: i64,
    num_valid: usize,
    num_sinks: usize,
}

impl GraphInfo {
    pub fn new(stream: &RecordStream, helpers: &HelperArrays) -> Self {
        Self {
            num_records: stream.len(),
            num_groups: stream.num_groups(),
            num_edges: stream.num_edges(),
            max_node_id: helpers.len() as i64 - 1,
            num_valid: helpers.num_valid(),
            num_sinks: helpers.num_sinks(),
        }
    }
}
