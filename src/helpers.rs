//! Per-node validity and out-degree derived from a record stream.

use crate::{
    error::{try_alloc, Error, Result},
    rle::RecordStream,
    types::NodeId,
};
use log::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperArrays {
    validity: Vec<bool>,
    out_degree: Vec<u32>,
    num_valid: usize,
}

impl HelperArrays {
    /// Number of node slots, i.e. the largest node id plus one.
    pub fn len(&self) -> usize {
        self.validity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    pub fn validity(&self) -> &[bool] {
        &self.validity
    }

    pub fn out_degree(&self) -> &[u32] {
        &self.out_degree
    }

    pub fn num_valid(&self) -> usize {
        self.num_valid
    }

    pub fn is_valid(&self, node: NodeId) -> bool {
        self.validity.get(node as usize).copied().unwrap_or(false)
    }

    /// Valid nodes without outgoing links.
    pub fn num_sinks(&self) -> usize {
        self.validity
            .iter()
            .zip(&self.out_degree)
            .filter(|&(&valid, &deg)| valid && deg == 0)
            .count()
    }
}

/// Builds the helper arrays, sizing them with a pre-pass over `stream`.
pub fn build_helper_arrays(stream: &RecordStream) -> Result<HelperArrays> {
    info!("finding max node id...");
    let max_node_id = stream.max_node_id();
    info!("max node id: {:?}", max_node_id);
    build_helper_arrays_with_max(stream, max_node_id)
}

/// Builds the helper arrays for node ids up to `max_node_id`.
pub fn build_helper_arrays_with_max(
    stream: &RecordStream,
    max_node_id: Option<NodeId>,
) -> Result<HelperArrays> {
    info!("populating helper arrays...");
    let len = max_node_id.map_or(0, |id| id as usize + 1);
    let mut validity = try_alloc("validity", len, false)?;
    let mut out_degree = try_alloc("out degree", len, 0)?;
    let out_of_range = |node: NodeId| Error::Range {
        stage: "helper arrays",
        node: node as usize,
        bound: len,
    };
    for group in stream.groups() {
        *validity
            .get_mut(group.destination as usize)
            .ok_or_else(|| out_of_range(group.destination))? = true;
        for &source in group.sources {
            let idx = source as usize;
            if idx >= len {
                return Err(out_of_range(source));
            }
            validity[idx] = true;
            out_degree[idx] += 1;
        }
    }
    let num_valid = validity.iter().filter(|&&valid| valid).count();
    info!("{} valid nodes", num_valid);
    Ok(HelperArrays {
        validity,
        out_degree,
        num_valid,
    })
}
