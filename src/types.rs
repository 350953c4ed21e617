//! Various types related to ranking.

/// The node id type.
pub type NodeId = u32;

/// The rank type.
pub type Rank = f64;

/// A `(source, destination)` link.
pub type Edge = (NodeId, NodeId);
