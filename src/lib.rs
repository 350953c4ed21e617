//! Parallel PageRank over run-length encoded link graphs.

pub mod convert;
pub mod error;
pub mod helpers;
pub mod info;
pub mod memory_manager;
pub mod pagerank;
pub mod partition;
pub mod rle;
pub mod types;

pub use error::{Error, Result};
