//! The graph file.
//!
//! ```text
//! +--------------------+
//! |    num_records     |
//! +--------------------+
//! +--------------------+--------------------+--------------------+
//! |    destination     |       count        |       source       |   ...
//! +--------------------+--------------------+--------------------+
//! ```
//!
//! Every field is a big-endian `u32`; `num_records` excludes itself.

use super::RecordStream;
use crate::{
    error::{try_alloc, Error, Result},
    memory_manager::MemoryManager,
    types::NodeId,
};
use log::info;
use rayon::prelude::*;
use std::{convert::TryFrom, mem::size_of, path::Path, time::Instant};

const RECORD_SIZE: usize = size_of::<u32>();

/// Size in bytes of the file holding `stream`.
pub fn graph_size(stream: &RecordStream) -> usize {
    RECORD_SIZE * (1 + stream.len())
}

/// Parses a graph file.
pub fn load_graph(bytes: &[u8]) -> Result<RecordStream> {
    if bytes.len() < RECORD_SIZE {
        return Err(Error::format(0, "missing header"));
    }
    let (header, body) = bytes.split_at(RECORD_SIZE);
    let num_records = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if body.len() != num_records * RECORD_SIZE {
        return Err(Error::format(
            0,
            format!(
                "header announces {} records but {} bytes follow",
                num_records,
                body.len()
            ),
        ));
    }
    let mut records: Vec<NodeId> = try_alloc("records", num_records, 0)?;
    records
        .par_iter_mut()
        .zip(body.par_chunks_exact(RECORD_SIZE))
        .for_each(|(record, chunk)| {
            *record = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        });
    RecordStream::new(records)
}

/// Serializes `stream` into `buf`, which must be exactly [`graph_size`] bytes long.
pub fn store_graph(stream: &RecordStream, buf: &mut [u8]) -> Result<()> {
    let num_records = u32::try_from(stream.len()).map_err(|_| {
        Error::format(
            0,
            format!("{} records do not fit in the header", stream.len()),
        )
    })?;
    if buf.len() != graph_size(stream) {
        return Err(Error::format(
            0,
            format!(
                "buffer holds {} bytes, the graph needs {}",
                buf.len(),
                graph_size(stream)
            ),
        ));
    }
    let (header, body) = buf.split_at_mut(RECORD_SIZE);
    header.copy_from_slice(&num_records.to_be_bytes());
    body.par_chunks_exact_mut(RECORD_SIZE)
        .zip(stream.as_slice().par_iter())
        .for_each(|(chunk, record)| chunk.copy_from_slice(&record.to_be_bytes()));
    Ok(())
}

/// Reads the graph file at `path`, either into memory or through a read-only mapping.
pub fn read_graph_file<P: AsRef<Path>>(path: P, in_memory: bool) -> Result<RecordStream> {
    let time_now = Instant::now();
    info!("loading {}...", path.as_ref().display());
    let mm = if in_memory {
        MemoryManager::read(path)?
    } else {
        MemoryManager::new_mmap(path)?
    };
    let stream = load_graph(mm.as_bytes())?;
    info!(
        "loaded {} records in {} groups ({}ms)",
        stream.len(),
        stream.num_groups(),
        time_now.elapsed().as_millis()
    );
    Ok(stream)
}

pub fn write_graph_file<P: AsRef<Path>>(path: P, stream: &RecordStream) -> Result<()> {
    info!("writing {} records...", stream.len());
    let mut mm = MemoryManager::new_mmap_mut(path, graph_size(stream))?;
    store_graph(stream, mm.as_bytes_mut()?)?;
    mm.flush()?;
    info!("wrote");
    Ok(())
}
