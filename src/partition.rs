//! Group-aligned partitions of a record stream.

use crate::{
    error::{Error, Result},
    rle::RecordStream,
};
use itertools::Itertools;
use log::debug;
use std::ops::Range;

/// A contiguous run of whole groups.
///
/// `nodes` is the range of destination ids the partition exclusively owns: every group in
/// `records` has its destination in `nodes`, and the `nodes` of different partitions are
/// disjoint and ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub records: Range<usize>,
    pub nodes: Range<usize>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Splits `stream` into `num_partitions` partitions of approximately equal length.
///
/// Trailing partitions are empty when there are fewer groups than partitions.
pub fn split(stream: &RecordStream, num_partitions: usize) -> Result<Vec<Partition>> {
    if num_partitions == 0 {
        return Err(Error::Config(String::from(
            "the number of partitions must be positive",
        )));
    }
    let len = stream.len();
    let targets: Vec<usize> = (0..num_partitions)
        .map(|i| i * len / num_partitions)
        .collect();
    debug!("targets: [{}]", targets.iter().join(", "));
    let mut starts = Vec::with_capacity(num_partitions);
    for group in stream.groups() {
        while starts.len() < num_partitions && group.offset >= targets[starts.len()] {
            starts.push(group.offset);
        }
        if starts.len() == num_partitions {
            break;
        }
    }
    starts.resize(num_partitions, len);
    debug!("starts: [{}]", starts.iter().join(", "));

    let records = stream.as_slice();
    let end_node = stream.max_destination().map_or(0, |id| id as usize + 1);
    let first_node = |start: usize| {
        if start < len {
            records[start] as usize
        } else {
            end_node
        }
    };
    Ok(starts
        .iter()
        .chain(std::iter::once(&len))
        .tuple_windows()
        .map(|(&start, &end)| Partition {
            records: start..end,
            nodes: first_node(start)..first_node(end),
        })
        .collect())
}
