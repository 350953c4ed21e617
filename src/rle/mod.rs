//! Run-length encoded adjacency records.
//!
//! All links entering the same destination are stored as one group:
//!
//! ```text
//! +-------------+-------------+-------------+-----+-------------+
//! | destination |    count    |   source    | ... |   source    |   ...
//! +-------------+-------------+-------------+-----+-------------+
//! ```
//!
//! Groups are sorted by strictly increasing destination.

pub use file::{load_graph, read_graph_file, store_graph, write_graph_file};

pub mod file;

use crate::{
    error::{Error, Result},
    types::{Edge, NodeId},
};
use std::ops::Range;

/// The state of a sequential scan over a record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// The next element is a destination id.
    Destination,
    /// The next element is the source count of the current group.
    Count,
    /// The next element is a source; the number of sources left is attached.
    Sources(usize),
}

/// A validated record stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStream {
    records: Vec<NodeId>,
    num_groups: usize,
    max_destination: Option<NodeId>,
}

impl RecordStream {
    /// Validates `records` and wraps them.
    pub fn new(records: Vec<NodeId>) -> Result<Self> {
        let (num_groups, max_destination) = validate(&records)?;
        Ok(Self {
            records,
            num_groups,
            max_destination,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_edges(&self) -> usize {
        self.records.len() - 2 * self.num_groups
    }

    pub fn max_destination(&self) -> Option<NodeId> {
        self.max_destination
    }

    /// Scans the stream for the largest destination or source id.
    pub fn max_node_id(&self) -> Option<NodeId> {
        self.groups()
            .map(|group| {
                group
                    .sources
                    .iter()
                    .copied()
                    .fold(group.destination, NodeId::max)
            })
            .max()
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.records
    }

    /// Decodes the stream.
    pub fn groups(&self) -> Groups {
        Groups {
            records: &self.records,
            base: 0,
            pos: 0,
        }
    }

    /// Decodes the groups in `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` does not start and end at group boundaries.
    pub fn groups_in(&self, range: Range<usize>) -> Groups {
        Groups {
            records: &self.records[range.clone()],
            base: range.start,
            pos: 0,
        }
    }
}

fn validate(records: &[NodeId]) -> Result<(usize, Option<NodeId>)> {
    let mut state = ScanState::Destination;
    let (mut num_groups, mut last) = (0, None);
    for (offset, &x) in records.iter().enumerate() {
        state = match state {
            ScanState::Destination => {
                if matches!(last, Some(prev) if x <= prev) {
                    return Err(Error::format(offset, "destinations are not increasing"));
                }
                last = Some(x);
                num_groups += 1;
                ScanState::Count
            }
            ScanState::Count => {
                let count = x as usize;
                if count == 0 {
                    return Err(Error::format(offset, "empty group"));
                }
                if count > records.len() - offset - 1 {
                    return Err(Error::format(
                        offset,
                        format!(
                            "count {} overruns the {} remaining records",
                            count,
                            records.len() - offset - 1
                        ),
                    ));
                }
                ScanState::Sources(count)
            }
            ScanState::Sources(1) => ScanState::Destination,
            ScanState::Sources(remaining) => ScanState::Sources(remaining - 1),
        }
    }
    match state {
        ScanState::Destination => Ok((num_groups, last)),
        _ => Err(Error::format(records.len(), "truncated group")),
    }
}

/// All links entering `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group<'a> {
    /// Position of the destination slot in the stream.
    pub offset: usize,
    pub destination: NodeId,
    pub sources: &'a [NodeId],
}

impl<'a> Group<'a> {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of records the group occupies.
    pub fn num_records(&self) -> usize {
        2 + self.sources.len()
    }
}

#[derive(Clone)]
pub struct Groups<'a> {
    records: &'a [NodeId],
    base: usize,
    pos: usize,
}

impl<'a> Iterator for Groups<'a> {
    type Item = Group<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.records.len() {
            return None;
        }
        let count = self.records[self.pos + 1] as usize;
        let group = Group {
            offset: self.base + self.pos,
            destination: self.records[self.pos],
            sources: &self.records[self.pos + 2..self.pos + 2 + count],
        };
        self.pos += group.num_records();
        Some(group)
    }
}

/// Builds a record stream from links sorted by destination.
///
/// The buffer grows as links are pushed, so the number of links does not need to be known.
#[derive(Debug, Default)]
pub struct Encoder {
    records: Vec<NodeId>,
    count_pos: Option<usize>,
    num_groups: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(num_edges: usize) -> Self {
        Self {
            records: Vec::with_capacity(num_edges),
            ..Self::default()
        }
    }

    /// Number of records written so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, (source, destination): Edge) -> Result<()> {
        match self.count_pos {
            Some(pos) if self.records[pos - 1] == destination => {
                self.records[pos] += 1;
            }
            Some(pos) if self.records[pos - 1] > destination => {
                return Err(Error::format(
                    self.records.len(),
                    format!(
                        "destination {} follows destination {}",
                        destination,
                        self.records[pos - 1]
                    ),
                ));
            }
            _ => {
                self.records.push(destination);
                self.count_pos = Some(self.records.len());
                self.records.push(1);
                self.num_groups += 1;
            }
        }
        self.records.push(source);
        Ok(())
    }

    pub fn finish(self) -> RecordStream {
        let max_destination = self.count_pos.map(|pos| self.records[pos - 1]);
        RecordStream {
            records: self.records,
            num_groups: self.num_groups,
            max_destination,
        }
    }
}

/// Encodes links sorted by destination.
pub fn encode<I>(edges: I) -> Result<RecordStream>
where
    I: IntoIterator<Item = Edge>,
{
    let edges = edges.into_iter();
    let mut encoder = Encoder::with_capacity(edges.size_hint().0);
    for edge in edges {
        encoder.push(edge)?;
    }
    Ok(encoder.finish())
}
