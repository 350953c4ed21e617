//! Conversion of text edge lists into record streams.

use crate::{
    error::{Error, Result},
    rle::{encode, RecordStream},
    types::{Edge, NodeId},
};
use log::info;
use rayon::slice::ParallelSliceMut;
use std::io::BufRead;

/// Reads `<source> <destination>` lines; blank lines are skipped.
pub fn read_edge_list<R: BufRead>(reader: R) -> Result<Vec<Edge>> {
    info!("reading edges...");
    let mut edges = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (None, _, _) => continue,
            (Some(source), Some(destination), None) => {
                edges.push((parse_node(source, i)?, parse_node(destination, i)?))
            }
            _ => {
                return Err(Error::format(
                    i + 1,
                    format!("expected two node ids on line: {:?}", line),
                ))
            }
        }
    }
    info!("read {} edges", edges.len());
    Ok(edges)
}

fn parse_node(field: &str, line: usize) -> Result<NodeId> {
    field
        .parse()
        .map_err(|_| Error::format(line + 1, format!("invalid node id {:?}", field)))
}

/// Sorts `edges` by destination and encodes them.
pub fn encode_edges(mut edges: Vec<Edge>) -> Result<RecordStream> {
    info!("sorting...");
    edges.par_sort_unstable_by_key(|&(source, destination)| (destination, source));
    info!("encoding {} edges...", edges.len());
    encode(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_edge_list() {
        let text = "1 2\n\n3 2\n  2 1 \n";
        assert_eq!(
            read_edge_list(text.as_bytes()).unwrap(),
            vec![(1, 2), (3, 2), (2, 1)]
        );
    }

    #[test]
    fn test_read_malformed() {
        assert!(matches!(
            read_edge_list("1 2\n3\n".as_bytes()),
            Err(Error::Format { offset: 2, .. })
        ));
        assert!(matches!(
            read_edge_list("1 2 3\n".as_bytes()),
            Err(Error::Format { offset: 1, .. })
        ));
        assert!(matches!(
            read_edge_list("1 -2\n".as_bytes()),
            Err(Error::Format { offset: 1, .. })
        ));
    }

    #[test]
    fn test_encode_edges() {
        let stream = encode_edges(vec![(3, 2), (1, 2), (2, 1)]).unwrap();
        assert_eq!(stream.as_slice(), &[1, 1, 2, 2, 2, 1, 3]);
    }
}
