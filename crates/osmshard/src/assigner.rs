//! Resolution of a single node id to its coordinates and owning partition.
//!
//! Without an index every lookup is a full scan of the source, which is
//! acceptable because lookups only happen for edge endpoints that a fragment
//! stream has not seen yet. A [`NodeIndex`] built once at startup removes the
//! repeated scans without changing any result.

use crate::error::{Error, Result};
use crate::partition::Partitions;
use crate::source::GraphSource;
use crate::types::{Coord, NodeId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// Coordinates and partition of a resolved node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedNode {
    pub coord: Coord,
    pub partition: usize,
}

/// Every node of a source, keyed by id. Nodes outside all regions are kept
/// with no partition so lookups can tell them apart from unknown ids.
#[derive(Debug, Default)]
pub struct NodeIndex {
    nodes: HashMap<NodeId, (Coord, Option<usize>)>,
}

impl NodeIndex {
    /// Scans `source` once. The first record of a duplicated id wins, the same
    /// as a scan lookup.
    pub fn build<S: GraphSource>(source: &S, partitions: &Partitions) -> Result<Self> {
        let mut nodes = HashMap::new();
        for record in source.nodes()? {
            let (id, coord) = record?;
            if let Entry::Vacant(slot) = nodes.entry(id) {
                slot.insert((coord, partitions.assign_coord(coord)));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(nodes = nodes.len(), "built node index");

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn lookup(&self, node_id: NodeId) -> Option<(Coord, Option<usize>)> {
        self.nodes.get(&node_id).copied()
    }
}

/// Resolves node ids against a [`GraphSource`] and a [`Partitions`] list.
pub struct PartitionAssigner<S> {
    source: Arc<S>,
    partitions: Partitions,
    index: Option<Arc<NodeIndex>>,
}

// Manual impl: `S` itself does not need to be `Clone`.
impl<S> Clone for PartitionAssigner<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            partitions: self.partitions.clone(),
            index: self.index.clone(),
        }
    }
}

impl<S: GraphSource> PartitionAssigner<S> {
    pub fn new(source: Arc<S>, partitions: Partitions) -> Self {
        Self {
            source,
            partitions,
            index: None,
        }
    }

    /// Serves lookups from `index` instead of scanning the source.
    pub fn with_index(mut self, index: Arc<NodeIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Finds the first record of `node_id` and the first partition containing
    /// it.
    ///
    /// # Errors
    ///
    /// - [`Error::NodeNotFound`] if the source has no such node.
    /// - [`Error::UnassignablePartition`] if no region contains it.
    /// - Any I/O or record error hit while scanning.
    pub fn resolve(&self, node_id: NodeId) -> Result<ResolvedNode> {
        let (coord, partition) = match &self.index {
            Some(index) => index
                .lookup(node_id)
                .ok_or(Error::NodeNotFound { node_id })?,
            None => {
                let coord = self.scan(node_id)?;
                (coord, self.partitions.assign_coord(coord))
            }
        };

        match partition {
            Some(partition) => Ok(ResolvedNode { coord, partition }),
            None => Err(Error::UnassignablePartition {
                node_id,
                lat: coord.lat,
                lon: coord.lon,
            }),
        }
    }

    fn scan(&self, node_id: NodeId) -> Result<Coord> {
        #[cfg(feature = "tracing")]
        tracing::trace!(node_id, "scanning source for node");

        for record in self.source.nodes()? {
            let (id, coord) = record?;
            if id == node_id {
                return Ok(coord);
            }
        }
        Err(Error::NodeNotFound { node_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Region;
    use crate::source::InMemorySource;

    const GRAPH: &str = r#"<osm>
 <node id="1" lat="0.5" lon="0.5"/>
 <node id="2" lat="0.5" lon="1.5"/>
 <node id="3" lat="1.5" lon="1.5"/>
 <node id="4" lat="5.0" lon="5.0"/>
 <node id="2" lat="0.5" lon="0.5"/>
</osm>"#;

    fn assigner() -> PartitionAssigner<InMemorySource> {
        let partitions = Partitions::new(vec![
            Region::Bbox([0.0, 0.0, 1.0, 1.0]),
            Region::Bbox([1.0, 0.0, 2.0, 1.0]),
            // Overlaps the first two entirely; only wins where they do not.
            Region::Bbox([0.0, 0.0, 2.0, 2.0]),
        ])
        .unwrap();
        PartitionAssigner::new(Arc::new(InMemorySource::from_text(GRAPH)), partitions)
    }

    fn check_resolution(assigner: &PartitionAssigner<InMemorySource>) {
        assert_eq!(
            assigner.resolve(1).unwrap(),
            ResolvedNode {
                coord: Coord::new(0.5, 0.5),
                partition: 0
            }
        );
        // First record wins over the later duplicate.
        assert_eq!(assigner.resolve(2).unwrap().partition, 1);
        assert_eq!(assigner.resolve(3).unwrap().partition, 2);

        match assigner.resolve(4) {
            Err(Error::UnassignablePartition { node_id: 4, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        match assigner.resolve(99) {
            Err(Error::NodeNotFound { node_id: 99 }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn scan_resolution() {
        let assigner = assigner();
        assert!(!assigner.is_indexed());
        check_resolution(&assigner);
    }

    #[test]
    fn indexed_resolution_matches_scan() {
        let scan = assigner();
        let index = NodeIndex::build(scan.source().as_ref(), scan.partitions()).unwrap();
        assert_eq!(index.len(), 4);

        let indexed = scan.clone().with_index(Arc::new(index));
        assert!(indexed.is_indexed());
        check_resolution(&indexed);

        for node_id in 1..=4 {
            assert_eq!(
                scan.resolve(node_id).ok(),
                indexed.resolve(node_id).ok(),
                "node {node_id}"
            );
        }
    }

    #[test]
    fn partition_nodes_resolve_to_their_own_partition() {
        // 9x9 grid with points on every shared region boundary.
        let mut text = String::from("<osm>\n");
        for row in 0..9u64 {
            for col in 0..9u64 {
                text.push_str(&format!(
                    " <node id=\"{}\" lat=\"{}\" lon=\"{}\"/>\n",
                    row * 9 + col + 1,
                    row as f64 * 0.25,
                    col as f64 * 0.25
                ));
            }
        }
        text.push_str("</osm>");

        let scan = PartitionAssigner::new(
            Arc::new(InMemorySource::from_text(&text)),
            assigner().partitions().clone(),
        );
        let index = NodeIndex::build(scan.source().as_ref(), scan.partitions()).unwrap();
        let indexed = scan.clone().with_index(Arc::new(index));

        let mut total = 0;
        for partition in 0..scan.partitions().len() {
            let owned = scan
                .source()
                .partition_nodes(scan.partitions(), partition)
                .unwrap();
            total += owned.len();
            for (node_id, coord) in owned {
                for assigner in [&scan, &indexed] {
                    assert_eq!(
                        assigner.resolve(node_id).unwrap(),
                        ResolvedNode { coord, partition },
                        "node {node_id}"
                    );
                }
            }
        }
        assert_eq!(total, 81);
    }

    #[test]
    fn resolution_is_deterministic() {
        let assigner = assigner();
        let first = assigner.resolve(3).unwrap();
        for _ in 0..5 {
            assert_eq!(assigner.resolve(3).unwrap(), first);
        }
    }
}
