//! Lazy generation of a partition's graph fragments.
//!
//! A [`FragmentStream`] runs in two phases:
//!
//! 1. **Nodes.** The source is scanned once for every node owned by the
//!    requested partition. Each id is emitted as a [`Fragment::Node`] and
//!    seeds the stream's private [`NodeCache`].
//! 2. **Edges.** The source is scanned a second time for ways. Every
//!    consecutive node pair `(a, b)` of a non-building way becomes an edge
//!    when `a` is cached as owned by the partition. `b` is resolved through
//!    the [`PartitionAssigner`] the first time it is seen and memoized.
//!
//! The stream is fused: after the first error it only returns `None`.

use crate::assigner::{NodeIndex, PartitionAssigner, ResolvedNode};
use crate::error::{Error, Result};
use crate::fragment::{Edge, Fragment, edge_weight};
use crate::osm;
use crate::partition::{Partitions, worker_id_of};
use crate::source::GraphSource;
use crate::types::{Coord, NodeId};
use std::collections::{HashMap, VecDeque};
use std::iter::Enumerate;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Resolved nodes seen by one fragment stream.
///
/// Owned by exactly one [`FragmentStream`] and dropped with it, so concurrent
/// streams never observe each other's entries.
#[derive(Debug, Default)]
pub struct NodeCache {
    entries: HashMap<NodeId, ResolvedNode>,
}

impl NodeCache {
    pub fn get(&self, node_id: NodeId) -> Option<&ResolvedNode> {
        self.entries.get(&node_id)
    }

    pub fn insert(&mut self, node_id: NodeId, node: ResolvedNode) {
        self.entries.insert(node_id, node);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ResolvedNode)> {
        self.entries.iter().map(|(id, node)| (*id, node))
    }

    fn retag(&mut self, partition: usize) {
        for node in self.entries.values_mut() {
            node.partition = partition;
        }
    }
}

/// Produces [`FragmentStream`]s for any partition of a source.
pub struct FragmentStreamer<S> {
    assigner: PartitionAssigner<S>,
}

impl<S> Clone for FragmentStreamer<S> {
    fn clone(&self) -> Self {
        Self {
            assigner: self.assigner.clone(),
        }
    }
}

impl<S: GraphSource> FragmentStreamer<S> {
    pub fn new(source: Arc<S>, partitions: Partitions) -> Self {
        Self::from_assigner(PartitionAssigner::new(source, partitions))
    }

    pub fn from_assigner(assigner: PartitionAssigner<S>) -> Self {
        Self { assigner }
    }

    /// Resolves foreign endpoints from `index` instead of rescanning.
    pub fn with_index(self, index: Arc<NodeIndex>) -> Self {
        Self::from_assigner(self.assigner.with_index(index))
    }

    pub fn assigner(&self) -> &PartitionAssigner<S> {
        &self.assigner
    }

    pub fn partitions(&self) -> &Partitions {
        self.assigner.partitions()
    }

    /// Starts a lazy stream for `partition`. No I/O happens until the first
    /// call to `next`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownWorker`] if `partition` is out of range.
    pub fn stream(&self, partition: usize) -> Result<FragmentStream<S>> {
        let partitions = self.partitions().len();
        if partition >= partitions {
            return Err(Error::UnknownWorker {
                worker_id: worker_id_of(partition),
                partitions,
            });
        }
        Ok(FragmentStream {
            requested: partition,
            current: partition,
            assigner: self.assigner.clone(),
            phase: Phase::Start,
            cache: NodeCache::default(),
            anchor: None,
            way: None,
            segments: VecDeque::new(),
        })
    }
}

enum Phase<L> {
    Start,
    Nodes(std::vec::IntoIter<NodeId>),
    Edges(Enumerate<L>),
    Done,
}

struct OpenWay {
    first_line: usize,
    records: Vec<String>,
}

/// Lazy, fused sequence of a partition's fragments. All node fragments
/// precede all edge fragments.
pub struct FragmentStream<S: GraphSource> {
    requested: usize,
    // Partition edges are emitted for, fixed when the edge phase starts.
    current: usize,
    assigner: PartitionAssigner<S>,
    phase: Phase<S::Lines>,
    cache: NodeCache,
    anchor: Option<(NodeId, Coord)>,
    way: Option<OpenWay>,
    segments: VecDeque<(NodeId, NodeId)>,
}

impl<S: GraphSource> FragmentStream<S> {
    /// Partition this stream was requested for.
    pub fn partition_index(&self) -> usize {
        self.requested
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    fn advance(&mut self) -> Result<Option<Fragment>> {
        loop {
            if let Some((from, to)) = self.segments.pop_front() {
                match self.edge(from, to)? {
                    Some(edge) => return Ok(Some(Fragment::Edge(edge))),
                    None => continue,
                }
            }

            match &mut self.phase {
                Phase::Start => self.seed()?,
                Phase::Nodes(ids) => match ids.next() {
                    Some(id) => return Ok(Some(Fragment::Node(id))),
                    None => self.begin_edges()?,
                },
                Phase::Edges(lines) => match lines.next() {
                    Some((index, line)) => self.consume(index + 1, line?)?,
                    None => {
                        if let Some(way) = self.way.take() {
                            return Err(Error::MalformedWay {
                                line: way.first_line,
                                reason: "way is not closed before the end of the source".into(),
                            });
                        }
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            partition = self.requested,
                            cached = self.cache.len(),
                            "fragment stream exhausted"
                        );
                        return Ok(None);
                    }
                },
                Phase::Done => return Ok(None),
            }
        }
    }

    fn seed(&mut self) -> Result<()> {
        let nodes = self
            .assigner
            .source()
            .partition_nodes(self.assigner.partitions(), self.requested)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            partition = self.requested,
            nodes = nodes.len(),
            "enumerated partition nodes"
        );

        self.anchor = nodes.first().copied();
        let mut ids = Vec::with_capacity(nodes.len());
        for (id, coord) in nodes {
            self.cache.insert(
                id,
                ResolvedNode {
                    coord,
                    partition: self.requested,
                },
            );
            ids.push(id);
        }
        self.phase = Phase::Nodes(ids.into_iter());
        Ok(())
    }

    fn begin_edges(&mut self) -> Result<()> {
        // A partition without nodes owns no edges.
        let Some((node_id, coord)) = self.anchor else {
            self.phase = Phase::Done;
            return Ok(());
        };

        self.current = self.assigner.partitions().assign_coord(coord).ok_or(
            Error::UnassignablePartition {
                node_id,
                lat: coord.lat,
                lon: coord.lon,
            },
        )?;
        self.cache.retag(self.current);
        self.phase = Phase::Edges(self.assigner.source().lines()?.enumerate());
        Ok(())
    }

    fn consume(&mut self, line: usize, record: String) -> Result<()> {
        if osm::is_way_begin(&record) {
            if let Some(open) = &self.way {
                return Err(Error::MalformedWay {
                    line,
                    reason: format!("way opened at line {} is not closed", open.first_line),
                });
            }
            if !osm::is_empty_way(&record) {
                self.way = Some(OpenWay {
                    first_line: line,
                    records: vec![record],
                });
            }
        } else if osm::is_way_end(&record) {
            let Some(mut open) = self.way.take() else {
                return Err(Error::MalformedWay {
                    line,
                    reason: "end marker without a matching begin marker".into(),
                });
            };
            open.records.push(record);
            let way = osm::parse_way(&open.records, open.first_line)?;
            if way.is_building() {
                #[cfg(feature = "tracing")]
                tracing::trace!(way = ?way.id, "skipping building");
                return Ok(());
            }
            self.segments.extend(way.segments());
        } else if let Some(open) = &mut self.way {
            open.records.push(record);
        }
        Ok(())
    }

    fn edge(&mut self, from: NodeId, to: NodeId) -> Result<Option<Edge>> {
        let origin = match self.cache.get(from) {
            Some(origin) if origin.partition == self.current => *origin,
            // Owned by another partition, whose stream emits this edge.
            _ => return Ok(None),
        };

        let target = match self.cache.get(to) {
            Some(target) => *target,
            None => {
                let target = self.assigner.resolve(to)?;
                self.cache.insert(to, target);
                target
            }
        };

        Ok(Some(Edge {
            from,
            to,
            weight: edge_weight(origin.coord, target.coord),
            to_worker: (target.partition != origin.partition)
                .then(|| worker_id_of(target.partition)),
        }))
    }
}

impl<S: GraphSource> Iterator for FragmentStream<S> {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(fragment)) => Some(Ok(fragment)),
            Ok(None) => {
                self.phase = Phase::Done;
                None
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(partition = self.requested, error = %e, "fragment stream failed");
                self.phase = Phase::Done;
                self.way = None;
                self.segments.clear();
                Some(Err(e))
            }
        }
    }
}

impl<S: GraphSource> core::iter::FusedIterator for FragmentStream<S> {}
