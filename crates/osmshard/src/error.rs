//! Error type shared by every graph partitioning operation.
//!
//! Every variant is fatal to the fragment stream that raised it. Callers are
//! expected to report the error and stop, never to retry the same stream.

use crate::types::{NodeId, WorkerId};
use std::sync::Arc;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors produced while partitioning or streaming a graph.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A node referenced by a way has no node record in the source.
    #[error("node {node_id} not found in the graph source")]
    NodeNotFound { node_id: NodeId },

    /// A node lies outside every partition region. This indicates the
    /// partition file does not cover the data set.
    #[error("node {node_id} at (lat {lat}, lon {lon}) is not covered by any partition")]
    UnassignablePartition { node_id: NodeId, lat: f64, lon: f64 },

    /// Way markers are unbalanced or a way body could not be parsed.
    #[error("malformed way at line {line}: {reason}")]
    MalformedWay { line: usize, reason: String },

    /// A node record is missing its id or coordinates.
    #[error("malformed node record at line {line}: {reason}")]
    MalformedNode { line: usize, reason: String },

    /// The worker id has no corresponding partition.
    #[error("unknown worker {worker_id}: expected an id between 1 and {partitions}")]
    UnknownWorker { worker_id: WorkerId, partitions: usize },

    /// The partition list could not be loaded or is unusable.
    #[error("invalid partitions: {reason}")]
    InvalidPartitions { reason: String },

    /// Reading the graph source failed.
    #[error("graph source I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
