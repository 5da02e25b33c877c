//! Conversions from domain values to their wire messages.

use crate::proto::{self, graph_piece::GraphElement, workers_list};
use osmshard::{Edge, Fragment, WorkerEntry};

impl From<Edge> for proto::Edge {
    fn from(edge: Edge) -> Self {
        Self {
            node_from_id: edge.from,
            node_to_id: edge.to,
            weight: edge.weight,
            node_to_worker_id: edge.to_worker,
        }
    }
}

impl From<Fragment> for proto::GraphPiece {
    fn from(fragment: Fragment) -> Self {
        let element = match fragment {
            Fragment::Node(node_id) => GraphElement::Nodes(proto::Node { node_id }),
            Fragment::Edge(edge) => GraphElement::Edges(edge.into()),
        };
        Self {
            graph_element: Some(element),
        }
    }
}

impl From<WorkerEntry> for workers_list::WorkerEntry {
    fn from(entry: WorkerEntry) -> Self {
        Self {
            worker_id: entry.worker_id,
            address: entry.address,
        }
    }
}

impl FromIterator<WorkerEntry> for proto::WorkersList {
    fn from_iter<I: IntoIterator<Item = WorkerEntry>>(iter: I) -> Self {
        Self {
            workers: iter.into_iter().map(Into::into).collect(),
        }
    }
}
