use crate::types::{Coord, NodeId, Weight, WorkerId};

/// Fixed point scale applied to coordinate distances.
pub const WEIGHT_SCALE: f64 = 1e7;

/// One unit of a partition's fragment stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Fragment {
    /// A node owned by the partition. Coordinates are not transmitted.
    Node(NodeId),
    Edge(Edge),
}

/// A directed edge leaving a node owned by the partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: Weight,
    /// Worker owning `to`, set only when it is not the current worker.
    pub to_worker: Option<WorkerId>,
}

impl Edge {
    pub const fn is_cross_partition(&self) -> bool {
        self.to_worker.is_some()
    }
}

/// Straight line distance between two coordinates in degrees, scaled by
/// [`WEIGHT_SCALE`] and truncated.
///
/// This is deliberately not a great-circle distance: downstream shortest path
/// computations compare weights produced by this exact formula.
pub fn edge_weight(a: Coord, b: Coord) -> Weight {
    let distance = ((b.lat - a.lat).powi(2) + (b.lon - a.lon).powi(2)).sqrt();
    (WEIGHT_SCALE * distance) as Weight
}
