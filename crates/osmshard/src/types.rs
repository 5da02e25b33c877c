/// Identifier of a node in the source graph.
pub type NodeId = u64;

/// Identifier handed out by the worker registry. Worker `n` owns partition
/// `n - 1`.
pub type WorkerId = u32;

/// Fixed point edge weight, see [`crate::edge_weight`].
pub type Weight = u64;

/// A geographic coordinate in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}
