//! # osmshard
//!
//! Geographic partitioning of a road network graph described by an
//! OpenStreetMap XML export, and lazy per-partition fragment streaming.
//!
//! A coordinator owns an ordered list of [`Partitions`]. Every node of the
//! source graph belongs to the first partition (in list order) whose
//! [`Region`] contains it, and partition `i` is served to worker `i + 1`.
//! For a requested partition, [`FragmentStreamer`] produces:
//!
//! 1. one [`Fragment::Node`] per node owned by the partition, then
//! 2. one [`Fragment::Edge`] per consecutive node pair of every non-building
//!    way whose first endpoint is owned by the partition. Edges that cross
//!    into another partition carry the owning worker's id.
//!
//! Nothing is materialized beyond the requested partition's node set and the
//! foreign endpoints discovered while walking its edges.
//!
//! ## Modules
//!
//! - [`partition`] - Regions, the ordered partition list and worker id
//!   translation.
//! - [`osm`] - Line based classification and parsing of OSM XML records.
//! - [`source`] - The [`GraphSource`] abstraction with file and in-memory
//!   backends.
//! - [`assigner`] - Resolution of single nodes to coordinates and partition.
//! - [`streamer`] - The lazy [`FragmentStream`].
//! - [`registry`] - Thread-safe worker registry.
//!
//! ## Example
//!
//! ```
//! use osmshard::{Fragment, FragmentStreamer, InMemorySource, Partitions, Region};
//! use std::sync::Arc;
//!
//! let source = InMemorySource::from_text(
//!     r#"<osm>
//!   <node id="1" lat="0.5" lon="0.5"/>
//!   <node id="2" lat="0.5" lon="1.5"/>
//!   <way id="10">
//!     <nd ref="1"/>
//!     <nd ref="2"/>
//!   </way>
//! </osm>"#,
//! );
//! let partitions = Partitions::new(vec![
//!     Region::Bbox([0.0, 0.0, 1.0, 1.0]),
//!     Region::Bbox([1.0, 0.0, 2.0, 1.0]),
//! ])?;
//!
//! let streamer = FragmentStreamer::new(Arc::new(source), partitions);
//! let fragments = streamer.stream(0)?.collect::<Result<Vec<_>, _>>()?;
//!
//! assert_eq!(fragments[0], Fragment::Node(1));
//! match &fragments[1] {
//!     Fragment::Edge(edge) => assert_eq!(edge.to_worker, Some(2)),
//!     other => panic!("unexpected fragment {other:?}"),
//! }
//! # Ok::<(), osmshard::Error>(())
//! ```

pub mod assigner;
mod error;
pub mod fragment;
pub mod osm;
pub mod partition;
pub mod registry;
pub mod source;
pub mod streamer;
mod types;

pub use crate::assigner::{NodeIndex, PartitionAssigner, ResolvedNode};
pub use crate::error::{Error, Result};
pub use crate::fragment::{Edge, Fragment, WEIGHT_SCALE, edge_weight};
pub use crate::osm::Way;
pub use crate::partition::{Partitions, Region, worker_id_of};
pub use crate::registry::{Registration, WorkerEntry, WorkerRegistry};
pub use crate::source::{GraphSource, InMemorySource, OsmFile};
pub use crate::streamer::{FragmentStream, FragmentStreamer, NodeCache};
pub use crate::types::{Coord, NodeId, Weight, WorkerId};
