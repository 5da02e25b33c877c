//! Geographic partitions and the region containment test.
//!
//! A partition file is a JSON array of regions. List order is significant:
//! a coordinate covered by several regions belongs to the one with the lowest
//! index.
//!
//! ```json
//! [
//!   { "bbox": [20.85, 52.09, 21.01, 52.37] },
//!   { "polygon": [[21.01, 52.09], [21.27, 52.09], [21.27, 52.37], [21.01, 52.37]] }
//! ]
//! ```

use crate::error::{Error, Result};
use crate::types::{Coord, WorkerId};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path, sync::Arc};

/// Area of the plane owned by one partition. Coordinates are `[lon, lat]`
/// ordered, matching GeoJSON.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// `[min_lon, min_lat, max_lon, max_lat]`, bounds inclusive.
    Bbox([f64; 4]),
    /// Simple polygon as a ring of `[lon, lat]` vertices. The ring is closed
    /// implicitly; repeating the first vertex is allowed.
    Polygon(Vec<[f64; 2]>),
}

impl Region {
    /// Returns `true` if the point lies inside the region.
    ///
    /// Bounding boxes include their edges. Polygons use the even-odd rule,
    /// so points exactly on a polygon edge may fall on either side.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            Self::Bbox([min_lon, min_lat, max_lon, max_lat]) => {
                (*min_lon..=*max_lon).contains(&lon) && (*min_lat..=*max_lat).contains(&lat)
            }
            Self::Polygon(ring) if ring.len() < 3 => false,
            Self::Polygon(ring) => {
                let mut inside = false;
                let mut j = ring.len() - 1;
                for i in 0..ring.len() {
                    let [xi, yi] = ring[i];
                    let [xj, yj] = ring[j];
                    if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
                        inside = !inside;
                    }
                    j = i;
                }
                inside
            }
        }
    }

    fn validate(&self, index: usize) -> Result<()> {
        let finite = |values: &[f64]| values.iter().all(|v| v.is_finite());
        match self {
            Self::Bbox(bbox) => {
                let [min_lon, min_lat, max_lon, max_lat] = *bbox;
                if !finite(bbox) || min_lon > max_lon || min_lat > max_lat {
                    return Err(Error::InvalidPartitions {
                        reason: format!(
                            "partition {index}: bounding box {bbox:?} is empty or not finite"
                        ),
                    });
                }
            }
            Self::Polygon(ring) => {
                if ring.len() < 3 {
                    return Err(Error::InvalidPartitions {
                        reason: format!(
                            "partition {index}: polygon needs at least 3 vertices, got {}",
                            ring.len()
                        ),
                    });
                }
                if !ring.iter().all(|v| finite(v)) {
                    return Err(Error::InvalidPartitions {
                        reason: format!("partition {index}: polygon has non-finite vertices"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The ordered, immutable partition list. Cloning is cheap.
#[derive(Clone, Debug, PartialEq)]
pub struct Partitions {
    regions: Arc<[Region]>,
}

impl Partitions {
    /// Builds a partition list, rejecting empty lists and degenerate regions.
    pub fn new(regions: Vec<Region>) -> Result<Self> {
        if regions.is_empty() {
            return Err(Error::InvalidPartitions {
                reason: "at least one partition is required".to_string(),
            });
        }
        for (index, region) in regions.iter().enumerate() {
            region.validate(index)?;
        }
        Ok(Self {
            regions: regions.into(),
        })
    }

    /// Loads a JSON array of regions.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let regions: Vec<Region> =
            serde_json::from_reader(reader).map_err(|e| Error::InvalidPartitions {
                reason: e.to_string(),
            })?;
        Self::new(regions)
    }

    /// Loads a JSON partition file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Number of partitions, which is also the number of servable workers.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Index of the first partition containing the point, if any.
    pub fn assign(&self, lon: f64, lat: f64) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(lon, lat))
    }

    /// [`Partitions::assign`] for a [`Coord`].
    pub fn assign_coord(&self, coord: Coord) -> Option<usize> {
        self.assign(coord.lon, coord.lat)
    }

    /// Translates a worker id into the partition index it owns.
    pub fn partition_of(&self, worker_id: WorkerId) -> Result<usize> {
        let partitions = self.len();
        match (worker_id as usize).checked_sub(1) {
            Some(index) if index < partitions => Ok(index),
            _ => Err(Error::UnknownWorker {
                worker_id,
                partitions,
            }),
        }
    }
}

/// Worker id owning the partition at `index`.
pub const fn worker_id_of(index: usize) -> WorkerId {
    index as WorkerId + 1
}
