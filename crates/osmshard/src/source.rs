//! Restartable, lazily read graph descriptions.
//!
//! Every call to [`GraphSource::lines`] opens an independent cursor, so any
//! number of fragment streams and node lookups can scan the same source
//! concurrently without sharing read state.

use crate::error::{Error, Result};
use crate::osm;
use crate::partition::Partitions;
use crate::types::{Coord, NodeId};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::iter::Enumerate;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A line oriented OSM graph description that can be read from the start any
/// number of times.
pub trait GraphSource: Send + Sync + 'static {
    /// Lazy iterator over the raw records of one pass.
    type Lines: Iterator<Item = Result<String>> + Send + 'static;

    /// Opens a fresh pass over the source.
    fn lines(&self) -> Result<Self::Lines>;

    /// Opens a fresh pass yielding only node records.
    fn nodes(&self) -> Result<NodeRecords<Self::Lines>> {
        Ok(NodeRecords {
            lines: self.lines()?.enumerate(),
        })
    }

    /// Every node whose first matching partition is `index`, in source order.
    ///
    /// A node id listed more than once is reported once, with the coordinates
    /// of its first record.
    fn partition_nodes(
        &self,
        partitions: &Partitions,
        index: usize,
    ) -> Result<Vec<(NodeId, Coord)>> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for record in self.nodes()? {
            let (id, coord) = record?;
            if partitions.assign_coord(coord) == Some(index) && seen.insert(id) {
                nodes.push((id, coord));
            }
        }
        Ok(nodes)
    }
}

/// Node records of one pass over a [`GraphSource`], with 1-based line numbers
/// used for diagnostics.
pub struct NodeRecords<L> {
    lines: Enumerate<L>,
}

impl<L> Iterator for NodeRecords<L>
where
    L: Iterator<Item = Result<String>>,
{
    type Item = Result<(NodeId, Coord)>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, line) in self.lines.by_ref() {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if osm::is_node_record(&line) {
                return Some(osm::node_info(&line, index + 1));
            }
        }
        None
    }
}

/// An `.osm` file on disk, re-opened for every pass.
#[derive(Clone, Debug)]
pub struct OsmFile {
    path: PathBuf,
}

impl OsmFile {
    /// Checks that `path` is a readable regular file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        if !file.metadata()?.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )
            .into());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lines of one pass over an [`OsmFile`].
pub struct FileLines {
    inner: std::io::Lines<BufReader<File>>,
}

impl Iterator for FileLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|line| line.map_err(Error::from))
    }
}

impl GraphSource for OsmFile {
    type Lines = FileLines;

    fn lines(&self) -> Result<Self::Lines> {
        let file = File::open(&self.path)?;
        Ok(FileLines {
            inner: BufReader::with_capacity(1 << 16, file).lines(),
        })
    }
}

/// A graph description held in memory. Passes share the underlying buffer.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    lines: Arc<[String]>,
}

impl InMemorySource {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: lines.into(),
        }
    }

    pub fn from_text(text: &str) -> Self {
        text.lines().map(str::to_string).collect()
    }
}

impl FromIterator<String> for InMemorySource {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Lines of one pass over an [`InMemorySource`].
pub struct InMemoryLines {
    lines: Arc<[String]>,
    position: usize,
}

impl Iterator for InMemoryLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.get(self.position)?.clone();
        self.position += 1;
        Some(Ok(line))
    }
}

impl GraphSource for InMemorySource {
    type Lines = InMemoryLines;

    fn lines(&self) -> Result<Self::Lines> {
        Ok(InMemoryLines {
            lines: Arc::clone(&self.lines),
            position: 0,
        })
    }
}
