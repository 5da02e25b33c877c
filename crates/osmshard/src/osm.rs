//! Line oriented classification of OSM XML records.
//!
//! The graph description is expected to be an `.osm` export with one element
//! per line, which is what `osmium` and the planet extracts produce:
//!
//! ```xml
//! <node id="1" lat="52.2297" lon="21.0122"/>
//! <way id="10">
//!   <nd ref="1"/>
//!   <nd ref="2"/>
//!   <tag k="highway" v="residential"/>
//! </way>
//! ```
//!
//! Only nodes and ways are interpreted. Everything else (relations, bounds,
//! node tags) is ignored.

use crate::error::{Error, Result};
use crate::types::{Coord, NodeId};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static NODE_RECORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<node\b").expect("node pattern"));
static WAY_BEGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<way\b[^>]*>").expect("way begin pattern"));
static WAY_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*</way>").expect("way end pattern"));
static WAY_NODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<nd\b").expect("way node pattern"));
static WAY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<tag\b").expect("tag pattern"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("attribute pattern")
});

/// An ordered polyline of node ids plus its tag set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Way {
    pub id: Option<u64>,
    pub nodes: Vec<NodeId>,
    pub tags: HashMap<String, String>,
}

impl Way {
    /// Buildings are not part of the routable network.
    pub fn is_building(&self) -> bool {
        self.tags.get("building").is_some_and(|v| !v.is_empty())
    }

    /// Consecutive node pairs. The last node is never joined back to the
    /// first, even for closed ways.
    pub fn segments(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Returns the value of attribute `name` in a single XML element line.
pub fn attribute<'a>(record: &'a str, name: &str) -> Option<&'a str> {
    ATTRIBUTE.captures_iter(record).find_map(|caps| {
        (caps.get(1)?.as_str() == name)
            .then(|| caps.get(2).or_else(|| caps.get(3)))
            .flatten()
            .map(|m| m.as_str())
    })
}

pub fn is_node_record(record: &str) -> bool {
    NODE_RECORD.is_match(record)
}

pub fn is_way_begin(record: &str) -> bool {
    WAY_BEGIN.is_match(record)
}

pub fn is_way_end(record: &str) -> bool {
    WAY_END.is_match(record)
}

/// A `<way .../>` with no body. It opens and closes on the same line.
pub fn is_empty_way(record: &str) -> bool {
    is_way_begin(record) && record.trim_end().ends_with("/>")
}

/// Extracts `(id, coordinates)` from a node record. `line` is only used for
/// diagnostics.
pub fn node_info(record: &str, line: usize) -> Result<(NodeId, Coord)> {
    let field = |name: &str| {
        attribute(record, name).ok_or_else(|| Error::MalformedNode {
            line,
            reason: format!("missing `{name}` attribute"),
        })
    };
    let id = field("id")?;
    let id = id.parse::<NodeId>().map_err(|e| Error::MalformedNode {
        line,
        reason: format!("invalid id {id:?}: {e}"),
    })?;
    let coordinate = |name: &str| {
        let raw = field(name)?;
        raw.parse::<f64>().map_err(|e| Error::MalformedNode {
            line,
            reason: format!("invalid {name} {raw:?}: {e}"),
        })
    };
    let lat = coordinate("lat")?;
    let lon = coordinate("lon")?;
    Ok((id, Coord::new(lat, lon)))
}

/// Parses a buffered way, from its begin marker up to and including its end
/// marker. `first_line` is the line number of the begin marker.
pub fn parse_way<S: AsRef<str>>(records: &[S], first_line: usize) -> Result<Way> {
    let mut way = Way::default();
    for (offset, record) in records.iter().enumerate() {
        let record = record.as_ref();
        let line = first_line + offset;
        let malformed = |reason: String| Error::MalformedWay { line, reason };

        if is_way_begin(record) {
            if offset != 0 {
                return Err(malformed("nested way begin marker".to_string()));
            }
            way.id = attribute(record, "id").and_then(|id| id.parse().ok());
        } else if WAY_NODE.is_match(record) {
            let raw = attribute(record, "ref")
                .ok_or_else(|| malformed("`nd` element without `ref`".to_string()))?;
            let node = raw
                .parse::<NodeId>()
                .map_err(|e| malformed(format!("invalid node ref {raw:?}: {e}")))?;
            way.nodes.push(node);
        } else if WAY_TAG.is_match(record) {
            let key = attribute(record, "k")
                .ok_or_else(|| malformed("`tag` element without `k`".to_string()))?;
            let value = attribute(record, "v").unwrap_or_default();
            way.tags.insert(key.to_string(), value.to_string());
        }
    }
    Ok(way)
}
