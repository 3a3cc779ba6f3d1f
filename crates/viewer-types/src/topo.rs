use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of topological entity a viewer can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopoKind {
    Vertex,
    Edge,
    Face,
}

impl TopoKind {
    pub const ALL: [TopoKind; 3] = [TopoKind::Face, TopoKind::Edge, TopoKind::Vertex];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopoKind::Vertex => "vertex",
            TopoKind::Edge => "edge",
            TopoKind::Face => "face",
        }
    }
}

impl fmt::Display for TopoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a selection type string is not a known entity kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind: {input:?} (expected face, edge or vertex)")]
pub struct ParseTopoKindError {
    pub input: String,
}

impl FromStr for TopoKind {
    type Err = ParseTopoKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "face" | "faces" => Ok(TopoKind::Face),
            "edge" | "edges" => Ok(TopoKind::Edge),
            "vertex" | "vertices" => Ok(TopoKind::Vertex),
            _ => Err(ParseTopoKindError {
                input: s.to_string(),
            }),
        }
    }
}

/// Engineering properties of a single picked BRep entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityProperties {
    Face {
        /// Surface area.
        area: f64,
        /// Area-weighted centroid [x, y, z].
        centroid: [f64; 3],
        /// Outward-pointing unit normal at the centroid.
        normal: [f64; 3],
    },
    Edge {
        /// Arc length along the edge curve.
        length: f64,
        start: [f64; 3],
        end: [f64; 3],
    },
    Vertex {
        position: [f64; 3],
    },
}

impl EntityProperties {
    pub fn kind(&self) -> TopoKind {
        match self {
            EntityProperties::Face { .. } => TopoKind::Face,
            EntityProperties::Edge { .. } => TopoKind::Edge,
            EntityProperties::Vertex { .. } => TopoKind::Vertex,
        }
    }
}
