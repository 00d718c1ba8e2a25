//! Error taxonomy for graph loading, snapping and routing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EdgeId, VertexId};

/// Rejected graph input. Fatal to the load attempt that produced it only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("invalid edge {edge_id}: {reason}")]
    InvalidEdge { edge_id: EdgeId, reason: String },
    #[error("graph has no edges")]
    EmptyGraph,
}

impl GraphError {
    pub(crate) fn invalid(edge_id: EdgeId, reason: impl Into<String>) -> Self {
        Self::InvalidEdge {
            edge_id,
            reason: reason.into(),
        }
    }
}

/// A coordinate could not be mapped to a usable vertex.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapError {
    #[error("no vertex within {max_distance_m} m of ({lat}, {lon})")]
    NoVertexInRange {
        lat: f64,
        lon: f64,
        max_distance_m: f64,
    },
}

/// Which side of a route request failed to snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Start,
    End,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Start => f.write_str("start"),
            Endpoint::End => f.write_str("end"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("{endpoint} point is out of range: {source}")]
    OutOfRangeEndpoint {
        endpoint: Endpoint,
        #[source]
        source: SnapError,
    },
    #[error("no path between vertex {from} and vertex {to}")]
    NoPath { from: VertexId, to: VertexId },
    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),
    #[error("vertex index {index} out of range for a graph of {len} vertices")]
    VertexIndexOutOfRange { index: usize, len: usize },
}

impl RoutingError {
    /// Caller-side problems (bad coordinates) as opposed to graph faults.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RoutingError::OutOfRangeEndpoint { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("bounding box must be south,west,north,east: {0:?}")]
    Malformed(String),
    #[error("bounding box values must be finite")]
    NotFinite,
    #[error("bounding box latitude must be within [-90, 90] and longitude within [-180, 180]")]
    OutOfRange,
    #[error("bounding box is inverted: south={south} west={west} north={north} east={east}")]
    Inverted {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },
}
