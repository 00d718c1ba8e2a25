//! Map arbitrary coordinates onto graph vertices.

use serde::Serialize;

use crate::error::SnapError;
use crate::graph::RoadGraph;
use crate::models::{Coordinate, VertexId};
use crate::spatial::SpatialIndex;

pub const DEFAULT_SNAP_MAX_DISTANCE_M: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapResult {
    #[serde(rename = "id")]
    pub vertex_id: VertexId,
    #[serde(flatten)]
    pub coordinate: Coordinate,
    #[serde(rename = "snap_distance_m")]
    pub distance_m: f64,
    #[serde(skip)]
    pub(crate) vertex: usize,
}

/// Resolves coordinates against one graph and the index built over it.
pub struct SnapResolver<'a> {
    graph: &'a RoadGraph,
    index: &'a dyn SpatialIndex,
    max_distance_m: f64,
}

impl<'a> SnapResolver<'a> {
    pub fn new(graph: &'a RoadGraph, index: &'a dyn SpatialIndex, max_distance_m: f64) -> Self {
        Self {
            graph,
            index,
            max_distance_m,
        }
    }

    pub fn max_distance_m(&self) -> f64 {
        self.max_distance_m
    }

    pub fn resolve(&self, point: Coordinate) -> Result<SnapResult, SnapError> {
        let out_of_range = SnapError::NoVertexInRange {
            lat: point.lat,
            lon: point.lon,
            max_distance_m: self.max_distance_m,
        };
        let hit = self
            .index
            .nearest(point, self.max_distance_m)
            .ok_or(out_of_range)?;
        debug_assert_eq!(self.graph.vertex(hit.vertex).id, hit.id);
        Ok(SnapResult {
            vertex_id: hit.id,
            coordinate: hit.coordinate,
            distance_m: hit.distance_m,
            vertex: hit.vertex,
        })
    }
}
