//! Turn a solved path into a single ordered polyline with its cost.

use serde::Serialize;

use crate::dijkstra::SolvedPath;
use crate::geo::polyline_length_m;
use crate::graph::{Direction, RoadGraph};
use crate::models::{Coordinate, EdgeId, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteSegment {
    pub edge_id: EdgeId,
    pub direction: Direction,
    /// Directional cost paid while solving.
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub start_vertex: VertexId,
    pub end_vertex: VertexId,
    pub segments: Vec<RouteSegment>,
    pub geometry: Vec<Coordinate>,
    pub total_cost: f64,
    pub distance_m: f64,
}

impl Route {
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.segments.iter().map(|s| s.edge_id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Concatenate the traversed geometries in travel order.
///
/// Edges walked in reverse contribute their geometry backwards. A junction
/// coordinate repeated at the start of the next edge is dropped.
pub fn assemble(graph: &RoadGraph, path: &SolvedPath) -> Route {
    let mut geometry: Vec<Coordinate> = Vec::new();
    let mut segments = Vec::with_capacity(path.steps.len());

    for step in &path.steps {
        let edge = graph.edge(step.edge);
        let points: Box<dyn Iterator<Item = &Coordinate>> = match step.direction {
            Direction::Forward => Box::new(edge.geometry.iter()),
            Direction::Reverse => Box::new(edge.geometry.iter().rev()),
        };
        for (i, point) in points.enumerate() {
            if i == 0 && geometry.last() == Some(point) {
                continue;
            }
            geometry.push(*point);
        }
        segments.push(RouteSegment {
            edge_id: edge.id,
            direction: step.direction,
            cost: step.cost,
        });
    }

    if geometry.is_empty() {
        geometry.push(graph.coordinate(path.source));
    }

    Route {
        start_vertex: graph.vertex(path.source).id,
        end_vertex: graph.vertex(path.target).id,
        distance_m: polyline_length_m(&geometry),
        segments,
        geometry,
        total_cost: path.total_cost,
    }
}
