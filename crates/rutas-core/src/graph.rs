//! Immutable road graph.
//!
//! Vertices and edges are stored densely and addressed internally by index;
//! public ids are mapped through lookup tables. Adjacency is a compressed
//! row layout built once at load time. Nothing here is mutated after
//! [`RoadGraph::load`] returns, so a graph can be shared across threads
//! without locking.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::GraphError;
use crate::models::{Coordinate, Edge, EdgeId, Vertex, VertexId};

/// Direction an edge is traversed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Recorded source to target, priced with the forward cost.
    Forward,
    /// Target to source, priced with the reverse cost.
    Reverse,
}

/// One way of leaving a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutgoingEdge {
    /// Dense index into [`RoadGraph::edges`].
    pub edge: usize,
    /// Dense index of the vertex reached.
    pub to: usize,
    /// Directional cost; `+inf` when impassable in this direction.
    pub cost: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub vertices: usize,
    pub edges: usize,
}

#[derive(Debug, Clone)]
pub struct RoadGraph {
    vertices: Vec<Vertex>,
    vertex_index: HashMap<VertexId, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeId, usize>,
    offsets: Vec<usize>,
    outgoing: Vec<OutgoingEdge>,
    incident: Vec<u32>,
}

impl RoadGraph {
    /// Build a graph from an edge list, taking vertex positions from the first
    /// and last geometry point of each edge.
    pub fn load(edges: Vec<Edge>) -> Result<Self, GraphError> {
        Self::build(None, edges)
    }

    /// Build a graph from explicit vertices. Every edge endpoint must be one
    /// of them.
    pub fn load_with_vertices(vertices: Vec<Vertex>, edges: Vec<Edge>) -> Result<Self, GraphError> {
        Self::build(Some(vertices), edges)
    }

    fn build(vertices: Option<Vec<Vertex>>, mut edges: Vec<Edge>) -> Result<Self, GraphError> {
        if edges.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        edges.sort_by_key(|edge| edge.id);

        let explicit = vertices.is_some();
        let mut vertex_list: Vec<Vertex> = vertices.unwrap_or_default();
        let mut vertex_index: HashMap<VertexId, usize> = HashMap::with_capacity(
            vertex_list.len().max(edges.len() + 1),
        );
        for (idx, vertex) in vertex_list.iter().enumerate() {
            vertex_index.insert(vertex.id, idx);
        }

        let mut edge_index = HashMap::with_capacity(edges.len());
        for (idx, edge) in edges.iter().enumerate() {
            validate_edge(edge)?;
            if edge_index.insert(edge.id, idx).is_some() {
                return Err(GraphError::invalid(edge.id, "duplicate edge id"));
            }

            let endpoints = [
                (edge.source, edge.geometry[0]),
                (edge.target, edge.geometry[edge.geometry.len() - 1]),
            ];
            for (vertex_id, position) in endpoints {
                if vertex_index.contains_key(&vertex_id) {
                    continue;
                }
                if explicit {
                    return Err(GraphError::invalid(
                        edge.id,
                        format!("references unknown vertex {vertex_id}"),
                    ));
                }
                vertex_index.insert(vertex_id, vertex_list.len());
                vertex_list.push(Vertex {
                    id: vertex_id,
                    coordinate: position,
                });
            }
        }

        // Counting pass, then fill: stable order follows edge id order.
        let mut counts = vec![0usize; vertex_list.len()];
        let mut incident = vec![0u32; vertex_list.len()];
        for edge in &edges {
            let s = vertex_index[&edge.source];
            let t = vertex_index[&edge.target];
            counts[s] += 1;
            counts[t] += 1;
            incident[s] = incident[s].saturating_add(1);
            incident[t] = incident[t].saturating_add(1);
        }
        let mut offsets = Vec::with_capacity(vertex_list.len() + 1);
        let mut running = 0usize;
        offsets.push(0);
        for count in &counts {
            running += count;
            offsets.push(running);
        }

        let placeholder = OutgoingEdge {
            edge: 0,
            to: 0,
            cost: f64::INFINITY,
            direction: Direction::Forward,
        };
        let mut outgoing = vec![placeholder; running];
        let mut cursor: Vec<usize> = offsets[..vertex_list.len()].to_vec();
        for (edge_idx, edge) in edges.iter().enumerate() {
            let s = vertex_index[&edge.source];
            let t = vertex_index[&edge.target];
            outgoing[cursor[s]] = OutgoingEdge {
                edge: edge_idx,
                to: t,
                cost: edge.forward_cost,
                direction: Direction::Forward,
            };
            cursor[s] += 1;
            outgoing[cursor[t]] = OutgoingEdge {
                edge: edge_idx,
                to: s,
                cost: edge.reverse_cost,
                direction: Direction::Reverse,
            };
            cursor[t] += 1;
        }

        Ok(Self {
            vertices: vertex_list,
            vertex_index,
            edges,
            edge_index,
            offsets,
            outgoing,
            incident,
        })
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            vertices: self.vertices.len(),
            edges: self.edges.len(),
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex(&self, idx: usize) -> &Vertex {
        &self.vertices[idx]
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    pub fn vertex_idx(&self, id: VertexId) -> Option<usize> {
        self.vertex_index.get(&id).copied()
    }

    pub fn vertex_by_id(&self, id: VertexId) -> Option<&Vertex> {
        self.vertex_idx(id).map(|idx| &self.vertices[idx])
    }

    pub fn edge_by_id(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index.get(&id).map(|idx| &self.edges[*idx])
    }

    pub fn coordinate(&self, idx: usize) -> Coordinate {
        self.vertices[idx].coordinate
    }

    /// Ways out of a vertex by dense index. Impassable directions are included
    /// with an infinite cost.
    pub fn outgoing(&self, idx: usize) -> &[OutgoingEdge] {
        &self.outgoing[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Outgoing edges of a vertex by id, in edge id order. `None` for an
    /// unknown vertex.
    pub fn neighbors(&self, id: VertexId) -> Option<impl Iterator<Item = (&Edge, Direction)> + '_> {
        let idx = self.vertex_idx(id)?;
        Some(
            self.outgoing(idx)
                .iter()
                .map(move |out| (&self.edges[out.edge], out.direction)),
        )
    }

    /// A vertex is usable for snapping when at least one edge touches it.
    pub fn is_routable(&self, idx: usize) -> bool {
        self.incident[idx] > 0
    }
}

fn validate_edge(edge: &Edge) -> Result<(), GraphError> {
    if edge.geometry.len() < 2 {
        return Err(GraphError::invalid(
            edge.id,
            format!("geometry has {} point(s), need at least 2", edge.geometry.len()),
        ));
    }
    if let Some(bad) = edge.geometry.iter().find(|c| !c.is_valid()) {
        return Err(GraphError::invalid(
            edge.id,
            format!("invalid coordinate ({}, {})", bad.lat, bad.lon),
        ));
    }
    if edge.forward_cost.is_nan() || edge.forward_cost < 0.0 {
        return Err(GraphError::invalid(
            edge.id,
            format!("forward cost {} must be non-negative", edge.forward_cost),
        ));
    }
    if edge.reverse_cost.is_nan() || edge.reverse_cost < 0.0 {
        return Err(GraphError::invalid(
            edge.id,
            format!("reverse cost {} must be non-negative", edge.reverse_cost),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: EdgeId, source: VertexId, target: VertexId, cost: f64) -> Edge {
        Edge {
            id,
            source,
            target,
            geometry: vec![
                Coordinate::new(0.0, source as f64 * 0.001),
                Coordinate::new(0.0, target as f64 * 0.001),
            ],
            forward_cost: cost,
            reverse_cost: cost,
            directed: false,
        }
    }

    #[test]
    fn load_rejects_negative_cost() {
        let mut bad = edge(7, 1, 2, 5.0);
        bad.forward_cost = -1.0;
        let err = RoadGraph::load(vec![edge(1, 1, 2, 1.0), bad]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidEdge { edge_id: 7, .. }));

        let mut bad_reverse = edge(8, 1, 2, 5.0);
        bad_reverse.reverse_cost = -0.5;
        assert!(RoadGraph::load(vec![bad_reverse]).is_err());
    }

    #[test]
    fn load_accepts_impassable_forward_direction() {
        let mut one_way_back = edge(4, 1, 2, 5.0);
        one_way_back.forward_cost = f64::INFINITY;
        let graph = RoadGraph::load(vec![one_way_back]).unwrap();
        let from_source = graph.outgoing(graph.vertex_idx(1).unwrap());
        assert!(from_source[0].cost.is_infinite());

        let mut nan = edge(5, 1, 2, 5.0);
        nan.forward_cost = f64::NAN;
        assert!(RoadGraph::load(vec![nan]).is_err());
    }

    #[test]
    fn load_rejects_short_geometry() {
        let mut bad = edge(3, 1, 2, 5.0);
        bad.geometry.truncate(1);
        let err = RoadGraph::load(vec![bad]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidEdge { edge_id: 3, .. }));
    }

    #[test]
    fn load_rejects_duplicate_ids_and_empty_input() {
        assert!(RoadGraph::load(vec![edge(1, 1, 2, 1.0), edge(1, 2, 3, 1.0)]).is_err());
        assert_eq!(RoadGraph::load(Vec::new()).unwrap_err(), GraphError::EmptyGraph);
    }

    #[test]
    fn explicit_vertices_must_cover_endpoints() {
        let vertices = vec![Vertex {
            id: 1,
            coordinate: Coordinate::new(0.0, 0.0),
        }];
        let err = RoadGraph::load_with_vertices(vertices, vec![edge(1, 1, 2, 1.0)]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidEdge { edge_id: 1, .. }));
    }

    #[test]
    fn neighbors_are_stable_and_directional() {
        let mut oneway = edge(5, 2, 3, 4.0);
        oneway.reverse_cost = f64::INFINITY;
        oneway.directed = true;
        let graph = RoadGraph::load(vec![oneway, edge(2, 1, 2, 1.0)]).unwrap();

        let from_two: Vec<(EdgeId, Direction)> = graph
            .neighbors(2)
            .unwrap()
            .map(|(edge, dir)| (edge.id, dir))
            .collect();
        assert_eq!(
            from_two,
            vec![(2, Direction::Reverse), (5, Direction::Forward)]
        );

        let idx3 = graph.vertex_idx(3).unwrap();
        let back = graph.outgoing(idx3);
        assert_eq!(back.len(), 1);
        assert!(back[0].cost.is_infinite());
        assert!(graph.neighbors(99).is_none());
        assert_eq!(graph.stats(), GraphStats { vertices: 3, edges: 2 });
    }
}
