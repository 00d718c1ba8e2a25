//! Least-cost paths over non-negative directional costs.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::RoutingError;
use crate::graph::{Direction, OutgoingEdge, RoadGraph};
use crate::models::VertexId;

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Frontier entry. `seq` is the push order, so equal costs pop first-seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    cost: FloatOrd,
    seq: u64,
    vertex: usize,
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexState {
    Unvisited,
    Frontier,
    Settled,
}

/// One traversed edge with the cost that was paid for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    /// Dense edge index.
    pub edge: usize,
    pub direction: Direction,
    pub cost: f64,
    /// Dense vertex indices.
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedPath {
    pub source: usize,
    pub target: usize,
    pub steps: Vec<PathStep>,
    /// Sum of `steps[i].cost` in travel order.
    pub total_cost: f64,
    pub settled: usize,
}

/// Shortest path between two vertex ids.
pub fn shortest_path(
    graph: &RoadGraph,
    from: VertexId,
    to: VertexId,
) -> Result<SolvedPath, RoutingError> {
    let source = graph
        .vertex_idx(from)
        .ok_or(RoutingError::UnknownVertex(from))?;
    let target = graph.vertex_idx(to).ok_or(RoutingError::UnknownVertex(to))?;
    shortest_path_idx(graph, source, target)
}

/// Dijkstra between dense vertex indices.
///
/// Only strict improvements replace a tentative cost, so among equal-cost
/// parents the first one discovered is kept. Impassable directions carry an
/// infinite cost and never improve anything.
pub fn shortest_path_idx(
    graph: &RoadGraph,
    source: usize,
    target: usize,
) -> Result<SolvedPath, RoutingError> {
    let n = graph.vertices().len();
    if let Some(index) = [source, target].into_iter().find(|idx| *idx >= n) {
        return Err(RoutingError::VertexIndexOutOfRange { index, len: n });
    }

    let mut dist = vec![f64::INFINITY; n];
    let mut state = vec![VertexState::Unvisited; n];
    let mut parent: Vec<Option<(usize, OutgoingEdge)>> = vec![None; n];
    let mut heap: BinaryHeap<Reverse<QueueEntry>> = BinaryHeap::new();
    let mut seq = 0u64;
    let mut settled = 0usize;

    dist[source] = 0.0;
    state[source] = VertexState::Frontier;
    heap.push(Reverse(QueueEntry {
        cost: FloatOrd(0.0),
        seq,
        vertex: source,
    }));

    while let Some(Reverse(current)) = heap.pop() {
        let u = current.vertex;
        // Stale entry left behind by a later improvement.
        if state[u] == VertexState::Settled || current.cost.0 > dist[u] {
            continue;
        }
        state[u] = VertexState::Settled;
        settled += 1;
        if u == target {
            break;
        }

        for out in graph.outgoing(u) {
            if state[out.to] == VertexState::Settled {
                continue;
            }
            let candidate = dist[u] + out.cost;
            if candidate < dist[out.to] {
                dist[out.to] = candidate;
                parent[out.to] = Some((u, *out));
                state[out.to] = VertexState::Frontier;
                seq += 1;
                heap.push(Reverse(QueueEntry {
                    cost: FloatOrd(candidate),
                    seq,
                    vertex: out.to,
                }));
            }
        }
    }

    if state[target] != VertexState::Settled {
        tracing::debug!(
            from = graph.vertex(source).id,
            to = graph.vertex(target).id,
            settled,
            "frontier exhausted"
        );
        return Err(RoutingError::NoPath {
            from: graph.vertex(source).id,
            to: graph.vertex(target).id,
        });
    }

    // The source never receives a parent: nothing improves on 0.
    let mut steps = Vec::new();
    let mut cursor = target;
    while let Some((prev, out)) = parent[cursor] {
        steps.push(PathStep {
            edge: out.edge,
            direction: out.direction,
            cost: out.cost,
            from: prev,
            to: cursor,
        });
        cursor = prev;
    }
    steps.reverse();

    let total_cost = steps.iter().fold(0.0, |acc, step| acc + step.cost);
    Ok(SolvedPath {
        source,
        target,
        steps,
        total_cost,
        settled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, Edge, EdgeId};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn edge(id: EdgeId, source: VertexId, target: VertexId, forward: f64, reverse: f64) -> Edge {
        Edge {
            id,
            source,
            target,
            geometry: vec![
                Coordinate::new(0.0, source as f64 * 0.01),
                Coordinate::new(0.001, target as f64 * 0.01),
            ],
            forward_cost: forward,
            reverse_cost: reverse,
            directed: reverse.is_infinite(),
        }
    }

    fn edge_ids(graph: &RoadGraph, path: &SolvedPath) -> Vec<EdgeId> {
        path.steps.iter().map(|s| graph.edge(s.edge).id).collect()
    }

    /// Edge-relaxation oracle over the same directional arcs.
    fn bellman_ford(graph: &RoadGraph, source: usize) -> Vec<f64> {
        let n = graph.vertices().len();
        let mut dist = vec![f64::INFINITY; n];
        dist[source] = 0.0;
        for _ in 0..n {
            let mut changed = false;
            for u in 0..n {
                if dist[u].is_infinite() {
                    continue;
                }
                for out in graph.outgoing(u) {
                    if dist[u] + out.cost < dist[out.to] {
                        dist[out.to] = dist[u] + out.cost;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        dist
    }

    #[test]
    fn prefers_cheaper_detour() {
        let graph = RoadGraph::load(vec![
            edge(1, 1, 2, 10.0, 10.0),
            edge(2, 1, 3, 2.0, 2.0),
            edge(3, 3, 2, 3.0, 3.0),
        ])
        .unwrap();
        let path = shortest_path(&graph, 1, 2).unwrap();
        assert_eq!(edge_ids(&graph, &path), vec![2, 3]);
        assert_eq!(path.total_cost, 5.0);
    }

    #[test]
    fn one_way_edges_use_reverse_cost() {
        let graph = RoadGraph::load(vec![
            edge(1, 1, 2, 1.0, f64::INFINITY),
            edge(2, 2, 3, 1.0, 1.0),
            edge(3, 1, 3, 50.0, 7.0),
        ])
        .unwrap();
        // 3 -> 1 cannot go back over edge 1, so it takes edge 3 in reverse.
        let back = shortest_path(&graph, 3, 1).unwrap();
        assert_eq!(edge_ids(&graph, &back), vec![3]);
        assert_eq!(back.steps[0].direction, Direction::Reverse);
        assert_eq!(back.total_cost, 7.0);

        let forward = shortest_path(&graph, 1, 3).unwrap();
        assert_eq!(edge_ids(&graph, &forward), vec![1, 2]);
    }

    #[test]
    fn disconnected_components_report_no_path() {
        let graph = RoadGraph::load(vec![edge(1, 1, 2, 1.0, 1.0), edge(2, 3, 4, 1.0, 1.0)]).unwrap();
        let err = shortest_path(&graph, 1, 4).unwrap_err();
        assert_eq!(err, RoutingError::NoPath { from: 1, to: 4 });

        let oneway = RoadGraph::load(vec![edge(1, 1, 2, 1.0, f64::INFINITY)]).unwrap();
        assert!(matches!(
            shortest_path(&oneway, 2, 1),
            Err(RoutingError::NoPath { .. })
        ));
        assert_eq!(
            shortest_path(&oneway, 1, 99).unwrap_err(),
            RoutingError::UnknownVertex(99)
        );
    }

    #[test]
    fn unknown_endpoints_keep_the_caller_id() {
        let graph = RoadGraph::load(vec![edge(1, 10, 20, 1.0, 1.0)]).unwrap();
        assert_eq!(
            shortest_path(&graph, 7, 20).unwrap_err(),
            RoutingError::UnknownVertex(7)
        );
        assert_eq!(
            shortest_path_idx(&graph, 0, 5).unwrap_err(),
            RoutingError::VertexIndexOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn sentinel_forward_cost_leaves_no_route() {
        let forward_blocked = crate::models::EdgeRecord {
            id: 1,
            source: 1,
            target: 2,
            directed: false,
            speed_kph: None,
            cost: Some(1e9),
            reverse_cost: Some(4.0),
            geometry: vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)],
        }
        .into_edge(&crate::models::CostDefaults::default());
        let graph = RoadGraph::load(vec![forward_blocked]).unwrap();

        assert_eq!(
            shortest_path(&graph, 1, 2).unwrap_err(),
            RoutingError::NoPath { from: 1, to: 2 }
        );
        assert_eq!(shortest_path(&graph, 2, 1).unwrap().total_cost, 4.0);
    }

    #[test]
    fn same_vertex_is_an_empty_path() {
        let graph = RoadGraph::load(vec![edge(1, 1, 2, 1.0, 1.0)]).unwrap();
        let path = shortest_path(&graph, 2, 2).unwrap();
        assert!(path.steps.is_empty());
        assert_eq!(path.total_cost, 0.0);
    }

    #[test]
    fn equal_cost_ties_keep_first_discovered() {
        // Two 2-cost routes 1 -> 4; edge 1 (via 2) is relaxed before edge 2 (via 3).
        let graph = RoadGraph::load(vec![
            edge(1, 1, 2, 1.0, 1.0),
            edge(2, 1, 3, 1.0, 1.0),
            edge(3, 2, 4, 1.0, 1.0),
            edge(4, 3, 4, 1.0, 1.0),
        ])
        .unwrap();
        for _ in 0..5 {
            let path = shortest_path(&graph, 1, 4).unwrap();
            assert_eq!(edge_ids(&graph, &path), vec![1, 3]);
        }
    }

    #[test]
    fn matches_bellman_ford_on_random_graphs() {
        let mut rng = StdRng::seed_from_u64(0x5eed_2024);
        for round in 0..40 {
            let vertices = rng.random_range(2..40i64);
            let edge_count = rng.random_range(1..120i64);
            let edges: Vec<Edge> = (0..edge_count)
                .map(|id| {
                    let s = rng.random_range(0..vertices);
                    let t = rng.random_range(0..vertices);
                    let forward = rng.random_range(0.0..100.0);
                    let reverse = if rng.random_bool(0.3) {
                        f64::INFINITY
                    } else {
                        rng.random_range(0.0..100.0)
                    };
                    edge(id, s, t, forward, reverse)
                })
                .collect();
            let graph = RoadGraph::load(edges).unwrap();
            let source = rng.random_range(0..graph.vertices().len());
            let oracle = bellman_ford(&graph, source);

            for target in 0..graph.vertices().len() {
                match shortest_path_idx(&graph, source, target) {
                    Ok(path) => {
                        assert!(
                            (path.total_cost - oracle[target]).abs() < 1e-9,
                            "round {round}: {} vs {}",
                            path.total_cost,
                            oracle[target]
                        );
                        let paid: f64 = path.steps.iter().map(|s| s.cost).sum();
                        assert!((paid - path.total_cost).abs() < 1e-9);
                        if let Some(first) = path.steps.first() {
                            assert_eq!(first.from, source);
                        }
                        if let Some(last) = path.steps.last() {
                            assert_eq!(last.to, target);
                        }
                    }
                    Err(RoutingError::NoPath { .. }) => {
                        assert!(oracle[target].is_infinite(), "round {round}");
                    }
                    Err(other) => panic!("unexpected {other}"),
                }
            }
        }
    }
}
