//! The active graph and its index, swapped as a unit on reload.
//!
//! Queries clone the current `Arc<GraphSnapshot>` and run against it without
//! further locking. A reload builds a complete new snapshot off to the side
//! and replaces the pointer; queries already holding the old one finish on
//! it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dijkstra::shortest_path_idx;
use crate::error::{Endpoint, RoutingError};
use crate::geo::BoundingBox;
use crate::graph::{GraphStats, RoadGraph};
use crate::models::{Coordinate, Edge};
use crate::route::{assemble, Route};
use crate::snap::{SnapResolver, SnapResult, DEFAULT_SNAP_MAX_DISTANCE_M};
use crate::spatial::{EdgePage, GridIndex, PageCursor, SpatialIndex};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub snap_max_distance_m: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            snap_max_distance_m: DEFAULT_SNAP_MAX_DISTANCE_M,
        }
    }
}

/// A solved request: both snapped endpoints and the assembled route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAnswer {
    pub start: SnapResult,
    pub end: SnapResult,
    pub route: Route,
}

pub struct GraphSnapshot {
    version: u64,
    loaded_at: DateTime<Utc>,
    graph: RoadGraph,
    index: Box<dyn SpatialIndex>,
}

impl std::fmt::Debug for GraphSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSnapshot")
            .field("version", &self.version)
            .field("loaded_at", &self.loaded_at)
            .field("stats", &self.graph.stats())
            .field("index", &self.index.name())
            .finish()
    }
}

impl GraphSnapshot {
    pub fn new(graph: RoadGraph, index: Box<dyn SpatialIndex>) -> Self {
        Self {
            version: 0,
            loaded_at: Utc::now(),
            graph,
            index,
        }
    }

    pub fn with_grid(graph: RoadGraph, cell_deg: f64) -> Self {
        let index = GridIndex::build(&graph, cell_deg);
        Self::new(graph, Box::new(index))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn index(&self) -> &dyn SpatialIndex {
        self.index.as_ref()
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    pub fn resolver(&self, config: &RoutingConfig) -> SnapResolver<'_> {
        SnapResolver::new(&self.graph, self.index.as_ref(), config.snap_max_distance_m)
    }

    /// Snap both points, solve, and assemble. Either endpoint failing to snap
    /// fails the whole request.
    pub fn route_between(
        &self,
        start: Coordinate,
        end: Coordinate,
        config: &RoutingConfig,
    ) -> Result<RouteAnswer, RoutingError> {
        let resolver = self.resolver(config);
        let start_snap = resolver
            .resolve(start)
            .map_err(|source| RoutingError::OutOfRangeEndpoint {
                endpoint: Endpoint::Start,
                source,
            })?;
        let end_snap = resolver
            .resolve(end)
            .map_err(|source| RoutingError::OutOfRangeEndpoint {
                endpoint: Endpoint::End,
                source,
            })?;

        let path = shortest_path_idx(&self.graph, start_snap.vertex, end_snap.vertex)?;
        tracing::debug!(
            from = start_snap.vertex_id,
            to = end_snap.vertex_id,
            settled = path.settled,
            cost = path.total_cost,
            "route solved"
        );
        Ok(RouteAnswer {
            start: start_snap,
            end: end_snap,
            route: assemble(&self.graph, &path),
        })
    }

    /// One page of edges touching `bbox`.
    pub fn viewport(&self, bbox: &BoundingBox, cursor: PageCursor, page_size: usize) -> ViewportPage<'_> {
        let page = self.index.query(&self.graph, bbox, cursor, page_size);
        ViewportPage {
            graph: &self.graph,
            page,
        }
    }
}

pub struct ViewportPage<'a> {
    graph: &'a RoadGraph,
    page: EdgePage,
}

impl<'a> ViewportPage<'a> {
    pub fn edges(&self) -> impl Iterator<Item = &'a Edge> + '_ {
        let graph = self.graph;
        self.page.edges.iter().map(move |idx| graph.edge(*idx))
    }

    pub fn len(&self) -> usize {
        self.page.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page.edges.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.page.has_more
    }

    pub fn next_after(&self) -> Option<i64> {
        self.page.next_after
    }
}

/// Shared, atomically replaceable reference to the active snapshot.
#[derive(Debug, Default)]
pub struct SnapshotHandle {
    current: RwLock<Option<Arc<GraphSnapshot>>>,
    versions: AtomicU64,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active snapshot, if one has been published.
    pub fn current(&self) -> Option<Arc<GraphSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stamp `snapshot` with the next version and make it active. Returns the
    /// published snapshot.
    pub fn publish(&self, mut snapshot: GraphSnapshot) -> Arc<GraphSnapshot> {
        snapshot.version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(snapshot);
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(snapshot.clone());
        tracing::info!(
            version = snapshot.version,
            previous = previous.as_ref().map(|s| s.version),
            vertices = snapshot.stats().vertices,
            edges = snapshot.stats().edges,
            "graph snapshot published"
        );
        snapshot
    }
}
