//! Build graph snapshots and station indexes from storage.
//!
//! Graph construction is CPU-bound and runs on the blocking pool; the
//! finished snapshot replaces the active one in a single swap.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use rutas_core::{CostDefaults, EdgeRecord, GraphSnapshot, RoadGraph, StationIndex};

use crate::persistence::{road_edges, stations, Database};
use crate::state::AppState;

pub fn require_database(state: &AppState) -> Result<&Database> {
    state
        .database()
        .ok_or_else(|| anyhow!("no database configured"))
}

pub async fn fetch_edges(db: &Database) -> Result<Vec<EdgeRecord>> {
    road_edges::load_all(db.pool())
        .await
        .context("loading road edges")
}

/// Apply cost defaults, validate, and index. Runs synchronously.
pub fn build_snapshot_blocking(
    records: Vec<EdgeRecord>,
    defaults: CostDefaults,
    cell_deg: f64,
) -> Result<GraphSnapshot> {
    let started = Instant::now();
    let edges = records
        .into_iter()
        .map(|record| record.into_edge(&defaults))
        .collect();
    let graph = RoadGraph::load(edges)?;
    let snapshot = GraphSnapshot::with_grid(graph, cell_deg);
    tracing::info!(
        vertices = snapshot.stats().vertices,
        edges = snapshot.stats().edges,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "graph built"
    );
    Ok(snapshot)
}

pub async fn build_snapshot(
    records: Vec<EdgeRecord>,
    defaults: CostDefaults,
    cell_deg: f64,
) -> Result<GraphSnapshot> {
    tokio::task::spawn_blocking(move || build_snapshot_blocking(records, defaults, cell_deg))
        .await
        .context("graph build task failed")?
}

/// Rebuild the graph from storage and make it active. On failure the previous
/// snapshot stays in place.
pub async fn reload_graph(state: &AppState) -> Result<Arc<GraphSnapshot>> {
    let db = require_database(state)?;
    let records = fetch_edges(db).await?;
    let config = state.config();
    let snapshot = build_snapshot(records, config.cost_defaults(), config.grid_cell_deg).await?;
    Ok(state.publish_graph(snapshot))
}

pub async fn fetch_station_index(db: &Database, cell_deg: f64) -> Result<StationIndex> {
    let rows = stations::load_all(db.pool())
        .await
        .context("loading stations")?;
    Ok(StationIndex::build(rows, cell_deg))
}

pub async fn reload_stations(state: &AppState) -> Result<usize> {
    let db = require_database(state)?;
    let index = fetch_station_index(db, state.config().grid_cell_deg).await?;
    let count = index.len();
    state.replace_stations(index);
    Ok(count)
}
