//! Graph snapshot status.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /api/graph/status`
pub async fn graph_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let stations = state.stations().len();
    match state.graph() {
        Some(snapshot) => {
            let stats = snapshot.stats();
            Json(json!({
                "loaded": true,
                "version": snapshot.version(),
                "vertices": stats.vertices,
                "edges": stats.edges,
                "loaded_at": snapshot.loaded_at(),
                "index": snapshot.index().name(),
                "stations": stations,
            }))
        }
        None => Json(json!({
            "loaded": false,
            "version": null,
            "vertices": 0,
            "edges": 0,
            "loaded_at": null,
            "stations": stations,
        })),
    }
}
