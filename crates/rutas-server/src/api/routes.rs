//! Router assembly.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::auth::{self, AdminToken};
use crate::api::{admin, graph, infra, request_id, routing, stations};
use crate::config::Config;
use crate::state::AppState;

pub fn create_router(config: &Config) -> Router<Arc<AppState>> {
    let admin_token = AdminToken(Arc::new(config.admin_token.clone()));

    let public_routes = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/routes/shortest", post(routing::shortest_route))
        .route("/infraestructura/data", get(infra::infra_data))
        .route("/api/stations", get(stations::list_stations))
        .route("/api/stations/near", get(stations::near_stations))
        .route("/api/stations/cheapest", get(stations::cheapest_stations))
        .route("/api/stations/brands", get(stations::compare_brands))
        .route("/api/stations/:id/savings", get(stations::promotion_savings_at))
        .route("/api/graph/status", get(graph::graph_status));

    let admin_routes = Router::new()
        .route("/api/admin/refresh", post(admin::refresh))
        .layer(middleware::from_fn_with_state(admin_token, auth::require_admin));

    public_routes
        .merge(admin_routes)
        .layer(middleware::from_fn(request_id::ensure_request_id))
}
