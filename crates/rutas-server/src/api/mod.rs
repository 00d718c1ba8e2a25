//! HTTP API.

pub mod admin;
pub mod auth;
pub mod error;
pub mod graph;
pub mod infra;
pub mod request_id;
mod routes;
pub mod routing;
pub mod stations;

use crate::config::Config;
use axum::Router;

pub fn routes(config: &Config) -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router(config)
}

#[cfg(test)]
mod tests;
