//! Rutas server: shortest routes, viewport road data and fuel stations.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rutas_server::config::Config;
use rutas_server::state::AppState;
use rutas_server::{api, loader, loops, persistence};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rutas_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting Rutas server...");

    let config = Config::from_env();
    let port = config.server_port;
    let db = persistence::init_database(&config.database_path, config.database_max_connections)
        .await?;
    let state = Arc::new(AppState::with_database(db, config.clone()));

    // Serve even when storage is empty; routes answer 503 until a graph loads.
    match loader::reload_graph(&state).await {
        Ok(snapshot) => tracing::info!(
            version = snapshot.version(),
            vertices = snapshot.stats().vertices,
            edges = snapshot.stats().edges,
            "Initial graph loaded"
        ),
        Err(err) => tracing::warn!("Initial graph load failed: {:#}", err),
    }
    match loader::reload_stations(&state).await {
        Ok(count) => tracing::info!(stations = count, "Initial stations loaded"),
        Err(err) => tracing::warn!("Initial station load failed: {:#}", err),
    }

    tokio::spawn(loops::graph_reload_loop::run_graph_reload_loop(
        state.clone(),
        config.clone(),
    ));

    let app = api::routes(&config)
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
