//! Periodically rebuild the graph and station index from storage.
//!
//! Failures keep the current snapshot active and back off before the next
//! attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use crate::backoff::Backoff;
use crate::config::Config;
use crate::loader;
use crate::state::AppState;

const MAX_BACKOFF_SECS: u64 = 600;

/// Start the reload loop. Returns immediately when reloading is disabled.
pub async fn run_graph_reload_loop(state: Arc<AppState>, config: Config) {
    if config.graph_reload_secs == 0 {
        tracing::info!("Graph reload loop disabled");
        return;
    }
    let period = Duration::from_secs(config.graph_reload_secs);
    let mut ticker = interval(period);
    // The first tick fires immediately; startup already loaded once.
    ticker.tick().await;
    let mut backoff = Backoff::new(period, Duration::from_secs(MAX_BACKOFF_SECS).max(period));

    loop {
        ticker.tick().await;
        if !backoff.ready() {
            continue;
        }

        let _guard = state.refresh_lock().lock().await;
        let graph = loader::reload_graph(&state).await;
        let stations = loader::reload_stations(&state).await;
        match (graph, stations) {
            (Ok(snapshot), Ok(count)) => {
                backoff.reset();
                tracing::debug!(
                    version = snapshot.version(),
                    stations = count,
                    "Periodic reload complete"
                );
            }
            (graph, stations) => {
                let delay = backoff.fail();
                if let Err(err) = graph {
                    tracing::warn!(
                        failures = backoff.failures(),
                        retry_in_secs = delay.as_secs(),
                        "Graph reload failed, keeping previous snapshot: {:#}",
                        err
                    );
                }
                if let Err(err) = stations {
                    tracing::warn!(
                        failures = backoff.failures(),
                        retry_in_secs = delay.as_secs(),
                        "Station reload failed: {:#}",
                        err
                    );
                }
            }
        }
    }
}
