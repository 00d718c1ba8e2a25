//! Process-wide state: the active graph snapshot, the station index and the
//! storage handle.

use std::sync::{Arc, PoisonError, RwLock};

use rutas_core::{GraphSnapshot, SnapshotHandle, StationIndex};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::persistence::Database;

pub struct AppState {
    config: Config,
    graph: SnapshotHandle,
    stations: RwLock<Arc<StationIndex>>,
    db: Option<Database>,
    /// Held for the duration of a reload so refreshes never interleave.
    refresh_lock: Mutex<()>,
}

impl AppState {
    /// State with no storage behind it; graph and stations are installed by
    /// the caller.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            graph: SnapshotHandle::new(),
            stations: RwLock::new(Arc::new(StationIndex::default())),
            db: None,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_database(db: Database, config: Config) -> Self {
        Self {
            db: Some(db),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    /// Active graph snapshot, or `None` before the first successful load.
    pub fn graph(&self) -> Option<Arc<GraphSnapshot>> {
        self.graph.current()
    }

    pub fn publish_graph(&self, snapshot: GraphSnapshot) -> Arc<GraphSnapshot> {
        self.graph.publish(snapshot)
    }

    pub fn stations(&self) -> Arc<StationIndex> {
        self.stations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace_stations(&self, index: StationIndex) {
        let count = index.len();
        *self
            .stations
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
        tracing::info!(stations = count, "station index replaced");
    }

    pub fn refresh_lock(&self) -> &Mutex<()> {
        &self.refresh_lock
    }
}
