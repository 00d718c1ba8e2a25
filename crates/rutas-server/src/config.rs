//! Server configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rutas_core::{CostDefaults, RoutingConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Snap threshold for route endpoints.
    pub snap_max_distance_m: f64,
    /// Speed used to price edges with no stored cost. 0 keeps costs in meters.
    pub default_speed_kph: f64,
    /// Periodic graph reload. 0 disables the loop.
    pub graph_reload_secs: u64,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub grid_cell_deg: f64,
    pub admin_token: String,
    pub admin_job_timeout_secs: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env_or("RUTAS_PORT", 5000),
            database_path: env::var("RUTAS_DATABASE_PATH")
                .unwrap_or_else(|_| "data/rutas.db".to_string()),
            database_max_connections: env_or("RUTAS_DATABASE_MAX_CONNECTIONS", 4),
            snap_max_distance_m: env_or("RUTAS_SNAP_MAX_DISTANCE_M", 1000.0),
            default_speed_kph: env_or("RUTAS_DEFAULT_SPEED_KPH", 60.0),
            graph_reload_secs: env_or("RUTAS_GRAPH_RELOAD_SECS", 0),
            default_page_size: env_or("RUTAS_DEFAULT_PAGE_SIZE", 7500),
            max_page_size: env_or("RUTAS_MAX_PAGE_SIZE", 10_000),
            grid_cell_deg: env_or("RUTAS_GRID_CELL_DEG", rutas_core::DEFAULT_CELL_DEG),
            admin_token: env::var("RUTAS_ADMIN_TOKEN")
                .unwrap_or_else(|_| "change-me-admin".to_string()),
            admin_job_timeout_secs: env_or("RUTAS_ADMIN_JOB_TIMEOUT_SECS", 900),
        }
    }

    pub fn routing(&self) -> RoutingConfig {
        RoutingConfig {
            snap_max_distance_m: self.snap_max_distance_m,
        }
    }

    pub fn cost_defaults(&self) -> CostDefaults {
        CostDefaults {
            default_speed_kph: (self.default_speed_kph > 0.0).then_some(self.default_speed_kph),
        }
    }

    pub fn admin_job_timeout(&self) -> Duration {
        Duration::from_secs(self.admin_job_timeout_secs.max(1))
    }

    /// Requested page size clamped to `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 5000,
            database_path: "data/rutas.db".to_string(),
            database_max_connections: 4,
            snap_max_distance_m: rutas_core::DEFAULT_SNAP_MAX_DISTANCE_M,
            default_speed_kph: 60.0,
            graph_reload_secs: 0,
            default_page_size: 7500,
            max_page_size: 10_000,
            grid_cell_deg: rutas_core::DEFAULT_CELL_DEG,
            admin_token: "change-me-admin".to_string(),
            admin_job_timeout_secs: 900,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        let config = Config::default();
        assert_eq!(config.page_size(None), 7500);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(50_000)), 10_000);
    }

    #[test]
    fn zero_speed_keeps_costs_in_meters() {
        let config = Config {
            default_speed_kph: 0.0,
            ..Config::default()
        };
        assert_eq!(config.cost_defaults().default_speed_kph, None);
        assert_eq!(
            Config::default().cost_defaults().default_speed_kph,
            Some(60.0)
        );
    }
}
