//! Admin-triggered data refresh, run as labelled steps.
//!
//! Each step records its own outcome and timing. The whole job is bounded by
//! the admin timeout; when it expires or a step fails, the steps finished so
//! far are still returned.

use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::loader;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Graph,
    Stations,
    All,
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graph" => Ok(Dataset::Graph),
            "stations" => Ok(Dataset::Stations),
            "all" => Ok(Dataset::All),
            other => Err(format!(
                "unknown dataset '{other}', expected graph, stations or all"
            )),
        }
    }
}

impl Dataset {
    fn includes_graph(self) -> bool {
        matches!(self, Dataset::Graph | Dataset::All)
    }

    fn includes_stations(self) -> bool {
        matches!(self, Dataset::Stations | Dataset::All)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub label: String,
    pub success: bool,
    pub duration_seconds: f64,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshReport {
    pub dataset: Dataset,
    pub success: bool,
    pub timed_out: bool,
    pub steps: Vec<StepResult>,
}

/// Time `fut` and append its outcome to `steps`. Returns the value on
/// success so later steps can use it.
async fn step<T, F>(steps: &mut Vec<StepResult>, label: &str, fut: F) -> Option<T>
where
    F: std::future::Future<Output = anyhow::Result<(T, String)>>,
{
    let started = Instant::now();
    let outcome = fut.await;
    let duration_seconds = started.elapsed().as_secs_f64();
    match outcome {
        Ok((value, stdout)) => {
            tracing::info!(step = label, duration_seconds, "{}", stdout);
            steps.push(StepResult {
                label: label.to_string(),
                success: true,
                duration_seconds,
                stdout,
                stderr: String::new(),
            });
            Some(value)
        }
        Err(err) => {
            tracing::warn!(step = label, duration_seconds, "refresh step failed: {:#}", err);
            steps.push(StepResult {
                label: label.to_string(),
                success: false,
                duration_seconds,
                stdout: String::new(),
                stderr: format!("{:#}", err),
            });
            None
        }
    }
}

async fn run_steps(state: &AppState, dataset: Dataset, steps: &mut Vec<StepResult>) -> bool {
    let config = state.config();

    if dataset.includes_graph() {
        let Some(records) = step(steps, "load edges", async {
            let db = loader::require_database(state)?;
            let records = loader::fetch_edges(db).await?;
            let message = format!("loaded {} edge rows", records.len());
            Ok::<_, anyhow::Error>((records, message))
        })
        .await
        else {
            return false;
        };

        let Some(snapshot) = step(steps, "build graph", async {
            let snapshot =
                loader::build_snapshot(records, config.cost_defaults(), config.grid_cell_deg)
                    .await?;
            let stats = snapshot.stats();
            let message = format!("{} vertices, {} edges", stats.vertices, stats.edges);
            Ok::<_, anyhow::Error>((snapshot, message))
        })
        .await
        else {
            return false;
        };

        step(steps, "swap snapshot", async {
            let published = state.publish_graph(snapshot);
            Ok::<_, anyhow::Error>(((), format!("graph version {} active", published.version())))
        })
        .await;
    }

    if dataset.includes_stations() {
        let Some(index) = step(steps, "load stations", async {
            let db = loader::require_database(state)?;
            let index = loader::fetch_station_index(db, config.grid_cell_deg).await?;
            let message = format!("loaded {} stations", index.len());
            Ok::<_, anyhow::Error>((index, message))
        })
        .await
        else {
            return false;
        };

        step(steps, "swap stations", async {
            let count = index.len();
            state.replace_stations(index);
            Ok::<_, anyhow::Error>(((), format!("{} stations active", count)))
        })
        .await;
    }

    steps.iter().all(|s| s.success)
}

/// Run a refresh under `timeout`. Concurrent callers queue behind each other.
pub async fn run_refresh(state: &AppState, dataset: Dataset, timeout: Duration) -> RefreshReport {
    let _guard = state.refresh_lock().lock().await;
    tracing::info!(?dataset, timeout_secs = timeout.as_secs(), "refresh started");

    let started = Instant::now();
    let mut steps = Vec::new();
    let outcome = tokio::time::timeout(timeout, run_steps(state, dataset, &mut steps)).await;

    let (success, timed_out) = match outcome {
        Ok(success) => (success, false),
        Err(_) => {
            steps.push(StepResult {
                label: "timeout".to_string(),
                success: false,
                duration_seconds: started.elapsed().as_secs_f64(),
                stdout: String::new(),
                stderr: format!("refresh exceeded {}s", timeout.as_secs()),
            });
            (false, true)
        }
    };

    tracing::info!(?dataset, success, timed_out, steps = steps.len(), "refresh finished");
    RefreshReport {
        dataset,
        success,
        timed_out,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn dataset_parses_known_names() {
        assert_eq!("Graph".parse::<Dataset>().unwrap(), Dataset::Graph);
        assert_eq!(" all ".parse::<Dataset>().unwrap(), Dataset::All);
        assert!("promotions".parse::<Dataset>().is_err());
    }

    #[tokio::test]
    async fn missing_database_fails_first_step_only() {
        let state = AppState::new(Config::default());
        let report = run_refresh(&state, Dataset::All, Duration::from_secs(5)).await;
        assert!(!report.success);
        assert!(!report.timed_out);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].label, "load edges");
        assert!(report.steps[0].stderr.contains("no database"));
    }
}
