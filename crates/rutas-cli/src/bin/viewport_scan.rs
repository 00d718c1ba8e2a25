//! Feed a sequence of map views to the viewport loader and report what ends
//! up on screen.

use std::time::Duration;

use clap::Parser;
use rutas_cli::{init_logging, parse_bbox};
use rutas_sdk::{LoadStatus, RutasClient, ViewportConfig, ViewportLoader};
use serde_json::json;

/// Simulate map panning against a Rutas server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Rutas server URL
    #[arg(long, default_value = "http://localhost:5000")]
    server: String,

    /// View as SOUTH,WEST,NORTH,EAST. Repeat for a pan sequence.
    #[arg(long, required = true, allow_hyphen_values = true)]
    bbox: Vec<String>,

    /// Pause between consecutive views
    #[arg(long, default_value_t = 100)]
    settle_ms: u64,

    /// Features per page
    #[arg(long, default_value_t = 7500)]
    page_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let views = args
        .bbox
        .iter()
        .map(|raw| parse_bbox(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let config = ViewportConfig {
        page_size: args.page_size.max(1),
        ..ViewportConfig::default()
    };
    let loader = ViewportLoader::new(RutasClient::new(&args.server), config);

    for view in &views {
        let scheduled = loader.view_changed(*view);
        if !scheduled {
            eprintln!("skipped unchanged view {view}");
        }
        tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;
    }

    let state = loader.settled().await;
    let (status, pages, message) = match &state.status {
        LoadStatus::Idle => ("idle", None, None),
        LoadStatus::Loading { .. } => ("loading", None, None),
        LoadStatus::Complete { pages } => ("complete", Some(*pages), None),
        LoadStatus::Failed { message } => ("failed", None, Some(message.clone())),
    };
    let report = json!({
        "status": status,
        "generation": state.generation,
        "bbox": state.bbox.map(|b| b.to_string()),
        "features": state.features.len(),
        "pages": pages,
        "message": message,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if matches!(state.status, LoadStatus::Failed { .. }) {
        std::process::exit(1);
    }
    Ok(())
}
