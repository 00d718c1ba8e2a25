//! Ask a Rutas server for the shortest route between two points.

use clap::Parser;
use rutas_cli::{init_logging, parse_day, parse_point};
use rutas_core::{FuelType, Weekday};
use rutas_sdk::client::FuelRequest;
use rutas_sdk::RutasClient;
use serde_json::json;

/// Shortest route between two coordinates
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Rutas server URL
    #[arg(long, default_value = "http://localhost:5000")]
    server: String,

    /// Start as LAT,LON
    #[arg(long, allow_hyphen_values = true)]
    from: String,

    /// End as LAT,LON
    #[arg(long, allow_hyphen_values = true)]
    to: String,

    /// Add a fuel estimate for this grade (93, 95, 97, DI)
    #[arg(long)]
    fuel_type: Option<FuelType>,

    /// Vehicle efficiency used by the fuel estimate
    #[arg(long)]
    km_per_liter: Option<f64>,

    /// Price with promotions valid on this weekday (e.g. miercoles, Wed)
    #[arg(long, value_parser = parse_day)]
    day: Option<Weekday>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let start = parse_point(&args.from)?;
    let end = parse_point(&args.to)?;
    let fuel = args.fuel_type.map(|fuel_type| FuelRequest {
        fuel_type,
        km_per_liter: args.km_per_liter,
        buffer_m: None,
        day: args.day,
    });

    let client = RutasClient::new(&args.server);
    let route = match client.shortest_route(start, end, fuel).await {
        Ok(route) => route,
        Err(err) => {
            match err.kind().as_deref() {
                Some("out_of_range_endpoint") => {
                    eprintln!("An endpoint is too far from the road network: {err}")
                }
                Some("no_route") => eprintln!("No route connects these points."),
                _ => eprintln!("Route request failed: {err}"),
            }
            std::process::exit(1);
        }
    };

    let summary = json!({
        "cost_seconds": route.cost_seconds,
        "distance_m": route.distance_m,
        "start_vertex": route.start.id,
        "end_vertex": route.end.id,
        "edges": route.edges,
        "fuel_estimate": route.fuel_estimate,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
