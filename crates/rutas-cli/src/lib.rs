//! Rutas CLI
//!
//! - route_query: one shortest-route call
//! - viewport_scan: drive the viewport loader over a sequence of map views

use anyhow::{bail, Context, Result};
use rutas_core::{parse_weekday, BoundingBox, Coordinate, Weekday};

/// Parse `LAT,LON`.
pub fn parse_point(raw: &str) -> Result<Coordinate> {
    let Some((lat, lon)) = raw.split_once(',') else {
        bail!("expected LAT,LON, got '{raw}'");
    };
    let point = Coordinate::new(
        lat.trim().parse().with_context(|| format!("bad latitude in '{raw}'"))?,
        lon.trim().parse().with_context(|| format!("bad longitude in '{raw}'"))?,
    );
    if !point.is_valid() {
        bail!("coordinate out of range: '{raw}'");
    }
    Ok(point)
}

/// Parse `SOUTH,WEST,NORTH,EAST`.
pub fn parse_bbox(raw: &str) -> Result<BoundingBox> {
    BoundingBox::parse(raw).with_context(|| format!("invalid bbox '{raw}'"))
}

/// Parse a weekday name in Spanish or English.
pub fn parse_day(raw: &str) -> Result<Weekday> {
    parse_weekday(raw).with_context(|| format!("unknown day '{raw}'"))
}

pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
