//! Geodesy helpers and bounding boxes.
//!
//! All distances are in meters on a spherical Earth, which is the same unit the
//! routing costs are derived from.

use crate::error::BoundsError;
use crate::models::Coordinate;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters (Haversine formula).
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Haversine distance between two coordinates.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    haversine_distance(a.lat, a.lon, b.lat, b.lon)
}

/// Length of a polyline in meters.
pub fn polyline_length_m(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|pair| distance_m(pair[0], pair[1])).sum()
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Convert a north/south offset in meters to degrees latitude.
pub fn meters_to_lat(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lat(ref_lat_deg).max(1e-9)
}

/// Convert an east/west offset in meters to degrees longitude.
pub fn meters_to_lon(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lon(ref_lat_deg).max(1e-9)
}

/// Offset a position by meters in the north and east directions.
pub fn offset_position(origin: Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    Coordinate {
        lat: origin.lat + meters_to_lat(north_m, origin.lat),
        lon: origin.lon + meters_to_lon(east_m, origin.lat),
    }
}

/// Minimum distance from a point to a line segment, in meters.
///
/// Works in a local east/north plane centered on the segment start, which is
/// accurate for the segment lengths found in a road network.
pub fn distance_to_segment_m(point: Coordinate, seg_start: Coordinate, seg_end: Coordinate) -> f64 {
    let ref_lat = seg_start.lat;
    let m_lat = meters_per_deg_lat(ref_lat);
    let m_lon = meters_per_deg_lon(ref_lat);

    let px = (point.lon - seg_start.lon) * m_lon;
    let py = (point.lat - seg_start.lat) * m_lat;
    let sx = (seg_end.lon - seg_start.lon) * m_lon;
    let sy = (seg_end.lat - seg_start.lat) * m_lat;

    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 0.0001 {
        return (px * px + py * py).sqrt();
    }

    // Project onto the segment: t = ((P-A) . (B-A)) / |B-A|^2
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * sx;
    let dy = py - t * sy;
    (dx * dx + dy * dy).sqrt()
}

/// Minimum distance from a point to a polyline, in meters.
pub fn distance_to_polyline_m(point: Coordinate, polyline: &[Coordinate]) -> f64 {
    match polyline {
        [] => f64::INFINITY,
        [only] => distance_m(point, *only),
        _ => polyline
            .windows(2)
            .map(|pair| distance_to_segment_m(point, pair[0], pair[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

pub(crate) fn segments_intersect_2d(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> bool {
    // Inputs are raw degrees; the tolerance only absorbs arithmetic noise.
    const EPS: f64 = 1e-12;

    fn orient(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
        (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
    }

    fn within(a: f64, b: f64, value: f64) -> bool {
        value >= a.min(b) - EPS && value <= a.max(b) + EPS
    }

    fn on_segment(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
        within(p.0, q.0, r.0) && within(p.1, q.1, r.1)
    }

    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);

    if o1.abs() <= EPS && on_segment(a1, a2, b1) {
        return true;
    }
    if o2.abs() <= EPS && on_segment(a1, a2, b2) {
        return true;
    }
    if o3.abs() <= EPS && on_segment(b1, b2, a1) {
        return true;
    }
    if o4.abs() <= EPS && on_segment(b1, b2, a2) {
        return true;
    }

    let a_crosses = (o1 > EPS && o2 < -EPS) || (o1 < -EPS && o2 > EPS);
    let b_crosses = (o3 > EPS && o4 < -EPS) || (o3 < -EPS && o4 > EPS);
    a_crosses && b_crosses
}

/// Geographic rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, BoundsError> {
        let values = [south, west, north, east];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(BoundsError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            return Err(BoundsError::OutOfRange);
        }
        if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
            return Err(BoundsError::OutOfRange);
        }
        if south > north || west > east {
            return Err(BoundsError::Inverted {
                south,
                west,
                north,
                east,
            });
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Parse the `south,west,north,east` query form.
    pub fn parse(raw: &str) -> Result<Self, BoundsError> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BoundsError::Malformed(raw.to_string()));
        }
        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BoundsError::Malformed(raw.to_string()))?;
        }
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Smallest box containing every point. `None` for an empty input.
    pub fn enclosing(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            south: first.lat,
            west: first.lon,
            north: first.lat,
            east: first.lon,
        };
        for point in &points[1..] {
            bbox.south = bbox.south.min(point.lat);
            bbox.north = bbox.north.max(point.lat);
            bbox.west = bbox.west.min(point.lon);
            bbox.east = bbox.east.max(point.lon);
        }
        Some(bbox)
    }

    /// Round every bound to `decimals` places so that repeated requests for an
    /// unchanged view compare equal.
    pub fn rounded(&self, decimals: u32) -> Self {
        let factor = 10_f64.powi(decimals as i32);
        let round = |value: f64| (value * factor).round() / factor;
        Self {
            south: round(self.south),
            west: round(self.west),
            north: round(self.north),
            east: round(self.east),
        }
    }

    /// Grow the box by `meters` on every side.
    pub fn expanded_by_m(&self, meters: f64) -> Self {
        let ref_lat = if self.south.abs() > self.north.abs() {
            self.south
        } else {
            self.north
        };
        let dlat = meters_to_lat(meters, ref_lat);
        let dlon = meters_to_lon(meters, ref_lat);
        Self {
            south: (self.south - dlat).max(-90.0),
            west: (self.west - dlon).max(-180.0),
            north: (self.north + dlat).min(90.0),
            east: (self.east + dlon).min(180.0),
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lon >= self.west
            && point.lon <= self.east
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }

    /// True when the segment touches the box, including segments that pass
    /// through it without a vertex inside.
    pub fn intersects_segment(&self, a: Coordinate, b: Coordinate) -> bool {
        if self.contains(a) || self.contains(b) {
            return true;
        }
        let sw = (self.west, self.south);
        let se = (self.east, self.south);
        let ne = (self.east, self.north);
        let nw = (self.west, self.north);
        let seg = ((a.lon, a.lat), (b.lon, b.lat));
        [(sw, se), (se, ne), (ne, nw), (nw, sw)]
            .iter()
            .any(|(p, q)| segments_intersect_2d(seg.0, seg.1, *p, *q))
    }

    /// True when any part of the polyline lies inside the box.
    pub fn intersects_polyline(&self, points: &[Coordinate]) -> bool {
        match points {
            [] => false,
            [only] => self.contains(*only),
            _ => points
                .windows(2)
                .any(|pair| self.intersects_segment(pair[0], pair[1])),
        }
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}
