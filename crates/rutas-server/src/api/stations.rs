//! Station listing by viewport, proximity and region, plus brand and
//! promotion price comparisons.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use rutas_core::{
    parse_weekday, promotion_savings, BoundingBox, Coordinate, FuelType, Weekday,
    DEFAULT_KM_PER_LITER, DEFAULT_NEAR_RADIUS_M,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 500;
const MAX_LIMIT: usize = 2000;

/// Fuel type used when a comparison does not name one.
const DEFAULT_FUEL: FuelType = FuelType::Diesel;
const DEFAULT_CHEAPEST_LIMIT: usize = 10;

fn parse_fuel(raw: Option<&str>) -> Result<Option<FuelType>, ApiError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<FuelType>().map_err(ApiError::BadRequest))
        .transpose()
}

pub(crate) fn parse_day(raw: Option<&str>) -> Result<Option<Weekday>, ApiError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            parse_weekday(s).ok_or_else(|| ApiError::bad_request(format!("unknown day '{s}'")))
        })
        .transpose()
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Debug, Deserialize)]
pub struct StationsQuery {
    pub north: Option<f64>,
    pub south: Option<f64>,
    pub east: Option<f64>,
    pub west: Option<f64>,
    pub limit: Option<usize>,
    pub fuel_type: Option<String>,
}

/// `GET /api/stations`
pub async fn list_stations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<StationsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let (Some(north), Some(south), Some(east), Some(west)) =
        (query.north, query.south, query.east, query.west)
    else {
        return Err(ApiError::bad_request(
            "north, south, east and west are required",
        ));
    };
    let bbox = BoundingBox::new(south, west, north, east)?;
    let fuel_type = parse_fuel(query.fuel_type.as_deref())?;

    let index = state.stations();
    let stations = index.within_bbox(&bbox, fuel_type, clamp_limit(query.limit));
    Ok(Json(json!({
        "count": stations.len(),
        "stations": stations,
    })))
}

#[derive(Debug, Deserialize)]
pub struct NearQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: Option<f64>,
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub promotions: bool,
    pub limit: Option<usize>,
}

/// `GET /api/stations/near`
pub async fn near_stations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<NearQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let point = Coordinate::new(query.lat, query.lon);
    if !point.is_valid() {
        return Err(ApiError::bad_request("lat/lon out of range"));
    }
    let radius_m = query
        .radius_m
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(DEFAULT_NEAR_RADIUS_M);
    let fuel_type = parse_fuel(query.fuel_type.as_deref())?;

    let index = state.stations();
    let hits = index.near_point(
        point,
        radius_m,
        fuel_type,
        query.promotions,
        clamp_limit(query.limit),
    );
    Ok(Json(json!({
        "count": hits.len(),
        "radius_m": radius_m,
        "stations": hits,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CheapestQuery {
    pub region: Option<String>,
    pub fuel_type: Option<String>,
    pub limit: Option<usize>,
}

/// `GET /api/stations/cheapest`
pub async fn cheapest_stations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CheapestQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let region = query
        .region
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("region is required"))?;
    let fuel_type = parse_fuel(query.fuel_type.as_deref())?.unwrap_or(DEFAULT_FUEL);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_CHEAPEST_LIMIT)
        .clamp(1, MAX_LIMIT);

    let index = state.stations();
    let stations = index.cheapest_in_region(&region, fuel_type, limit);
    Ok(Json(json!({
        "region": region.trim(),
        "fuel_type": fuel_type,
        "count": stations.len(),
        "stations": stations,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BrandsQuery {
    pub fuel_type: Option<String>,
    pub region: Option<String>,
}

/// `GET /api/stations/brands`
pub async fn compare_brands(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BrandsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let fuel_type = parse_fuel(query.fuel_type.as_deref())?.unwrap_or(DEFAULT_FUEL);

    let index = state.stations();
    let brands = index.compare_brands(fuel_type, query.region.as_deref());
    Ok(Json(json!({
        "fuel_type": fuel_type,
        "region": query.region,
        "brands": brands,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SavingsQuery {
    pub distance_km: f64,
    pub fuel_type: Option<String>,
    pub km_per_liter: Option<f64>,
    pub day: Option<String>,
    pub discount_per_liter: Option<f64>,
}

/// `GET /api/stations/:id/savings`
pub async fn promotion_savings_at(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<SavingsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let Query(query) = query?;
    if !(query.distance_km.is_finite() && query.distance_km >= 0.0) {
        return Err(ApiError::bad_request("distance_km must be a non-negative number"));
    }
    let fuel_type = parse_fuel(query.fuel_type.as_deref())?.unwrap_or(DEFAULT_FUEL);
    let day = parse_day(query.day.as_deref())?;

    let index = state.stations();
    let station = index
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("station {id} not found")))?;
    let report = promotion_savings(
        station,
        fuel_type,
        query.distance_km * 1000.0,
        query.km_per_liter.unwrap_or(DEFAULT_KM_PER_LITER),
        day,
        query.discount_per_liter,
    )
    .ok_or_else(|| {
        ApiError::NotFound(format!(
            "station {id} has no {fuel_type} price with an applicable promotion"
        ))
    })?;
    Ok(Json(json!(report)))
}
