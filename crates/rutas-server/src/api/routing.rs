//! `POST /api/routes/shortest`.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use rutas_core::{
    estimate_fuel_cost, Coordinate, FuelType, DEFAULT_KM_PER_LITER, DEFAULT_ROUTE_BUFFER_M,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::stations::parse_day;
use crate::state::AppState;

const STATIONS_ON_ROUTE_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct PointPayload {
    pub lat: f64,
    pub lon: f64,
}

impl PointPayload {
    fn coordinate(&self, name: &str) -> Result<Coordinate, ApiError> {
        let point = Coordinate::new(self.lat, self.lon);
        if !point.is_valid() {
            return Err(ApiError::bad_request(format!(
                "\"{name}\" must contain a valid latitude and longitude"
            )));
        }
        Ok(point)
    }
}

#[derive(Debug, Deserialize)]
pub struct FuelOptions {
    pub fuel_type: FuelType,
    #[serde(default)]
    pub km_per_liter: Option<f64>,
    #[serde(default)]
    pub buffer_m: Option<f64>,
    /// Weekday (Spanish or English) whose promotions apply.
    #[serde(default)]
    pub day: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShortestRouteRequest {
    pub start: PointPayload,
    pub end: PointPayload,
    #[serde(default)]
    pub fuel: Option<FuelOptions>,
}

pub async fn shortest_route(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ShortestRouteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let start = request.start.coordinate("start")?;
    let end = request.end.coordinate("end")?;
    let fuel_day = parse_day(request.fuel.as_ref().and_then(|f| f.day.as_deref()))?;

    let snapshot = state.graph().ok_or(ApiError::GraphNotLoaded)?;
    let routing = state.config().routing();
    let answer = tokio::task::spawn_blocking(move || snapshot.route_between(start, end, &routing))
        .await
        .map_err(ApiError::internal)??;

    let route = &answer.route;
    let feature = route.to_feature().map_err(ApiError::internal)?;
    let mut body = json!({
        "route": feature,
        "cost_seconds": route.total_cost,
        "distance_m": route.distance_m,
        "start": answer.start,
        "end": answer.end,
        "edges": route.edge_ids(),
    });

    if let Some(fuel) = request.fuel {
        let stations = state.stations();
        let buffer_m = fuel
            .buffer_m
            .filter(|b| b.is_finite() && *b >= 0.0)
            .unwrap_or(DEFAULT_ROUTE_BUFFER_M);
        let hits = stations.along_route(
            &route.geometry,
            buffer_m,
            Some(fuel.fuel_type),
            fuel_day,
            STATIONS_ON_ROUTE_LIMIT,
        );
        let estimate = estimate_fuel_cost(
            route.distance_m,
            &hits,
            fuel.fuel_type,
            fuel.km_per_liter.unwrap_or(DEFAULT_KM_PER_LITER),
        );
        body["fuel_estimate"] = json!({
            "stations_on_route": hits,
            "liters_needed": estimate.liters_needed,
            "cheapest_station": estimate.cheapest_station,
            "cheapest_price": estimate.cheapest_price,
            "base_price": estimate.base_price,
            "discount_per_liter": estimate.discount_per_liter,
            "promotion": estimate.promotion,
            "estimated_cost": estimate.estimated_cost,
            "savings": estimate.savings,
            "day": fuel_day.map(|d| d.to_string()),
            "fuel_type": estimate.fuel_type,
            "km_per_liter": estimate.km_per_liter,
            "buffer_m": buffer_m,
        });
    }

    tracing::info!(
        start = answer.start.vertex_id,
        end = answer.end.vertex_id,
        segments = route.segments.len(),
        cost = route.total_cost,
        "Route computed"
    );
    Ok(Json(body))
}
