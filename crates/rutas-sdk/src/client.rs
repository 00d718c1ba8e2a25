//! Client for the Rutas HTTP API.

use std::future::Future;

use geojson::Feature;
use rutas_core::{
    BoundingBox, BrandPrices, Coordinate, EdgeId, FuelType, SavingsReport, Station, VertexId,
    Weekday,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::TransportError;
use crate::viewport::{PageRequest, PageSource};

/// Client for a running Rutas server.
#[derive(Debug, Clone)]
pub struct RutasClient {
    pub(crate) base_url: String,
    pub(crate) admin_token: Option<String>,
    pub(crate) client: reqwest::Client,
}

#[derive(Debug, Clone, Serialize)]
pub struct FuelRequest {
    pub fuel_type: FuelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub km_per_liter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_m: Option<f64>,
    /// Apply promotions valid on this weekday.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<Weekday>,
}

/// Vertex a request coordinate was snapped to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SnappedEndpoint {
    pub id: VertexId,
    pub lat: f64,
    pub lon: f64,
    pub snap_distance_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteResponse {
    pub route: Feature,
    pub cost_seconds: f64,
    pub distance_m: f64,
    pub start: SnappedEndpoint,
    pub end: SnappedEndpoint,
    pub edges: Vec<EdgeId>,
    #[serde(default)]
    pub fuel_estimate: Option<Value>,
}

/// One page of `/infraestructura/data`.
#[derive(Debug, Clone, Deserialize)]
pub struct InfraPage {
    pub features: Vec<Feature>,
    pub has_more: bool,
    #[serde(default)]
    pub next_after: Option<EdgeId>,
    #[serde(default)]
    pub graph_version: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationList {
    pub count: usize,
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheapestStations {
    pub region: String,
    pub fuel_type: FuelType,
    pub count: usize,
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandComparison {
    pub fuel_type: FuelType,
    #[serde(default)]
    pub region: Option<String>,
    pub brands: Vec<BrandPrices>,
}

/// Optional knobs for [`RutasClient::promotion_savings`].
#[derive(Debug, Clone, Default)]
pub struct SavingsOptions {
    pub km_per_liter: Option<f64>,
    pub day: Option<Weekday>,
    pub discount_per_liter: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshStep {
    pub label: String,
    pub success: bool,
    pub duration_seconds: f64,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshReport {
    pub success: bool,
    #[serde(default)]
    pub timed_out: bool,
    pub steps: Vec<RefreshStep>,
}

impl RutasClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Token sent as `Authorization: Bearer` on admin calls.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shortest route between two coordinates, with an optional fuel estimate.
    pub async fn shortest_route(
        &self,
        start: Coordinate,
        end: Coordinate,
        fuel: Option<FuelRequest>,
    ) -> Result<RouteResponse, TransportError> {
        let url = format!("{}/api/routes/shortest", self.base_url);
        let mut body = json!({
            "start": { "lat": start.lat, "lon": start.lon },
            "end": { "lat": end.lat, "lon": end.lon },
        });
        if let Some(fuel) = fuel {
            body["fuel"] = json!(fuel);
        }
        let response = self.client.post(&url).json(&body).send().await?;
        decode(response).await
    }

    /// Fetch one viewport page. Dropping the returned future cancels the
    /// underlying request.
    pub async fn fetch_infra_page(
        &self,
        bbox: &BoundingBox,
        page: u32,
        page_size: usize,
    ) -> Result<InfraPage, TransportError> {
        let url = format!("{}/infraestructura/data", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("bbox", bbox.to_string()),
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
            ])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_stations(
        &self,
        bbox: &BoundingBox,
        fuel_type: Option<FuelType>,
        limit: Option<usize>,
    ) -> Result<StationList, TransportError> {
        let url = format!("{}/api/stations", self.base_url);
        let mut params = vec![
            ("north", bbox.north.to_string()),
            ("south", bbox.south.to_string()),
            ("east", bbox.east.to_string()),
            ("west", bbox.west.to_string()),
        ];
        if let Some(fuel) = fuel_type {
            params.push(("fuel_type", fuel.code().to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let response = self.client.get(&url).query(&params).send().await?;
        decode(response).await
    }

    /// Cheapest stations selling `fuel_type` in a region.
    pub async fn cheapest_in_region(
        &self,
        region: &str,
        fuel_type: FuelType,
        limit: Option<usize>,
    ) -> Result<CheapestStations, TransportError> {
        let url = format!("{}/api/stations/cheapest", self.base_url);
        let mut params = vec![
            ("region", region.to_string()),
            ("fuel_type", fuel_type.code().to_string()),
        ];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let response = self.client.get(&url).query(&params).send().await?;
        decode(response).await
    }

    /// Average, minimum and maximum price per brand.
    pub async fn compare_brands(
        &self,
        fuel_type: FuelType,
        region: Option<&str>,
    ) -> Result<BrandComparison, TransportError> {
        let url = format!("{}/api/stations/brands", self.base_url);
        let mut params = vec![("fuel_type", fuel_type.code().to_string())];
        if let Some(region) = region {
            params.push(("region", region.to_string()));
        }
        let response = self.client.get(&url).query(&params).send().await?;
        decode(response).await
    }

    /// What a station's promotion saves on a trip of `distance_km`. The server
    /// answers 404 when the station has no price or applicable promotion.
    pub async fn promotion_savings(
        &self,
        station_id: i64,
        fuel_type: FuelType,
        distance_km: f64,
        options: &SavingsOptions,
    ) -> Result<SavingsReport, TransportError> {
        let url = format!("{}/api/stations/{}/savings", self.base_url, station_id);
        let mut params = vec![
            ("distance_km", distance_km.to_string()),
            ("fuel_type", fuel_type.code().to_string()),
        ];
        if let Some(km_per_liter) = options.km_per_liter {
            params.push(("km_per_liter", km_per_liter.to_string()));
        }
        if let Some(day) = options.day {
            params.push(("day", day.to_string()));
        }
        if let Some(discount) = options.discount_per_liter {
            params.push(("discount_per_liter", discount.to_string()));
        }
        let response = self.client.get(&url).query(&params).send().await?;
        decode(response).await
    }

    /// Trigger a storage refresh. `dataset` is `graph`, `stations` or `all`.
    pub async fn admin_refresh(&self, dataset: &str) -> Result<RefreshReport, TransportError> {
        let url = format!("{}/api/admin/refresh", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .json(&json!({ "dataset": dataset }));
        if let Some(token) = self.admin_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| TransportError::Decode(err.to_string()))
}

impl PageSource for RutasClient {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<InfraPage, TransportError>> + Send {
        self.fetch_infra_page(&request.bbox, request.page, request.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = RutasClient::new("http://localhost:5000/").with_admin_token("t");
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.admin_token.as_deref(), Some("t"));
    }

    #[test]
    fn route_response_parses_server_body() {
        let body = json!({
            "route": {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[-70.66, -33.45], [-70.655, -33.45]] },
                "properties": { "start_node": 1, "end_node": 2, "total_cost": 60.0, "segment_count": 1 }
            },
            "cost_seconds": 60.0,
            "distance_m": 464.2,
            "start": { "id": 1, "lat": -33.45, "lon": -70.66, "snap_distance_m": 12.5 },
            "end": { "id": 2, "lat": -33.45, "lon": -70.655, "snap_distance_m": 3.0 },
            "edges": [1]
        });
        let parsed: RouteResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.start.id, 1);
        assert_eq!(parsed.edges, vec![1]);
        assert!(parsed.fuel_estimate.is_none());
        assert!(parsed.route.geometry.is_some());
    }

    #[test]
    fn fuel_request_omits_unset_options() {
        let fuel = FuelRequest {
            fuel_type: FuelType::Diesel,
            km_per_liter: None,
            buffer_m: Some(500.0),
            day: None,
        };
        assert_eq!(
            serde_json::to_value(&fuel).unwrap(),
            json!({ "fuel_type": "DI", "buffer_m": 500.0 })
        );

        let wednesday = FuelRequest {
            day: Some(Weekday::Wed),
            ..fuel
        };
        assert_eq!(serde_json::to_value(&wednesday).unwrap()["day"], "Wed");
    }

    #[test]
    fn station_comparisons_parse_server_bodies() {
        let brands: BrandComparison = serde_json::from_value(json!({
            "fuel_type": "93",
            "region": null,
            "brands": [
                { "brand": "COPEC", "avg_price": 1200.0, "min_price": 1100.0, "max_price": 1300.0, "station_count": 2 }
            ]
        }))
        .unwrap();
        assert_eq!(brands.fuel_type, FuelType::Gasoline93);
        assert_eq!(brands.brands[0].station_count, 2);

        let cheapest: CheapestStations = serde_json::from_value(json!({
            "region": "13",
            "fuel_type": "DI",
            "count": 1,
            "stations": [{
                "id": 3, "code": "CNE-3", "brand": "SHELL", "address": "", "commune": "Santiago",
                "region": "13", "location": { "lat": -33.4, "lon": -70.6 },
                "prices": { "DI": 990.0 },
                "promotions": [{ "title": "Jueves", "days": ["Thu"] }]
            }]
        }))
        .unwrap();
        let station = &cheapest.stations[0];
        assert_eq!(station.price(FuelType::Diesel), Some(990.0));
        assert_eq!(station.promotions[0].days, vec![Weekday::Thu]);

        let report: SavingsReport = serde_json::from_value(json!({
            "station_id": 10, "station_code": "CNE-10", "brand": "COPEC", "fuel_type": "93",
            "liters_needed": 10.0, "base_price": 1300.0, "base_total_cost": 13000.0,
            "discount_per_liter": 80.0, "promo_price": 1220.0, "promo_total_cost": 12200.0,
            "total_savings": 800.0, "promotion": "Miércoles Banco"
        }))
        .unwrap();
        assert_eq!(report.total_savings, 800.0);
    }
}
