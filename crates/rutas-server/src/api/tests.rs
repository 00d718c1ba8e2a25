use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use rutas_core::geo::offset_position;
use rutas_core::{
    Coordinate, Edge, FuelType, GraphSnapshot, Promotion, RoadGraph, Station, StationIndex, Weekday,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tower::ServiceExt;

use crate::{api, config::Config, state::AppState};

const ADMIN_TOKEN: &str = "test-admin-token";

fn origin() -> Coordinate {
    Coordinate::new(-33.45, -70.66)
}

fn edge(id: i64, source: i64, target: i64, a: Coordinate, b: Coordinate, cost: f64) -> Edge {
    Edge {
        id,
        source,
        target,
        geometry: vec![a, b],
        forward_cost: cost,
        reverse_cost: cost,
        directed: false,
    }
}

/// Vertices 1-2 joined by one 500 m edge of cost 60; vertices 3-4 form a
/// separate component 3 km north.
fn fixture_graph() -> RoadGraph {
    let a = origin();
    let b = offset_position(a, 0.0, 500.0);
    let c = offset_position(a, 3000.0, 0.0);
    let d = offset_position(c, 0.0, 400.0);
    RoadGraph::load(vec![edge(1, 1, 2, a, b, 60.0), edge(2, 3, 4, c, d, 45.0)]).unwrap()
}

fn fixture_stations() -> StationIndex {
    let a = origin();
    let station = |id: i64, brand: &str, location: Coordinate, price: f64| Station {
        id,
        code: format!("CNE-{id}"),
        brand: brand.to_string(),
        address: String::new(),
        commune: "Santiago".to_string(),
        region: "13".to_string(),
        location,
        prices: [(FuelType::Gasoline93, price)].into_iter().collect(),
        promotions: Vec::new(),
    };
    let mut with_card = station(10, "COPEC", offset_position(a, 50.0, 100.0), 1300.0);
    with_card.promotions.push(Promotion {
        title: "Miércoles Banco".to_string(),
        description: String::new(),
        discount_per_liter: Some(80.0),
        days: vec![Weekday::Wed],
    });
    StationIndex::build(
        vec![
            with_card,
            station(11, "SHELL", offset_position(a, -80.0, 400.0), 1250.0),
            station(12, "COPEC", offset_position(a, 8000.0, 8000.0), 1100.0),
        ],
        0.01,
    )
}

fn test_config() -> Config {
    Config {
        admin_token: ADMIN_TOKEN.to_string(),
        ..Config::default()
    }
}

fn setup_app(graph: Option<RoadGraph>) -> (axum::Router, Arc<AppState>) {
    let config = test_config();
    let state = Arc::new(AppState::new(config.clone()));
    if let Some(graph) = graph {
        state.publish_graph(GraphSnapshot::with_grid(graph, config.grid_cell_deg));
    }
    state.replace_stations(fixture_stations());
    let app = api::routes(&config).with_state(state.clone());
    (app, state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn point(c: Coordinate) -> Value {
    json!({ "lat": c.lat, "lon": c.lon })
}

#[tokio::test]
async fn health_echoes_request_id() {
    let (app, _) = setup_app(None);
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn shortest_route_between_nearby_points() {
    let (app, _) = setup_app(Some(fixture_graph()));
    let start = offset_position(origin(), 30.0, -20.0);
    let end = offset_position(origin(), -25.0, 510.0);

    let response = app
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({ "start": point(start), "end": point(end) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = read_json(response).await;
    assert_eq!(body["route"]["type"], "Feature");
    assert_eq!(body["route"]["geometry"]["type"], "LineString");
    assert!(body["route"]["geometry"]["coordinates"].as_array().unwrap().len() >= 2);
    assert!((body["cost_seconds"].as_f64().unwrap() - 60.0).abs() < 1e-9);
    assert_eq!(body["route"]["properties"]["start_node"], 1);
    assert_eq!(body["route"]["properties"]["end_node"], 2);
    assert_eq!(body["edges"], json!([1]));
    assert!(body["start"]["snap_distance_m"].as_f64().unwrap() < 50.0);
    assert!(body.get("fuel_estimate").is_none());
}

#[tokio::test]
async fn far_endpoint_is_bad_request() {
    let (app, _) = setup_app(Some(fixture_graph()));
    let far = offset_position(origin(), -5000.0, 0.0);
    let response = app
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({ "start": point(origin()), "end": point(far) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "out_of_range_endpoint");
    assert_eq!(body["endpoint"], "end");
}

#[tokio::test]
async fn disconnected_endpoints_report_no_route() {
    let (app, _) = setup_app(Some(fixture_graph()));
    let north = offset_position(origin(), 3000.0, 10.0);
    let response = app
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({ "start": point(origin()), "end": point(north) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["error"], "no_route");
}

#[tokio::test]
async fn malformed_route_requests_are_rejected() {
    let (app, _) = setup_app(Some(fixture_graph()));

    let missing_end = app
        .clone()
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({ "start": point(origin()) }),
        ))
        .await
        .unwrap();
    assert_eq!(missing_end.status(), StatusCode::BAD_REQUEST);

    let bad_lat = app
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({ "start": { "lat": 123.0, "lon": 0.0 }, "end": point(origin()) }),
        ))
        .await
        .unwrap();
    assert_eq!(bad_lat.status(), StatusCode::BAD_REQUEST);
    let body = read_json(bad_lat).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn route_before_graph_load_is_unavailable() {
    let (app, _) = setup_app(None);
    let response = app
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({ "start": point(origin()), "end": point(origin()) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn route_with_fuel_options_lists_stations_on_route() {
    let (app, _) = setup_app(Some(fixture_graph()));
    let end = offset_position(origin(), 0.0, 500.0);
    let response = app
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({
                "start": point(origin()),
                "end": point(end),
                "fuel": { "fuel_type": "93", "km_per_liter": 10.0 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let estimate = &body["fuel_estimate"];
    let ids: Vec<i64> = estimate["stations_on_route"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![11, 10]);
    assert_eq!(estimate["cheapest_station"], 11);
    assert!((estimate["liters_needed"].as_f64().unwrap() - 0.05).abs() < 0.001);
}

#[tokio::test]
async fn route_fuel_estimate_applies_promotions_for_the_day() {
    let (app, _) = setup_app(Some(fixture_graph()));
    let end = offset_position(origin(), 0.0, 500.0);
    let request = |day: &str| {
        post_json(
            "/api/routes/shortest",
            json!({
                "start": point(origin()),
                "end": point(end),
                "fuel": { "fuel_type": "93", "day": day }
            }),
        )
    };

    let response = app.clone().oneshot(request("miércoles")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let estimate = &body["fuel_estimate"];
    assert_eq!(estimate["cheapest_station"], 10);
    assert_eq!(estimate["cheapest_price"], 1220.0);
    assert_eq!(estimate["base_price"], 1300.0);
    assert_eq!(estimate["promotion"], "Miércoles Banco");
    assert_eq!(estimate["day"], "Wed");
    assert_eq!(estimate["stations_on_route"][0]["pump_price"]["price"], 1220.0);

    let bad_day = app.oneshot(request("feriado")).await.unwrap();
    assert_eq!(bad_day.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cheapest_stations_by_region() {
    let (app, _) = setup_app(None);
    let response = app
        .clone()
        .oneshot(get("/api/stations/cheapest?region=13&fuel_type=93&limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let ids: Vec<i64> = body["stations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![12, 11]);
    assert_eq!(body["fuel_type"], "93");

    let missing = app
        .oneshot(get("/api/stations/cheapest?fuel_type=93"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn brands_are_compared_by_average_price() {
    let (app, _) = setup_app(None);
    let response = app
        .oneshot(get("/api/stations/brands?fuel_type=93"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let brands = body["brands"].as_array().unwrap();
    assert_eq!(brands.len(), 2);
    assert_eq!(brands[0]["brand"], "COPEC");
    assert_eq!(brands[0]["avg_price"], 1200.0);
    assert_eq!(brands[0]["station_count"], 2);
    assert_eq!(brands[1]["brand"], "SHELL");
}

#[tokio::test]
async fn promotion_savings_for_a_station() {
    let (app, _) = setup_app(None);
    let response = app
        .clone()
        .oneshot(get(
            "/api/stations/10/savings?distance_km=120&fuel_type=93&km_per_liter=12&day=Wed",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["base_total_cost"], 13_000.0);
    assert_eq!(body["promo_total_cost"], 12_200.0);
    assert_eq!(body["total_savings"], 800.0);

    for (uri, status) in [
        ("/api/stations/999/savings?distance_km=10&fuel_type=93", StatusCode::NOT_FOUND),
        ("/api/stations/11/savings?distance_km=10&fuel_type=93", StatusCode::NOT_FOUND),
        ("/api/stations/10/savings?distance_km=10&fuel_type=93&day=Mon", StatusCode::NOT_FOUND),
        ("/api/stations/10/savings?fuel_type=93", StatusCode::BAD_REQUEST),
        ("/api/stations/10/savings?distance_km=-1", StatusCode::BAD_REQUEST),
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), status, "{uri}");
    }
}

#[tokio::test]
async fn same_point_route_is_zero_cost() {
    let (app, _) = setup_app(Some(fixture_graph()));
    let response = app
        .oneshot(post_json(
            "/api/routes/shortest",
            json!({ "start": point(origin()), "end": point(origin()) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["cost_seconds"], 0.0);
    assert_eq!(
        body["route"]["geometry"]["coordinates"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

/// 12,000 short disjoint edges inside one degree square.
fn dense_graph() -> RoadGraph {
    let edges = (0..12_000i64)
        .map(|i| {
            let lat = -33.9 + (i / 120) as f64 * 0.005;
            let lon = -70.9 + (i % 120) as f64 * 0.005;
            let a = Coordinate::new(lat, lon);
            let b = Coordinate::new(lat, lon + 0.002);
            edge(i + 1, 2 * i + 1, 2 * i + 2, a, b, 10.0)
        })
        .collect();
    RoadGraph::load(edges).unwrap()
}

fn feature_ids(body: &Value) -> Vec<i64> {
    body["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["properties"]["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn viewport_pages_twelve_thousand_features() {
    let (app, _) = setup_app(Some(dense_graph()));
    let bbox = "-34.00000,-71.00000,-33.00000,-70.00000";

    let first = app
        .clone()
        .oneshot(get(&format!(
            "/infraestructura/data?bbox={bbox}&page=1&page_size=7500"
        )))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = read_json(first).await;
    assert_eq!(first["has_more"], true);

    let second = app
        .oneshot(get(&format!(
            "/infraestructura/data?bbox={bbox}&page=2&page_size=7500"
        )))
        .await
        .unwrap();
    let second = read_json(second).await;
    assert_eq!(second["has_more"], false);

    let first_ids = feature_ids(&first);
    let second_ids = feature_ids(&second);
    assert_eq!(first_ids.len(), 7500);
    assert_eq!(second_ids.len(), 4500);
    let unique: HashSet<i64> = first_ids.iter().chain(&second_ids).copied().collect();
    assert_eq!(unique.len(), 12_000);
}

#[tokio::test]
async fn viewport_keyset_cursor_allows_changing_page_size() {
    let (app, _) = setup_app(Some(dense_graph()));
    let bbox = "-33.9,-70.9,-33.85,-70.85";

    let mut seen = Vec::new();
    let mut after: Option<i64> = None;
    for page_size in [5usize, 17, 3, 1000] {
        let uri = match after {
            Some(id) => format!("/infraestructura/data?bbox={bbox}&after={id}&page_size={page_size}"),
            None => format!("/infraestructura/data?bbox={bbox}&page_size={page_size}"),
        };
        let body = read_json(app.clone().oneshot(get(&uri)).await.unwrap()).await;
        seen.extend(feature_ids(&body));
        if body["has_more"] == false {
            break;
        }
        after = body["next_after"].as_i64();
    }

    let unique: HashSet<i64> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len());
    let mut sorted = seen.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, seen);
    assert!(!seen.is_empty());
}

#[tokio::test]
async fn viewport_rejects_bad_bbox() {
    let (app, _) = setup_app(Some(fixture_graph()));
    for uri in [
        "/infraestructura/data",
        "/infraestructura/data?bbox=1,2,3",
        "/infraestructura/data?bbox=-33,-70,-34,-71",
        "/infraestructura/data?bbox=-34,-71,-33,-70&page=0",
        "/infraestructura/data?bbox=-34,-71,-33,-70&page=2&after=5",
        "/infraestructura/data?bbox=-34,-71,-33,-70&page=abc",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn stations_listing_requires_bounds_and_filters_fuel() {
    let (app, _) = setup_app(None);

    let missing = app
        .clone()
        .oneshot(get("/api/stations?north=-33.4&south=-33.5"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get(
            "/api/stations?north=-33.4&south=-33.5&east=-70.6&west=-70.7&fuel_type=93",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let ids: Vec<i64> = body["stations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![11, 10]);

    let bad_fuel = app
        .oneshot(get(
            "/api/stations?north=-33.4&south=-33.5&east=-70.6&west=-70.7&fuel_type=99",
        ))
        .await
        .unwrap();
    assert_eq!(bad_fuel.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn near_stations_sorted_by_distance() {
    let (app, _) = setup_app(None);
    let o = origin();
    let response = app
        .oneshot(get(&format!(
            "/api/stations/near?lat={}&lon={}&radius_m=1000",
            o.lat, o.lon
        )))
        .await
        .unwrap();
    let body = read_json(response).await;
    let ids: Vec<i64> = body["stations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![10, 11]);
}

#[tokio::test]
async fn graph_status_reports_snapshot() {
    let (app, _) = setup_app(Some(fixture_graph()));
    let body = read_json(app.oneshot(get("/api/graph/status")).await.unwrap()).await;
    assert_eq!(body["loaded"], true);
    assert_eq!(body["version"], 1);
    assert_eq!(body["vertices"], 4);
    assert_eq!(body["edges"], 2);
}

#[tokio::test]
async fn admin_refresh_requires_token_and_known_dataset() {
    let (app, _) = setup_app(Some(fixture_graph()));

    let anonymous = app
        .clone()
        .oneshot(post_json("/api/admin/refresh", json!({ "dataset": "graph" })))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let mut wrong = post_json("/api/admin/refresh", json!({ "dataset": "graph" }));
    wrong
        .headers_mut()
        .insert("authorization", "Bearer nope".parse().unwrap());
    assert_eq!(
        app.clone().oneshot(wrong).await.unwrap().status(),
        StatusCode::FORBIDDEN
    );

    let mut unknown = post_json("/api/admin/refresh", json!({ "dataset": "brands" }));
    unknown.headers_mut().insert(
        "authorization",
        format!("Bearer {ADMIN_TOKEN}").parse().unwrap(),
    );
    assert_eq!(
        app.clone().oneshot(unknown).await.unwrap().status(),
        StatusCode::BAD_REQUEST
    );

    // No storage behind this state: the first step fails and is reported.
    let mut request = post_json("/api/admin/refresh", json!({ "dataset": "graph" }));
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {ADMIN_TOKEN}").parse().unwrap(),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["steps"][0]["label"], "load edges");
    assert_eq!(body["steps"][0]["success"], false);
}
