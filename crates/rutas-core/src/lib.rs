pub mod dijkstra;
pub mod error;
pub mod geo;
pub mod graph;
pub mod models;
pub mod route;
pub mod snap;
pub mod snapshot;
pub mod spatial;
pub mod stations;
pub mod to_geojson;

pub use dijkstra::{shortest_path, shortest_path_idx, PathStep, SolvedPath};
pub use error::{BoundsError, Endpoint, GraphError, RoutingError, SnapError};
pub use geo::{haversine_distance, BoundingBox};
pub use graph::{Direction, GraphStats, OutgoingEdge, RoadGraph};
pub use models::{
    parse_weekday, CostDefaults, Coordinate, Edge, EdgeId, EdgeRecord, FuelType, Promotion,
    PumpPrice, Station, Vertex, VertexId, IMPASSABLE_COST_SENTINEL,
};
pub use route::{assemble, Route, RouteSegment};
pub use snap::{SnapResolver, SnapResult, DEFAULT_SNAP_MAX_DISTANCE_M};
pub use snapshot::{GraphSnapshot, RouteAnswer, RoutingConfig, SnapshotHandle, ViewportPage};
pub use spatial::{
    EdgePage, GridIndex, LinearIndex, NearestVertex, PageCursor, SpatialIndex, DEFAULT_CELL_DEG,
};
pub use stations::{
    estimate_fuel_cost, promotion_savings, BrandPrices, FuelEstimate, SavingsReport, StationHit,
    StationIndex, DEFAULT_KM_PER_LITER, DEFAULT_NEAR_RADIUS_M, DEFAULT_ROUTE_BUFFER_M,
};
pub use chrono::Weekday;
