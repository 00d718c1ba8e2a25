//! Rutas SDK
//!
//! HTTP client for the routing service plus the viewport loader that keeps a
//! map layer in sync with the visible rectangle.

pub mod client;
pub mod error;
pub mod viewport;

pub use client::{
    BrandComparison, CheapestStations, FuelRequest, InfraPage, RouteResponse, RutasClient,
    SavingsOptions,
};
pub use error::TransportError;
pub use rutas_core::{BoundingBox, Coordinate, FuelType, Weekday};
pub use viewport::{
    DisplayState, LoadStatus, PageRequest, PageSource, ViewportConfig, ViewportLoader,
};
