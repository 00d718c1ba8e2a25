//! JSON error responses.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rutas_core::{BoundsError, Endpoint, RoutingError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    OutOfRange { endpoint: Endpoint, message: String },
    #[error("{0}")]
    NoRoute(String),
    #[error("{0}")]
    NotFound(String),
    #[error("graph not loaded")]
    GraphNotLoaded,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal(message.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
            ApiError::NoRoute(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::GraphNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::OutOfRange { .. } => "out_of_range_endpoint",
            ApiError::NoRoute(_) => "no_route",
            ApiError::NotFound(_) => "not_found",
            ApiError::GraphNotLoaded => "graph_not_loaded",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        match &self {
            ApiError::OutOfRange { endpoint, .. } => {
                body["endpoint"] = json!(endpoint);
            }
            ApiError::Internal(message) => {
                tracing::error!("Request failed: {}", message);
                body["message"] = json!("Unable to complete the request at this time.");
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

impl From<RoutingError> for ApiError {
    fn from(err: RoutingError) -> Self {
        match &err {
            RoutingError::OutOfRangeEndpoint { endpoint, .. } => ApiError::OutOfRange {
                endpoint: *endpoint,
                message: err.to_string(),
            },
            RoutingError::NoPath { .. } => ApiError::NoRoute(err.to_string()),
            RoutingError::UnknownVertex(_) | RoutingError::VertexIndexOutOfRange { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<BoundsError> for ApiError {
    fn from(err: BoundsError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rutas_core::SnapError;

    #[test]
    fn routing_errors_map_to_distinct_statuses() {
        let out_of_range: ApiError = RoutingError::OutOfRangeEndpoint {
            endpoint: Endpoint::Start,
            source: SnapError::NoVertexInRange {
                lat: 0.0,
                lon: 0.0,
                max_distance_m: 1000.0,
            },
        }
        .into();
        assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);

        let no_route: ApiError = RoutingError::NoPath { from: 1, to: 2 }.into();
        assert_eq!(no_route.status(), StatusCode::NOT_FOUND);
        assert_eq!(no_route.kind(), "no_route");

        let unknown: ApiError = RoutingError::UnknownVertex(3).into();
        assert_eq!(unknown.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
