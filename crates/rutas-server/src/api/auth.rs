//! Bearer token guard for the admin endpoints.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AdminToken(pub Arc<String>);

fn reject(status: StatusCode, kind: &str, message: &str) -> Response {
    (status, Json(json!({ "error": kind, "message": message }))).into_response()
}

/// 401 without credentials, 400 for a non-bearer header, 403 for a wrong
/// token.
pub async fn require_admin(
    State(admin_token): State<AdminToken>,
    request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let Some(auth) = auth_header else {
        return reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Add header: Authorization: Bearer <admin_token>",
        );
    };
    let Some(token) = auth.strip_prefix("Bearer ") else {
        return reject(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "Authorization header must be 'Bearer <token>'",
        );
    };
    if token.trim() != admin_token.0.as_str() {
        tracing::warn!("Rejected admin request with invalid token");
        return reject(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Invalid admin token, check RUTAS_ADMIN_TOKEN",
        );
    }
    next.run(request).await
}
