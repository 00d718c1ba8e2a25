//! `POST /api/admin/refresh`.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::refresh::{run_refresh, Dataset, RefreshReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub dataset: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshReport>, ApiError> {
    let Json(request) = payload?;
    let dataset: Dataset = request.dataset.parse().map_err(ApiError::BadRequest)?;
    let report = run_refresh(&state, dataset, state.config().admin_job_timeout()).await;
    Ok(Json(report))
}
