//! `GET /infraestructura/data`: road edges inside a viewport, paged.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use geojson::Feature;
use rutas_core::{BoundingBox, EdgeId, PageCursor};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfraQuery {
    pub bbox: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<usize>,
    /// Keyset cursor: last feature id already received.
    pub after: Option<EdgeId>,
}

impl InfraQuery {
    fn cursor(&self) -> Result<PageCursor, ApiError> {
        match (self.page, self.after) {
            (Some(_), Some(_)) => Err(ApiError::bad_request(
                "use either page or after, not both",
            )),
            (Some(0), None) => Err(ApiError::bad_request("page is 1-based")),
            (Some(page), None) => Ok(PageCursor::Page(page)),
            (None, Some(after)) => Ok(PageCursor::After(after)),
            (None, None) => Ok(PageCursor::Page(1)),
        }
    }
}

pub async fn infra_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<InfraQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let raw_bbox = query
        .bbox
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("bbox=south,west,north,east is required"))?;
    let bbox = BoundingBox::parse(raw_bbox)?;
    let cursor = query.cursor()?;
    let page_size = state.config().page_size(query.page_size);

    let snapshot = state.graph().ok_or(ApiError::GraphNotLoaded)?;
    let page = snapshot.viewport(&bbox, cursor, page_size);
    let features: Vec<Feature> = page
        .edges()
        .map(|edge| edge.to_feature())
        .collect::<Result<_, _>>()
        .map_err(ApiError::internal)?;

    tracing::debug!(
        bbox = %bbox,
        ?cursor,
        page_size,
        returned = features.len(),
        has_more = page.has_more(),
        "Viewport page served"
    );

    Ok(Json(json!({
        "features": features,
        "has_more": page.has_more(),
        "next_after": page.next_after(),
        "page": query.page.unwrap_or(1),
        "page_size": page_size,
        "graph_version": snapshot.version(),
    })))
}
