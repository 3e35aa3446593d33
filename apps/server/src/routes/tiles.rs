// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tile retrieval and release endpoints.

use crate::error::ApiError;
use crate::types::ReleaseRequest;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use ifc_stream_core::TileStore;
use std::sync::Arc;

/// GET /api/v1/tiles/:key - Fetch one tile.
pub async fn get_tile(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.get_bytes(&key).await? {
        Some(data) => {
            tracing::debug!(key = %key, size = data.len(), "Tile HIT");
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
                .body(Body::from(data))
                .map_err(|e| ApiError::Storage(e.to_string()))
        }
        None => {
            tracing::debug!(key = %key, "Tile MISS");
            Err(ApiError::NotFound(format!("Tile not found: {}", key)))
        }
    }
}

/// DELETE /api/v1/tiles - Release tiles by handle.
pub async fn release(
    State(state): State<AppState>,
    Json(request): Json<ReleaseRequest>,
) -> Result<StatusCode, ApiError> {
    let count = request.handles.len();
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || store.release(&request.handles)).await?;

    tracing::info!(count, "Released tiles");
    Ok(StatusCode::NO_CONTENT)
}
