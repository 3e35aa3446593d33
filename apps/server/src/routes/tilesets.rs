// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tileset creation endpoint.

use crate::error::ApiError;
use crate::services::build_tileset;
use crate::types::TilesetResponse;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;

/// Extract the `file` field (name and contents) from a multipart request.
async fn extract_file(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        tracing::debug!(field_name = %field_name, "Processing multipart field");

        if field_name == "file" {
            let file_name = field.file_name().unwrap_or("model.ifc").to_string();
            let bytes = field.bytes().await?;
            tracing::debug!(file_name = %file_name, size = bytes.len(), "Extracted file from multipart");
            return Ok((file_name, bytes));
        }
    }

    tracing::warn!("No 'file' field found in multipart request");
    Err(ApiError::MissingFile)
}

/// POST /api/v1/tilesets - Tile an IFC file.
pub async fn create(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TilesetResponse>, ApiError> {
    let (file_name, data) = extract_file(&mut multipart).await?;

    if data.len() > state.config.max_file_size_bytes() {
        return Err(ApiError::FileTooLarge {
            max_mb: state.config.max_file_size_mb,
        });
    }

    tracing::info!(file_name = %file_name, size = data.len(), "Tiling upload");
    let response = build_tileset(
        &state.store,
        &state.config.tiler,
        state.config.large_file_threshold,
        &file_name,
        &data,
    )
    .await?;

    Ok(Json(response))
}
