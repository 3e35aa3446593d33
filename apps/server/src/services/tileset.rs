// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tile an uploaded model and assemble its streaming descriptor.

use crate::error::ApiError;
use crate::services::tile_store::DiskTileStore;
use crate::types::TilesetResponse;
use ifc_stream_core::{
    assemble, generate_tiles, sanitize_model_name, StepTiler, TileHandle, TileStore, TilerSettings,
};
use std::time::Instant;

/// Run tile generation, persistence and assembly for one upload.
///
/// Tiles persisted before a failed assembly are released.
pub async fn build_tileset(
    store: &DiskTileStore,
    settings: &TilerSettings,
    large_file_threshold: u64,
    file_name: &str,
    data: &[u8],
) -> Result<TilesetResponse, ApiError> {
    let started = Instant::now();
    // Tiler channels are per instance, so every request gets its own.
    let tiler = StepTiler::new();

    let result = generate_tiles(&tiler, settings, data, file_name).await?;
    let tile_count = result.files.len();
    let element_count = result.geometries_data.len();
    let asset_count = result.assets_data.len();

    let handles = store.persist(&result).await?;
    let persisted: Vec<TileHandle> = handles.values().cloned().collect();

    let descriptor = match assemble(result, &handles) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            store.release(&persisted);
            return Err(e.into());
        }
    };

    let model_name = sanitize_model_name(file_name);
    tracing::info!(
        model = %model_name,
        tiles = tile_count,
        elements = element_count,
        assets = asset_count,
        total_time_ms = started.elapsed().as_millis() as u64,
        "Tileset ready"
    );

    Ok(TilesetResponse {
        model_name,
        descriptor,
        tile_count,
        element_count,
        asset_count,
        large_file: data.len() as u64 > large_file_threshold,
    })
}
