// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tile generation: drive a [`GeometryTiler`] and collect its output.
//!
//! Progress events are forwarded into an unbounded channel while the engine
//! runs and merged afterwards, in arrival order, into a
//! [`TileGenerationResult`]. All three listeners are unregistered before the
//! engine's outcome is inspected, so a failed run leaks nothing.

use crate::engine::{GeometryChunk, GeometryTiler, TilerSettings};
use crate::error::{Error, Result};
use crate::types::{AssetRecord, ElementId, GeometryIndexEntry, TileFile, TileGenerationResult, TileName};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Progress event captured from the engine.
#[derive(Debug)]
enum TilerEvent {
    Geometry(GeometryChunk),
    Assets(Vec<AssetRecord>),
    Global(Vec<u8>),
}

/// Logical name of the `n`th geometry tile of a model.
pub fn geometry_tile_name(model_name: &str, n: usize) -> TileName {
    TileName(format!("{}-processed-geometries-{}", model_name, n))
}

/// Logical name of a model's global data tile.
pub fn global_tile_name(model_name: &str) -> TileName {
    TileName(format!("{}-processed-global", model_name))
}

/// Make a model name safe for use in tile names.
///
/// Strips a trailing `.ifc` extension (any case) and replaces everything but
/// ASCII alphanumerics, `-` and `_` with `_`.
pub fn sanitize_model_name(name: &str) -> String {
    let trimmed = name.trim();
    let stem = match trimmed.len().checked_sub(4) {
        Some(cut) if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(".ifc") => {
            &trimmed[..cut]
        }
        _ => trimmed,
    };

    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "model".to_string()
    } else {
        sanitized
    }
}

/// Accumulates engine events into a result, in the order they arrived.
struct TileSetBuilder {
    model_name: String,
    files: Vec<TileFile>,
    geometries: BTreeMap<ElementId, GeometryIndexEntry<TileName>>,
    assets: Vec<AssetRecord>,
    global: Option<TileName>,
    next_geometry_tile: usize,
}

impl TileSetBuilder {
    fn new(model_name: String) -> Self {
        Self {
            model_name,
            files: Vec::new(),
            geometries: BTreeMap::new(),
            assets: Vec::new(),
            global: None,
            next_geometry_tile: 1,
        }
    }

    fn apply(&mut self, event: TilerEvent) -> Result<()> {
        match event {
            TilerEvent::Geometry(chunk) => {
                let name = geometry_tile_name(&self.model_name, self.next_geometry_tile);
                self.next_geometry_tile += 1;
                for (id, metadata) in chunk.data {
                    self.geometries.insert(
                        id,
                        GeometryIndexEntry {
                            geometry_file: name.clone(),
                            metadata,
                        },
                    );
                }
                self.files.push(TileFile {
                    name,
                    payload: chunk.buffer,
                });
            }
            TilerEvent::Assets(records) => self.assets.extend(records),
            TilerEvent::Global(payload) => {
                if self.global.is_some() {
                    return Err(Error::DuplicateGlobalData);
                }
                let name = global_tile_name(&self.model_name);
                self.files.push(TileFile {
                    name: name.clone(),
                    payload,
                });
                self.global = Some(name);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<TileGenerationResult> {
        if self.files.is_empty() {
            return Err(Error::NoTilesGenerated);
        }
        let global_data_file_name = self
            .global
            .ok_or(Error::MissingGlobalData(self.files.len()))?;

        Ok(TileGenerationResult {
            files: self.files,
            geometries_data: self.geometries,
            assets_data: self.assets,
            global_data_file_name,
        })
    }
}

/// Convert a raw model buffer into tile files and index tables.
///
/// Single attempt. An engine rejection is returned unchanged and no partial
/// result is exposed.
pub async fn generate_tiles(
    tiler: &dyn GeometryTiler,
    settings: &TilerSettings,
    buffer: &[u8],
    model_name: &str,
) -> Result<TileGenerationResult> {
    if buffer.is_empty() {
        return Err(Error::EmptyBuffer);
    }
    let model_name = sanitize_model_name(model_name);

    tracing::info!(
        model = %model_name,
        size = buffer.len(),
        min_geometry_size = settings.min_geometry_size,
        min_assets_size = settings.min_assets_size,
        "Starting tile generation"
    );
    tiler.configure(settings);

    let (tx, mut rx) = mpsc::unbounded_channel::<TilerEvent>();

    let geometry_tx = tx.clone();
    let assets_tx = tx.clone();
    let global_tx = tx;
    let subscriptions = [
        tiler.on_geometry_streamed().subscribe(move |chunk| {
            let _ = geometry_tx.send(TilerEvent::Geometry(chunk.clone()));
            Ok(())
        }),
        tiler.on_asset_streamed().subscribe(move |assets| {
            let _ = assets_tx.send(TilerEvent::Assets(assets.clone()));
            Ok(())
        }),
        tiler.on_ifc_loaded().subscribe(move |payload| {
            let _ = global_tx.send(TilerEvent::Global(payload.clone()));
            Ok(())
        }),
    ];

    let outcome = tiler.stream_from_buffer(buffer).await;
    drop(subscriptions);

    if let Err(e) = outcome {
        tracing::warn!(model = %model_name, error = %e, "Tiling engine rejected the model");
        return Err(e);
    }

    let mut builder = TileSetBuilder::new(model_name);
    while let Ok(event) = rx.try_recv() {
        builder.apply(event)?;
    }
    let result = builder.finish()?;

    tracing::info!(
        model = %result.global_data_file_name,
        files = result.files.len(),
        elements = result.geometries_data.len(),
        assets = result.assets_data.len(),
        bytes = result.total_bytes(),
        "Tile generation finished"
    );
    Ok(result)
}
