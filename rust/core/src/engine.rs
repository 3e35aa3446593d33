// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary with the geometry tiling engine.

use crate::error::Result;
use crate::events::EventChannel;
use crate::types::{AssetRecord, ElementId, ElementMetadata};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default runtime location of the tiling engine.
pub const DEFAULT_TILER_WASM_PATH: &str = "https://unpkg.com/web-ifc@0.0.66/";

/// Where the engine's native runtime lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmLocator {
    pub path: String,
    pub absolute: bool,
}

impl WasmLocator {
    pub fn absolute(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            absolute: true,
        }
    }
}

/// Tiling engine settings applied before every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilerSettings {
    pub wasm: WasmLocator,
    /// Minimum number of elements per geometry tile.
    pub min_geometry_size: usize,
    /// Minimum number of asset records per asset batch.
    pub min_assets_size: usize,
}

impl Default for TilerSettings {
    fn default() -> Self {
        Self {
            wasm: WasmLocator::absolute(DEFAULT_TILER_WASM_PATH),
            min_geometry_size: 20,
            min_assets_size: 1000,
        }
    }
}

/// One binary geometry chunk plus the index fragment describing its elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryChunk {
    pub buffer: Vec<u8>,
    pub data: BTreeMap<ElementId, ElementMetadata>,
}

/// A tiling engine that turns a raw model buffer into progress events.
///
/// `stream_from_buffer` reports its output exclusively through the three
/// channels; listeners must be registered before the call.
pub trait GeometryTiler: Send + Sync {
    /// Apply settings for the next run.
    fn configure(&self, settings: &TilerSettings);

    /// Fires zero or more times, one chunk per call.
    fn on_geometry_streamed(&self) -> &EventChannel<GeometryChunk>;

    /// Fires zero or more times with records to append in order.
    fn on_asset_streamed(&self) -> &EventChannel<Vec<AssetRecord>>;

    /// Fires once at the end with the global data blob.
    fn on_ifc_loaded(&self) -> &EventChannel<Vec<u8>>;

    /// Run the engine over `buffer`.
    fn stream_from_buffer<'a>(&'a self, buffer: &'a [u8]) -> BoxFuture<'a, Result<()>>;
}
