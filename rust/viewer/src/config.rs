// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration loaded from environment variables.

use crate::classification::ReconcileStrategy;
use crate::streaming::{StreamerConfig, DEFAULT_LARGE_FILE_THRESHOLD};
use ifc_stream_core::{TilerSettings, WasmLocator};
use std::time::Duration;

/// Default runtime location of the standard IFC loader.
pub const DEFAULT_LOADER_WASM_PATH: &str = "/wasm/";

/// Viewer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Files larger than this many bytes are loaded through the streaming path.
    pub large_file_threshold: u64,
    /// Overrides applied whenever the streamer is configured.
    pub streamer: StreamerConfig,
    /// Settings handed to the tiling engine.
    pub tiler: TilerSettings,
    /// Runtime locator for the standard loader.
    pub loader_wasm: WasmLocator,
    /// How the classification index follows registry changes.
    pub classification: ReconcileStrategy,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            streamer: StreamerConfig::default(),
            tiler: TilerSettings::default(),
            loader_wasm: WasmLocator::absolute(DEFAULT_LOADER_WASM_PATH),
            classification: ReconcileStrategy::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ViewerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            large_file_threshold: env_parse::<u64>("IFC_STREAM_LARGE_FILE_MB")
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.large_file_threshold),
            streamer: StreamerConfig {
                threshold: env_parse("IFC_STREAM_CULLER_THRESHOLD"),
                max_hidden_time: env_parse::<u64>("IFC_STREAM_MAX_HIDDEN_MS").map(Duration::from_millis),
                max_lost_time: env_parse::<u64>("IFC_STREAM_MAX_LOST_MS").map(Duration::from_millis),
                use_cache: env_parse("IFC_STREAM_USE_CACHE"),
            },
            tiler: TilerSettings {
                wasm: std::env::var("IFC_STREAM_TILER_WASM_PATH")
                    .map(WasmLocator::absolute)
                    .unwrap_or(defaults.tiler.wasm),
                min_geometry_size: env_parse("IFC_STREAM_MIN_GEOMETRY_SIZE")
                    .unwrap_or(defaults.tiler.min_geometry_size),
                min_assets_size: env_parse("IFC_STREAM_MIN_ASSETS_SIZE")
                    .unwrap_or(defaults.tiler.min_assets_size),
            },
            loader_wasm: std::env::var("IFC_STREAM_LOADER_WASM_PATH")
                .map(WasmLocator::absolute)
                .unwrap_or(defaults.loader_wasm),
            classification: std::env::var("IFC_STREAM_CLASSIFICATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.classification),
        }
    }
}
