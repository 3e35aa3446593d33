// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use ifc_stream_core::StreamingDescriptor;
use serde::{Deserialize, Serialize};

/// Result of tiling one uploaded model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesetResponse {
    /// Sanitized model name used in tile names.
    pub model_name: String,
    /// Descriptor to hand to the streaming engine. Holds tile URLs only.
    pub descriptor: StreamingDescriptor,
    /// Number of tile files, global data included.
    pub tile_count: usize,
    /// Number of indexed elements.
    pub element_count: usize,
    /// Number of asset records.
    pub asset_count: usize,
    /// Whether the upload is above the streaming threshold.
    pub large_file: bool,
}
