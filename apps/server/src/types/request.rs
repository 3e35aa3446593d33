// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request types for the API.

use ifc_stream_core::TileHandle;
use serde::{Deserialize, Serialize};

/// Body of `DELETE /api/v1/tiles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub handles: Vec<TileHandle>,
}
