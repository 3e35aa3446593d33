// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Business logic services.

pub mod tile_store;
pub mod tileset;

pub use tile_store::DiskTileStore;
pub use tileset::build_tileset;
