// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Stream Core
//!
//! Turns a raw IFC buffer into a self-contained streaming descriptor that a
//! progressive-loading engine can consume.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──generate_tiles──▶ TileGenerationResult ──TileStore::persist──▶ HandleMap
//!                                   │                                       │
//!                                   └──────────────assemble◀────────────────┘
//!                                                     │
//!                                                     ▼
//!                                             StreamingDescriptor
//! ```
//!
//! - **Tile generation** ([`generate_tiles`]): drives a [`GeometryTiler`] and
//!   names every emitted chunk.
//! - **Tile storage** ([`TileStore`]): persists files, returns handles, releases them.
//! - **Assembly** ([`assemble`]): swaps logical names for handles.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_stream_core::{assemble, generate_tiles, MemoryTileStore, StepTiler, TileStore, TilerSettings};
//!
//! let tiler = StepTiler::new();
//! let store = MemoryTileStore::new();
//! let result = generate_tiles(&tiler, &TilerSettings::default(), &bytes, "house.ifc").await?;
//! let handles = store.persist(&result).await?;
//! let descriptor = assemble(result, &handles)?;
//! ```

pub mod assembler;
pub mod engine;
pub mod error;
pub mod events;
pub mod step_tiler;
pub mod store;
pub mod tiler;
pub mod types;

pub use assembler::assemble;
pub use engine::{GeometryChunk, GeometryTiler, TilerSettings, WasmLocator, DEFAULT_TILER_WASM_PATH};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventChannel, Subscription};
pub use step_tiler::{is_geometry_entity, RecordScanner, StepRecord, StepTiler};
pub use store::{ensure_unique_names, MemoryTileStore, TileStore};
pub use tiler::{generate_tiles, geometry_tile_name, global_tile_name, sanitize_model_name};
pub use types::{
    AssetRecord, ElementId, ElementMetadata, GeometryIndexEntry, HandleMap, StreamingDescriptor,
    TileFile, TileGenerationResult, TileHandle, TileName,
};
