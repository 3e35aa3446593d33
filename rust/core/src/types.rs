// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model shared by the tiling pipeline stages.
//!
//! Tile references come in two flavours: a [`TileName`] is the logical name
//! the generator gives a file, a [`TileHandle`] is what the tile store hands
//! back once the file is persisted. Index entries are generic over the
//! reference type, so a [`StreamingDescriptor`] can only ever hold handles.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Element identifier from the source model (the STEP express id, as a string key).
pub type ElementId = String;

/// Free-form per-element metadata reported by the tiling engine.
pub type ElementMetadata = Map<String, Value>;

/// Opaque per-asset record. Order of a record list is discovery order.
pub type AssetRecord = Value;

/// Mapping from logical tile name to persisted handle.
pub type HandleMap = FxHashMap<TileName, TileHandle>;

/// Logical tile file name, internal to the generator and the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileName(pub String);

impl TileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TileName {
    fn from(s: &str) -> Self {
        TileName(s.to_string())
    }
}

/// Dereferenceable reference to persisted tile data (a blob or HTTP URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileHandle(pub String);

impl TileHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One generated tile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFile {
    pub name: TileName,
    pub payload: Vec<u8>,
}

/// Per-element geometry index entry.
///
/// `geometry_file` points at the tile holding the element's geometry:
/// a [`TileName`] straight out of the generator, a [`TileHandle`] after assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryIndexEntry<F = TileName> {
    #[serde(rename = "geometryFile")]
    pub geometry_file: F,
    #[serde(flatten)]
    pub metadata: ElementMetadata,
}

impl<F> GeometryIndexEntry<F> {
    /// Same metadata, different file reference.
    pub fn map_file<G>(self, geometry_file: G) -> GeometryIndexEntry<G> {
        GeometryIndexEntry {
            geometry_file,
            metadata: self.metadata,
        }
    }

    /// String metadata field, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Output of one successful tiling run.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGenerationResult {
    pub files: Vec<TileFile>,
    pub geometries_data: BTreeMap<ElementId, GeometryIndexEntry<TileName>>,
    pub assets_data: Vec<AssetRecord>,
    pub global_data_file_name: TileName,
}

impl TileGenerationResult {
    /// Number of geometry tiles (every file except the global data file).
    pub fn geometry_tile_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.name != self.global_data_file_name)
            .count()
    }

    /// Total payload size in bytes.
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.payload.len()).sum()
    }
}

/// Self-contained input for the streaming engine. Holds handles only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingDescriptor {
    pub geometries: BTreeMap<ElementId, GeometryIndexEntry<TileHandle>>,
    pub assets: Vec<AssetRecord>,
    pub global_data_file_id: TileHandle,
}

impl StreamingDescriptor {
    /// Every distinct handle the descriptor references, global data first.
    pub fn handles(&self) -> Vec<TileHandle> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut handles = Vec::new();
        let all = std::iter::once(&self.global_data_file_id)
            .chain(self.geometries.values().map(|g| &g.geometry_file));
        for handle in all {
            if seen.insert(handle) {
                handles.push(handle.clone());
            }
        }
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_serializes_with_engine_field_names() {
        let mut geometries = BTreeMap::new();
        let mut metadata = ElementMetadata::new();
        metadata.insert("entity".into(), json!("IFCWALL"));
        geometries.insert(
            "12".to_string(),
            GeometryIndexEntry {
                geometry_file: TileHandle("blob:a".into()),
                metadata,
            },
        );
        let descriptor = StreamingDescriptor {
            geometries,
            assets: vec![json!({"id": "asset1"})],
            global_data_file_id: TileHandle("blob:g".into()),
        };

        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["globalDataFileId"], json!("blob:g"));
        assert_eq!(value["geometries"]["12"]["geometryFile"], json!("blob:a"));
        assert_eq!(value["geometries"]["12"]["entity"], json!("IFCWALL"));
        assert_eq!(value["assets"][0]["id"], json!("asset1"));
    }

    #[test]
    fn descriptor_handles_are_deduplicated() {
        let entry = |h: &str| GeometryIndexEntry {
            geometry_file: TileHandle(h.into()),
            metadata: ElementMetadata::new(),
        };
        let mut geometries = BTreeMap::new();
        geometries.insert("1".to_string(), entry("blob:1"));
        geometries.insert("2".to_string(), entry("blob:1"));
        geometries.insert("3".to_string(), entry("blob:2"));
        let descriptor = StreamingDescriptor {
            geometries,
            assets: Vec::new(),
            global_data_file_id: TileHandle("blob:g".into()),
        };

        let handles = descriptor.handles();
        assert_eq!(handles.len(), 3);
        assert_eq!(handles[0], TileHandle("blob:g".into()));
    }
}
