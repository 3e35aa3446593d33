// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming descriptor assembly.

use crate::error::{Error, Result};
use crate::types::{HandleMap, StreamingDescriptor, TileGenerationResult, TileHandle, TileName};

fn resolve(handles: &HandleMap, name: &TileName) -> Result<TileHandle> {
    handles
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnresolvedTile(name.to_string()))
}

/// Replace every logical tile name in `result` with its persisted handle.
///
/// A name without a handle means the pipeline is broken; this fails instead
/// of emitting a dangling reference. Asset records are carried over untouched.
pub fn assemble(result: TileGenerationResult, handles: &HandleMap) -> Result<StreamingDescriptor> {
    let global_data_file_id = resolve(handles, &result.global_data_file_name)?;

    let geometries = result
        .geometries_data
        .into_iter()
        .map(|(id, entry)| {
            let handle = resolve(handles, &entry.geometry_file)?;
            Ok((id, entry.map_file(handle)))
        })
        .collect::<Result<_>>()?;

    Ok(StreamingDescriptor {
        geometries,
        assets: result.assets_data,
        global_data_file_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TilerSettings;
    use crate::store::{MemoryTileStore, TileStore};
    use crate::tiler::generate_tiles;
    use crate::tiler::tests::{chunk, ScriptedTiler, Step};
    use serde_json::json;

    #[tokio::test]
    async fn assembled_descriptor_holds_only_handles() {
        let tiler = ScriptedTiler::new(vec![
            Step::Geometry(chunk(&[1, 2, 3], &["1", "2"])),
            Step::Geometry(chunk(&[4], &["3"])),
            Step::Assets(vec![json!({"id": "asset1"})]),
            Step::Global(vec![4, 5, 6]),
        ]);
        let store = MemoryTileStore::new();

        let result = generate_tiles(&tiler, &TilerSettings::default(), &[0; 4], "tower")
            .await
            .unwrap();
        let names: Vec<TileName> = result.files.iter().map(|f| f.name.clone()).collect();
        let handles = store.persist(&result).await.unwrap();
        let descriptor = assemble(result, &handles).unwrap();

        let held: Vec<&TileHandle> = handles.values().collect();
        for entry in descriptor.geometries.values() {
            assert!(held.contains(&&entry.geometry_file));
            assert!(names.iter().all(|n| n.as_str() != entry.geometry_file.as_str()));
        }
        assert!(held.contains(&&descriptor.global_data_file_id));
        assert!(descriptor
            .geometries
            .values()
            .all(|g| g.geometry_file != descriptor.global_data_file_id));
        assert_eq!(descriptor.assets, vec![json!({"id": "asset1"})]);
        assert_eq!(
            descriptor.geometries["1"].geometry_file,
            descriptor.geometries["2"].geometry_file
        );
        assert_ne!(
            descriptor.geometries["1"].geometry_file,
            descriptor.geometries["3"].geometry_file
        );
    }

    #[tokio::test]
    async fn model_without_geometry_still_resolves_global_data() {
        let tiler = ScriptedTiler::new(vec![Step::Global(vec![7])]);
        let store = MemoryTileStore::new();

        let result = generate_tiles(&tiler, &TilerSettings::default(), &[1], "empty")
            .await
            .unwrap();
        let handles = store.persist(&result).await.unwrap();
        let descriptor = assemble(result, &handles).unwrap();

        assert!(descriptor.geometries.is_empty());
        assert_eq!(
            store.fetch(&descriptor.global_data_file_id).as_deref(),
            Some(&[7u8][..])
        );
    }

    #[tokio::test]
    async fn missing_handle_fails_loudly() {
        let tiler = ScriptedTiler::new(vec![
            Step::Geometry(chunk(&[1], &["1"])),
            Step::Global(vec![2]),
        ]);
        let result = generate_tiles(&tiler, &TilerSettings::default(), &[1], "m")
            .await
            .unwrap();

        let mut handles = HandleMap::default();
        handles.insert(result.global_data_file_name.clone(), TileHandle("blob:g".into()));

        let err = assemble(result, &handles).unwrap_err();
        assert!(matches!(err, Error::UnresolvedTile(ref name) if name == "m-processed-geometries-1"));
        assert_eq!(err.kind(), crate::error::ErrorKind::AssemblyInvariant);
    }
}
