// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk-backed tile store using cacache.
//!
//! Each tile is written under `sha256(batch || 0x00 || name || 0x00 || payload)`
//! where `batch` is a fresh id per `persist` call, so two uploads of the same
//! model never share entries. A tile's handle is the URL it is served from.

use crate::error::ApiError;
use futures_util::future::BoxFuture;
use ifc_stream_core::{
    ensure_unique_names, Error as TilingError, HandleMap, TileGenerationResult, TileHandle, TileStore,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Route prefix tiles are served under.
pub const TILE_ROUTE: &str = "/api/v1/tiles";

/// Tile store on the local disk.
pub struct DiskTileStore {
    cache_dir: PathBuf,
    public_url: String,
}

impl DiskTileStore {
    /// Create a store in the specified directory.
    pub async fn new(cache_dir: &str, public_url: &str) -> Self {
        let path = PathBuf::from(cache_dir);

        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "Failed to create tile directory"
            );
        }

        Self {
            cache_dir: path,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Key of one tile file written in `batch`.
    pub fn generate_key(batch: &Uuid, name: &str, payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(batch.as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(payload);
        hex::encode(hasher.finalize())
    }

    /// Handle under which `key` is served.
    pub fn handle_for(&self, key: &str) -> TileHandle {
        TileHandle(format!("{}{}/{}", self.public_url, TILE_ROUTE, key))
    }

    /// Key behind a handle this store issued.
    pub fn key_of<'h>(&self, handle: &'h TileHandle) -> Option<&'h str> {
        handle
            .as_str()
            .strip_prefix(self.public_url.as_str())?
            .strip_prefix(TILE_ROUTE)?
            .strip_prefix('/')
            .filter(|key| validate_key(key).is_ok())
    }

    /// Read a tile's bytes.
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError> {
        validate_key(key)?;
        match cacache::read(&self.cache_dir, key).await {
            Ok(data) => Ok(Some(data)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(ApiError::Storage(e.to_string())),
        }
    }
}

impl TileStore for DiskTileStore {
    fn persist<'a>(&'a self, result: &'a TileGenerationResult) -> BoxFuture<'a, ifc_stream_core::Result<HandleMap>> {
        Box::pin(async move {
            ensure_unique_names(result)?;

            let batch = Uuid::new_v4();
            let mut handles = HandleMap::default();
            for file in &result.files {
                let key = Self::generate_key(&batch, file.name.as_str(), &file.payload);
                if let Err(e) = cacache::write(&self.cache_dir, &key, &file.payload).await {
                    tracing::error!(file = %file.name, written = handles.len(), error = %e, "Tile write failed");
                    let written: Vec<TileHandle> = handles.into_values().collect();
                    self.release(&written);
                    return Err(TilingError::Store(e.to_string()));
                }
                handles.insert(file.name.clone(), self.handle_for(&key));
            }

            tracing::debug!(files = handles.len(), bytes = result.total_bytes(), "Persisted tiles to disk");
            Ok(handles)
        })
    }

    fn release(&self, handles: &[TileHandle]) {
        for handle in handles {
            let Some(key) = self.key_of(handle) else {
                tracing::warn!(handle = %handle, "Tile handle was not issued by this store");
                continue;
            };
            if let Err(e) = cacache::remove_sync(&self.cache_dir, key) {
                tracing::warn!(handle = %handle, error = %e, "Failed to release tile");
            }
        }
    }
}

/// Reject keys that could escape the tile directory or are not hex digests.
pub fn validate_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::InvalidKey("key cannot be empty".into()));
    }
    if key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(ApiError::InvalidKey(
            "contains path separators or parent references".into(),
        ));
    }
    if !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::InvalidKey("contains disallowed characters".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_stream_core::{TileFile, TileName};
    use std::collections::BTreeMap;

    async fn store() -> DiskTileStore {
        let dir = std::env::temp_dir().join(format!("ifc-stream-tiles-{}", Uuid::new_v4()));
        DiskTileStore::new(dir.to_str().unwrap(), "http://tiles.test/").await
    }

    fn result(files: &[(&str, &[u8])]) -> TileGenerationResult {
        TileGenerationResult {
            files: files
                .iter()
                .map(|(name, payload)| TileFile {
                    name: TileName(name.to_string()),
                    payload: payload.to_vec(),
                })
                .collect(),
            geometries_data: BTreeMap::new(),
            assets_data: Vec::new(),
            global_data_file_name: TileName(files[0].0.to_string()),
        }
    }

    #[test]
    fn key_depends_on_batch_name_and_payload() {
        let batch = Uuid::new_v4();
        let a = DiskTileStore::generate_key(&batch, "m-processed-global", b"abc");
        assert_eq!(a.len(), 64);
        assert_eq!(a, DiskTileStore::generate_key(&batch, "m-processed-global", b"abc"));
        assert_ne!(a, DiskTileStore::generate_key(&Uuid::new_v4(), "m-processed-global", b"abc"));
        assert_ne!(a, DiskTileStore::generate_key(&batch, "m-processed-geometries-1", b"abc"));
        assert_ne!(a, DiskTileStore::generate_key(&batch, "m-processed-global", b"abd"));
        // The separator keeps name/payload boundaries distinct.
        assert_ne!(
            DiskTileStore::generate_key(&batch, "ab", b"c"),
            DiskTileStore::generate_key(&batch, "a", b"bc")
        );
    }

    #[tokio::test]
    async fn identical_uploads_are_released_independently() {
        let store = store().await;
        let result = result(&[("m-processed-global", b"global")]);

        let first: Vec<TileHandle> = store.persist(&result).await.unwrap().into_values().collect();
        let second: Vec<TileHandle> = store.persist(&result).await.unwrap().into_values().collect();
        assert_ne!(first, second);

        store.release(&first);
        let first_key = store.key_of(&first[0]).unwrap();
        let second_key = store.key_of(&second[0]).unwrap();
        assert_eq!(store.get_bytes(first_key).await.unwrap(), None);
        assert_eq!(store.get_bytes(second_key).await.unwrap().as_deref(), Some(&b"global"[..]));

        tokio::fs::remove_dir_all(store.cache_dir()).await.unwrap();
    }

    #[tokio::test]
    async fn unwritable_directory_is_a_storage_error() {
        let path = std::env::temp_dir().join(format!("ifc-stream-blocked-{}", Uuid::new_v4()));
        tokio::fs::write(&path, b"not a directory").await.unwrap();
        let store = DiskTileStore::new(path.to_str().unwrap(), "http://tiles.test").await;
        let result = result(&[("m-processed-global", b"global"), ("m-processed-geometries-1", b"geo")]);

        let err = store.persist(&result).await.unwrap_err();
        assert_eq!(err.kind(), ifc_stream_core::ErrorKind::Storage);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn persist_then_release() {
        let store = store().await;
        let result = result(&[("m-processed-global", b"global"), ("m-processed-geometries-1", b"geo")]);

        let handles = store.persist(&result).await.unwrap();
        assert_eq!(handles.len(), 2);
        let global = &handles[&TileName("m-processed-global".into())];
        assert!(global.as_str().starts_with("http://tiles.test/api/v1/tiles/"));

        let key = store.key_of(global).unwrap().to_string();
        assert_eq!(store.get_bytes(&key).await.unwrap().as_deref(), Some(&b"global"[..]));

        let all: Vec<TileHandle> = handles.values().cloned().collect();
        store.release(&all);
        assert_eq!(store.get_bytes(&key).await.unwrap(), None);

        tokio::fs::remove_dir_all(store.cache_dir()).await.unwrap();
    }

    #[tokio::test]
    async fn foreign_handles_are_skipped() {
        let store = store().await;
        let result = result(&[("m-processed-global", b"global")]);
        let handles = store.persist(&result).await.unwrap();
        let ours = handles.values().next().unwrap().clone();

        store.release(&[TileHandle("blob:elsewhere".into()), ours.clone()]);
        let key = store.key_of(&ours).unwrap();
        assert_eq!(store.get_bytes(key).await.unwrap(), None);

        tokio::fs::remove_dir_all(store.cache_dir()).await.unwrap();
    }

    #[test]
    fn keys_must_be_hex() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("xyz").is_err());
        assert!(validate_key("deadbeef").is_ok());
    }
}
