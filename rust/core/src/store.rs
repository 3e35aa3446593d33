// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tile persistence.

use crate::error::{Error, Result};
use crate::types::{HandleMap, TileGenerationResult, TileHandle};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Persists tile files and hands out dereferenceable handles.
pub trait TileStore: Send + Sync {
    /// Store every file of `result`, one handle per file.
    ///
    /// Handles are distinct for distinct file names while the files are held.
    fn persist<'a>(&'a self, result: &'a TileGenerationResult) -> BoxFuture<'a, Result<HandleMap>>;

    /// Best-effort release. Individual failures are logged, never returned.
    fn release(&self, handles: &[TileHandle]);
}

/// Reject results whose file names are not unique.
pub fn ensure_unique_names(result: &TileGenerationResult) -> Result<()> {
    let mut seen = FxHashSet::default();
    for file in &result.files {
        if !seen.insert(&file.name) {
            return Err(Error::DuplicateTile(file.name.to_string()));
        }
    }
    Ok(())
}

/// In-process blob store issuing `blob:<uuid>` handles.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    blobs: Mutex<FxHashMap<TileHandle, Arc<[u8]>>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dereference a handle.
    pub fn fetch(&self, handle: &TileHandle) -> Option<Arc<[u8]>> {
        self.blobs.lock().get(handle).cloned()
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }

    fn allocate_handle() -> TileHandle {
        TileHandle(format!("blob:{}", Uuid::new_v4()))
    }
}

impl TileStore for MemoryTileStore {
    fn persist<'a>(&'a self, result: &'a TileGenerationResult) -> BoxFuture<'a, Result<HandleMap>> {
        Box::pin(async move {
            ensure_unique_names(result)?;

            let mut handles = HandleMap::default();
            let mut blobs = self.blobs.lock();
            for file in &result.files {
                let handle = Self::allocate_handle();
                blobs.insert(handle.clone(), Arc::from(file.payload.as_slice()));
                handles.insert(file.name.clone(), handle);
            }
            drop(blobs);

            tracing::debug!(files = handles.len(), "Persisted tiles in memory");
            Ok(handles)
        })
    }

    fn release(&self, handles: &[TileHandle]) {
        let mut blobs = self.blobs.lock();
        for handle in handles {
            if blobs.remove(handle).is_none() {
                tracing::warn!(handle = %handle, "Tile handle was not held by the store");
            }
        }
    }
}
