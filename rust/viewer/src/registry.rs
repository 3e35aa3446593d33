// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The registry of models attached to the scene.
//!
//! There is exactly one registry per viewer, shared behind a lock. Only
//! [`crate::lifecycle::ModelLifecycle`] mutates it; everything else reads.

use crate::model::{LoadedModel, ModelState};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Shared handle to the registry.
pub type SharedRegistry = Arc<RwLock<ModelRegistry>>;

/// A load that has started but not completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLoad {
    pub id: Uuid,
    pub name: String,
}

/// Loaded models in insertion order, plus in-flight loads and disposals.
#[derive(Debug)]
pub struct ModelRegistry {
    models: Vec<Arc<LoadedModel>>,
    pending: Vec<PendingLoad>,
    disposing: FxHashSet<Uuid>,
    /// `all-models-removed` already emitted for the current empty state.
    empty_announced: bool,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            pending: Vec::new(),
            disposing: FxHashSet::default(),
            empty_announced: true,
        }
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Arc<LoadedModel>> {
        self.models.iter().find(|m| m.id() == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<LoadedModel>> {
        self.models.iter()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.models.iter().map(|m| m.id()).collect()
    }

    pub fn pending(&self) -> &[PendingLoad] {
        &self.pending
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    /// Current state of `id`.
    pub fn state(&self, id: Uuid) -> ModelState {
        if self.is_pending(id) {
            ModelState::Loading
        } else if self.disposing.contains(&id) {
            ModelState::Disposing
        } else if self.contains(id) {
            ModelState::Loaded
        } else {
            ModelState::Removed
        }
    }

    /// Display names keyed by id, for loaded and pending entries.
    pub fn names(&self) -> FxHashMap<Uuid, String> {
        self.models
            .iter()
            .map(|m| (m.id(), m.display_name().to_string()))
            .chain(self.pending.iter().map(|p| (p.id, p.name.clone())))
            .collect()
    }

    pub(crate) fn begin_pending(&mut self, pending: PendingLoad) {
        self.pending.push(pending);
    }

    pub(crate) fn end_pending(&mut self, id: Uuid) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        before != self.pending.len()
    }

    /// Add a loaded model. A model with the same id is replaced in place.
    pub(crate) fn insert(&mut self, model: Arc<LoadedModel>) {
        self.empty_announced = false;
        match self.models.iter_mut().find(|m| m.id() == model.id()) {
            Some(slot) => {
                tracing::warn!(model = %model.id(), "Model already registered, replacing it");
                *slot = model;
            }
            None => self.models.push(model),
        }
    }

    /// Detach a model and mark it as disposing.
    pub(crate) fn begin_dispose(&mut self, id: Uuid) -> Option<Arc<LoadedModel>> {
        let index = self.models.iter().position(|m| m.id() == id)?;
        let model = self.models.remove(index);
        self.disposing.insert(id);
        Some(model)
    }

    /// Finish a disposal. Returns `true` when the registry just became empty
    /// and that has not been announced yet.
    pub(crate) fn end_dispose(&mut self, id: Uuid) -> bool {
        self.disposing.remove(&id);
        if self.models.is_empty() && self.disposing.is_empty() && !self.empty_announced {
            self.empty_announced = true;
            return true;
        }
        false
    }

    pub fn is_disposing(&self, id: Uuid) -> bool {
        self.disposing.contains(&id)
    }
}
