// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The user-facing list of models.

use crate::error::{Error, Result};
use crate::lifecycle::{DeleteRequested, ModelLifecycle};
use crate::model::ModelState;
use crate::registry::SharedRegistry;
use ifc_stream_core::{EventChannel, Subscription};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// One row of the model list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRow {
    pub id: Uuid,
    pub display_name: String,
    pub state: ModelState,
    pub streamed: bool,
    /// False while the model is still loading.
    pub deletable: bool,
}

pub struct ModelList {
    registry: SharedRegistry,
    delete_requested: EventChannel<DeleteRequested>,
    revision: Arc<AtomicU64>,
    last_error: Mutex<Option<String>>,
    _subscriptions: Vec<Subscription>,
}

impl ModelList {
    pub fn new(lifecycle: &ModelLifecycle) -> Self {
        let events = lifecycle.events();
        let revision = Arc::new(AtomicU64::new(0));

        let bump = |revision: &Arc<AtomicU64>| {
            let revision = Arc::clone(revision);
            move || {
                revision.fetch_add(1, Ordering::Relaxed);
            }
        };
        let on_loaded = {
            let bump = bump(&revision);
            events.model_loaded.subscribe(move |_| {
                bump();
                Ok(())
            })
        };
        let on_disposed = {
            let bump = bump(&revision);
            events.model_disposed.subscribe(move |_| {
                bump();
                Ok(())
            })
        };

        Self {
            registry: Arc::clone(lifecycle.registry()),
            delete_requested: events.delete_requested.clone(),
            revision,
            last_error: Mutex::new(None),
            _subscriptions: vec![on_loaded, on_disposed],
        }
    }

    /// Loaded models in insertion order, then pending loads.
    pub fn rows(&self) -> Vec<ModelRow> {
        let registry = self.registry.read();
        let loaded = registry.models().map(|model| ModelRow {
            id: model.id(),
            display_name: model.display_name().to_string(),
            state: registry.state(model.id()),
            streamed: model.is_streamed(),
            deletable: true,
        });
        let pending = registry.pending().iter().map(|p| ModelRow {
            id: p.id,
            display_name: p.name.clone(),
            state: ModelState::Loading,
            streamed: false,
            deletable: false,
        });
        loaded.chain(pending).collect()
    }

    /// Incremented whenever the list changes.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }

    /// Ask for a model to be deleted.
    ///
    /// Returns `Ok(false)` when the model is not in the list.
    pub fn request_delete(&self, model_id: Uuid) -> Result<bool> {
        let name = {
            let registry = self.registry.read();
            if registry.is_pending(model_id) {
                drop(registry);
                return self.fail(Error::LoadInProgress(model_id));
            }
            match registry.get(model_id) {
                Some(model) => model.display_name().to_string(),
                None => return Ok(false),
            }
        };

        tracing::debug!(model = %model_id, name = %name, "Delete requested");
        let failures = self.delete_requested.emit(&DeleteRequested { model_id });
        if failures > 0 || self.registry.read().contains(model_id) {
            return self.fail(Error::DeleteFailed(model_id));
        }

        *self.last_error.lock() = None;
        Ok(true)
    }

    /// Message shown for the last failed deletion.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn fail(&self, error: Error) -> Result<bool> {
        tracing::warn!(error = %error, "Model deletion failed");
        *self.last_error.lock() = Some(error.to_string());
        Err(error)
    }
}
