// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model lifecycle coordination.
//!
//! Every registry mutation goes through [`ModelLifecycle`]:
//!
//! ```text
//! begin_load ──▶ Loading ──complete_load──▶ Loaded ──remove──▶ Disposing ──▶ Removed
//!                   │                          ▲
//!                   └── ticket dropped ────────┘ (entry discarded)
//! ```
//!
//! Events are emitted after the registry lock is released, so listeners may
//! read the registry freely. A model-disposed listener never sees the
//! departed model in the registry.

use crate::error::{Error, Result};
use crate::model::LoadedModel;
use crate::registry::{PendingLoad, SharedRegistry};
use ifc_stream_core::{EventChannel, Subscription};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// A model finished loading and is in the registry.
#[derive(Debug, Clone)]
pub struct ModelLoaded {
    pub model: Arc<LoadedModel>,
}

/// A model left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDisposed {
    pub model_id: Uuid,
}

/// The last model left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllModelsRemoved;

/// UI-originated request to delete a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRequested {
    pub model_id: Uuid,
}

/// The classification index changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationsUpdated;

/// Channels of the lifecycle protocol.
#[derive(Clone)]
pub struct LifecycleEvents {
    pub model_loaded: EventChannel<ModelLoaded>,
    pub model_disposed: EventChannel<ModelDisposed>,
    pub all_models_removed: EventChannel<AllModelsRemoved>,
    pub delete_requested: EventChannel<DeleteRequested>,
    pub classifications_updated: EventChannel<ClassificationsUpdated>,
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self {
            model_loaded: EventChannel::new("model-loaded"),
            model_disposed: EventChannel::new("model-disposed"),
            all_models_removed: EventChannel::new("all-models-removed"),
            delete_requested: EventChannel::new("model-delete-requested"),
            classifications_updated: EventChannel::new("model-classifications-update"),
        }
    }
}

/// Releases everything a model holds outside the registry.
pub trait ModelDisposer: Send + Sync {
    fn dispose(&self, model: &LoadedModel) -> anyhow::Result<()>;
}

/// Marks a load in progress. Dropping it without
/// [`ModelLifecycle::complete_load`] discards the pending entry.
#[must_use = "dropping the ticket abandons the load"]
pub struct LoadTicket {
    id: Uuid,
    registry: SharedRegistry,
    finished: bool,
}

impl LoadTicket {
    /// Identifier of the pending entry; not the final model id.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if !self.finished && self.registry.write().end_pending(self.id) {
            tracing::debug!(ticket = %self.id, "Load abandoned");
        }
    }
}

impl std::fmt::Debug for LoadTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTicket")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Owner of the model registry and the lifecycle event channels.
pub struct ModelLifecycle {
    registry: SharedRegistry,
    events: LifecycleEvents,
    disposer: Arc<dyn ModelDisposer>,
}

impl ModelLifecycle {
    pub fn new(registry: SharedRegistry, disposer: Arc<dyn ModelDisposer>) -> Self {
        Self {
            registry,
            events: LifecycleEvents::default(),
            disposer,
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn events(&self) -> &LifecycleEvents {
        &self.events
    }

    /// Register a load in progress.
    pub fn begin_load(&self, name: &str) -> LoadTicket {
        let id = Uuid::new_v4();
        self.registry.write().begin_pending(PendingLoad {
            id,
            name: name.to_string(),
        });
        tracing::debug!(ticket = %id, name, "Load started");
        LoadTicket {
            id,
            registry: Arc::clone(&self.registry),
            finished: false,
        }
    }

    /// `Loading -> Loaded`.
    pub fn complete_load(&self, mut ticket: LoadTicket, model: LoadedModel) -> Arc<LoadedModel> {
        let model = Arc::new(model);
        {
            let mut registry = self.registry.write();
            registry.end_pending(ticket.id);
            registry.insert(Arc::clone(&model));
        }
        ticket.finished = true;

        tracing::info!(
            model = %model.id(),
            name = model.display_name(),
            streamed = model.is_streamed(),
            "Model loaded"
        );
        self.events.model_loaded.emit(&ModelLoaded {
            model: Arc::clone(&model),
        });
        model
    }

    /// `Loaded -> Disposing -> Removed`.
    ///
    /// Returns `Ok(false)` when the model is already gone. Fails for a load
    /// still in progress.
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let model = {
            let mut registry = self.registry.write();
            if registry.is_pending(id) {
                return Err(Error::LoadInProgress(id));
            }
            match registry.begin_dispose(id) {
                Some(model) => model,
                None => {
                    tracing::debug!(model = %id, "Model already removed");
                    return Ok(false);
                }
            }
        };

        self.dispose(&model);

        let became_empty = self.registry.write().end_dispose(id);
        tracing::info!(model = %id, name = model.display_name(), "Model removed");

        self.events.model_disposed.emit(&ModelDisposed { model_id: id });
        if became_empty {
            tracing::info!("All models removed");
            self.events.all_models_removed.emit(&AllModelsRemoved);
        }
        Ok(true)
    }

    /// Remove every loaded model. Pending loads are left to finish.
    pub fn remove_all(&self) -> usize {
        let ids = self.registry.read().ids();
        let mut removed = 0;
        for id in ids {
            match self.remove(id) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(model = %id, error = %e, "Skipping model during teardown"),
            }
        }
        removed
    }

    /// Serve `model-delete-requested` events for as long as the guard lives.
    pub fn bind_delete_requests(self: &Arc<Self>) -> Subscription {
        let lifecycle: Weak<Self> = Arc::downgrade(self);
        self.events.delete_requested.subscribe(move |request| {
            let Some(lifecycle) = lifecycle.upgrade() else {
                return Ok(());
            };
            lifecycle.remove(request.model_id)?;
            Ok(())
        })
    }

    fn dispose(&self, model: &LoadedModel) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.disposer.dispose(model)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(model = %model.id(), error = %e, "Model cleanup failed");
            }
            Err(_) => {
                tracing::error!(model = %model.id(), "Model cleanup panicked");
            }
        }
    }
}
