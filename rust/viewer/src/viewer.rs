// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer composition root: wires the streaming service, the lifecycle
//! coordinator and the derived views to one world.

use crate::classification::ClassificationTree;
use crate::clipper::Clipper;
use crate::config::ViewerConfig;
use crate::engine::{Components, Scene, World};
use crate::error::{Error, Result};
use crate::file::IfcFile;
use crate::lifecycle::{ModelDisposer, ModelLifecycle};
use crate::model::LoadedModel;
use crate::model_list::ModelList;
use crate::picking::PickTargets;
use crate::registry::ModelRegistry;
use crate::streaming::{is_large_file, StreamingService};
use ifc_stream_core::{Subscription, TileStore};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Releases a model's streaming listener, scene object and tiles.
pub struct SceneDisposer {
    streaming: Arc<StreamingService>,
    scene: Arc<dyn Scene>,
}

impl SceneDisposer {
    pub fn new(streaming: Arc<StreamingService>, scene: Arc<dyn Scene>) -> Self {
        Self { streaming, scene }
    }
}

impl ModelDisposer for SceneDisposer {
    fn dispose(&self, model: &LoadedModel) -> anyhow::Result<()> {
        self.streaming.cleanup_model(model);
        self.scene.remove(model.scene_object());
        self.scene.dispose(model.scene_object());
        self.streaming.release_tiles(model);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StatusState {
    in_flight: usize,
    last_error: Option<String>,
}

/// Loading flag and last failure shown next to the import control.
#[derive(Debug, Clone, Default)]
pub struct ImportStatus {
    state: Arc<Mutex<StatusState>>,
}

impl ImportStatus {
    /// True while any import is running.
    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    fn begin(&self) -> ImportGuard {
        let mut state = self.state.lock();
        // A failure stays visible until a fresh batch of imports starts.
        if state.in_flight == 0 {
            state.last_error = None;
        }
        state.in_flight += 1;
        ImportGuard {
            state: Arc::clone(&self.state),
        }
    }
}

/// Ends one import on every exit path.
struct ImportGuard {
    state: Arc<Mutex<StatusState>>,
}

impl ImportGuard {
    fn fail(&self, message: String) {
        self.state.lock().last_error = Some(message);
    }
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

pub struct Viewer {
    config: ViewerConfig,
    components: Components,
    world: World,
    streaming: Arc<StreamingService>,
    lifecycle: Arc<ModelLifecycle>,
    classification: ClassificationTree,
    picking: PickTargets,
    model_list: ModelList,
    status: ImportStatus,
    clipper: Option<Clipper>,
    _delete_binding: Subscription,
}

impl Viewer {
    pub fn new(config: ViewerConfig, components: Components, world: World, store: Arc<dyn TileStore>) -> Self {
        let streaming = Arc::new(
            StreamingService::new(components.clone(), world.clone(), store)
                .with_tiler_settings(config.tiler.clone())
                .with_streamer_config(config.streamer.clone()),
        );
        let disposer = Arc::new(SceneDisposer::new(Arc::clone(&streaming), Arc::clone(&world.scene)));
        let lifecycle = Arc::new(ModelLifecycle::new(ModelRegistry::shared(), disposer));

        let classification = ClassificationTree::new(&lifecycle, config.classification);
        let picking = PickTargets::new(&lifecycle);
        let model_list = ModelList::new(&lifecycle);
        let delete_binding = lifecycle.bind_delete_requests();
        let clipper = Clipper::from_components(&components).ok();

        tracing::info!(
            large_file_threshold = config.large_file_threshold,
            classification = ?config.classification,
            "Viewer ready"
        );

        Self {
            config,
            components,
            world,
            streaming,
            lifecycle,
            classification,
            picking,
            model_list,
            status: ImportStatus::default(),
            clipper,
            _delete_binding: delete_binding,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn streaming(&self) -> &StreamingService {
        &self.streaming
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycle> {
        &self.lifecycle
    }

    pub fn classification(&self) -> &ClassificationTree {
        &self.classification
    }

    pub fn picking(&self) -> &PickTargets {
        &self.picking
    }

    pub fn model_list(&self) -> &ModelList {
        &self.model_list
    }

    pub fn status(&self) -> &ImportStatus {
        &self.status
    }

    /// Section planes; fails when no clipping engine is registered.
    pub fn clipper(&self) -> Result<&Clipper> {
        self.clipper.as_ref().ok_or(Error::ClipperUnavailable)
    }

    /// Import a file, streaming it when it is large.
    pub async fn import(&self, file: &IfcFile) -> Result<Arc<LoadedModel>> {
        let guard = self.status.begin();
        let streamed = is_large_file(file, Some(self.config.large_file_threshold));
        tracing::info!(file = file.name(), size = file.size(), streamed, "Importing model");

        let outcome = if streamed {
            self.load_streamed(file).await
        } else {
            self.load_ifc(file).await
        };

        if let Err(e) = &outcome {
            tracing::error!(file = file.name(), error = %e, "Import failed");
            guard.fail(e.to_string());
        }
        outcome
    }

    /// Load a file whole through the standard loader.
    pub async fn load_ifc(&self, file: &IfcFile) -> Result<Arc<LoadedModel>> {
        let ticket = self.lifecycle.begin_load(file.name());
        let loader = self.components.ifc_loader()?;
        loader.configure(&self.config.loader_wasm);

        let buffer = file.read().await?;
        let object = loader.load(&buffer, file.name()).await?;
        self.world.scene.add(&object);

        Ok(self
            .lifecycle
            .complete_load(ticket, LoadedModel::standard(file.name(), object)))
    }

    /// Load a file through the tiling and streaming pipeline.
    pub async fn load_streamed(&self, file: &IfcFile) -> Result<Arc<LoadedModel>> {
        let ticket = self.lifecycle.begin_load(file.name());
        let model = self.streaming.load_with_streaming(file).await?;
        Ok(self.lifecycle.complete_load(ticket, model))
    }

    /// Hydrate properties of a loaded streamed model.
    pub async fn load_model_properties(&self, model_id: Uuid) -> Result<bool> {
        let model = self.lifecycle.registry().read().get(model_id).cloned();
        match model {
            Some(model) => {
                self.streaming.load_model_properties(&model).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_model(&self, model_id: Uuid) -> Result<bool> {
        self.lifecycle.remove(model_id)
    }

    /// Dispose every model.
    pub fn teardown(&self) {
        let removed = self.lifecycle.remove_all();
        tracing::info!(removed, "Viewer torn down");
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.teardown();
    }
}
