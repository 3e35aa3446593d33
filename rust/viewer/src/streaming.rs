// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming service: runs tile generation, storage and assembly for one
//! file, then hands the descriptor to the streaming engine.
//!
//! ```text
//! IfcFile ─read─▶ bytes ─generate_tiles─▶ result ─persist─▶ handles
//!                                            └────assemble◀────┘
//!                                                   │
//!                      Streamer::load(descriptor, coordinate = true)
//!                                                   │
//!                                              LoadedModel
//! ```

use crate::engine::{Components, Streamer, World};
use crate::error::{Error, Result};
use crate::file::IfcFile;
use crate::model::{LoadedModel, StreamResources, StreamedModel};
use ifc_stream_core::{
    assemble, generate_tiles, StreamingDescriptor, TileHandle, TileStore, TilerSettings,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Files strictly larger than this are streamed (15 MiB).
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 15 * 1024 * 1024;

const DEFAULT_CULLER_THRESHOLD: f32 = 10.0;
const DEFAULT_MAX_HIDDEN_TIME: Duration = Duration::from_millis(1000);
const DEFAULT_MAX_LOST_TIME: Duration = Duration::from_millis(3000);

/// Streaming engine overrides. Unset fields take the defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamerConfig {
    pub threshold: Option<f32>,
    pub max_hidden_time: Option<Duration>,
    pub max_lost_time: Option<Duration>,
    pub use_cache: Option<bool>,
}

/// Whether `file` should go through the streaming path.
pub fn is_large_file(file: &IfcFile, threshold: Option<u64>) -> bool {
    file.size() > threshold.unwrap_or(DEFAULT_LARGE_FILE_THRESHOLD)
}

/// Streaming orchestration bound to one world.
pub struct StreamingService {
    components: Components,
    world: World,
    store: Arc<dyn TileStore>,
    tiler_settings: TilerSettings,
    overrides: StreamerConfig,
    /// Held for a whole tiling run; the tiler's channels are shared.
    tiling: Mutex<()>,
}

impl StreamingService {
    pub fn new(components: Components, world: World, store: Arc<dyn TileStore>) -> Self {
        Self {
            components,
            world,
            store,
            tiler_settings: TilerSettings::default(),
            overrides: StreamerConfig::default(),
            tiling: Mutex::new(()),
        }
    }

    pub fn with_tiler_settings(mut self, settings: TilerSettings) -> Self {
        self.tiler_settings = settings;
        self
    }

    pub fn with_streamer_config(mut self, overrides: StreamerConfig) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    /// Apply culling and cache settings to the streaming engine.
    ///
    /// Safe to call repeatedly; the last call wins.
    pub fn configure(&self, config: Option<&StreamerConfig>) -> Result<Arc<dyn Streamer>> {
        let streamer = self.components.streamer()?;
        let config = config.cloned().unwrap_or_default();

        let threshold = config.threshold.unwrap_or(DEFAULT_CULLER_THRESHOLD);
        let max_hidden_time = config.max_hidden_time.unwrap_or(DEFAULT_MAX_HIDDEN_TIME);
        let max_lost_time = config.max_lost_time.unwrap_or(DEFAULT_MAX_LOST_TIME);
        let use_cache = config.use_cache.unwrap_or(true);

        streamer.set_use_cache(use_cache);
        match streamer.culler() {
            Some(culler) => culler.set_thresholds(threshold, max_hidden_time, max_lost_time),
            None => tracing::debug!("Streamer has no culler, skipping thresholds"),
        }

        tracing::debug!(
            threshold,
            max_hidden_ms = max_hidden_time.as_millis() as u64,
            max_lost_ms = max_lost_time.as_millis() as u64,
            use_cache,
            "Configured streamer"
        );
        Ok(streamer)
    }

    /// Tile, persist and assemble `file`, then stream it into the scene.
    ///
    /// Any stage failing aborts the load. Handles persisted before the
    /// failure are released. Tiling runs one file at a time; persisting and
    /// streaming overlap freely.
    pub async fn load_with_streaming(&self, file: &IfcFile) -> Result<LoadedModel> {
        let tiler = self.components.tiler()?;
        let buffer = file.read().await?;

        let result = {
            let _tiling = self.tiling.lock().await;
            generate_tiles(tiler.as_ref(), &self.tiler_settings, &buffer, file.name()).await?
        };
        drop(buffer);

        let handles = self.store.persist(&result).await?;
        let persisted: Vec<TileHandle> = handles.values().cloned().collect();

        let descriptor = match assemble(result, &handles) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::error!(file = file.name(), error = %e, "Streaming descriptor assembly failed");
                self.store.release(&persisted);
                return Err(e.into());
            }
        };

        match self.load_streaming_data(descriptor, file.name()).await {
            Ok(model) => {
                if let Some(streamed) = model.streamed() {
                    streamed.set_tile_handles(persisted);
                }
                Ok(model)
            }
            Err(e) => {
                tracing::warn!(file = file.name(), error = %e, "Streaming load failed, releasing tiles");
                self.store.release(&persisted);
                Err(e)
            }
        }
    }

    /// Hand an assembled descriptor to the streaming engine.
    pub async fn load_streaming_data(
        &self,
        descriptor: StreamingDescriptor,
        display_name: &str,
    ) -> Result<LoadedModel> {
        let streamer = self.configure(Some(&self.overrides))?;
        let descriptor = Arc::new(descriptor);

        let object = streamer.load(&descriptor, true, None).await?;

        let on_sleep = Arc::clone(&streamer);
        let culling_update = self.world.camera.on_sleep().subscribe(move |_| {
            if let Some(culler) = on_sleep.culler() {
                culler.request_update();
            }
            Ok(())
        });

        tracing::info!(
            model = %object.id,
            name = display_name,
            elements = descriptor.geometries.len(),
            assets = descriptor.assets.len(),
            "Streamed model loaded"
        );

        let resources = StreamResources {
            culling_update: Some(culling_update),
            tile_handles: Vec::new(),
        };
        Ok(LoadedModel::from_streamed(
            display_name,
            StreamedModel::new(object, descriptor, resources),
        ))
    }

    /// Hydrate element properties of a streamed model on demand.
    pub async fn load_model_properties(&self, model: &LoadedModel) -> Result<()> {
        let descriptor = model
            .streaming_descriptor()
            .ok_or(Error::StreamingSettingsMissing)?;
        let streamer = self.components.streamer()?;
        streamer.load_properties(model.scene_object(), descriptor).await
    }

    /// Remove the camera listener registered for `model`. No-op otherwise.
    pub fn cleanup_model(&self, model: &LoadedModel) {
        let Some(streamed) = model.streamed() else {
            return;
        };
        if let Some(subscription) = streamed.take_culling_update() {
            subscription.unsubscribe();
            tracing::debug!(model = %model.id(), "Removed culling update listener");
        }
    }

    /// Release the tiles backing `model`.
    pub fn release_tiles(&self, model: &LoadedModel) {
        let Some(streamed) = model.streamed() else {
            return;
        };
        let handles = streamed.take_tile_handles();
        if !handles.is_empty() {
            tracing::debug!(model = %model.id(), count = handles.len(), "Releasing tiles");
            self.store.release(&handles);
        }
    }
}
