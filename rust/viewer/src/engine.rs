// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary with the rendering side: streaming engine, standard loader,
//! scene graph, camera and clipping.
//!
//! Everything here is implemented by the host application. The viewer only
//! calls through these traits and never touches the scene graph except via
//! [`Scene`] and the engines' own load primitives.

use crate::error::{Error, Result};
use ifc_stream_core::{ElementId, EventChannel, GeometryTiler, StreamingDescriptor, WasmLocator};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Column-major 4x4 transform applied to a streamed model on load.
pub type Transform = [f64; 16];

/// Identifier of a pickable mesh inside the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub u64);

/// Classification facts about one model element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub id: ElementId,
    /// Upper-case entity class, e.g. `IFCWALL`.
    pub entity: String,
    pub predefined_type: Option<String>,
}

/// An object the engine placed in the scene.
///
/// The scene graph owns the object; the viewer keeps this description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: Uuid,
    pub meshes: Vec<MeshId>,
    pub elements: Vec<ElementInfo>,
}

/// Visibility culler state, shared between the streaming engine and the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct CullerState {
    pub threshold: f32,
    pub max_hidden_time: Duration,
    pub max_lost_time: Duration,
    pub needs_update: bool,
}

impl Default for CullerState {
    fn default() -> Self {
        Self {
            threshold: 10.0,
            max_hidden_time: Duration::from_millis(1000),
            max_lost_time: Duration::from_millis(3000),
            needs_update: false,
        }
    }
}

/// The streaming engine's visibility culler.
#[derive(Debug, Default)]
pub struct Culler {
    state: Mutex<CullerState>,
}

impl Culler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CullerState {
        self.state.lock().clone()
    }

    pub fn set_thresholds(&self, threshold: f32, max_hidden_time: Duration, max_lost_time: Duration) {
        let mut state = self.state.lock();
        state.threshold = threshold;
        state.max_hidden_time = max_hidden_time;
        state.max_lost_time = max_lost_time;
    }

    /// Ask the engine to recompute visibility on its next frame.
    pub fn request_update(&self) {
        self.state.lock().needs_update = true;
    }

    /// Consume a pending update request.
    pub fn take_update(&self) -> bool {
        std::mem::replace(&mut self.state.lock().needs_update, false)
    }
}

/// Progressive geometry loader.
pub trait Streamer: Send + Sync {
    fn set_use_cache(&self, use_cache: bool);

    fn culler(&self) -> Option<Arc<Culler>>;

    /// Load a descriptor. `coordinate` aligns the model with already loaded ones.
    fn load<'a>(
        &'a self,
        descriptor: &'a StreamingDescriptor,
        coordinate: bool,
        transform: Option<Transform>,
    ) -> BoxFuture<'a, Result<SceneObject>>;

    /// Hydrate per-element properties of a loaded object.
    fn load_properties<'a>(
        &'a self,
        object: &'a SceneObject,
        descriptor: &'a StreamingDescriptor,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Whole-file IFC loader used for models below the streaming threshold.
pub trait IfcLoader: Send + Sync {
    fn configure(&self, wasm: &WasmLocator);

    fn load<'a>(&'a self, buffer: &'a [u8], name: &'a str) -> BoxFuture<'a, Result<SceneObject>>;
}

/// Emitted when camera controls come to rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSleep;

pub trait CameraControls: Send + Sync {
    fn on_sleep(&self) -> &EventChannel<CameraSleep>;
}

/// Scene graph operations the viewer is allowed to perform.
pub trait Scene: Send + Sync {
    fn add(&self, object: &SceneObject);

    fn remove(&self, object: &SceneObject);

    /// Release geometry and materials of a removed object.
    fn dispose(&self, object: &SceneObject);
}

/// Section plane support.
pub trait ClippingEngine: Send + Sync {
    fn create_plane(&self);

    fn delete_plane(&self);

    fn apply_config(&self, config: &crate::clipper::ClipperConfig);
}

/// The engines available to the viewer. Any of them may be missing.
#[derive(Clone, Default)]
pub struct Components {
    tiler: Option<Arc<dyn GeometryTiler>>,
    streamer: Option<Arc<dyn Streamer>>,
    ifc_loader: Option<Arc<dyn IfcLoader>>,
    clipper: Option<Arc<dyn ClippingEngine>>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tiler(mut self, tiler: Arc<dyn GeometryTiler>) -> Self {
        self.tiler = Some(tiler);
        self
    }

    pub fn with_streamer(mut self, streamer: Arc<dyn Streamer>) -> Self {
        self.streamer = Some(streamer);
        self
    }

    pub fn with_ifc_loader(mut self, loader: Arc<dyn IfcLoader>) -> Self {
        self.ifc_loader = Some(loader);
        self
    }

    pub fn with_clipper(mut self, clipper: Arc<dyn ClippingEngine>) -> Self {
        self.clipper = Some(clipper);
        self
    }

    pub fn tiler(&self) -> Result<Arc<dyn GeometryTiler>> {
        self.tiler
            .clone()
            .ok_or(Error::Pipeline(ifc_stream_core::Error::TilerUnavailable))
    }

    pub fn streamer(&self) -> Result<Arc<dyn Streamer>> {
        self.streamer.clone().ok_or(Error::StreamerUnavailable)
    }

    pub fn ifc_loader(&self) -> Result<Arc<dyn IfcLoader>> {
        self.ifc_loader.clone().ok_or(Error::LoaderUnavailable)
    }

    pub fn clipper(&self) -> Result<Arc<dyn ClippingEngine>> {
        self.clipper.clone().ok_or(Error::ClipperUnavailable)
    }
}

/// The scene and camera a viewer renders into.
#[derive(Clone)]
pub struct World {
    pub scene: Arc<dyn Scene>,
    pub camera: Arc<dyn CameraControls>,
}

impl World {
    pub fn new(scene: Arc<dyn Scene>, camera: Arc<dyn CameraControls>) -> Self {
        Self { scene, camera }
    }
}
