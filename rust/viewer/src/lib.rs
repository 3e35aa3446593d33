// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Stream Viewer
//!
//! Model loading and lifecycle coordination on top of `ifc-stream-core`.
//!
//! - [`StreamingService`] turns a large file into a streamed model.
//! - [`ModelLifecycle`] owns the model registry and emits lifecycle events.
//! - [`ClassificationTree`], [`PickTargets`] and [`ModelList`] are derived
//!   views that follow those events.
//! - [`Viewer`] wires everything to one world.
//!
//! Rendering, scene graph and camera are supplied by the host through the
//! traits in [`engine`].

pub mod classification;
pub mod clipper;
pub mod config;
pub mod engine;
pub mod error;
pub mod file;
pub mod lifecycle;
pub mod model;
pub mod model_list;
pub mod picking;
pub mod registry;
pub mod streaming;
pub mod viewer;

pub use classification::{
    ClassificationIndex, ClassificationTree, ClassificationView, ElementRef, ReconcileStrategy, ENTITIES,
    PREDEFINED_TYPES,
};
pub use clipper::{Clipper, ClipperConfig, ClipperConfigPatch};
pub use config::ViewerConfig;
pub use engine::{
    CameraControls, CameraSleep, ClippingEngine, Components, Culler, CullerState, ElementInfo, IfcLoader, MeshId,
    Scene, SceneObject, Streamer, Transform, World,
};
pub use error::{Error, Result};
pub use file::IfcFile;
pub use lifecycle::{
    AllModelsRemoved, ClassificationsUpdated, DeleteRequested, LifecycleEvents, LoadTicket, ModelDisposed,
    ModelDisposer, ModelLifecycle, ModelLoaded,
};
pub use model::{LoadedModel, ModelKind, ModelState, StreamResources, StreamedModel};
pub use model_list::{ModelList, ModelRow};
pub use picking::PickTargets;
pub use registry::{ModelRegistry, PendingLoad, SharedRegistry};
pub use streaming::{is_large_file, StreamerConfig, StreamingService, DEFAULT_LARGE_FILE_THRESHOLD};
pub use viewer::{ImportStatus, SceneDisposer, Viewer};
