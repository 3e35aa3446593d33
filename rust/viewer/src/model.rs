// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loaded models.
//!
//! A model is either [`ModelKind::Standard`] (loaded whole) or
//! [`ModelKind::Streamed`] (loaded progressively from a descriptor). The kind
//! is fixed at load time; consumers go through the accessors on
//! [`LoadedModel`] rather than inspecting engine objects.

use crate::engine::{ElementInfo, MeshId, SceneObject};
use ifc_stream_core::{StreamingDescriptor, Subscription, TileHandle};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle state of a model entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Loading,
    Loaded,
    Disposing,
    Removed,
}

/// Resources a streamed model holds outside the scene graph.
#[derive(Debug, Default)]
pub struct StreamResources {
    /// Camera listener that flags the culler for an update.
    pub culling_update: Option<Subscription>,
    /// Persisted tiles backing the descriptor.
    pub tile_handles: Vec<TileHandle>,
}

/// A model fed through the streaming engine.
#[derive(Debug)]
pub struct StreamedModel {
    pub object: SceneObject,
    pub descriptor: Arc<StreamingDescriptor>,
    resources: Mutex<StreamResources>,
}

impl StreamedModel {
    pub fn new(object: SceneObject, descriptor: Arc<StreamingDescriptor>, resources: StreamResources) -> Self {
        Self {
            object,
            descriptor,
            resources: Mutex::new(resources),
        }
    }

    pub fn has_culling_update(&self) -> bool {
        self.resources.lock().culling_update.is_some()
    }

    /// Remove and return the camera listener, if still registered.
    pub fn take_culling_update(&self) -> Option<Subscription> {
        self.resources.lock().culling_update.take()
    }

    /// Remove and return the tile handles this model still holds.
    pub fn take_tile_handles(&self) -> Vec<TileHandle> {
        std::mem::take(&mut self.resources.lock().tile_handles)
    }

    pub fn tile_handles(&self) -> Vec<TileHandle> {
        self.resources.lock().tile_handles.clone()
    }

    pub(crate) fn set_tile_handles(&self, handles: Vec<TileHandle>) {
        self.resources.lock().tile_handles = handles;
    }
}

#[derive(Debug)]
pub enum ModelKind {
    Standard(SceneObject),
    Streamed(StreamedModel),
}

/// One model attached to the scene.
#[derive(Debug)]
pub struct LoadedModel {
    display_name: String,
    kind: ModelKind,
}

impl LoadedModel {
    pub fn standard(display_name: impl Into<String>, object: SceneObject) -> Self {
        Self {
            display_name: display_name.into(),
            kind: ModelKind::Standard(object),
        }
    }

    pub fn from_streamed(display_name: impl Into<String>, model: StreamedModel) -> Self {
        Self {
            display_name: display_name.into(),
            kind: ModelKind::Streamed(model),
        }
    }

    /// Model identifier; the scene object's id.
    pub fn id(&self) -> Uuid {
        self.scene_object().id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    pub fn scene_object(&self) -> &SceneObject {
        match &self.kind {
            ModelKind::Standard(object) => object,
            ModelKind::Streamed(streamed) => &streamed.object,
        }
    }

    pub fn elements(&self) -> &[ElementInfo] {
        &self.scene_object().elements
    }

    pub fn meshes(&self) -> &[MeshId] {
        &self.scene_object().meshes
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self.kind, ModelKind::Streamed(_))
    }

    pub fn streamed(&self) -> Option<&StreamedModel> {
        match &self.kind {
            ModelKind::Streamed(streamed) => Some(streamed),
            ModelKind::Standard(_) => None,
        }
    }

    /// Descriptor the model was streamed from.
    pub fn streaming_descriptor(&self) -> Option<&Arc<StreamingDescriptor>> {
        self.streamed().map(|s| &s.descriptor)
    }
}
