// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section planes.

use crate::engine::{ClippingEngine, Components};
use crate::error::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Section plane settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipperConfig {
    pub enabled: bool,
    pub visible: bool,
    /// RGB, 0..=1.
    pub color: [f32; 3],
    pub opacity: f32,
    pub size: f32,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            visible: true,
            color: [0.8, 0.1, 0.1],
            opacity: 0.2,
            size: 5.0,
        }
    }
}

/// Partial update; unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipperConfigPatch {
    pub enabled: Option<bool>,
    pub visible: Option<bool>,
    pub color: Option<[f32; 3]>,
    pub opacity: Option<f32>,
    pub size: Option<f32>,
}

impl ClipperConfig {
    pub fn apply(&mut self, patch: &ClipperConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
    }
}

pub struct Clipper {
    engine: Arc<dyn ClippingEngine>,
    config: Mutex<ClipperConfig>,
}

impl Clipper {
    /// Fails with `clipper not found` when no clipping engine is registered.
    pub fn from_components(components: &Components) -> Result<Self> {
        Ok(Self::new(components.clipper()?))
    }

    pub fn new(engine: Arc<dyn ClippingEngine>) -> Self {
        Self {
            engine,
            config: Mutex::new(ClipperConfig::default()),
        }
    }

    pub fn config(&self) -> ClipperConfig {
        self.config.lock().clone()
    }

    /// Create a plane. Returns `false` while disabled.
    pub fn create_plane(&self) -> bool {
        if !self.config.lock().enabled {
            return false;
        }
        self.engine.create_plane();
        tracing::debug!("Clip plane created");
        true
    }

    /// Delete the plane under the pointer. Returns `false` while disabled.
    pub fn delete_plane(&self) -> bool {
        if !self.config.lock().enabled {
            return false;
        }
        self.engine.delete_plane();
        tracing::debug!("Clip plane deleted");
        true
    }

    /// Merge `patch` into the configuration and push it to the engine.
    pub fn update_config(&self, patch: &ClipperConfigPatch) -> ClipperConfig {
        let config = {
            let mut config = self.config.lock();
            config.apply(patch);
            config.clone()
        };
        self.engine.apply_config(&config);
        config
    }
}
