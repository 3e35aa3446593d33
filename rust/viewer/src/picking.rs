// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Meshes the pointer can hit, rebuilt from the registry on every change.

use crate::engine::MeshId;
use crate::lifecycle::ModelLifecycle;
use crate::registry::SharedRegistry;
use ifc_stream_core::Subscription;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Targets {
    meshes: Vec<MeshId>,
    owners: FxHashMap<MeshId, Uuid>,
}

impl Targets {
    fn collect(registry: &SharedRegistry) -> Self {
        let registry = registry.read();
        let mut targets = Self::default();
        for model in registry.models() {
            for mesh in model.meshes() {
                targets.meshes.push(*mesh);
                targets.owners.insert(*mesh, model.id());
            }
        }
        targets
    }
}

/// Pick targets for raycasting.
pub struct PickTargets {
    targets: Arc<RwLock<Targets>>,
    _subscriptions: Vec<Subscription>,
}

impl PickTargets {
    pub fn new(lifecycle: &ModelLifecycle) -> Self {
        let registry = Arc::clone(lifecycle.registry());
        let targets = Arc::new(RwLock::new(Targets::collect(&registry)));
        let events = lifecycle.events();

        let refresh = move |targets: &Arc<RwLock<Targets>>, registry: &SharedRegistry| {
            let fresh = Targets::collect(registry);
            tracing::trace!(meshes = fresh.meshes.len(), "Pick targets refreshed");
            *targets.write() = fresh;
        };

        let on_loaded = {
            let (targets, registry) = (Arc::clone(&targets), Arc::clone(&registry));
            events.model_loaded.subscribe(move |_| {
                refresh(&targets, &registry);
                Ok(())
            })
        };
        let on_disposed = {
            let (targets, registry) = (Arc::clone(&targets), Arc::clone(&registry));
            events.model_disposed.subscribe(move |_| {
                refresh(&targets, &registry);
                Ok(())
            })
        };

        Self {
            targets,
            _subscriptions: vec![on_loaded, on_disposed],
        }
    }

    /// Meshes in registry order.
    pub fn meshes(&self) -> Vec<MeshId> {
        self.targets.read().meshes.clone()
    }

    pub fn len(&self) -> usize {
        self.targets.read().meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().meshes.is_empty()
    }

    /// Model owning a hit mesh.
    pub fn model_for(&self, mesh: MeshId) -> Option<Uuid> {
        self.targets.read().owners.get(&mesh).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SceneObject;
    use crate::lifecycle::ModelDisposer;
    use crate::model::LoadedModel;
    use crate::registry::ModelRegistry;

    struct NoopDisposer;

    impl ModelDisposer for NoopDisposer {
        fn dispose(&self, _model: &LoadedModel) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn follows_loads_and_removals() {
        let lifecycle = ModelLifecycle::new(ModelRegistry::shared(), Arc::new(NoopDisposer));
        let picking = PickTargets::new(&lifecycle);
        assert!(picking.is_empty());

        let load = |meshes: Vec<u64>| {
            let ticket = lifecycle.begin_load("m.ifc");
            let object = SceneObject {
                id: Uuid::new_v4(),
                meshes: meshes.into_iter().map(MeshId).collect(),
                elements: vec![],
            };
            lifecycle.complete_load(ticket, LoadedModel::standard("m.ifc", object))
        };
        let a = load(vec![1, 2]);
        let b = load(vec![3]);

        assert_eq!(picking.meshes(), vec![MeshId(1), MeshId(2), MeshId(3)]);
        assert_eq!(picking.model_for(MeshId(3)), Some(b.id()));

        lifecycle.remove(a.id()).unwrap();
        assert_eq!(picking.meshes(), vec![MeshId(3)]);
        assert_eq!(picking.model_for(MeshId(1)), None);
    }
}
