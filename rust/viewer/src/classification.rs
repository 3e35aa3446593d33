// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification index and the tree view that follows the registry.
//!
//! The index maps a classification system (`entities`, `predefinedTypes`)
//! to category labels, and each label to the `(model, element)` pairs in it.
//! It is derived state: it can always be rebuilt from the registry, and it
//! must never mention a model the registry does not hold.

use crate::lifecycle::{ClassificationsUpdated, ModelLifecycle};
use crate::model::LoadedModel;
use crate::registry::SharedRegistry;
use ifc_stream_core::{ElementId, Subscription};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const ENTITIES: &str = "entities";
pub const PREDEFINED_TYPES: &str = "predefinedTypes";

/// One element of one model.
pub type ElementRef = (Uuid, ElementId);

/// How the index follows model removals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcileStrategy {
    /// Rebuild from the registry on every change.
    #[default]
    FullRebuild,
    /// Drop only the departed model's references.
    IncrementalPrune,
}

impl FromStr for ReconcileStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rebuild" | "full" => Ok(Self::FullRebuild),
            "prune" | "incremental" => Ok(Self::IncrementalPrune),
            other => Err(format!("unknown classification strategy: {other}")),
        }
    }
}

/// Classification system name -> label -> elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationIndex {
    systems: BTreeMap<String, BTreeMap<String, BTreeSet<ElementRef>>>,
}

impl ClassificationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one model by entity class and predefined type.
    pub fn classify(model: &LoadedModel) -> Self {
        let mut index = Self::new();
        let model_id = model.id();
        for element in model.elements() {
            let element_ref = (model_id, element.id.clone());
            index.insert(ENTITIES, &element.entity, element_ref.clone());
            if let Some(predefined) = &element.predefined_type {
                index.insert(PREDEFINED_TYPES, predefined, element_ref);
            }
        }
        index
    }

    /// Index every model in `models`.
    pub fn rebuild<'a>(models: impl IntoIterator<Item = &'a Arc<LoadedModel>>) -> Self {
        let mut index = Self::new();
        for model in models {
            index.merge(Self::classify(model));
        }
        index
    }

    pub fn merge(&mut self, other: ClassificationIndex) {
        for (system, labels) in other.systems {
            let target = self.systems.entry(system).or_default();
            for (label, elements) in labels {
                target.entry(label).or_default().extend(elements);
            }
        }
    }

    /// Remove every reference to `model_id`, dropping buckets left empty.
    pub fn prune_model(&mut self, model_id: Uuid) {
        for labels in self.systems.values_mut() {
            for elements in labels.values_mut() {
                elements.retain(|(m, _)| *m != model_id);
            }
            labels.retain(|_, elements| !elements.is_empty());
        }
        self.systems.retain(|_, labels| !labels.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn system(&self, name: &str) -> Option<&BTreeMap<String, BTreeSet<ElementRef>>> {
        self.systems.get(name)
    }

    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.systems.keys().map(String::as_str)
    }

    /// Elements filed under `label` in `system`.
    pub fn find(&self, system: &str, label: &str) -> Option<&BTreeSet<ElementRef>> {
        self.systems.get(system)?.get(label)
    }

    /// Every model referenced anywhere in the index.
    pub fn model_ids(&self) -> BTreeSet<Uuid> {
        self.systems
            .values()
            .flat_map(|labels| labels.values())
            .flat_map(|elements| elements.iter().map(|(m, _)| *m))
            .collect()
    }

    fn insert(&mut self, system: &str, label: &str, element: ElementRef) {
        self.systems
            .entry(system.to_string())
            .or_default()
            .entry(label.to_string())
            .or_default()
            .insert(element);
    }
}

/// What the classification panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationView {
    NoModelLoaded,
    Tree(ClassificationIndex),
}

#[derive(Debug)]
struct TreeState {
    index: ClassificationIndex,
    no_models: bool,
}

/// Classification index kept in step with lifecycle events.
pub struct ClassificationTree {
    state: Arc<Mutex<TreeState>>,
    strategy: ReconcileStrategy,
    _subscriptions: Vec<Subscription>,
}

impl ClassificationTree {
    pub fn new(lifecycle: &ModelLifecycle, strategy: ReconcileStrategy) -> Self {
        let registry = Arc::clone(lifecycle.registry());
        let initial = {
            let registry = registry.read();
            TreeState {
                index: ClassificationIndex::rebuild(registry.models()),
                no_models: registry.is_empty(),
            }
        };
        let state = Arc::new(Mutex::new(initial));
        let events = lifecycle.events();
        let updated = events.classifications_updated.clone();

        let on_loaded = {
            let state = Arc::clone(&state);
            let updated = updated.clone();
            events.model_loaded.subscribe(move |event| {
                {
                    let mut state = state.lock();
                    state.index.merge(ClassificationIndex::classify(&event.model));
                    state.no_models = false;
                }
                updated.emit(&ClassificationsUpdated);
                Ok(())
            })
        };

        let on_disposed = {
            let state = Arc::clone(&state);
            let registry = Arc::clone(&registry);
            let updated = updated.clone();
            events.model_disposed.subscribe(move |event| {
                match strategy {
                    ReconcileStrategy::FullRebuild => reconcile(&state, &registry),
                    ReconcileStrategy::IncrementalPrune => state.lock().index.prune_model(event.model_id),
                }
                updated.emit(&ClassificationsUpdated);
                Ok(())
            })
        };

        let on_empty = {
            let state = Arc::clone(&state);
            events.all_models_removed.subscribe(move |_| {
                let stale = state.lock().index.model_ids();
                if !stale.is_empty() {
                    tracing::warn!(?stale, "Classification index still referenced removed models");
                }
                reconcile(&state, &registry);
                state.lock().no_models = true;
                updated.emit(&ClassificationsUpdated);
                Ok(())
            })
        };

        Self {
            state,
            strategy,
            _subscriptions: vec![on_loaded, on_disposed, on_empty],
        }
    }

    pub fn strategy(&self) -> ReconcileStrategy {
        self.strategy
    }

    pub fn view(&self) -> ClassificationView {
        let state = self.state.lock();
        if state.no_models {
            ClassificationView::NoModelLoaded
        } else {
            ClassificationView::Tree(state.index.clone())
        }
    }

    pub fn index(&self) -> ClassificationIndex {
        self.state.lock().index.clone()
    }
}

fn reconcile(state: &Mutex<TreeState>, registry: &SharedRegistry) {
    let index = ClassificationIndex::rebuild(registry.read().models());
    tracing::debug!(models = index.model_ids().len(), "Classification index rebuilt");
    state.lock().index = index;
}
