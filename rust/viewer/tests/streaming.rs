// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::{sample_file, streaming_config, yielding_file, Harness, RejectingTiler};
use ifc_stream_core::{ErrorKind, TilerSettings};
use ifc_stream_viewer::{
    Components, CullerState, Error, LoadedModel, SceneObject, StreamerConfig, StreamingService,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn service(harness: &Harness) -> StreamingService {
    StreamingService::new(harness.components.clone(), harness.world.clone(), harness.store.clone())
        .with_tiler_settings(TilerSettings {
            min_geometry_size: 2,
            ..TilerSettings::default()
        })
}

#[test]
fn configure_applies_defaults() {
    let harness = Harness::new();
    harness.streamer.culler.set_thresholds(1.0, Duration::ZERO, Duration::ZERO);

    service(&harness).configure(None).unwrap();

    assert_eq!(harness.streamer.culler.state(), CullerState::default());
    assert_eq!(*harness.streamer.use_cache.lock(), Some(true));
}

#[test]
fn configure_is_idempotent_and_last_write_wins() {
    let harness = Harness::new();
    let service = service(&harness);
    let config = StreamerConfig {
        threshold: Some(25.0),
        max_lost_time: Some(Duration::from_millis(5000)),
        use_cache: Some(false),
        ..StreamerConfig::default()
    };

    service.configure(Some(&config)).unwrap();
    let once = harness.streamer.culler.state();
    service.configure(Some(&config)).unwrap();
    assert_eq!(harness.streamer.culler.state(), once);

    assert_eq!(once.threshold, 25.0);
    assert_eq!(once.max_hidden_time, Duration::from_millis(1000));
    assert_eq!(once.max_lost_time, Duration::from_millis(5000));
    assert_eq!(*harness.streamer.use_cache.lock(), Some(false));

    service.configure(None).unwrap();
    assert_eq!(harness.streamer.culler.state().threshold, 10.0);
}

#[test]
fn configure_without_streamer_fails() {
    let harness = Harness::new();
    let service = StreamingService::new(Components::new(), harness.world.clone(), harness.store.clone());

    let err = service.configure(None).err().unwrap();
    assert_eq!(err.to_string(), "streamer unavailable");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn load_with_streaming_hands_engine_a_resolved_descriptor() {
    let harness = Harness::new();
    let service = service(&harness);

    let model = service.load_with_streaming(&sample_file("house.ifc")).await.unwrap();

    assert!(model.is_streamed());
    assert_eq!(model.display_name(), "house.ifc");
    assert_eq!(model.elements().len(), 4);

    let loads = harness.streamer.loads.lock();
    assert_eq!(loads.len(), 1);
    let (descriptor, coordinate) = &loads[0];
    assert!(*coordinate);
    assert_eq!(descriptor.geometries.len(), 4);
    for entry in descriptor.geometries.values() {
        assert!(entry.geometry_file.as_str().starts_with("blob:"));
        assert!(harness.store.fetch(&entry.geometry_file).is_some());
        assert_ne!(entry.geometry_file, descriptor.global_data_file_id);
    }
    assert!(harness.store.fetch(&descriptor.global_data_file_id).is_some());

    let streamed = model.streamed().unwrap();
    assert_eq!(streamed.tile_handles().len(), harness.store.len());
    assert_eq!(model.streaming_descriptor().unwrap().as_ref(), descriptor);
}

#[tokio::test]
async fn camera_sleep_requests_culling_until_cleanup() {
    let harness = Harness::new();
    let service = service(&harness);
    let model = service.load_with_streaming(&sample_file("house.ifc")).await.unwrap();

    harness.sleep_camera();
    assert!(harness.streamer.culler.take_update());

    service.cleanup_model(&model);
    assert!(!model.streamed().unwrap().has_culling_update());
    harness.sleep_camera();
    assert!(!harness.streamer.culler.take_update());

    service.cleanup_model(&model);
}

#[tokio::test]
async fn tiler_rejection_propagates_unchanged() {
    let harness = Harness::new();
    let components = harness.components.clone().with_tiler(Arc::new(RejectingTiler::default()));
    let service = StreamingService::new(components, harness.world.clone(), harness.store.clone());

    let err = service.load_with_streaming(&sample_file("house.ifc")).await.unwrap_err();
    assert_eq!(err.to_string(), "wasm runtime failed to load");
    assert_eq!(err.kind(), ErrorKind::Generation);
    assert!(harness.store.is_empty());
    assert!(harness.streamer.loads.lock().is_empty());
}

#[tokio::test]
async fn engine_rejection_releases_persisted_tiles() {
    let harness = Harness::new();
    *harness.streamer.reject_with.lock() = Some("out of GPU memory".to_string());

    let err = service(&harness)
        .load_with_streaming(&sample_file("house.ifc"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "out of GPU memory");
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn release_tiles_returns_handles_to_the_store() {
    let harness = Harness::new();
    let service = service(&harness);
    let model = service.load_with_streaming(&sample_file("house.ifc")).await.unwrap();
    assert!(!harness.store.is_empty());

    service.release_tiles(&model);
    assert!(harness.store.is_empty());
    assert!(model.streamed().unwrap().tile_handles().is_empty());
}

#[tokio::test]
async fn properties_need_a_streamed_model() {
    let harness = Harness::new();
    let service = service(&harness);

    let standard = LoadedModel::standard(
        "small.ifc",
        SceneObject {
            id: Uuid::new_v4(),
            meshes: vec![],
            elements: vec![],
        },
    );
    let err = service.load_model_properties(&standard).await.unwrap_err();
    assert!(matches!(err, Error::StreamingSettingsMissing));
    assert_eq!(err.to_string(), "model streaming settings not found");

    let streamed = service.load_with_streaming(&sample_file("house.ifc")).await.unwrap();
    service.load_model_properties(&streamed).await.unwrap();
    assert_eq!(*harness.streamer.property_loads.lock(), vec![streamed.id()]);
}

#[tokio::test]
async fn properties_without_streamer_fail() {
    let harness = Harness::new();
    let model = service(&harness)
        .load_with_streaming(&sample_file("house.ifc"))
        .await
        .unwrap();

    let detached = StreamingService::new(Components::new(), harness.world.clone(), harness.store.clone());
    let err = detached.load_model_properties(&model).await.unwrap_err();
    assert_eq!(err.to_string(), "streamer unavailable");
}

#[tokio::test]
async fn overlapping_imports_keep_their_own_tiles() {
    let harness = Harness::new();
    let viewer = harness.yielding_viewer(streaming_config());

    let (file_1, file_2) = (yielding_file("1"), yielding_file("2"));
    let (a, b) = tokio::join!(viewer.import(&file_1), viewer.import(&file_2));
    let (a, b) = (a.unwrap(), b.unwrap());

    let ids = |model: &LoadedModel| model.elements().iter().map(|e| e.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(a.as_ref()), vec!["1"]);
    assert_eq!(ids(b.as_ref()), vec!["2"]);
    assert_ne!(a.streaming_descriptor(), b.streaming_descriptor());
    assert_eq!(viewer.lifecycle().registry().read().len(), 2);
}
