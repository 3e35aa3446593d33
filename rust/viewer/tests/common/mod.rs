// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine stand-ins shared by the integration tests.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use ifc_stream_core::{
    EventChannel, GeometryChunk, GeometryTiler, MemoryTileStore, StepTiler, StreamingDescriptor, TilerSettings,
    WasmLocator,
};
use ifc_stream_viewer::{
    CameraControls, CameraSleep, ClipperConfig, ClippingEngine, Components, Culler, ElementInfo, Error, IfcFile, IfcLoader, MeshId, Result, Scene,
    SceneObject, Streamer, Transform, Viewer, ViewerConfig, World,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub const SAMPLE: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('house.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'House',$,$,$,$,$,$);
#10=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall A',$,$,$,$,'tag',.STANDARD.);
#11=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOI',$,'Wall B',$,$,$,$,'tag',.NOTDEFINED.);
#12=IFCSLAB('1O2Fr$t4X7Zf8NOew3FLOH',$,'Slab',$,$,$,$,'tag',.FLOOR.);
#13=IFCDOOR('3O2Fr$t4X7Zf8NOew3FLOH',$,'Door',$,$,$,$,'tag',2.1,0.9,.DOOR.,.SINGLE_SWING_LEFT.,$);
ENDSEC;
END-ISO-10303-21;
";

static NEXT_MESH: AtomicU64 = AtomicU64::new(1);

fn next_mesh() -> MeshId {
    MeshId(NEXT_MESH.fetch_add(1, Ordering::Relaxed))
}

/// Streaming engine that derives scene objects from the descriptor.
#[derive(Default)]
pub struct MockStreamer {
    pub culler: Arc<Culler>,
    pub use_cache: Mutex<Option<bool>>,
    pub loads: Mutex<Vec<(StreamingDescriptor, bool)>>,
    pub property_loads: Mutex<Vec<Uuid>>,
    pub reject_with: Mutex<Option<String>>,
}

impl Streamer for MockStreamer {
    fn set_use_cache(&self, use_cache: bool) {
        *self.use_cache.lock() = Some(use_cache);
    }

    fn culler(&self) -> Option<Arc<Culler>> {
        Some(Arc::clone(&self.culler))
    }

    fn load<'a>(
        &'a self,
        descriptor: &'a StreamingDescriptor,
        coordinate: bool,
        _transform: Option<Transform>,
    ) -> BoxFuture<'a, Result<SceneObject>> {
        async move {
            if let Some(message) = self.reject_with.lock().clone() {
                return Err(Error::engine(message));
            }
            self.loads.lock().push((descriptor.clone(), coordinate));
            let elements = descriptor
                .geometries
                .iter()
                .map(|(id, entry)| ElementInfo {
                    id: id.clone(),
                    entity: entry.metadata_str("entity").unwrap_or("IFCPRODUCT").to_string(),
                    predefined_type: entry.metadata_str("predefinedType").map(String::from),
                })
                .collect();
            Ok(SceneObject {
                id: Uuid::new_v4(),
                meshes: vec![next_mesh()],
                elements,
            })
        }
        .boxed()
    }

    fn load_properties<'a>(
        &'a self,
        object: &'a SceneObject,
        _descriptor: &'a StreamingDescriptor,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            self.property_loads.lock().push(object.id);
            Ok(())
        }
        .boxed()
    }
}

/// Whole-file loader returning a fixed element list.
#[derive(Default)]
pub struct MockLoader {
    pub configured: Mutex<Option<WasmLocator>>,
    pub elements: Vec<ElementInfo>,
}

impl MockLoader {
    pub fn with_elements(elements: Vec<ElementInfo>) -> Self {
        Self {
            elements,
            ..Default::default()
        }
    }
}

impl IfcLoader for MockLoader {
    fn configure(&self, wasm: &WasmLocator) {
        *self.configured.lock() = Some(wasm.clone());
    }

    fn load<'a>(&'a self, _buffer: &'a [u8], _name: &'a str) -> BoxFuture<'a, Result<SceneObject>> {
        async move {
            Ok(SceneObject {
                id: Uuid::new_v4(),
                meshes: vec![next_mesh(), next_mesh()],
                elements: self.elements.clone(),
            })
        }
        .boxed()
    }
}

pub struct MockCamera {
    sleep: EventChannel<CameraSleep>,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self {
            sleep: EventChannel::new("camera-sleep"),
        }
    }
}

impl CameraControls for MockCamera {
    fn on_sleep(&self) -> &EventChannel<CameraSleep> {
        &self.sleep
    }
}

#[derive(Default)]
pub struct MockScene {
    pub added: Mutex<Vec<Uuid>>,
    pub removed: Mutex<Vec<Uuid>>,
    pub disposed: Mutex<Vec<Uuid>>,
}

impl Scene for MockScene {
    fn add(&self, object: &SceneObject) {
        self.added.lock().push(object.id);
    }

    fn remove(&self, object: &SceneObject) {
        self.removed.lock().push(object.id);
    }

    fn dispose(&self, object: &SceneObject) {
        self.disposed.lock().push(object.id);
    }
}

/// Tiler whose stream call always rejects.
pub struct RejectingTiler {
    geometry: EventChannel<GeometryChunk>,
    assets: EventChannel<Vec<ifc_stream_core::AssetRecord>>,
    loaded: EventChannel<Vec<u8>>,
}

impl Default for RejectingTiler {
    fn default() -> Self {
        Self {
            geometry: EventChannel::new("geometry-streamed"),
            assets: EventChannel::new("asset-streamed"),
            loaded: EventChannel::new("ifc-loaded"),
        }
    }
}

impl GeometryTiler for RejectingTiler {
    fn configure(&self, _settings: &TilerSettings) {}

    fn on_geometry_streamed(&self) -> &EventChannel<GeometryChunk> {
        &self.geometry
    }

    fn on_asset_streamed(&self) -> &EventChannel<Vec<ifc_stream_core::AssetRecord>> {
        &self.assets
    }

    fn on_ifc_loaded(&self) -> &EventChannel<Vec<u8>> {
        &self.loaded
    }

    fn stream_from_buffer<'a>(&'a self, _buffer: &'a [u8]) -> BoxFuture<'a, ifc_stream_core::Result<()>> {
        async { Err(ifc_stream_core::Error::engine("wasm runtime failed to load")) }.boxed()
    }
}

/// Tiler that suspends between its geometry chunk and its global data, the
/// way an engine running on another thread does. Each buffer yields one
/// element whose id is the buffer's first line.
pub struct YieldingTiler {
    geometry: EventChannel<GeometryChunk>,
    assets: EventChannel<Vec<ifc_stream_core::AssetRecord>>,
    loaded: EventChannel<Vec<u8>>,
}

impl Default for YieldingTiler {
    fn default() -> Self {
        Self {
            geometry: EventChannel::new("geometry-streamed"),
            assets: EventChannel::new("asset-streamed"),
            loaded: EventChannel::new("ifc-loaded"),
        }
    }
}

impl GeometryTiler for YieldingTiler {
    fn configure(&self, _settings: &TilerSettings) {}

    fn on_geometry_streamed(&self) -> &EventChannel<GeometryChunk> {
        &self.geometry
    }

    fn on_asset_streamed(&self) -> &EventChannel<Vec<ifc_stream_core::AssetRecord>> {
        &self.assets
    }

    fn on_ifc_loaded(&self) -> &EventChannel<Vec<u8>> {
        &self.loaded
    }

    fn stream_from_buffer<'a>(&'a self, buffer: &'a [u8]) -> BoxFuture<'a, ifc_stream_core::Result<()>> {
        async move {
            let text = String::from_utf8_lossy(buffer);
            let id = text.lines().next().unwrap_or_default().to_string();
            let mut chunk = GeometryChunk {
                buffer: buffer.to_vec(),
                ..GeometryChunk::default()
            };
            chunk.data.insert(id, ifc_stream_core::ElementMetadata::new());
            self.geometry.emit(&chunk);
            tokio::task::yield_now().await;
            self.loaded.emit(&buffer.to_vec());
            Ok(())
        }
        .boxed()
    }
}

/// A large file for [`YieldingTiler`] carrying one element `id`.
pub fn yielding_file(id: &str) -> IfcFile {
    IfcFile::from_bytes(format!("{id}.ifc"), format!("{id}\n{}", "x".repeat(64)).into_bytes())
}

#[derive(Default)]
pub struct MockClipper {
    pub calls: Mutex<Vec<String>>,
}

impl ClippingEngine for MockClipper {
    fn create_plane(&self) {
        self.calls.lock().push("create".into());
    }

    fn delete_plane(&self) {
        self.calls.lock().push("delete".into());
    }

    fn apply_config(&self, config: &ClipperConfig) {
        self.calls.lock().push(format!("config enabled={}", config.enabled));
    }
}

pub fn element(id: &str, entity: &str, predefined: Option<&str>) -> ElementInfo {
    ElementInfo {
        id: id.into(),
        entity: entity.into(),
        predefined_type: predefined.map(String::from),
    }
}

/// Everything a test needs to observe a viewer.
pub struct Harness {
    pub streamer: Arc<MockStreamer>,
    pub loader: Arc<MockLoader>,
    pub camera: Arc<MockCamera>,
    pub scene: Arc<MockScene>,
    pub store: Arc<MemoryTileStore>,
    pub components: Components,
    pub world: World,
}

impl Harness {
    pub fn new() -> Self {
        let streamer = Arc::new(MockStreamer::default());
        let loader = Arc::new(MockLoader::with_elements(vec![
            element("100", "IFCWALL", Some("STANDARD")),
            element("101", "IFCBEAM", None),
        ]));
        let camera = Arc::new(MockCamera::default());
        let scene = Arc::new(MockScene::default());
        let components = Components::new()
            .with_tiler(Arc::new(StepTiler::new()))
            .with_streamer(streamer.clone())
            .with_ifc_loader(loader.clone());
        let world = World::new(scene.clone(), camera.clone());

        Self {
            streamer,
            loader,
            camera,
            scene,
            store: Arc::new(MemoryTileStore::new()),
            components,
            world,
        }
    }

    pub fn viewer(&self, config: ViewerConfig) -> Viewer {
        Viewer::new(config, self.components.clone(), self.world.clone(), self.store.clone())
    }

    /// Viewer whose tiler suspends mid-run, for overlapping imports.
    pub fn yielding_viewer(&self, config: ViewerConfig) -> Viewer {
        let components = self.components.clone().with_tiler(Arc::new(YieldingTiler::default()));
        Viewer::new(config, components, self.world.clone(), self.store.clone())
    }

    pub fn sleep_camera(&self) {
        self.camera.on_sleep().emit(&CameraSleep);
    }
}

/// A config that streams anything above 16 bytes.
pub fn streaming_config() -> ViewerConfig {
    ViewerConfig {
        large_file_threshold: 16,
        tiler: TilerSettings {
            min_geometry_size: 2,
            ..TilerSettings::default()
        },
        ..ViewerConfig::default()
    }
}

pub fn sample_file(name: &str) -> IfcFile {
    IfcFile::from_bytes(name, SAMPLE.as_bytes().to_vec())
}
