// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in tiling engine for ISO-10303-21 (STEP) encoded IFC files.
//!
//! The data section is split by record: geometry-bearing products are packed
//! into geometry chunks, everything else (header, relationships, property
//! sets, representation items) becomes the global data blob. Chunk payloads
//! are the raw STEP records, newline separated, so a consumer can re-parse
//! any tile on its own.
//!
//! ```text
//! #12=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',#2,'Wall',$,$,#30,#40,'tag',.STANDARD.);
//!  ^id ^entity                                                      ^predefined type
//! ```

use crate::engine::{GeometryChunk, GeometryTiler, TilerSettings};
use crate::error::{Error, Result};
use crate::events::EventChannel;
use crate::types::{AssetRecord, ElementMetadata};
use futures_util::future::BoxFuture;
use memchr::{memchr, memchr2, memmem};
use parking_lot::Mutex;
use serde_json::{json, Value};

const STEP_MAGIC: &[u8] = b"ISO-10303-21";
const DATA_SECTION: &[u8] = b"DATA;";
const END_SECTION: &[u8] = b"ENDSEC;";
const TRAILER: &[u8] = b"ENDSEC;\nEND-ISO-10303-21;\n";

/// Product entities whose records carry renderable geometry.
const GEOMETRY_ENTITIES: &[&str] = &[
    "IFCBEAM",
    "IFCBEAMSTANDARDCASE",
    "IFCBUILDINGELEMENTPROXY",
    "IFCCHIMNEY",
    "IFCCOLUMN",
    "IFCCOLUMNSTANDARDCASE",
    "IFCCOVERING",
    "IFCCURTAINWALL",
    "IFCDOOR",
    "IFCDOORSTANDARDCASE",
    "IFCFLOWFITTING",
    "IFCFLOWSEGMENT",
    "IFCFLOWTERMINAL",
    "IFCFOOTING",
    "IFCFURNISHINGELEMENT",
    "IFCFURNITURE",
    "IFCMEMBER",
    "IFCMEMBERSTANDARDCASE",
    "IFCPILE",
    "IFCPLATE",
    "IFCPLATESTANDARDCASE",
    "IFCRAILING",
    "IFCRAMP",
    "IFCRAMPFLIGHT",
    "IFCROOF",
    "IFCSLAB",
    "IFCSLABSTANDARDCASE",
    "IFCSPACE",
    "IFCSTAIR",
    "IFCSTAIRFLIGHT",
    "IFCWALL",
    "IFCWALLSTANDARDCASE",
    "IFCWINDOW",
    "IFCWINDOWSTANDARDCASE",
];

/// Whether records of this (upper-case) entity type go into geometry tiles.
pub fn is_geometry_entity(entity: &str) -> bool {
    GEOMETRY_ENTITIES.binary_search(&entity).is_ok()
}

/// One entity record of the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord<'a> {
    pub id: u32,
    /// Upper-cased entity type name.
    pub entity: String,
    /// The full record including the terminating `;`.
    pub bytes: &'a [u8],
}

impl StepRecord<'_> {
    /// Last top-level attribute when it is an enumeration other than a logical.
    pub fn predefined_type(&self) -> Option<String> {
        let open = memchr(b'(', self.bytes)?;
        let close = self.bytes.iter().rposition(|&b| b == b')')?;
        if close <= open {
            return None;
        }
        let last = last_top_level_attribute(&self.bytes[open + 1..close]);
        let last = last.trim_ascii();
        if last.len() < 3 || last[0] != b'.' || last[last.len() - 1] != b'.' {
            return None;
        }
        let value = std::str::from_utf8(&last[1..last.len() - 1]).ok()?;
        match value {
            "T" | "F" | "U" => None,
            other => Some(other.to_string()),
        }
    }
}

/// Slice of the last comma-separated attribute at nesting depth zero.
fn last_top_level_attribute(args: &[u8]) -> &[u8] {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;
    for (i, &b) in args.iter().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => depth = depth.saturating_sub(1),
            b',' if !in_string && depth == 0 => start = i + 1,
            _ => {}
        }
    }
    &args[start..]
}

/// Iterator over the entity records of a STEP data section.
pub struct RecordScanner<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> RecordScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            while self.position < self.data.len() && self.data[self.position].is_ascii_whitespace() {
                self.position += 1;
            }
            if self.data[self.position..].starts_with(b"/*") {
                let close = memmem::find(&self.data[self.position + 2..], b"*/")
                    .ok_or_else(|| Error::engine(format!("unterminated comment at offset {}", self.position)))?;
                self.position += close + 4;
            } else {
                return Ok(());
            }
        }
    }

    /// End offset (exclusive) of the record starting at `start`.
    fn record_end(&self, start: usize) -> Result<usize> {
        let mut cursor = start;
        let mut in_string = false;
        while let Some(i) = memchr2(b'\'', b';', &self.data[cursor..]) {
            let at = cursor + i;
            match self.data[at] {
                b'\'' => in_string = !in_string,
                _ if !in_string => return Ok(at + 1),
                _ => {}
            }
            cursor = at + 1;
        }
        Err(Error::engine(format!("unterminated STEP record at offset {}", start)))
    }

    fn parse_record(&self, start: usize, end: usize) -> Result<StepRecord<'a>> {
        let bytes = &self.data[start..end];
        let malformed = || Error::engine(format!("malformed STEP record at offset {}", start));

        let digits = bytes[1..].iter().take_while(|b| b.is_ascii_digit()).count();
        let id = std::str::from_utf8(&bytes[1..1 + digits])
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(malformed)?;

        let rest = &bytes[1 + digits..];
        let eq = memchr(b'=', rest).ok_or_else(malformed)?;
        let rest = rest[eq + 1..].trim_ascii_start();
        let name_len = rest
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count();
        if name_len == 0 {
            return Err(malformed());
        }
        let entity = String::from_utf8_lossy(&rest[..name_len]).to_ascii_uppercase();

        Ok(StepRecord { id, entity, bytes })
    }
}

impl<'a> Iterator for RecordScanner<'a> {
    type Item = Result<StepRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.skip_trivia() {
            self.position = self.data.len();
            return Some(Err(e));
        }
        let rest = &self.data[self.position..];
        if rest.is_empty() || rest.starts_with(END_SECTION) {
            return None;
        }
        if rest[0] != b'#' {
            let start = self.position;
            self.position = self.data.len();
            return Some(Err(Error::engine(format!("unexpected content at offset {}", start))));
        }

        let start = self.position;
        let record = self
            .record_end(start)
            .and_then(|end| {
                self.position = end;
                self.parse_record(start, end)
            });
        if record.is_err() {
            self.position = self.data.len();
        }
        Some(record)
    }
}

/// Channels a partitioning run reports to.
#[derive(Clone)]
struct TilerChannels {
    geometry: EventChannel<GeometryChunk>,
    assets: EventChannel<Vec<AssetRecord>>,
    loaded: EventChannel<Vec<u8>>,
}

/// Geometry chunk under construction.
#[derive(Default)]
struct PendingChunk {
    chunk: GeometryChunk,
}

impl PendingChunk {
    fn push(&mut self, record: &StepRecord<'_>, predefined_type: Option<&str>) {
        let offset = self.chunk.buffer.len();
        self.chunk.buffer.extend_from_slice(record.bytes);
        self.chunk.buffer.push(b'\n');

        let mut metadata = ElementMetadata::new();
        metadata.insert("entity".into(), Value::from(record.entity.as_str()));
        if let Some(pt) = predefined_type {
            metadata.insert("predefinedType".into(), Value::from(pt));
        }
        metadata.insert("offset".into(), Value::from(offset));
        metadata.insert("length".into(), Value::from(record.bytes.len()));
        self.chunk.data.insert(record.id.to_string(), metadata);
    }

    fn len(&self) -> usize {
        self.chunk.data.len()
    }

    fn take(&mut self) -> GeometryChunk {
        std::mem::take(&mut self.chunk)
    }
}

/// Split `buffer` and report the pieces on `channels`.
fn partition(buffer: &[u8], settings: &TilerSettings, channels: &TilerChannels) -> Result<()> {
    if !buffer.trim_ascii_start().starts_with(STEP_MAGIC) {
        return Err(Error::engine("not an ISO-10303-21 file"));
    }
    let data_start = memmem::find(buffer, DATA_SECTION)
        .map(|i| i + DATA_SECTION.len())
        .ok_or_else(|| Error::engine("missing DATA section"))?;

    let min_geometry = settings.min_geometry_size.max(1);
    let min_assets = settings.min_assets_size.max(1);

    let mut global = Vec::with_capacity(buffer.len() / 4);
    global.extend_from_slice(&buffer[..data_start]);
    global.push(b'\n');

    let mut pending = PendingChunk::default();
    let mut assets: Vec<AssetRecord> = Vec::new();
    let mut chunks = 0usize;
    let mut elements = 0usize;

    for record in RecordScanner::new(&buffer[data_start..]) {
        let record = record?;
        if !is_geometry_entity(&record.entity) {
            global.extend_from_slice(record.bytes);
            global.push(b'\n');
            continue;
        }

        let predefined_type = record.predefined_type();
        pending.push(&record, predefined_type.as_deref());
        assets.push(json!({
            "id": record.id,
            "entity": record.entity,
            "predefinedType": predefined_type,
        }));
        elements += 1;

        if pending.len() >= min_geometry {
            channels.geometry.emit(&pending.take());
            chunks += 1;
        }
        if assets.len() >= min_assets {
            channels.assets.emit(&std::mem::take(&mut assets));
        }
    }

    if pending.len() > 0 {
        channels.geometry.emit(&pending.take());
        chunks += 1;
    }
    if !assets.is_empty() {
        channels.assets.emit(&assets);
    }

    global.extend_from_slice(TRAILER);
    tracing::debug!(elements, chunks, global_bytes = global.len(), "Partitioned STEP buffer");
    channels.loaded.emit(&global);
    Ok(())
}

/// Tiling engine for STEP-encoded IFC buffers.
///
/// Listeners are shared by every run, so concurrent runs on one instance would
/// interleave their events. Serialize runs or use one instance per pipeline.
pub struct StepTiler {
    settings: Mutex<TilerSettings>,
    channels: TilerChannels,
}

impl StepTiler {
    pub fn new() -> Self {
        Self {
            settings: Mutex::new(TilerSettings::default()),
            channels: TilerChannels {
                geometry: EventChannel::new("geometry-streamed"),
                assets: EventChannel::new("asset-streamed"),
                loaded: EventChannel::new("ifc-loaded"),
            },
        }
    }

    /// Settings the next run will use.
    pub fn settings(&self) -> TilerSettings {
        self.settings.lock().clone()
    }
}

impl Default for StepTiler {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryTiler for StepTiler {
    fn configure(&self, settings: &TilerSettings) {
        *self.settings.lock() = settings.clone();
    }

    fn on_geometry_streamed(&self) -> &EventChannel<GeometryChunk> {
        &self.channels.geometry
    }

    fn on_asset_streamed(&self) -> &EventChannel<Vec<AssetRecord>> {
        &self.channels.assets
    }

    fn on_ifc_loaded(&self) -> &EventChannel<Vec<u8>> {
        &self.channels.loaded
    }

    fn stream_from_buffer<'a>(&'a self, buffer: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        let settings = self.settings();
        let channels = self.channels.clone();
        let data = buffer.to_vec();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || partition(&data, &settings, &channels))
                .await
                .map_err(|e| Error::engine(format!("tiling task failed: {}", e)))?
        })
    }
}
