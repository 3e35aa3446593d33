// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Input files selected for import.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Source {
    Memory(Arc<[u8]>),
    Disk(PathBuf),
}

/// An IFC file to import, either already in memory or on disk.
#[derive(Debug, Clone)]
pub struct IfcFile {
    name: String,
    size: u64,
    source: Source,
}

impl IfcFile {
    /// Wrap an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: Source::Memory(bytes),
        }
    }

    /// Reference a file on disk. Only its metadata is read here.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model.ifc")
            .to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            source: Source::Disk(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the whole file into a buffer.
    pub async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            Source::Memory(bytes) => Ok(bytes.to_vec()),
            Source::Disk(path) => tokio::fs::read(path).await.map_err(|source| Error::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disk_file_reports_name_and_size() {
        let dir = std::env::temp_dir().join(format!("ifc-stream-file-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("house.ifc");
        tokio::fs::write(&path, b"ISO-10303-21;").await.unwrap();

        let file = IfcFile::open(&path).await.unwrap();
        assert_eq!(file.name(), "house.ifc");
        assert_eq!(file.size(), 13);
        assert_eq!(file.read().await.unwrap(), b"ISO-10303-21;");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = IfcFile::open("/definitely/not/here.ifc").await.unwrap_err();
        assert_eq!(err.kind(), ifc_stream_core::ErrorKind::Io);
    }
}
