// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for model loading and lifecycle management.

use ifc_stream_core::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

/// Result type for viewer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the streaming service, loaders and lifecycle coordinator
#[derive(Error, Debug)]
pub enum Error {
    #[error("streamer unavailable")]
    StreamerUnavailable,

    #[error("IFC loader not found")]
    LoaderUnavailable,

    #[error("clipper not found")]
    ClipperUnavailable,

    #[error("model streaming settings not found")]
    StreamingSettingsMissing,

    /// Failure in tile generation, storage or assembly.
    #[error(transparent)]
    Pipeline(#[from] ifc_stream_core::Error),

    /// Rejection from the render/streaming engine, message unchanged.
    #[error("{0}")]
    Engine(String),

    #[error("model {0} is still loading")]
    LoadInProgress(Uuid),

    #[error("failed to delete model {0}")]
    DeleteFailed(Uuid),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::StreamerUnavailable
            | Error::LoaderUnavailable
            | Error::ClipperUnavailable
            | Error::StreamingSettingsMissing => ErrorKind::Configuration,
            Error::LoadInProgress(_) | Error::DeleteFailed(_) => ErrorKind::Lifecycle,
            Error::Pipeline(inner) => inner.kind(),
            Error::Engine(_) => ErrorKind::Generation,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    /// Wrap a render engine rejection without altering its message.
    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine(message.into())
    }
}
