// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the tiling pipeline.

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure class, used by callers to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required engine component is missing. Never retried.
    Configuration,
    /// Tiling failed or produced nothing usable.
    Generation,
    /// The pipeline produced a dangling reference. Indicates a bug.
    AssemblyInvariant,
    /// Tile persistence failed.
    Storage,
    /// A lifecycle listener or disposal step failed.
    Lifecycle,
    /// Reading input failed.
    Io,
}

/// Errors that can occur while turning a model buffer into a streaming descriptor
#[derive(Error, Debug)]
pub enum Error {
    /// Rejection from the tiling engine, carried with its message unchanged.
    #[error("{0}")]
    Engine(String),

    #[error("geometry tiler unavailable")]
    TilerUnavailable,

    #[error("model buffer is empty")]
    EmptyBuffer,

    #[error("no tiles generated")]
    NoTilesGenerated,

    #[error("tiling engine emitted global data more than once")]
    DuplicateGlobalData,

    #[error("tiling engine emitted {0} geometry tiles but no global data")]
    MissingGlobalData(usize),

    #[error("tile file {0} appears more than once in the result")]
    DuplicateTile(String),

    #[error("tile file {0} has no handle in the tile store")]
    UnresolvedTile(String),

    #[error("tile store error: {0}")]
    Store(String),
}

impl Error {
    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TilerUnavailable => ErrorKind::Configuration,
            Error::Engine(_)
            | Error::EmptyBuffer
            | Error::NoTilesGenerated
            | Error::DuplicateGlobalData
            | Error::MissingGlobalData(_) => ErrorKind::Generation,
            Error::UnresolvedTile(_) => ErrorKind::AssemblyInvariant,
            Error::DuplicateTile(_) | Error::Store(_) => ErrorKind::Storage,
        }
    }

    /// Wrap an engine rejection without altering its message.
    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine(message.into())
    }
}
