//! Error types for raster ingestion and the terrain pipeline.
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by raster I/O and the terrain-analysis steps.
#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("input not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("unsupported raster format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported boundary condition: {0:?}")]
    UnsupportedBoundary(String),

    #[error("raster grids differ: {expected} vs {found}")]
    GridMismatch { expected: String, found: String },

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl TerrainError {
    /// Classify an `io::Error` raised while reading input `path`. Anything
    /// but a missing file (permissions, a directory in its place, ...) makes
    /// the input unreadable.
    pub(crate) fn from_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            TerrainError::NotFound { path }
        } else {
            TerrainError::Unreadable { path, source }
        }
    }

    pub(crate) fn from_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TerrainError::Io { path: path.into(), source }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TerrainError::Format { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, TerrainError>;
