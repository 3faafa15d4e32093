//! Error types for cardgen

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cardgen operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Layer {0} has no default prim")]
    MissingDefaultPrim(String),

    #[error("Degenerate bounding box: {0}")]
    DegenerateBounds(String),

    #[error("{program} exited with {status}")]
    ToolFailed { program: String, status: String },

    #[error("Failed to launch {program}: {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Rendered image not found: {}", .0.display())]
    MissingImage(PathBuf),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Result type alias for cardgen operations
pub type Result<T> = std::result::Result<T, Error>;
