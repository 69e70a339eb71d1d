//! Error type for generation passes.

use crate::diagnostics::Diagnostics;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a generation pass.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more schema violations; nothing was written.
    #[error("{0}")]
    Schema(Diagnostics),

    #[error("invalid declarations in {path}: {message}")]
    Input { path: PathBuf, message: String },

    #[error("unsupported declaration format: {0} (expected .json, .yaml or .yml)")]
    Format(String),

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<Diagnostics> for Error {
    fn from(diagnostics: Diagnostics) -> Self {
        Error::Schema(diagnostics)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
