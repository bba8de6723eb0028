//! The crate's single error type. Every fallible public function returns
//! `Result<T, Error>`; low-level read errors bubble up via `?`, per-DVA and
//! per-label retries are internal loops that only surface an `Error` once
//! every candidate has been exhausted.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error at {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid block pointer or DVA: {0}")]
    InvalidPointer(String),

    #[error("corrupt on-disk structure: {0}")]
    Corrupt(String),

    #[error("corrupt compressed block: {0}")]
    CorruptCompressed(String),

    #[error("unsupported on-disk feature: {0}")]
    Unsupported(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to write output path {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error::Io { context: context.into(), source }
    }
}
