use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors returned by container operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A file or directory could not be opened, read or written.
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The archive is malformed or cannot be built from the given inputs.
    #[error("archive error: {0}")]
    Archive(String),

    /// No signature entry with the requested index exists in the container.
    #[error("signature with id '{id}' not found")]
    SignatureNotFound {
        /// Requested signature index
        id: u32,
    },

    /// The signing authority failed to produce a signature.
    #[error("signing failed: {0:#}")]
    Signing(#[source] anyhow::Error),

    /// The signature object returned by the authority could not be encoded.
    #[error("failed to encode signature: {0:#}")]
    SignatureEncoding(#[source] anyhow::Error),

    /// A manifest or settings document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A container was requested without any data files.
    #[error("a container requires at least one data file")]
    EmptyContainer,

    /// Settings are missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Returns a mapper that attaches `path` to an [`io::Error`].
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}
