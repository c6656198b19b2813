//! Signed data containers.
//!
//! A container is a compressed archive holding data files plus one or more
//! signature entries. Each entry is a JSON manifest listing the data files
//! and their digests, paired with a signature over the manifest issued by an
//! external signing authority.

/// Archive codec used to pack and unpack containers
pub mod archive;

/// Signing authority boundary and its implementations
pub mod authority;

/// Settings file loading
pub mod config;

/// Container creation and signature management
pub mod container;

/// File digests and imprints
pub mod digest;

/// Library error type
pub mod error;

/// Manifest documents and signature entry naming
pub mod manifest;

/// Manifest creation and signing
pub mod signature;

/// Per-operation scratch directories
pub mod workspace;

#[cfg(test)]
mod mock;

pub use container::{ContainerSigner, Creator};
pub use error::{Error, Result};
pub use manifest::SignatureIndex;
