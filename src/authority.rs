/// Remote signing authority reached over HTTP
#[cfg(feature = "authority-http")]
pub mod http_authority;
/// In-process P-256 signing authority
#[cfg(feature = "authority-local")]
pub mod local_authority;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

#[cfg(feature = "authority-http")]
pub use http_authority::*;
#[cfg(feature = "authority-local")]
pub use local_authority::*;

use crate::digest::Imprint;

/// Service that turns an imprint into an opaque, serializable signature.
///
/// Transport, authentication and the signing protocol are the
/// implementation's concern; callers only submit imprints.
#[async_trait]
pub trait SigningAuthority: Send + Sync {
    /// Signs the provided imprint.
    ///
    /// # Arguments
    ///
    /// * `imprint` - Algorithm-tagged digest to sign.
    ///
    /// # Returns
    ///
    /// The signature object returned by the authority.
    async fn sign(&self, imprint: &Imprint) -> Result<Box<dyn SignatureObject>>;
}

/// Signature produced by a [`SigningAuthority`].
pub trait SignatureObject: Send + Sync + fmt::Debug {
    /// Encodes the signature for storage next to its manifest.
    fn serialize(&self) -> Result<Vec<u8>>;
}

/// Signature that is already in its stored form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSignature(pub Vec<u8>);

impl SignatureObject for RawSignature {
    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}
