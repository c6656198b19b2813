use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use p256::ecdsa::{signature::Signer as _, Signature, SigningKey};
use serde::{Deserialize, Serialize};

use crate::{
    authority::{SignatureObject, SigningAuthority},
    digest::Imprint,
};

/// Signing authority backed by a P-256 key held in process.
///
/// Useful offline and in tests; the produced signature is a JSON document
/// carrying the imprint, the public key and a DER-encoded ECDSA signature.
/// Library only: the command-line tool always signs through `HttpAuthority`.
#[derive(Clone)]
pub struct LocalKeyAuthority {
    signing_key: SigningKey,
}

/// Signature document produced by [`LocalKeyAuthority`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSignature {
    /// Signature algorithm, always `ES256`
    pub algorithm: String,
    /// Hex-encoded imprint bytes that were signed
    pub imprint: String,
    /// Hex-encoded compressed SEC1 public key
    pub public_key: String,
    /// Base64-encoded DER ECDSA signature
    pub signature: String,
}

impl LocalKeyAuthority {
    /// Creates an authority with a randomly generated key.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        Self { signing_key }
    }

    /// Imports a 32-byte secret key.
    ///
    /// # Arguments
    ///
    /// * `secret_key` - Raw P-256 secret scalar.
    pub fn import(secret_key: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(secret_key)
            .map_err(|e| anyhow!("Invalid P-256 secret key: {e}"))?;
        Ok(Self { signing_key })
    }

    /// Hex-encoded compressed SEC1 public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(
            self.signing_key
                .verifying_key()
                .to_encoded_point(true)
                .as_bytes(),
        )
    }
}

impl std::fmt::Debug for LocalKeyAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyAuthority")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

#[async_trait]
impl SigningAuthority for LocalKeyAuthority {
    async fn sign(&self, imprint: &Imprint) -> Result<Box<dyn SignatureObject>> {
        log::trace!("Signing {imprint} with local P-256 key");
        let imprint_bytes = imprint.to_bytes();
        let signature: Signature = self.signing_key.sign(&imprint_bytes);

        Ok(Box::new(LocalSignature {
            algorithm: "ES256".to_owned(),
            imprint: hex::encode(imprint_bytes),
            public_key: self.public_key_hex(),
            signature: BASE64.encode(signature.to_der().as_bytes()),
        }))
    }
}

impl SignatureObject for LocalSignature {
    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
