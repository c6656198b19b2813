use std::{
    fmt,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};

/// Hash algorithms supported for data file digests and manifest imprints.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
pub enum HashAlgorithm {
    /// SHA-256 (default)
    #[default]
    #[serde(rename = "SHA256", alias = "sha256")]
    #[strum(to_string = "SHA256", serialize = "sha256")]
    Sha256,
    /// SHA-512
    #[serde(rename = "SHA512", alias = "sha512")]
    #[strum(to_string = "SHA512", serialize = "sha512")]
    Sha512,
}

impl HashAlgorithm {
    /// Identifier byte prefixed to imprints submitted for signing.
    pub fn id(self) -> u8 {
        match self {
            HashAlgorithm::Sha256 => 0x01,
            HashAlgorithm::Sha512 => 0x05,
        }
    }

    /// Length in bytes of digests produced by this algorithm.
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Hashes everything readable from `reader`.
    pub fn hash_reader<R: Read>(self, reader: &mut R) -> io::Result<Vec<u8>> {
        match self {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                io::copy(reader, &mut hasher)?;
                Ok(hasher.finalize().to_vec())
            }
            HashAlgorithm::Sha512 => {
                let mut hasher = Sha512::new();
                io::copy(reader, &mut hasher)?;
                Ok(hasher.finalize().to_vec())
            }
        }
    }

    /// Hashes an in-memory buffer.
    pub fn hash_bytes(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Hex digest of a single file together with the algorithm that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    /// Algorithm used
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest
    pub hex: String,
}

/// Computes the digest of the file at `path`.
///
/// The result depends only on the file content, never on its path.
///
/// # Arguments
///
/// * `path` - File to hash.
/// * `algorithm` - Hash algorithm to use.
///
/// # Returns
///
/// The hex digest and algorithm, or an I/O error if the file cannot be read.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<FileDigest> {
    let file = File::open(path).map_err(Error::io(path))?;
    let mut reader = BufReader::new(file);
    let digest = algorithm
        .hash_reader(&mut reader)
        .map_err(Error::io(path))?;

    log::trace!("{algorithm} digest of {}", path.display());

    Ok(FileDigest {
        algorithm,
        hex: hex::encode(digest),
    })
}

/// Algorithm-tagged digest submitted to a signing authority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Imprint {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Imprint {
    /// Creates an imprint from an existing digest.
    ///
    /// Returns `None` if the digest length doesn't match the algorithm.
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Option<Self> {
        (digest.len() == algorithm.digest_len()).then_some(Self { algorithm, digest })
    }

    /// Computes the imprint of the file at `path`.
    pub fn of_file(path: &Path, algorithm: HashAlgorithm) -> Result<Self> {
        let file = File::open(path).map_err(Error::io(path))?;
        let digest = algorithm
            .hash_reader(&mut BufReader::new(file))
            .map_err(Error::io(path))?;
        Ok(Self { algorithm, digest })
    }

    /// Algorithm that produced the digest.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes, without the algorithm identifier.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Algorithm identifier byte followed by the digest.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.digest.len() + 1);
        bytes.push(self.algorithm.id());
        bytes.extend_from_slice(&self.digest);
        bytes
    }

    /// Lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

impl fmt::Display for Imprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}
