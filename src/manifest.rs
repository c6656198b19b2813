use std::{
    fmt, fs,
    io::{self, ErrorKind},
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    digest::{hash_file, HashAlgorithm},
    error::{Error, Result},
    workspace::Workspace,
};

/// Reserved folder holding manifest and signature files inside a container.
pub const METADATA_DIR: &str = "META-INF";

const MANIFEST_PREFIX: &str = "manifest";
const MANIFEST_SUFFIX: &str = ".json";
const SIGNATURE_SUFFIX: &str = ".sig";

/// Manifest document listing data file digests for one signature entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Data files covered by the signature
    pub files: Vec<DataFile>,
    /// Archive path of the paired signature file
    pub signature_uri: String,
}

/// Reference to one data file in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFile {
    /// Base name of the file as stored in the archive
    pub uri: String,
    /// Name of the hash algorithm
    ///
    /// Only names of [`HashAlgorithm`] variants are accepted; a manifest
    /// naming any other algorithm fails to parse.
    pub hash_algorithm: HashAlgorithm,
    /// Hex-encoded digest of the file content
    pub hash: String,
}

impl Manifest {
    /// Builds a manifest over `file_paths`.
    ///
    /// # Arguments
    ///
    /// * `file_paths` - Data files to reference, in order.
    /// * `manifest_name` - File name of the manifest, used to derive the signature URI.
    /// * `algorithm` - Hash algorithm for the file digests.
    ///
    /// # Returns
    ///
    /// The manifest, or the hashing error of the first file that cannot be read.
    pub fn build<P: AsRef<Path>>(
        file_paths: &[P],
        manifest_name: &str,
        algorithm: HashAlgorithm,
    ) -> Result<Self> {
        let files = file_paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let digest = hash_file(path, algorithm)?;
                Ok(DataFile {
                    uri: base_name(path)?,
                    hash_algorithm: digest.algorithm,
                    hash: digest.hex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            files,
            signature_uri: format!("{METADATA_DIR}/{manifest_name}{SIGNATURE_SUFFIX}"),
        })
    }

    /// Serializes the manifest as pretty-printed JSON.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Parses a manifest document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reads a manifest from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(Error::io(path))?;
        Self::from_slice(&bytes)
    }

    /// Writes the manifest into the workspace metadata folder.
    ///
    /// # Returns
    ///
    /// Path of the written manifest file.
    pub fn write(&self, workspace: &Workspace, manifest_name: &str) -> Result<PathBuf> {
        let path = workspace.metadata_dir().join(manifest_name);
        fs::write(&path, self.to_json_bytes()?).map_err(Error::io(&path))?;
        log::debug!(
            "wrote manifest {} covering {} file(s)",
            path.display(),
            self.files.len()
        );
        Ok(path)
    }
}

/// Index shared by a manifest and its signature file, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureIndex(NonZeroU32);

impl SignatureIndex {
    /// Index of the signature created together with a container.
    pub const FIRST: SignatureIndex = SignatureIndex(NonZeroU32::MIN);

    /// Returns `None` for 0.
    pub fn new(index: u32) -> Option<Self> {
        NonZeroU32::new(index).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The following index, or `None` on overflow.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// `manifest<N>.json`
    pub fn manifest_name(self) -> String {
        format!("{MANIFEST_PREFIX}{}{MANIFEST_SUFFIX}", self.0)
    }

    /// `manifest<N>.json.sig`
    pub fn signature_name(self) -> String {
        format!("{}{SIGNATURE_SUFFIX}", self.manifest_name())
    }

    /// Parses a manifest file name. Only the canonical form is accepted.
    pub fn from_manifest_name(name: &str) -> Option<Self> {
        let digits = name
            .strip_prefix(MANIFEST_PREFIX)?
            .strip_suffix(MANIFEST_SUFFIX)?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        digits.parse().ok().and_then(Self::new)
    }

    /// Parses a signature file name.
    pub fn from_signature_name(name: &str) -> Option<Self> {
        Self::from_manifest_name(name.strip_suffix(SIGNATURE_SUFFIX)?)
    }
}

impl fmt::Display for SignatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which half of a signature entry a file is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Manifest,
    Signature,
}

/// Classifies `path` as a manifest artifact.
///
/// A path qualifies when it lives directly in a [`METADATA_DIR`] folder and
/// its file name is a canonical manifest or signature name.
pub fn artifact_kind(path: &Path) -> Option<(ArtifactKind, SignatureIndex)> {
    let parent = path.parent()?.file_name()?;
    if parent != METADATA_DIR {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    SignatureIndex::from_manifest_name(name)
        .map(|index| (ArtifactKind::Manifest, index))
        .or_else(|| {
            SignatureIndex::from_signature_name(name).map(|index| (ArtifactKind::Signature, index))
        })
}

/// Whether an archive-relative `path` lives under [`METADATA_DIR`].
pub fn is_metadata_path(path: &Path) -> bool {
    path.components()
        .next()
        .is_some_and(|component| component.as_os_str() == METADATA_DIR)
}

/// UTF-8 file name of `path`.
pub(crate) fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| Error::Io {
            path: path.to_path_buf(),
            source: io::Error::new(ErrorKind::InvalidInput, "path has no UTF-8 file name"),
        })
}
