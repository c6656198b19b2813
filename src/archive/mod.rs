use std::path::{Component, Path, PathBuf};

use crate::{
    error::{Error, Result},
    manifest::{artifact_kind, base_name, METADATA_DIR},
};

pub mod zip_archive;

pub use zip_archive::ZipArchive;

/// A file to store in a container together with its entry name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File on disk providing the entry content
    pub source: PathBuf,
    /// `/`-separated name inside the archive
    pub name: String,
}

impl ArchiveEntry {
    /// Entry for a caller-supplied file.
    ///
    /// Manifest artifacts are stored under [`METADATA_DIR`], all other files
    /// under their base name.
    pub fn flattened(path: &Path) -> Result<Self> {
        Ok(Self {
            source: path.to_path_buf(),
            name: entry_name(path)?,
        })
    }

    /// Entry for a file extracted into, or produced in, `root`.
    ///
    /// The entry name is the path relative to `root`, so rebuilding an
    /// extracted container keeps every entry where it was. Relative paths are
    /// taken as already relative to `root`.
    pub fn relative_to(root: &Path, path: &Path) -> Result<Self> {
        let relative = path.strip_prefix(root).unwrap_or(path);

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                    Error::Archive(format!("entry path '{}' is not UTF-8", path.display()))
                })?),
                Component::CurDir => {}
                _ => {
                    return Err(Error::Archive(format!(
                        "'{}' lies outside '{}'",
                        path.display(),
                        root.display()
                    )))
                }
            }
        }
        if parts.is_empty() {
            return Err(Error::Archive(format!(
                "'{}' does not name a file",
                path.display()
            )));
        }

        Ok(Self {
            source: path.to_path_buf(),
            name: parts.join("/"),
        })
    }
}

/// Archive codec used to build and unpack containers.
pub trait ArchiveService: Send + Sync {
    /// Writes every entry into a single archive at `destination`.
    ///
    /// An existing archive at `destination` is replaced only once the new one
    /// is complete.
    fn create_archive(&self, entries: &[ArchiveEntry], destination: &Path) -> Result<()>;

    /// Unpacks `archive` into the `destination` directory.
    ///
    /// Returns the extracted file paths; directory entries are created but not
    /// returned. Cleanup of `destination` is up to the caller.
    fn extract(&self, archive: &Path, destination: &Path) -> Result<Vec<PathBuf>>;

    /// Lists file entry names without extracting anything.
    fn entries(&self, archive: &Path) -> Result<Vec<String>>;
}

/// Name under which a caller-supplied `path` is stored in a container.
pub fn entry_name(path: &Path) -> Result<String> {
    let name = base_name(path)?;
    if artifact_kind(path).is_some() {
        Ok(format!("{METADATA_DIR}/{name}"))
    } else {
        Ok(name)
    }
}
