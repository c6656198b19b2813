use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use tempfile::TempDir;

use crate::{
    error::{Error, Result},
    manifest::METADATA_DIR,
};

const WORKSPACE_PREFIX: &str = "signed-container-";

/// Uniquely named scratch directory owned by a single container operation.
///
/// The directory, including everything extracted or produced in it, is
/// removed when the workspace is dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    metadata_dir: PathBuf,
}

impl Workspace {
    /// Creates a workspace in the system temporary directory.
    pub fn new() -> Result<Self> {
        Self::new_in(std::env::temp_dir())
    }

    /// Creates a workspace under `base`, creating `base` if needed.
    pub fn new_in(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        fs::create_dir_all(base).map_err(Error::io(base))?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(base)
            .map_err(Error::io(base))?;

        let metadata_dir = dir.path().join(METADATA_DIR);
        fs::create_dir_all(&metadata_dir).map_err(Error::io(&metadata_dir))?;

        debug!("created workspace {}", dir.path().display());

        Ok(Self { dir, metadata_dir })
    }

    /// Creates a workspace under `base` when given, else in the system temporary directory.
    pub fn acquire(base: Option<&Path>) -> Result<Self> {
        match base {
            Some(base) => Self::new_in(base),
            None => Self::new(),
        }
    }

    /// Root of the workspace; data files are extracted here.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// `<root>/META-INF`
    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Removes the workspace now, reporting failures instead of ignoring them.
    pub fn close(self) -> Result<()> {
        let root = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            warn!("failed to remove workspace {}: {e}", root.display());
            Error::io(&root)(e)
        })?;
        debug!("removed workspace {}", root.display());
        Ok(())
    }
}
