use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;

use crate::{
    archive::{ArchiveEntry, ArchiveService},
    error::{Error, Result},
    manifest::SignatureIndex,
    signature::SignatureCreator,
    workspace::Workspace,
};

/// Creates new containers carrying their first signature.
#[derive(Clone)]
pub struct Creator {
    signatures: Arc<dyn SignatureCreator>,
    archive: Arc<dyn ArchiveService>,
    scratch_dir: Option<PathBuf>,
}

impl Creator {
    pub fn new(signatures: Arc<dyn SignatureCreator>, archive: Arc<dyn ArchiveService>) -> Self {
        Self {
            signatures,
            archive,
            scratch_dir: None,
        }
    }

    /// Places scratch workspaces under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// Creates a container at `container_path` holding `file_paths` and signs it.
    ///
    /// The signature entry gets index 1. The scratch workspace is removed
    /// whether or not the operation succeeds.
    ///
    /// # Arguments
    ///
    /// * `file_paths` - Data files to add; stored under their base names.
    /// * `container_path` - Destination of the container.
    pub async fn create(&self, file_paths: &[PathBuf], container_path: &Path) -> Result<()> {
        if file_paths.is_empty() {
            return Err(Error::EmptyContainer);
        }

        let workspace = Workspace::acquire(self.scratch_dir.as_deref())?;

        let files = self
            .signatures
            .new_signature(
                &workspace,
                file_paths,
                &SignatureIndex::FIRST.manifest_name(),
            )
            .await?;

        let mut entries = file_paths
            .iter()
            .map(|path| ArchiveEntry::flattened(path))
            .collect::<Result<Vec<_>>>()?;
        entries.push(ArchiveEntry::relative_to(workspace.root(), &files.manifest_path)?);
        entries.push(ArchiveEntry::relative_to(workspace.root(), &files.signature_path)?);

        self.archive.create_archive(&entries, container_path)?;

        info!(
            "created container {} with {} data file(s)",
            container_path.display(),
            file_paths.len()
        );
        Ok(())
    }
}
