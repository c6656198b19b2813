use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};

use crate::{
    archive::{ArchiveEntry, ArchiveService},
    container::ContainerState,
    error::{Error, Result},
    manifest::{artifact_kind, is_metadata_path, ArtifactKind, SignatureIndex},
    signature::SignatureCreator,
    workspace::Workspace,
};

/// Adds and removes signatures on existing containers.
///
/// Every operation extracts the container into its own workspace, mutates
/// the extracted tree and rebuilds the container in place. The file on disk
/// is replaced only by a complete rebuild.
#[derive(Clone)]
pub struct ContainerSigner {
    signatures: Arc<dyn SignatureCreator>,
    archive: Arc<dyn ArchiveService>,
    scratch_dir: Option<PathBuf>,
}

/// Tracks one operation through extract, mutate and rebuild.
struct Transition<'a> {
    operation: &'static str,
    container: &'a Path,
    state: ContainerState,
}

impl<'a> Transition<'a> {
    fn start(operation: &'static str, container: &'a Path) -> Self {
        debug!("{operation} {}: {}", container.display(), ContainerState::Intact);
        Self {
            operation,
            container,
            state: ContainerState::Intact,
        }
    }

    fn advance(&mut self, next: ContainerState) {
        debug!(
            "{} {}: {} -> {next}",
            self.operation,
            self.container.display(),
            self.state
        );
        self.state = next;
    }

    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!(
                "{} {} failed while {}: {e}",
                self.operation,
                self.container.display(),
                self.state
            );
            self.advance(ContainerState::Failed);
        }
        result
    }
}

impl ContainerSigner {
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

    /// Indices of the signature entries in the container, ascending.
    ///
    /// Reads entry names only; nothing is extracted.
    pub fn list_signatures(&self, container_path: &Path) -> Result<Vec<SignatureIndex>> {
        Ok(super::list(self.archive.as_ref(), container_path)?.signatures)
    }

    /// Adds a new signature entry to the container at `container_path`.
    ///
    /// The new manifest covers every data file currently in the container.
    /// Existing entries are carried over byte-for-byte.
    ///
    /// # Returns
    ///
    /// Index of the new entry: one past the highest index present.
    pub async fn add_signature(&self, container_path: &Path) -> Result<SignatureIndex> {
        let mut transition = Transition::start("add-signature", container_path);
        let result = self.add_signature_in(&mut transition, container_path).await;
        transition.finish(result)
    }

    async fn add_signature_in(
        &self,
        transition: &mut Transition<'_>,
        container_path: &Path,
    ) -> Result<SignatureIndex> {
        let workspace = Workspace::acquire(self.scratch_dir.as_deref())?;

        let mut file_paths = self.archive.extract(container_path, workspace.root())?;
        transition.advance(ContainerState::Extracted);

        let index = next_index(&file_paths)?;
        let data_files = data_files(&workspace, &file_paths);
        debug!(
            "signing {} data file(s) as entry {index}",
            data_files.len()
        );

        let files = self
            .signatures
            .new_signature(&workspace, &data_files, &index.manifest_name())
            .await?;
        file_paths.push(files.manifest_path);
        file_paths.push(files.signature_path);
        transition.advance(ContainerState::Mutated);

        let entries = workspace_entries(&workspace, &file_paths)?;
        self.archive.create_archive(&entries, container_path)?;
        transition.advance(ContainerState::Rebuilt);

        info!(
            "added signature {index} to {}",
            container_path.display()
        );
        Ok(index)
    }

    /// Removes the signature entry `signature_id` from the container.
    ///
    /// Data files and every other entry are left as they are.
    ///
    /// # Arguments
    ///
    /// * `container_path` - Container to modify in place.
    /// * `signature_id` - Index `N` of `META-INF/manifest<N>.json`.
    pub async fn remove_signature(&self, container_path: &Path, signature_id: u32) -> Result<()> {
        let mut transition = Transition::start("remove-signature", container_path);
        let result = self.remove_signature_in(&mut transition, container_path, signature_id);
        transition.finish(result)
    }

    fn remove_signature_in(
        &self,
        transition: &mut Transition<'_>,
        container_path: &Path,
        signature_id: u32,
    ) -> Result<()> {
        let workspace = Workspace::acquire(self.scratch_dir.as_deref())?;

        let file_paths = self.archive.extract(container_path, workspace.root())?;
        transition.advance(ContainerState::Extracted);

        let manifest_path = SignatureIndex::new(signature_id)
            .and_then(|index| {
                file_paths
                    .iter()
                    .find(|path| artifact_kind(path) == Some((ArtifactKind::Manifest, index)))
            })
            .cloned()
            .ok_or(Error::SignatureNotFound { id: signature_id })?;
        let mut signature_path = manifest_path.as_os_str().to_owned();
        signature_path.push(".sig");
        let signature_path = PathBuf::from(signature_path);

        fs::remove_file(&manifest_path).map_err(Error::io(&manifest_path))?;
        fs::remove_file(&signature_path).map_err(Error::io(&signature_path))?;

        let remaining: Vec<PathBuf> = file_paths
            .into_iter()
            .filter(|path| *path != manifest_path && *path != signature_path)
            .collect();
        transition.advance(ContainerState::Mutated);

        let entries = workspace_entries(&workspace, &remaining)?;
        self.archive.create_archive(&entries, container_path)?;
        transition.advance(ContainerState::Rebuilt);

        info!(
            "removed signature {signature_id} from {}",
            container_path.display()
        );
        Ok(())
    }
}

/// One past the highest signature index among `file_paths`.
fn next_index(file_paths: &[PathBuf]) -> Result<SignatureIndex> {
    let highest = file_paths
        .iter()
        .filter_map(|path| artifact_kind(path))
        .filter(|(kind, _)| *kind == ArtifactKind::Signature)
        .map(|(_, index)| index)
        .max();

    match highest {
        None => Ok(SignatureIndex::FIRST),
        Some(index) => index
            .next()
            .ok_or_else(|| Error::Archive(format!("signature index {index} cannot be exceeded"))),
    }
}

/// Archive entries for files inside the workspace, named by their place in it.
fn workspace_entries(workspace: &Workspace, file_paths: &[PathBuf]) -> Result<Vec<ArchiveEntry>> {
    file_paths
        .iter()
        .map(|path| ArchiveEntry::relative_to(workspace.root(), path))
        .collect()
}

/// Extracted paths that are not under the metadata directory.
fn data_files(workspace: &Workspace, file_paths: &[PathBuf]) -> Vec<PathBuf> {
    file_paths
        .iter()
        .filter(|path| {
            let relative = path.strip_prefix(workspace.root()).unwrap_or(path.as_path());
            !is_metadata_path(relative)
        })
        .cloned()
        .collect()
}
