//! Hand-written collaborator doubles for container tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    archive::{ArchiveEntry, ArchiveService},
    authority::{RawSignature, SignatureObject, SigningAuthority},
    digest::Imprint,
    error::Result,
    signature::{SignatureCreator, SignatureFiles},
    workspace::Workspace,
};

type CreateArchiveFn = Box<dyn Fn(&[ArchiveEntry], &Path) -> Result<()> + Send + Sync>;
type ExtractFn = Box<dyn Fn(&Path, &Path) -> Result<Vec<PathBuf>> + Send + Sync>;
type EntriesFn = Box<dyn Fn(&Path) -> Result<Vec<String>> + Send + Sync>;
type NewSignatureFn =
    Box<dyn Fn(&Workspace, &[PathBuf], &str) -> Result<SignatureFiles> + Send + Sync>;

#[derive(Default)]
pub(crate) struct ArchiveServiceMock {
    pub create_archive_fn: Option<CreateArchiveFn>,
    pub extract_fn: Option<ExtractFn>,
    pub entries_fn: Option<EntriesFn>,
}

impl ArchiveService for ArchiveServiceMock {
    fn create_archive(&self, entries: &[ArchiveEntry], destination: &Path) -> Result<()> {
        let f = self
            .create_archive_fn
            .as_ref()
            .expect("create_archive_fn is uninitialized!");
        f(entries, destination)
    }

    fn extract(&self, archive: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
        let f = self
            .extract_fn
            .as_ref()
            .expect("extract_fn is uninitialized!");
        f(archive, destination)
    }

    fn entries(&self, archive: &Path) -> Result<Vec<String>> {
        let f = self
            .entries_fn
            .as_ref()
            .expect("entries_fn is uninitialized!");
        f(archive)
    }
}

#[derive(Default)]
pub(crate) struct SignatureCreatorMock {
    pub new_signature_fn: Option<NewSignatureFn>,
}

#[async_trait]
impl SignatureCreator for SignatureCreatorMock {
    async fn new_signature(
        &self,
        workspace: &Workspace,
        file_paths: &[PathBuf],
        manifest_name: &str,
    ) -> Result<SignatureFiles> {
        let f = self
            .new_signature_fn
            .as_ref()
            .expect("new_signature_fn is uninitialized!");
        f(workspace, file_paths, manifest_name)
    }
}

/// Authority answering with the imprint bytes, prefixed with a tag.
pub(crate) struct StubAuthority(pub &'static str);

#[async_trait]
impl SigningAuthority for StubAuthority {
    async fn sign(&self, imprint: &Imprint) -> anyhow::Result<Box<dyn SignatureObject>> {
        let mut bytes = self.0.as_bytes().to_vec();
        bytes.extend_from_slice(&imprint.to_bytes());
        Ok(Box::new(RawSignature(bytes)))
    }
}

/// Writes `files` under `dir` and returns their paths.
pub(crate) fn write_files(dir: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, content)| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        })
        .collect()
}
