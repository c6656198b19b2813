use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use log::{debug, info};

use crate::{
    authority::SigningAuthority,
    digest::{HashAlgorithm, Imprint},
    error::{Error, Result},
    manifest::Manifest,
    workspace::Workspace,
};

/// Manifest and signature files produced for one signature entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureFiles {
    /// `<workspace>/META-INF/manifest<N>.json`
    pub manifest_path: PathBuf,
    /// `<workspace>/META-INF/manifest<N>.json.sig`
    pub signature_path: PathBuf,
}

/// Produces a manifest over data files and signs it.
#[async_trait]
pub trait SignatureCreator: Send + Sync {
    /// Builds, persists and signs a manifest.
    ///
    /// # Arguments
    ///
    /// * `workspace` - Workspace receiving the manifest and signature files.
    /// * `file_paths` - Data files the manifest covers.
    /// * `manifest_name` - File name of the manifest, e.g. `manifest1.json`.
    ///
    /// # Returns
    ///
    /// Paths of both files, or the error of the first failing step.
    async fn new_signature(
        &self,
        workspace: &Workspace,
        file_paths: &[PathBuf],
        manifest_name: &str,
    ) -> Result<SignatureFiles>;
}

/// [`SignatureCreator`] that submits manifest imprints to a [`SigningAuthority`].
#[derive(Clone)]
pub struct ManifestSigner {
    authority: Arc<dyn SigningAuthority>,
    algorithm: HashAlgorithm,
}

impl ManifestSigner {
    pub fn new(authority: Arc<dyn SigningAuthority>) -> Self {
        Self {
            authority,
            algorithm: HashAlgorithm::default(),
        }
    }

    /// Uses `algorithm` for data file digests and the manifest imprint.
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    async fn sign_manifest(&self, manifest_path: &Path) -> Result<PathBuf> {
        let imprint = Imprint::of_file(manifest_path, self.algorithm)?;
        debug!("manifest {} imprint {imprint}", manifest_path.display());

        let signature = self
            .authority
            .sign(&imprint)
            .await
            .map_err(Error::Signing)?;
        let bytes = signature.serialize().map_err(Error::SignatureEncoding)?;

        let mut signature_path = manifest_path.as_os_str().to_owned();
        signature_path.push(".sig");
        let signature_path = PathBuf::from(signature_path);
        fs::write(&signature_path, bytes).map_err(Error::io(&signature_path))?;

        Ok(signature_path)
    }
}

#[async_trait]
impl SignatureCreator for ManifestSigner {
    async fn new_signature(
        &self,
        workspace: &Workspace,
        file_paths: &[PathBuf],
        manifest_name: &str,
    ) -> Result<SignatureFiles> {
        let manifest = Manifest::build(file_paths, manifest_name, self.algorithm)?;
        let manifest_path = manifest.write(workspace, manifest_name)?;

        let signature_path = self.sign_manifest(&manifest_path).await?;

        info!(
            "signed {manifest_name} covering {} file(s)",
            manifest.files.len()
        );

        Ok(SignatureFiles {
            manifest_path,
            signature_path,
        })
    }
}
