//! Container lifecycle: create, add signature, remove signature, inspect.

pub mod creator;
pub mod signer;

use std::path::{Path, PathBuf};

pub use creator::Creator;
pub use signer::ContainerSigner;

use crate::{
    archive::ArchiveService,
    error::Result,
    manifest::{artifact_kind, is_metadata_path, ArtifactKind, SignatureIndex},
};

/// Where a container operation stands.
///
/// Operations move `Intact -> Extracted -> Mutated -> Rebuilt`, or end in
/// `Failed` from any earlier state. The container on disk only changes on
/// the transition into `Rebuilt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ContainerState {
    Intact,
    Extracted,
    Mutated,
    Rebuilt,
    Failed,
}

/// What a container holds, read without extracting it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerListing {
    /// Entry names of the data files
    pub data_files: Vec<String>,
    /// Indices of the signature entries, ascending
    pub signatures: Vec<SignatureIndex>,
}

/// Lists data files and signature entries of the container at `container_path`.
pub fn list(archive: &dyn ArchiveService, container_path: &Path) -> Result<ContainerListing> {
    let mut listing = ContainerListing::default();
    for name in archive.entries(container_path)? {
        let path = Path::new(&name);
        if !is_metadata_path(path) {
            listing.data_files.push(name);
        } else if let Some((ArtifactKind::Manifest, index)) = artifact_kind(path) {
            listing.signatures.push(index);
        }
    }
    listing.signatures.sort();
    Ok(listing)
}

/// Extracts the container at `container_path` into `destination`.
///
/// # Returns
///
/// Paths of the extracted files.
pub fn open(
    archive: &dyn ArchiveService,
    container_path: &Path,
    destination: &Path,
) -> Result<Vec<PathBuf>> {
    let paths = archive.extract(container_path, destination)?;
    log::info!(
        "opened {} into {} ({} file(s))",
        container_path.display(),
        destination.display(),
        paths.len()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use super::*;
    use crate::{
        archive::{ArchiveEntry, ZipArchive},
        digest::{hash_file, HashAlgorithm},
        error::Error,
        manifest::Manifest,
        mock::{write_files, StubAuthority},
        signature::ManifestSigner,
    };

    struct Fixture {
        dir: tempfile::TempDir,
        scratch: PathBuf,
        container: PathBuf,
        creator: Creator,
        signer: ContainerSigner,
        archive: Arc<ZipArchive>,
    }

    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let container = dir.path().join("container.zip");
        let archive = Arc::new(ZipArchive::new());
        let signatures = Arc::new(ManifestSigner::new(Arc::new(StubAuthority("sig:"))));
        let creator = Creator::new(signatures.clone(), archive.clone())
            .with_scratch_dir(Some(scratch.clone()));
        let signer =
            ContainerSigner::new(signatures, archive.clone()).with_scratch_dir(Some(scratch.clone()));
        Fixture {
            dir,
            scratch,
            container,
            creator,
            signer,
            archive,
        }
    }

    impl Fixture {
        async fn create_with(&self, files: &[(&str, &str)]) -> Vec<PathBuf> {
            let inputs = write_files(&self.dir.path().join("inputs"), files);
            self.creator.create(&inputs, &self.container).await.unwrap();
            inputs
        }

        fn entries(&self) -> Vec<String> {
            let mut names = self.archive.entries(&self.container).unwrap();
            names.sort();
            names
        }

        fn read_entry(&self, name: &str) -> Vec<u8> {
            let out = tempfile::tempdir().unwrap();
            open(self.archive.as_ref(), &self.container, out.path()).unwrap();
            fs::read(out.path().join(name)).unwrap()
        }

        fn scratch_is_empty(&self) -> bool {
            fs::read_dir(&self.scratch)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true)
        }
    }

    #[tokio::test]
    async fn create_signs_all_data_files() {
        let fx = fixture();
        let inputs = fx.create_with(&[("a.txt", "alpha"), ("b.txt", "beta")]).await;

        assert_eq!(
            fx.entries(),
            [
                "META-INF/manifest1.json",
                "META-INF/manifest1.json.sig",
                "a.txt",
                "b.txt"
            ]
        );

        let manifest = Manifest::from_slice(&fx.read_entry("META-INF/manifest1.json")).unwrap();
        assert_eq!(manifest.signature_uri, "META-INF/manifest1.json.sig");
        let uris: Vec<_> = manifest.files.iter().map(|f| f.uri.as_str()).collect();
        assert_eq!(uris, ["a.txt", "b.txt"]);
        for (file, input) in manifest.files.iter().zip(&inputs) {
            assert_eq!(file.hash_algorithm, HashAlgorithm::Sha256);
            assert_eq!(file.hash, hash_file(input, HashAlgorithm::Sha256).unwrap().hex);
            assert_eq!(fx.read_entry(&file.uri), fs::read(input).unwrap());
        }

        // the signature covers the manifest bytes exactly as archived
        let manifest_bytes = fx.read_entry("META-INF/manifest1.json");
        let mut expected = b"sig:".to_vec();
        expected.push(HashAlgorithm::Sha256.id());
        expected.extend(HashAlgorithm::Sha256.hash_bytes(&manifest_bytes));
        assert_eq!(fx.read_entry("META-INF/manifest1.json.sig"), expected);

        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn add_signature_keeps_existing_entries() {
        let fx = fixture();
        fx.create_with(&[("a.txt", "alpha"), ("b.txt", "beta")]).await;
        let manifest1 = fx.read_entry("META-INF/manifest1.json");
        let signature1 = fx.read_entry("META-INF/manifest1.json.sig");

        let index = fx.signer.add_signature(&fx.container).await.unwrap();

        assert_eq!(index.get(), 2);
        assert_eq!(
            fx.entries(),
            [
                "META-INF/manifest1.json",
                "META-INF/manifest1.json.sig",
                "META-INF/manifest2.json",
                "META-INF/manifest2.json.sig",
                "a.txt",
                "b.txt"
            ]
        );
        assert_eq!(fx.read_entry("META-INF/manifest1.json"), manifest1);
        assert_eq!(fx.read_entry("META-INF/manifest1.json.sig"), signature1);

        // data files only, never earlier manifests
        let manifest2 = Manifest::from_slice(&fx.read_entry("META-INF/manifest2.json")).unwrap();
        let uris: Vec<_> = manifest2.files.iter().map(|f| f.uri.as_str()).collect();
        assert_eq!(uris, ["a.txt", "b.txt"]);
        assert_eq!(manifest2.signature_uri, "META-INF/manifest2.json.sig");

        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn remove_then_add_does_not_reuse_higher_index() {
        let fx = fixture();
        fx.create_with(&[("a.txt", "alpha")]).await;
        fx.signer.add_signature(&fx.container).await.unwrap();
        fx.signer.add_signature(&fx.container).await.unwrap();

        fx.signer.remove_signature(&fx.container, 1).await.unwrap();
        let listing = list(fx.archive.as_ref(), &fx.container).unwrap();
        assert_eq!(
            listing.signatures.iter().map(|i| i.get()).collect::<Vec<_>>(),
            [2, 3]
        );
        assert_eq!(listing.data_files, ["a.txt"]);

        let index = fx.signer.add_signature(&fx.container).await.unwrap();
        assert_eq!(index.get(), 4);
        assert_eq!(
            fx.signer.list_signatures(&fx.container).unwrap(),
            [2, 3, 4].map(|i| SignatureIndex::new(i).unwrap())
        );
    }

    #[tokio::test]
    async fn remove_signature_leaves_other_entries() {
        let fx = fixture();
        fx.create_with(&[("a.txt", "alpha")]).await;
        fx.signer.add_signature(&fx.container).await.unwrap();
        let manifest2 = fx.read_entry("META-INF/manifest2.json");
        let signature2 = fx.read_entry("META-INF/manifest2.json.sig");

        fx.signer.remove_signature(&fx.container, 1).await.unwrap();

        assert_eq!(
            fx.entries(),
            [
                "META-INF/manifest2.json",
                "META-INF/manifest2.json.sig",
                "a.txt"
            ]
        );
        assert_eq!(fx.read_entry("a.txt"), b"alpha");
        assert_eq!(fx.read_entry("META-INF/manifest2.json"), manifest2);
        assert_eq!(fx.read_entry("META-INF/manifest2.json.sig"), signature2);
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn extra_metadata_entries_survive_rebuilds() {
        let fx = fixture();
        fx.create_with(&[("a.txt", "alpha")]).await;

        // repack with a non-signature file under META-INF
        let staged = fx.dir.path().join("staged");
        let mut paths = open(fx.archive.as_ref(), &fx.container, &staged).unwrap();
        paths.extend(write_files(&staged, &[("META-INF/notes.txt", "notes")]));
        let entries: Vec<_> = paths
            .iter()
            .map(|path| ArchiveEntry::relative_to(&staged, path).unwrap())
            .collect();
        fx.archive.create_archive(&entries, &fx.container).unwrap();

        fx.signer.add_signature(&fx.container).await.unwrap();

        assert_eq!(
            fx.entries(),
            [
                "META-INF/manifest1.json",
                "META-INF/manifest1.json.sig",
                "META-INF/manifest2.json",
                "META-INF/manifest2.json.sig",
                "META-INF/notes.txt",
                "a.txt"
            ]
        );
        assert_eq!(fx.read_entry("META-INF/notes.txt"), b"notes");
        let manifest2 = Manifest::from_slice(&fx.read_entry("META-INF/manifest2.json")).unwrap();
        let uris: Vec<_> = manifest2.files.iter().map(|f| f.uri.as_str()).collect();
        assert_eq!(uris, ["a.txt"]);

        fx.signer.remove_signature(&fx.container, 1).await.unwrap();

        assert_eq!(
            fx.entries(),
            [
                "META-INF/manifest2.json",
                "META-INF/manifest2.json.sig",
                "META-INF/notes.txt",
                "a.txt"
            ]
        );
        let listing = list(fx.archive.as_ref(), &fx.container).unwrap();
        assert_eq!(listing.data_files, ["a.txt"]);
    }

    #[cfg(feature = "authority-local")]
    #[tokio::test]
    async fn local_key_signatures_verify_against_archived_manifests() {
        use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
        use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};

        use crate::{
            authority::{LocalKeyAuthority, LocalSignature},
            manifest::METADATA_DIR,
        };

        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("container.zip");
        let authority = Arc::new(LocalKeyAuthority::generate());
        let public_key = authority.public_key_hex();
        let signatures = Arc::new(ManifestSigner::new(authority));
        let archive = Arc::new(ZipArchive::new());

        let inputs = write_files(&dir.path().join("inputs"), &[("a.txt", "alpha")]);
        Creator::new(signatures.clone(), archive.clone())
            .create(&inputs, &container)
            .await
            .unwrap();
        let index = ContainerSigner::new(signatures, archive.clone())
            .add_signature(&container)
            .await
            .unwrap();
        assert_eq!(index.get(), 2);

        let out = tempfile::tempdir().unwrap();
        open(archive.as_ref(), &container, out.path()).unwrap();
        for index in [1, 2].map(|i| SignatureIndex::new(i).unwrap()) {
            let manifest = fs::read(out.path().join(METADATA_DIR).join(index.manifest_name())).unwrap();
            let doc: LocalSignature = serde_json::from_slice(
                &fs::read(out.path().join(METADATA_DIR).join(index.signature_name())).unwrap(),
            )
            .unwrap();

            let mut imprint = vec![HashAlgorithm::Sha256.id()];
            imprint.extend(HashAlgorithm::Sha256.hash_bytes(&manifest));
            assert_eq!(doc.imprint, hex::encode(&imprint));
            assert_eq!(doc.public_key, public_key);

            let key = VerifyingKey::from_sec1_bytes(&hex::decode(&doc.public_key).unwrap()).unwrap();
            let signature = Signature::from_der(&BASE64.decode(&doc.signature).unwrap()).unwrap();
            assert!(key.verify(&imprint, &signature).is_ok());
        }
    }

    #[tokio::test]
    async fn remove_unknown_signature_leaves_container_untouched() {
        let fx = fixture();
        fx.create_with(&[("a.txt", "alpha")]).await;
        let before = fs::read(&fx.container).unwrap();

        let err = fx
            .signer
            .remove_signature(&fx.container, 7)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SignatureNotFound { id: 7 }));
        assert_eq!(fs::read(&fx.container).unwrap(), before);
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn removing_last_signature_leaves_data_only() {
        let fx = fixture();
        fx.create_with(&[("a.txt", "alpha")]).await;

        fx.signer.remove_signature(&fx.container, 1).await.unwrap();

        assert_eq!(fx.entries(), ["a.txt"]);
        let index = fx.signer.add_signature(&fx.container).await.unwrap();
        assert_eq!(index, SignatureIndex::FIRST);
    }

    #[tokio::test]
    async fn add_signature_to_missing_container_fails() {
        let fx = fixture();

        let err = fx.signer.add_signature(&fx.container).await.unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert!(!fx.container.exists());
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn duplicate_base_names_are_rejected() {
        let fx = fixture();
        let inputs = [
            write_files(&fx.dir.path().join("one"), &[("same.txt", "1")]),
            write_files(&fx.dir.path().join("two"), &[("same.txt", "2")]),
        ]
        .concat();

        let err = fx.creator.create(&inputs, &fx.container).await.unwrap_err();

        assert!(matches!(err, Error::Archive(_)));
        assert!(!fx.container.exists());
    }

    #[test]
    fn state_names() {
        assert_eq!(ContainerState::Intact.to_string(), "intact");
        assert_eq!(ContainerState::Rebuilt.to_string(), "rebuilt");
    }
}
