use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Seek, Write},
    path::{Component, Path, PathBuf},
};

use log::{debug, trace};
use tempfile::NamedTempFile;
use zip::{
    read::ZipArchive as ZipReader,
    result::ZipError,
    write::{SimpleFileOptions, ZipWriter},
    CompressionMethod, DateTime,
};

use crate::{
    archive::{ArchiveEntry, ArchiveService},
    error::{Error, Result},
};

/// Deflate-compressed zip containers.
///
/// Entries carry a fixed timestamp and mode, so the same inputs always give
/// the same bytes. Archives are written to a temporary file next to the
/// destination and renamed over it once complete, so an existing container
/// is never left half-written.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipArchive;

impl ZipArchive {
    pub fn new() -> Self {
        Self
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }

    fn write_archive<W: Write + Seek>(&self, writer: W, entries: &[ArchiveEntry]) -> Result<W> {
        let mut zip = ZipWriter::new(writer);

        for entry in entries {
            let mut file = File::open(&entry.source).map_err(Error::io(&entry.source))?;
            zip.start_file(entry.name.as_str(), Self::options())
                .map_err(zip_error(&entry.source))?;
            let size = io::copy(&mut file, &mut zip).map_err(Error::io(&entry.source))?;
            trace!(
                "archived {} as {} ({size} bytes)",
                entry.source.display(),
                entry.name
            );
        }

        zip.finish()
            .map_err(|e| Error::Archive(format!("failed to finish zip archive: {e}")))
    }
}

/// Maps zip errors, keeping I/O failures attached to `path`.
fn zip_error(path: &Path) -> impl FnOnce(ZipError) -> Error + '_ {
    move |e| match e {
        ZipError::Io(source) => Error::Io {
            path: path.to_path_buf(),
            source,
        },
        other => Error::Archive(format!("{}: {other}", path.display())),
    }
}

/// Rejects entry names that would land outside the extraction directory.
fn checked_entry_path(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && !name.contains('\\')
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(path)
    } else {
        Err(Error::Archive(format!(
            "entry '{name}' escapes the extraction directory"
        )))
    }
}

fn open_reader(archive: &Path) -> Result<ZipReader<BufReader<File>>> {
    let file = File::open(archive).map_err(Error::io(archive))?;
    ZipReader::new(BufReader::new(file)).map_err(zip_error(archive))
}

impl ArchiveService for ZipArchive {
    fn create_archive(&self, entries: &[ArchiveEntry], destination: &Path) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in entries {
            checked_entry_path(&entry.name)?;
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::Archive(format!(
                    "duplicate entry '{}' (from {})",
                    entry.name,
                    entry.source.display()
                )));
            }
        }

        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staging = NamedTempFile::new_in(parent).map_err(Error::io(parent))?;
        let staging_path = staging.path().to_path_buf();

        let writer = self.write_archive(BufWriter::new(staging.as_file_mut()), entries)?;
        writer
            .into_inner()
            .map_err(|e| Error::io(&staging_path)(e.into_error()))?
            .sync_all()
            .map_err(Error::io(&staging_path))?;

        staging
            .persist(destination)
            .map_err(|e| Error::io(destination)(e.error))?;

        debug!(
            "wrote archive {} with {} entries",
            destination.display(),
            entries.len()
        );
        Ok(())
    }

    fn extract(&self, archive: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
        let mut zip = open_reader(archive)?;

        fs::create_dir_all(destination).map_err(Error::io(destination))?;

        let mut extracted = Vec::new();
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(zip_error(archive))?;
            let name = entry.name().to_owned();
            let target = destination.join(checked_entry_path(&name)?);

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(Error::io(&target))?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(Error::io(parent))?;
            }
            let mut out = File::create(&target).map_err(Error::io(&target))?;
            io::copy(&mut entry, &mut out).map_err(Error::io(&target))?;

            trace!("extracted {}", target.display());
            extracted.push(target);
        }

        debug!(
            "extracted {} file(s) from {} into {}",
            extracted.len(),
            archive.display(),
            destination.display()
        );
        Ok(extracted)
    }

    fn entries(&self, archive: &Path) -> Result<Vec<String>> {
        let mut zip = open_reader(archive)?;

        let mut names = Vec::new();
        for index in 0..zip.len() {
            let entry = zip.by_index_raw(index).map_err(zip_error(archive))?;
            if entry.is_dir() {
                continue;
            }
            names.push(entry.name().to_owned());
        }
        Ok(names)
    }
}
