//! Archiving of rotated-out log files
//!
//! Each rotated file becomes a gzip-compressed tar archive next to it, named
//! after the file with its extension replaced by `.tar.gz`. The archive holds
//! a single entry whose name is the file's full path (with the root stripped,
//! as tar entry names are relative) and whose header carries the original
//! size, mode and modification time.

use crate::error::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Suffix appended to a rotated file's stem to name its archive.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Path of the archive produced for `path`.
#[must_use]
pub fn archive_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_default();
    name.push(ARCHIVE_SUFFIX);
    path.with_file_name(name)
}

/// Tar entry name for `path`: every normal component, root and prefix dropped.
fn entry_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect()
}

/// Write the archive for a closed file, leaving the file itself in place.
///
/// The archive is staged under a hidden temporary name and renamed into
/// place, so on failure no partial archive is left behind.
///
/// # Errors
///
/// Returns [`Error::Archive`] if the file cannot be read or the archive cannot
/// be written.
pub fn archive(path: &Path) -> Result<PathBuf> {
    let archive_path = archive_path_for(path);
    write_archive(path, &archive_path).map_err(|source| Error::Archive {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(archive_path)
}

/// Archive a closed file and remove it once the archive is in place.
///
/// # Errors
///
/// Returns [`Error::Archive`] if archiving fails (the file is kept) or if the
/// original cannot be removed afterwards (the archive is kept).
pub fn archive_and_remove(path: &Path) -> Result<PathBuf> {
    let archive_path = archive(path)?;
    fs::remove_file(path).map_err(|source| Error::Archive {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(archive_path)
}

fn write_archive(path: &Path, archive_path: &Path) -> io::Result<()> {
    let source = File::open(path)?;
    let metadata = source.metadata()?;

    let directory = archive_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staging = tempfile::Builder::new()
        .prefix(".")
        .suffix(".archive")
        .tempfile_in(directory)?;

    let encoder = GzEncoder::new(staging.as_file(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_metadata(&metadata);
    builder.append_data(&mut header, entry_name(path), source)?;

    builder.into_inner()?.finish()?;
    staging.as_file().sync_all()?;
    staging.persist(archive_path).map_err(|e| e.error)?;

    Ok(())
}
