//! The `latest` symlink pointing at the active log file

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reserved name of the link inside the log directory.
pub const LATEST_LINK_NAME: &str = "latest";

const STAGING_LINK_NAME: &str = ".latest.tmp";

/// Maintains (or keeps absent) the `latest` link in a log directory.
#[derive(Debug, Clone)]
pub struct LatestLink {
    path: PathBuf,
    staging: PathBuf,
    enabled: bool,
}

impl LatestLink {
    /// Link manager for `directory`.
    #[must_use]
    pub fn new(directory: &Path, enabled: bool) -> Self {
        Self {
            path: directory.join(LATEST_LINK_NAME),
            staging: directory.join(STAGING_LINK_NAME),
            enabled,
        }
    }

    /// Where the link lives.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point the link at `active`, or remove it when disabled or when there is
    /// no active file.
    ///
    /// The new link is created under a staging name and renamed over the old
    /// one, so while enabled the link never disappears.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Link`] if the link cannot be removed or replaced.
    pub fn relink(&self, active: Option<&Path>) -> Result<()> {
        let target = match active.and_then(Path::file_name) {
            Some(name) if self.enabled => name,
            _ => return remove_if_exists(&self.path).map_err(|e| self.error(e)),
        };

        remove_if_exists(&self.staging).map_err(|e| self.error(e))?;
        symlink(Path::new(target), &self.staging).map_err(|e| self.error(e))?;
        fs::rename(&self.staging, &self.path).map_err(|e| {
            let _ = fs::remove_file(&self.staging);
            self.error(e)
        })
    }

    fn error(&self, source: io::Error) -> Error {
        Error::Link {
            path: self.path.clone(),
            source,
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_relink_points_at_active_file() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.log");
        let second = dir.path().join("b.log");
        fs::write(&first, b"a").unwrap();
        fs::write(&second, b"b").unwrap();

        let link = LatestLink::new(dir.path(), true);
        link.relink(Some(first.as_path())).unwrap();
        assert_eq!(fs::read_link(link.path()).unwrap(), PathBuf::from("a.log"));
        assert_eq!(fs::read_to_string(link.path()).unwrap(), "a");

        link.relink(Some(second.as_path())).unwrap();
        assert_eq!(fs::read_link(link.path()).unwrap(), PathBuf::from("b.log"));
        assert!(!dir.path().join(STAGING_LINK_NAME).exists());
    }

    #[test]
    fn test_disabled_link_is_removed() {
        let dir = tempdir().unwrap();
        let active = dir.path().join("a.log");
        fs::write(&active, b"a").unwrap();

        LatestLink::new(dir.path(), true).relink(Some(active.as_path())).unwrap();
        let link = LatestLink::new(dir.path(), false);
        link.relink(Some(active.as_path())).unwrap();
        assert!(fs::symlink_metadata(link.path()).is_err());

        // Removing an absent link is not an error
        link.relink(Some(active.as_path())).unwrap();
    }

    #[test]
    fn test_no_active_file_removes_link() {
        let dir = tempdir().unwrap();
        let active = dir.path().join("a.log");
        fs::write(&active, b"a").unwrap();

        let link = LatestLink::new(dir.path(), true);
        link.relink(Some(active.as_path())).unwrap();
        link.relink(None).unwrap();
        assert!(fs::symlink_metadata(link.path()).is_err());
    }

    #[test]
    fn test_link_failure_is_reported() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(LATEST_LINK_NAME)).unwrap();
        let active = dir.path().join("a.log");
        fs::write(&active, b"a").unwrap();

        let err = LatestLink::new(dir.path(), false)
            .relink(Some(active.as_path()))
            .unwrap_err();
        assert!(matches!(err, Error::Link { .. }));
    }
}
