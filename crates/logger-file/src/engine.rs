//! The rotation state machine
//!
//! Owns the active file handle and the time of the last rotation. Every
//! method takes `&mut self`; [`FileLogger`](crate::FileLogger) serializes
//! access through a single mutex and never hands the file out.

use crate::archive::{self, ARCHIVE_SUFFIX, archive_path_for};
use crate::clock::{Clock, boundary_floor};
use crate::config::FileLoggerConfig;
use crate::error::{Error, Result};
use crate::link::{LATEST_LINK_NAME, LatestLink};
use crate::policy::{RotationPolicy, RotationTrigger};
use crate::template::{FilenameCandidate, FilenameRenderer, validate_file_name};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Result of a rotation attempt.
#[derive(Debug)]
pub enum RotateOutcome {
    /// A new active file was opened.
    Rotated(RotationReport),
    /// The template rendered the same name for consecutive iterations and
    /// that name is taken, so the current file stays active.
    Skipped {
        /// The file that stays active
        current: PathBuf,
    },
}

impl RotateOutcome {
    /// The report, if a rotation happened.
    #[must_use]
    pub const fn report(&self) -> Option<&RotationReport> {
        match self {
            Self::Rotated(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }

    /// Whether a new file became active.
    #[must_use]
    pub const fn is_rotated(&self) -> bool {
        matches!(self, Self::Rotated(_))
    }

    /// The active file after the attempt.
    #[must_use]
    pub fn current(&self) -> &Path {
        match self {
            Self::Rotated(report) => &report.current,
            Self::Skipped { current } => current,
        }
    }
}

/// What a completed rotation did.
#[derive(Debug)]
pub struct RotationReport {
    /// The file that was active before, if any
    pub previous: Option<PathBuf>,
    /// The new active file
    pub current: PathBuf,
    /// Archive written for the previous file
    pub archived: Option<PathBuf>,
    /// Archiving the previous file failed; the rotation still completed
    pub archive_error: Option<Error>,
    /// Updating the latest link failed; the rotation still completed
    pub link_error: Option<Error>,
}

impl RotationReport {
    /// Whether the rotation completed without non-fatal errors.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.archive_error.is_none() && self.link_error.is_none()
    }

    /// Surface the first non-fatal error as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns the archive error, or else the link error, if either occurred.
    pub fn into_result(self) -> Result<PathBuf> {
        match (self.archive_error, self.link_error) {
            (Some(err), _) | (None, Some(err)) => Err(err),
            (None, None) => Ok(self.current),
        }
    }
}

/// What a single write did besides appending.
#[derive(Debug)]
pub(crate) struct WriteOutcome {
    pub(crate) written: usize,
    pub(crate) rotation: Option<(RotationTrigger, RotateOutcome)>,
    pub(crate) recreated: Option<PathBuf>,
}

#[derive(Debug)]
struct ActiveFile {
    file: File,
    path: PathBuf,
}

/// How the engine came up.
#[derive(Debug)]
pub(crate) enum Startup {
    /// An existing file in the directory was adopted
    Adopted(PathBuf),
    /// No eligible file existed, so an initial rotation created one
    Created(PathBuf),
}

#[derive(Debug)]
pub(crate) struct RotationEngine {
    directory: PathBuf,
    archive_on_rotate: bool,
    rotation_interval: std::time::Duration,
    policy: RotationPolicy,
    renderer: Arc<dyn FilenameRenderer>,
    clock: Arc<dyn Clock>,
    link: LatestLink,
    active: Option<ActiveFile>,
    last_rotation: DateTime<Local>,
    closed: bool,
}

impl RotationEngine {
    /// Prepare the directory and adopt or create the active file.
    pub(crate) fn open(
        config: &FileLoggerConfig,
        renderer: Arc<dyn FilenameRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, Startup)> {
        if config.directory.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "log directory must not be empty".to_string(),
            ));
        }

        // Reject templates that cannot render before any file I/O
        let now = clock.now();
        let sample = renderer.render(&FilenameCandidate::new(now))?;
        validate_file_name(&sample)?;

        fs::create_dir_all(&config.directory).map_err(|source| Error::CreateDirectory {
            path: config.directory.clone(),
            source,
        })?;
        let directory =
            fs::canonicalize(&config.directory).map_err(|source| Error::CreateDirectory {
                path: config.directory.clone(),
                source,
            })?;

        let mut engine = Self {
            link: LatestLink::new(&directory, config.maintain_latest_link),
            directory,
            archive_on_rotate: config.archive_on_rotate,
            rotation_interval: config.rotation_interval,
            policy: RotationPolicy::from_config(config),
            renderer,
            clock,
            active: None,
            last_rotation: now,
            closed: false,
        };

        let startup = match newest_log_file(&engine.directory)? {
            Some((path, modified)) => {
                let file = open_append(&path)?;
                let modified = DateTime::<Local>::from(modified);
                engine.last_rotation = if engine.rotation_interval.is_zero() {
                    modified
                } else {
                    boundary_floor(modified, engine.rotation_interval)
                };
                engine.active = Some(ActiveFile {
                    file,
                    path: path.clone(),
                });
                engine.link.relink(Some(path.as_path()))?;
                Startup::Adopted(path)
            }
            None => match engine.rotate()? {
                RotateOutcome::Rotated(report) => {
                    if let Some(err) = report.link_error {
                        return Err(err);
                    }
                    Startup::Created(report.current)
                }
                RotateOutcome::Skipped { .. } => {
                    return Err(Error::Configuration(format!(
                        "filename template cannot produce a free file name in {}",
                        engine.directory.display()
                    )));
                }
            },
        };

        Ok((engine, startup))
    }

    pub(crate) fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn link_path(&self) -> &Path {
        self.link.path()
    }

    pub(crate) fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    pub(crate) const fn last_rotation(&self) -> DateTime<Local> {
        self.last_rotation
    }

    /// Find the first free name for a rotation starting at `now`, or `None`
    /// when the template keeps rendering the same taken name.
    fn next_free_path(&self, now: DateTime<Local>) -> Result<Option<PathBuf>> {
        let mut candidate = FilenameCandidate::new(now);
        let mut previous: Option<String> = None;

        loop {
            let name = self.renderer.render(&candidate)?;
            if previous.as_deref() == Some(name.as_str()) {
                return Ok(None);
            }
            validate_file_name(&name)?;

            let path = self.directory.join(&name);
            let taken = exists(&path)?
                || (self.archive_on_rotate && exists(&archive_path_for(&path))?);
            if !taken {
                return Ok(Some(path));
            }

            previous = Some(name);
            candidate = candidate.next();
        }
    }

    /// Run one rotation attempt.
    pub(crate) fn rotate(&mut self) -> Result<RotateOutcome> {
        if self.closed {
            return Err(Error::Closed);
        }
        let now = self.clock.now();

        let Some(path) = self.next_free_path(now)? else {
            return match &self.active {
                Some(active) => Ok(RotateOutcome::Skipped {
                    current: active.path.clone(),
                }),
                None => Ok(RotateOutcome::Skipped {
                    current: PathBuf::new(),
                }),
            };
        };

        // The old handle stays active until the new file is open
        if let Some(active) = &mut self.active {
            active
                .file
                .sync_all()
                .map_err(|e| Error::Io("failed to sync active log file", e))?;
        }
        let file = open_append(&path)?;
        let previous = self.active.replace(ActiveFile {
            file,
            path: path.clone(),
        });

        let mut report = RotationReport {
            previous: None,
            current: path,
            archived: None,
            archive_error: None,
            link_error: None,
        };

        if let Some(ActiveFile { file, path }) = previous {
            drop(file);
            if self.archive_on_rotate {
                match archive::archive_and_remove(&path) {
                    Ok(archived) => report.archived = Some(archived),
                    Err(err) => report.archive_error = Some(err),
                }
            }
            report.previous = Some(path);
        }

        self.last_rotation = self.clock.now();
        report.link_error = self.link.relink(Some(report.current.as_path())).err();

        Ok(RotateOutcome::Rotated(report))
    }

    /// Append `buf` to the active file, rotating first if the policy says so.
    pub(crate) fn write(&mut self, buf: &[u8]) -> Result<WriteOutcome> {
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(Error::Closed)?;

        let mut recreated = None;
        let current_size = match fs::metadata(&active.path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                active.file = open_append(&active.path)?;
                recreated = Some(active.path.clone());
                0
            }
            Err(e) => return Err(Error::Io("failed to stat active log file", e)),
        };

        let pending = u64::try_from(buf.len()).unwrap_or(u64::MAX);
        let rotation = match self
            .policy
            .evaluate(current_size, pending, self.last_rotation, now)
        {
            Some(trigger) => Some((trigger, self.rotate()?)),
            None => None,
        };

        let active = self.active.as_mut().ok_or(Error::Closed)?;
        active
            .file
            .write_all(buf)
            .map_err(|e| Error::Io("failed to write to log file", e))?;

        Ok(WriteOutcome {
            written: buf.len(),
            rotation,
            recreated,
        })
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        match &mut self.active {
            Some(active) => active
                .file
                .flush()
                .map_err(|e| Error::Io("failed to flush log file", e)),
            None => Err(Error::Closed),
        }
    }

    /// Sync and release the active file. Later writes fail with [`Error::Closed`].
    pub(crate) fn close(&mut self) -> Result<Option<PathBuf>> {
        self.closed = true;
        match self.active.take() {
            Some(ActiveFile { file, path }) => {
                file.sync_all()
                    .map_err(|e| Error::Io("failed to sync log file on close", e))?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Io("failed to open log file", e))
}

fn exists(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io("failed to stat candidate log file", e)),
    }
}

/// Whether a directory entry can be adopted as the active log file.
fn is_eligible(name: &str) -> bool {
    name != LATEST_LINK_NAME && !name.starts_with('.') && !name.ends_with(ARCHIVE_SUFFIX)
}

/// The most recently modified eligible regular file in `directory`.
fn newest_log_file(directory: &Path) -> Result<Option<(PathBuf, SystemTime)>> {
    let entries =
        fs::read_dir(directory).map_err(|e| Error::Io("failed to read log directory", e))?;

    let mut newest: Option<(PathBuf, SystemTime)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| Error::Io("failed to read log directory entry", e))?;
        let eligible = entry.file_name().to_str().is_some_and(is_eligible);
        let file_type = entry
            .file_type()
            .map_err(|e| Error::Io("failed to read log directory entry", e))?;
        if !eligible || !file_type.is_file() {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .map_err(|e| Error::Io("failed to stat log file", e))?;
        if newest.as_ref().is_none_or(|(_, newest)| modified > *newest) {
            newest = Some((entry.path(), modified));
        }
    }

    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::template::FilenameTemplate;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::tempdir;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn engine_with(config: &FileLoggerConfig, clock: Arc<ManualClock>) -> (RotationEngine, Startup) {
        let template = Arc::new(config.template().unwrap());
        RotationEngine::open(config, template, clock).unwrap()
    }

    #[test]
    fn test_initial_rotation_creates_first_file() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::new(dir.path());
        let (engine, startup) = engine_with(&config, Arc::new(ManualClock::new(t0())));

        let current = engine.current_path().unwrap().to_path_buf();
        assert!(matches!(startup, Startup::Created(ref path) if *path == current));
        assert_eq!(current.file_name().unwrap(), "2024-03-01_0.log");
        assert!(current.exists());
        assert_eq!(engine.last_rotation(), t0());
    }

    #[test]
    fn test_adopts_most_recent_file() {
        let dir = tempdir().unwrap();
        let older = dir.path().join("older.log");
        let newer = dir.path().join("newer.log");
        fs::write(&older, b"old").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        fs::write(&newer, b"new").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        // Archives and hidden files are never adopted
        fs::write(dir.path().join("newest.tar.gz"), b"").unwrap();
        fs::write(dir.path().join(".staging"), b"").unwrap();

        let config = FileLoggerConfig::new(dir.path());
        let (engine, startup) = engine_with(&config, Arc::new(ManualClock::new(t0())));

        let adopted = fs::canonicalize(&newer).unwrap();
        assert!(matches!(startup, Startup::Adopted(ref path) if *path == adopted));
        assert_eq!(engine.current_path(), Some(adopted.as_path()));
    }

    #[test]
    fn test_adopted_file_floors_last_rotation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("existing.log"), b"x").unwrap();
        let hour = Duration::from_secs(3600);
        let modified = DateTime::<Local>::from(
            fs::metadata(dir.path().join("existing.log"))
                .unwrap()
                .modified()
                .unwrap(),
        );

        let config = FileLoggerConfig::builder(dir.path())
            .rotation_interval(hour)
            .build()
            .unwrap();
        let (engine, _) = engine_with(&config, Arc::new(ManualClock::new(t0())));

        assert_eq!(engine.last_rotation(), boundary_floor(modified, hour));
        assert!(engine.last_rotation() <= modified);
    }

    #[test]
    fn test_rotation_iterates_past_collisions() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::new(dir.path());
        let (mut engine, _) = engine_with(&config, Arc::new(ManualClock::new(t0())));

        let outcome = engine.rotate().unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.current.file_name().unwrap(), "2024-03-01_1.log");
        assert_eq!(
            report.previous.as_ref().unwrap().file_name().unwrap(),
            "2024-03-01_0.log"
        );
        assert!(report.is_clean());

        let outcome = engine.rotate().unwrap();
        assert_eq!(outcome.current().file_name().unwrap(), "2024-03-01_2.log");
    }

    #[test]
    fn test_iteration_insensitive_template_skips() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::builder(dir.path())
            .filename_template("{time:%Y-%m-%d}.log")
            .build()
            .unwrap();
        let (mut engine, _) = engine_with(&config, Arc::new(ManualClock::new(t0())));
        let before = engine.current_path().unwrap().to_path_buf();

        let outcome = engine.rotate().unwrap();
        assert!(!outcome.is_rotated());
        assert_eq!(outcome.current(), before.as_path());
        assert_eq!(engine.current_path(), Some(before.as_path()));
    }

    #[test]
    fn test_existing_archive_counts_as_collision() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::builder(dir.path())
            .archive_on_rotate(true)
            .build()
            .unwrap();
        let (mut engine, _) = engine_with(&config, Arc::new(ManualClock::new(t0())));

        // _0 -> _1, _0 archived
        engine.rotate().unwrap();
        assert!(engine.directory().join("2024-03-01_0.tar.gz").exists());
        assert!(!engine.directory().join("2024-03-01_0.log").exists());

        // _0.log is free again but its archive exists, so _1 -> _2
        let outcome = engine.rotate().unwrap();
        assert_eq!(outcome.current().file_name().unwrap(), "2024-03-01_2.log");
        assert!(engine.directory().join("2024-03-01_1.tar.gz").exists());
    }

    #[test]
    fn test_write_rotates_before_overflow() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::builder(dir.path())
            .max_file_size(10)
            .build()
            .unwrap();
        let (mut engine, _) = engine_with(&config, Arc::new(ManualClock::new(t0())));
        let first = engine.current_path().unwrap().to_path_buf();

        let outcome = engine.write(b"test").unwrap();
        assert_eq!(outcome.written, 4);
        assert!(outcome.rotation.is_none());

        let outcome = engine.write(b"1234567890").unwrap();
        let (trigger, rotation) = outcome.rotation.unwrap();
        assert_eq!(trigger, RotationTrigger::Size);
        let second = rotation.current().to_path_buf();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"test");
        assert_eq!(fs::read(&second).unwrap(), b"1234567890");
    }

    #[test]
    fn test_write_rotates_after_interval() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let config = FileLoggerConfig::builder(dir.path())
            .rotation_interval(Duration::from_secs(60))
            .build()
            .unwrap();
        let (mut engine, _) = engine_with(&config, clock.clone());

        clock.advance(Duration::from_secs(60));
        assert!(engine.write(b"a").unwrap().rotation.is_none());

        clock.advance(Duration::from_millis(1));
        let (trigger, _) = engine.write(b"b").unwrap().rotation.unwrap();
        assert_eq!(trigger, RotationTrigger::Interval);
        assert_eq!(engine.last_rotation(), clock.now());

        assert!(engine.write(b"c").unwrap().rotation.is_none());
    }

    #[test]
    fn test_write_recreates_deleted_file() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::new(dir.path());
        let (mut engine, _) = engine_with(&config, Arc::new(ManualClock::new(t0())));
        let path = engine.current_path().unwrap().to_path_buf();

        engine.write(b"lost").unwrap();
        fs::remove_file(&path).unwrap();

        let outcome = engine.write(b"kept").unwrap();
        assert_eq!(outcome.recreated.as_deref(), Some(path.as_path()));
        assert!(outcome.rotation.is_none());
        assert_eq!(fs::read(&path).unwrap(), b"kept");
    }

    #[test]
    fn test_close_rejects_writes() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::new(dir.path());
        let (mut engine, _) = engine_with(&config, Arc::new(ManualClock::new(t0())));

        assert!(engine.close().unwrap().is_some());
        assert!(matches!(engine.write(b"x"), Err(Error::Closed)));
        assert!(matches!(engine.flush(), Err(Error::Closed)));
        assert!(matches!(engine.rotate(), Err(Error::Closed)));
        assert!(engine.close().unwrap().is_none());
    }

    #[test]
    fn test_invalid_rendered_name_fails_before_io() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("not-created");
        let config = FileLoggerConfig::builder(&target)
            .filename_template("latest")
            .build()
            .unwrap();
        let template = Arc::new(FilenameTemplate::parse("latest").unwrap());

        let err = RotationEngine::open(&config, template, Arc::new(ManualClock::new(t0())))
            .unwrap_err();
        assert!(err.is_config());
        assert!(!target.exists());
    }
}
