//! The shareable logger handle

use crate::clock::{Clock, SystemClock};
use crate::config::FileLoggerConfig;
use crate::engine::{RotateOutcome, RotationEngine, Startup, WriteOutcome};
use crate::error::Result;
use crate::scheduler::RotationScheduler;
use crate::template::FilenameRenderer;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::MakeWriter;

/// File logger with size- and time-based rotation.
///
/// Cloning is cheap and every clone writes to the same active file. All
/// operations are serialized by one mutex; tracing events about rotations are
/// emitted only after it is released, so a `FileLogger` can also be the
/// writer of the subscriber that receives them.
#[derive(Debug, Clone)]
pub struct FileLogger {
    engine: Arc<Mutex<RotationEngine>>,
    clock: Arc<dyn Clock>,
    directory: PathBuf,
    latest_link: PathBuf,
    rotation_interval: Duration,
}

impl FileLogger {
    /// Open a logger using the system clock and the configured template.
    ///
    /// Creates the directory if needed, then adopts the most recently
    /// modified log file in it or creates a fresh one.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid template or directory,
    /// and an I/O or link error if the initial file or link cannot be set up.
    pub fn new(config: FileLoggerConfig) -> Result<Self> {
        let template = config.template()?;
        Self::with_parts(config, Arc::new(template), Arc::new(SystemClock))
    }

    /// Open a logger with a custom filename renderer and clock.
    ///
    /// # Errors
    ///
    /// See [`FileLogger::new`].
    pub fn with_parts(
        config: FileLoggerConfig,
        renderer: Arc<dyn FilenameRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let (engine, startup) = RotationEngine::open(&config, renderer, clock.clone())?;

        match &startup {
            Startup::Adopted(path) => debug!("adopted existing log file {}", path.display()),
            Startup::Created(path) => debug!("created log file {}", path.display()),
        }

        Ok(Self {
            directory: engine.directory().to_path_buf(),
            latest_link: engine.link_path().to_path_buf(),
            engine: Arc::new(Mutex::new(engine)),
            clock,
            rotation_interval: config.rotation_interval,
        })
    }

    /// Append `buf` to the active file, rotating first when the size limit or
    /// the rotation interval says so.
    ///
    /// The whole buffer always lands in a single file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`](crate::Error::Closed) after [`FileLogger::close`], or an error if
    /// the rotation or the write itself fails.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let outcome = self.engine.lock().write(buf)?;
        Ok(log_write(outcome))
    }

    /// Rotate now, regardless of the policy.
    ///
    /// Archive and link failures do not fail the rotation; they are reported
    /// on the returned [`RotationReport`](crate::RotationReport).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`](crate::Error::Closed) after [`FileLogger::close`], a template error
    /// if a name cannot be rendered, or an I/O error if the new file cannot be
    /// opened (the previous file then stays active).
    pub fn rotate(&self) -> Result<RotateOutcome> {
        let outcome = self.rotate_quietly()?;
        log_rotation("manual", &outcome);
        Ok(outcome)
    }

    pub(crate) fn rotate_quietly(&self) -> Result<RotateOutcome> {
        self.engine.lock().rotate()
    }

    /// Flush the active file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`](crate::Error::Closed) after close, or the flush error.
    pub fn flush(&self) -> Result<()> {
        self.engine.lock().flush()
    }

    /// Sync and close the active file. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final sync fails.
    pub fn close(&self) -> Result<()> {
        let closed = self.engine.lock().close()?;
        if let Some(path) = closed {
            info!("closed log file {}", path.display());
        }
        Ok(())
    }

    /// Path of the file currently receiving writes, `None` once closed.
    #[must_use]
    pub fn current_path(&self) -> Option<PathBuf> {
        self.engine.lock().current_path().map(Path::to_path_buf)
    }

    /// When the active file became active.
    #[must_use]
    pub fn last_rotation(&self) -> DateTime<Local> {
        self.engine.lock().last_rotation()
    }

    /// The canonical log directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the `latest` link lives (whether or not it is maintained).
    #[must_use]
    pub fn latest_link_path(&self) -> &Path {
        &self.latest_link
    }

    /// The configured rotation interval.
    #[must_use]
    pub const fn rotation_interval(&self) -> Duration {
        self.rotation_interval
    }

    pub(crate) fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// Start rotating this logger on its interval cadence in the background.
    ///
    /// # Errors
    ///
    /// See [`RotationScheduler::start`].
    pub fn start_scheduler(&self) -> Result<RotationScheduler> {
        RotationScheduler::start(self.clone())
    }
}

fn log_write(outcome: WriteOutcome) -> usize {
    if let Some(path) = &outcome.recreated {
        warn!("log file {} disappeared, recreated it", path.display());
    }
    if let Some((trigger, rotation)) = &outcome.rotation {
        log_rotation(&trigger.to_string(), rotation);
    }
    outcome.written
}

pub(crate) fn log_rotation(reason: &str, outcome: &RotateOutcome) {
    match outcome {
        RotateOutcome::Rotated(report) => {
            match &report.previous {
                Some(previous) => info!(
                    reason,
                    "rotated log file {} -> {}",
                    previous.display(),
                    report.current.display()
                ),
                None => info!(reason, "opened log file {}", report.current.display()),
            }
            if let Some(err) = &report.archive_error {
                warn!("failed to archive rotated log file: {err}");
            }
            if let Some(err) = &report.link_error {
                warn!("failed to update latest log link: {err}");
            }
        }
        RotateOutcome::Skipped { current } => debug!(
            reason,
            "no free file name, keeping {}",
            current.display()
        ),
    }
}

impl io::Write for FileLogger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FileLogger::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        FileLogger::flush(self).map_err(Into::into)
    }
}

impl io::Write for &FileLogger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FileLogger::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        FileLogger::flush(self).map_err(Into::into)
    }
}

impl<'a> MakeWriter<'a> for FileLogger {
    type Writer = &'a Self;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
