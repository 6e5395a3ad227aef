//! Background rotation on the interval cadence

use crate::clock::next_boundary;
use crate::error::{Error, Result};
use crate::writer::{FileLogger, log_rotation};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Rotates a [`FileLogger`] at every multiple of its rotation interval.
///
/// Boundaries are counted from the Unix epoch in local time, so a 24h
/// interval rotates at local midnight. The rotation goes through
/// [`FileLogger::rotate`] on the blocking pool, and is serialized with writes
/// by the logger's own lock.
#[derive(Debug)]
pub struct RotationScheduler {
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl RotationScheduler {
    /// Spawn the scheduler task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] when called outside a tokio runtime and
    /// [`Error::Configuration`] when the logger's rotation interval is zero.
    pub fn start(logger: FileLogger) -> Result<Self> {
        let interval = logger.rotation_interval();
        if interval.is_zero() {
            return Err(Error::Configuration(
                "scheduled rotation requires a non-zero rotation interval".to_string(),
            ));
        }
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let shutdown_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        let token = shutdown_token.clone();
        task_tracker.spawn_on(
            async move {
                let mut last_fired = None;
                loop {
                    let now = logger.now();
                    let boundary = next_boundary(now, last_fired, interval);
                    let wait = (boundary - now).to_std().unwrap_or_default();
                    debug!("next scheduled log rotation in {wait:?}");

                    tokio::select! {
                        () = token.cancelled() => break,
                        () = tokio::time::sleep(wait) => {}
                    }

                    last_fired = Some(boundary);
                    let rotating = logger.clone();
                    match tokio::task::spawn_blocking(move || rotating.rotate_quietly()).await {
                        Ok(Ok(outcome)) => log_rotation("schedule", &outcome),
                        Ok(Err(e)) => error!("scheduled log rotation failed: {e}"),
                        Err(e) => error!("scheduled log rotation task failed: {e}"),
                    }
                }
            },
            &handle,
        );
        task_tracker.close();

        Ok(Self {
            shutdown_token,
            task_tracker,
        })
    }

    /// Stop the scheduler, waiting for an in-flight rotation to finish.
    pub async fn shutdown(&self) {
        info!("log rotation scheduler shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        info!("log rotation scheduler shutdown complete.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileLoggerConfig;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_requires_runtime() {
        let dir = tempdir().unwrap();
        let config = FileLoggerConfig::builder(dir.path())
            .rotation_interval(Duration::from_secs(60))
            .build()
            .unwrap();
        let logger = FileLogger::new(config).unwrap();

        assert!(matches!(
            RotationScheduler::start(logger),
            Err(Error::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_requires_interval() {
        let dir = tempdir().unwrap();
        let logger = FileLogger::new(FileLoggerConfig::new(dir.path())).unwrap();

        let err = logger.start_scheduler().unwrap_err();
        assert!(err.is_config());
    }
}
