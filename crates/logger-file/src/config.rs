//! Configuration for the file logger

use crate::error::{Error, Result};
use crate::template::{DEFAULT_FILENAME_TEMPLATE, FilenameTemplate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`FileLogger`](crate::FileLogger).
///
/// Immutable once the logger is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLoggerConfig {
    /// Directory holding active and archived log files; created if absent
    pub directory: PathBuf,
    /// Template used to name new log files
    #[serde(default = "default_filename_template")]
    pub filename_template: String,
    /// Rotate when this much time has passed since the last rotation (zero disables)
    #[serde(default)]
    pub rotation_interval: Duration,
    /// Rotate before a write would bring the file to this many bytes (0 disables)
    #[serde(default)]
    pub max_file_size: u64,
    /// Compress rotated-out files into `.tar.gz` archives and delete the originals
    #[serde(default)]
    pub archive_on_rotate: bool,
    /// Keep a `latest` symlink pointing at the active file
    #[serde(default)]
    pub maintain_latest_link: bool,
}

fn default_filename_template() -> String {
    DEFAULT_FILENAME_TEMPLATE.to_string()
}

impl FileLoggerConfig {
    /// Configuration with defaults for everything except the directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            filename_template: default_filename_template(),
            rotation_interval: Duration::ZERO,
            max_file_size: 0,
            archive_on_rotate: false,
            maintain_latest_link: false,
        }
    }

    /// Create a builder for the given directory.
    pub fn builder(directory: impl Into<PathBuf>) -> FileLoggerConfigBuilder {
        FileLoggerConfigBuilder {
            config: Self::new(directory),
        }
    }

    /// Parse the configured filename template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] if the template is invalid.
    pub fn template(&self) -> Result<FilenameTemplate> {
        FilenameTemplate::parse(&self.filename_template)
    }

    /// Check the configuration without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty directory or an invalid
    /// template.
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "log directory must not be empty".to_string(),
            ));
        }
        self.template().map(|_| ())
    }
}

/// Builder for [`FileLoggerConfig`]
#[derive(Debug, Clone)]
pub struct FileLoggerConfigBuilder {
    config: FileLoggerConfig,
}

impl FileLoggerConfigBuilder {
    /// Set the filename template
    #[must_use]
    pub fn filename_template(mut self, template: impl Into<String>) -> Self {
        self.config.filename_template = template.into();
        self
    }

    /// Set the time-based rotation interval
    #[must_use]
    pub const fn rotation_interval(mut self, interval: Duration) -> Self {
        self.config.rotation_interval = interval;
        self
    }

    /// Set the size-based rotation threshold in bytes
    #[must_use]
    pub const fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    /// Enable or disable archiving of rotated files
    #[must_use]
    pub const fn archive_on_rotate(mut self, enabled: bool) -> Self {
        self.config.archive_on_rotate = enabled;
        self
    }

    /// Enable or disable the `latest` symlink
    #[must_use]
    pub const fn maintain_latest_link(mut self, enabled: bool) -> Self {
        self.config.maintain_latest_link = enabled;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// See [`FileLoggerConfig::validate`].
    pub fn build(self) -> Result<FileLoggerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FileLoggerConfig::new("/var/log/app");
        assert_eq!(config.filename_template, DEFAULT_FILENAME_TEMPLATE);
        assert!(config.rotation_interval.is_zero());
        assert_eq!(config.max_file_size, 0);
        assert!(!config.archive_on_rotate);
        assert!(!config.maintain_latest_link);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = FileLoggerConfig::builder("logs")
            .filename_template("{time:%Y%m%d}-{iteration}.log")
            .rotation_interval(Duration::from_secs(3600))
            .max_file_size(1024)
            .archive_on_rotate(true)
            .maintain_latest_link(true)
            .build()
            .unwrap();

        assert_eq!(config.directory, PathBuf::from("logs"));
        assert_eq!(config.rotation_interval, Duration::from_secs(3600));
        assert_eq!(config.max_file_size, 1024);
        assert!(config.archive_on_rotate);
        assert!(config.maintain_latest_link);
    }

    #[test]
    fn test_builder_rejects_invalid_template() {
        let err = FileLoggerConfig::builder("logs")
            .filename_template("{nope}.log")
            .build()
            .unwrap_err();
        assert!(err.is_config());

        let err = FileLoggerConfig::builder("").build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: FileLoggerConfig =
            serde_json::from_str(r#"{"directory": "/tmp/app-logs", "max_file_size": 4096}"#)
                .unwrap();

        assert_eq!(config.directory, PathBuf::from("/tmp/app-logs"));
        assert_eq!(config.max_file_size, 4096);
        assert_eq!(config.filename_template, DEFAULT_FILENAME_TEMPLATE);
        assert!(config.rotation_interval.is_zero());
        assert!(!config.maintain_latest_link);
    }
}
