//! Rotating file logger
//!
//! Appends log bytes to a file in a directory and switches to a fresh file
//! when the active one grows past a size limit or has been active longer than
//! a rotation interval. File names come from a template such as
//! `{time:%Y-%m-%d}_{iteration}.log`; the iteration counter is bumped until a
//! name is free, so no two rotations ever share a file. Optionally:
//! - rotated-out files are compressed into `.tar.gz` archives
//! - a `latest` symlink tracks the active file
//! - a background [`RotationScheduler`] rotates on the interval cadence
//!
//! [`FileLogger`] implements [`std::io::Write`] and
//! [`tracing_subscriber::fmt::MakeWriter`], so it can sit directly behind a
//! `tracing` subscriber:
//!
//! ```no_run
//! use proven_logger_file::{FileLogger, FileLoggerConfig};
//! use std::time::Duration;
//!
//! # fn main() -> proven_logger_file::Result<()> {
//! let config = FileLoggerConfig::builder("/var/log/app")
//!     .max_file_size(64 * 1024 * 1024)
//!     .rotation_interval(Duration::from_secs(24 * 60 * 60))
//!     .archive_on_rotate(true)
//!     .maintain_latest_link(true)
//!     .build()?;
//! let logger = FileLogger::new(config)?;
//!
//! tracing_subscriber::fmt().with_writer(logger.clone()).init();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, unreachable_pub)]
#![forbid(unsafe_code)]

mod archive;
mod clock;
mod config;
mod engine;
mod error;
mod link;
mod policy;
mod scheduler;
mod template;
mod writer;

pub use archive::{ARCHIVE_SUFFIX, archive, archive_and_remove, archive_path_for};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FileLoggerConfig, FileLoggerConfigBuilder};
pub use engine::{RotateOutcome, RotationReport};
pub use error::{Error, Result};
pub use link::{LATEST_LINK_NAME, LatestLink};
pub use policy::{RotationPolicy, RotationTrigger};
pub use scheduler::RotationScheduler;
pub use template::{
    DEFAULT_FILENAME_TEMPLATE, FilenameCandidate, FilenameRenderer, FilenameTemplate,
};
pub use writer::FileLogger;
