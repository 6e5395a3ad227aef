//! Filename templates for rotated log files
//!
//! A template mixes literal text with placeholders:
//! - `{time:<strftime>}` renders the rotation timestamp (`{time}` alone uses
//!   `%Y-%m-%dT%H-%M-%S`)
//! - `{iteration}` renders the collision counter, `{iteration:N}` zero-pads it
//!   to `N` digits
//! - `{{` and `}}` are literal braces

use crate::archive::ARCHIVE_SUFFIX;
use crate::error::{Error, Result};
use crate::link::LATEST_LINK_NAME;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fmt::{self, Write};
use std::str::FromStr;

/// Template used when none is configured; renders `YYYY-MM-DD_<iteration>.log`.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{time:%Y-%m-%d}_{iteration}.log";

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Input to a single filename rendering attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilenameCandidate {
    /// Time the rotation started.
    pub timestamp: DateTime<Local>,
    /// Collision counter, starting at 0 for every rotation.
    pub iteration: u32,
}

impl FilenameCandidate {
    /// First candidate of a rotation started at `timestamp`.
    #[must_use]
    pub const fn new(timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            iteration: 0,
        }
    }

    /// The candidate to try after this one collided.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            timestamp: self.timestamp,
            iteration: self.iteration.saturating_add(1),
        }
    }
}

/// Renders filenames for rotation candidates.
///
/// Implementations must be pure: the same candidate always renders the same
/// name. The engine checks every rendered name before touching the disk.
pub trait FilenameRenderer: Send + Sync + fmt::Debug {
    /// Render the filename (a single path component) for `candidate`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] if the candidate cannot be rendered.
    fn render(&self, candidate: &FilenameCandidate) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Time(String),
    Iteration { width: usize },
}

/// A parsed filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for unknown placeholders, unbalanced braces,
    /// invalid strftime formats or an empty template.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if chars.next_if(|&(_, n)| n == '{').is_some() => literal.push('{'),
                '}' if chars.next_if(|&(_, n)| n == '}').is_some() => literal.push('}'),
                '}' => {
                    return Err(Error::Template(format!(
                        "unmatched '}}' at offset {offset} in {source:?}"
                    )));
                }
                '{' => {
                    let mut placeholder = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        placeholder.push(n);
                    }
                    if !closed {
                        return Err(Error::Template(format!(
                            "unterminated placeholder at offset {offset} in {source:?}"
                        )));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Self::parse_placeholder(&placeholder)?);
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if segments.is_empty() {
            return Err(Error::Template("template is empty".to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    fn parse_placeholder(placeholder: &str) -> Result<Segment> {
        let (name, arg) = match placeholder.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (placeholder.trim(), None),
        };

        match (name, arg) {
            ("time", None) => Ok(Segment::Time(DEFAULT_TIME_FORMAT.to_string())),
            ("time", Some(format)) => {
                if format.is_empty()
                    || StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
                {
                    return Err(Error::Template(format!(
                        "invalid time format {format:?}"
                    )));
                }
                Ok(Segment::Time(format.to_string()))
            }
            ("iteration", None) => Ok(Segment::Iteration { width: 0 }),
            ("iteration", Some(width)) => width
                .trim()
                .parse()
                .map(|width| Segment::Iteration { width })
                .map_err(|_| Error::Template(format!("invalid iteration width {width:?}"))),
            _ => Err(Error::Template(format!(
                "unknown placeholder {{{placeholder}}}"
            ))),
        }
    }

    /// The template source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether rendered names change with the iteration counter.
    ///
    /// Templates without `{iteration}` cannot resolve a same-timestamp
    /// collision; such rotations are skipped.
    #[must_use]
    pub fn uses_iteration(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Iteration { .. }))
    }
}

impl Default for FilenameTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_FILENAME_TEMPLATE.to_string(),
            segments: vec![
                Segment::Time("%Y-%m-%d".to_string()),
                Segment::Literal("_".to_string()),
                Segment::Iteration { width: 0 },
                Segment::Literal(".log".to_string()),
            ],
        }
    }
}

impl FromStr for FilenameTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FilenameRenderer for FilenameTemplate {
    fn render(&self, candidate: &FilenameCandidate) -> Result<String> {
        let mut name = String::new();

        for segment in &self.segments {
            let written = match segment {
                Segment::Literal(text) => {
                    name.push_str(text);
                    Ok(())
                }
                Segment::Time(format) => write!(name, "{}", candidate.timestamp.format(format)),
                Segment::Iteration { width } => {
                    write!(name, "{:0width$}", candidate.iteration, width = *width)
                }
            };
            written.map_err(|_| {
                Error::Template(format!("failed to render template {:?}", self.source))
            })?;
        }

        Ok(name)
    }
}

/// Checks that a rendered name is usable as a log file name in the directory.
pub(crate) fn validate_file_name(name: &str) -> Result<()> {
    let problem = if name.is_empty() {
        Some("is empty")
    } else if name.chars().any(|c| std::path::is_separator(c) || c == '\0') {
        Some("is not a single path component")
    } else if name.starts_with('.') {
        Some("starts with '.', which is reserved for staging files")
    } else if name == LATEST_LINK_NAME {
        Some("collides with the reserved latest link name")
    } else if name.ends_with(ARCHIVE_SUFFIX) {
        Some("would be mistaken for an archive")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(Error::Template(format!(
            "rendered filename {name:?} {problem}"
        ))),
        None => Ok(()),
    }
}
