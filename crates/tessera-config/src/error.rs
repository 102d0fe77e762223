//! Configuration error types.
//!
//! Three levels of failure exist:
//!
//! - [`ParseError`]: a raw value could not be converted to its declared type.
//! - [`LoadError`]: a source layer is malformed or unreachable. Parse errors
//!   escalate to this immediately.
//! - [`ConfigError::Rejected`]: the merged configuration violates one or more
//!   FATAL rules. The full [`ValidationReport`] is attached.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::raw::Source;
use crate::validator::ValidationReport;

/// A raw value that cannot be converted to its declared type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {field} from `{raw_value}`: {reason}")]
pub struct ParseError {
    /// Canonical path of the field being parsed.
    pub field: String,
    /// The offending raw value. Secret fields carry a redacted placeholder.
    pub raw_value: String,
    /// Why the conversion failed.
    pub reason: String,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(
        field: impl Into<String>,
        raw_value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            raw_value: raw_value.into(),
            reason: reason.into(),
        }
    }
}

/// A configuration source that could not be merged.
///
/// A layer that fails is never partially applied: the whole load fails.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    Read {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document could not be parsed at all.
    #[error("malformed {source_layer}: {message}")]
    Syntax {
        /// Layer the document belongs to.
        source_layer: Source,
        /// Parser message.
        message: String,
    },

    /// The file extension or format name is not one we read.
    #[error("unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The rejected extension or format name.
        format: String,
    },

    /// A field value in a layer could not be parsed.
    #[error("invalid value in {source_layer}: {error}")]
    Parse {
        /// Layer containing the value.
        source_layer: Source,
        /// The parse failure, including field path and raw value.
        #[source]
        error: ParseError,
    },

    /// Unknown field in a layer (strict mode).
    #[error("unknown configuration field `{path}` in {source_layer}")]
    UnknownField {
        /// Layer containing the field.
        source_layer: Source,
        /// Full field path as written in the source.
        path: String,
    },

    /// The caller-imposed deadline expired before loading finished.
    #[error("configuration load timed out after {limit:?}")]
    Timeout {
        /// The deadline that was exceeded.
        limit: Duration,
    },
}

impl LoadError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create a new syntax error.
    pub fn syntax(source_layer: Source, message: impl ToString) -> Self {
        Self::Syntax {
            source_layer,
            message: message.to_string(),
        }
    }

    /// Create a new parse error for a layer.
    pub fn parse(source_layer: Source, error: ParseError) -> Self {
        Self::Parse {
            source_layer,
            error,
        }
    }

    /// Create a new unknown field error.
    pub fn unknown_field(source_layer: Source, path: impl Into<String>) -> Self {
        Self::UnknownField {
            source_layer,
            path: path.into(),
        }
    }

    /// Create a new unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }
}

/// Top-level error returned by loading, validation and reload.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be loaded or merged.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The merged configuration failed validation.
    #[error("configuration rejected:\n{0}")]
    Rejected(ValidationReport),

    /// The file watcher could not be set up.
    #[error("configuration watcher error: {message}")]
    Watch {
        /// Description of the failure.
        message: String,
    },
}

impl ConfigError {
    /// Create a new watcher error.
    pub fn watch(message: impl Into<String>) -> Self {
        Self::Watch {
            message: message.into(),
        }
    }

    /// The validation report, if this is a rejection.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Rejected(report) => Some(report),
            _ => None,
        }
    }
}

impl From<ValidationReport> for ConfigError {
    fn from(report: ValidationReport) -> Self {
        Self::Rejected(report)
    }
}
