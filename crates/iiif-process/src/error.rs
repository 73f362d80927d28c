//! Error types for derivative processing
//!
//! Per-task errors (source open, palette, rewrite, derivative, dimensions)
//! are logged and absorbed by the orchestrator; report write errors are
//! logged and absorbed by the batch runner. Only setup-level errors reach the
//! caller.

use crate::instructions::Label;
use crate::uri::UriError;
use iiif_cache::CacheError;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Boxed error returned by external collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main processing error type
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Driver could not open the origin image
    #[error("failed to open {origin}: {source}")]
    SourceOpen {
        origin: String,
        #[source]
        source: BoxError,
    },

    /// Palette computation failed
    #[error("failed to derive palette for {uri}: {source}")]
    Palette {
        uri: String,
        #[source]
        source: BoxError,
    },

    /// Target derivation or rewrite URI parsing failed
    #[error("failed to derive target {uri} ({label}): {source}")]
    Rewrite {
        uri: String,
        label: Label,
        #[source]
        source: UriError,
    },

    /// Processor failed to produce a derivative
    #[error("failed to process {uri} ({label}): {source}")]
    Derivative {
        uri: String,
        label: Label,
        #[source]
        source: BoxError,
    },

    /// Derivative image could not report its size
    #[error("failed to read dimensions of {uri} ({label}): {source}")]
    DimensionQuery {
        uri: String,
        label: Label,
        #[source]
        source: BoxError,
    },

    /// Report sink write failed
    #[error("unable to write process report {key}: {source}")]
    ReportPersist {
        key: String,
        #[source]
        source: CacheError,
    },

    /// Instruction set could not be decoded
    #[error("invalid instructions: {0}")]
    InvalidInstructions(String),

    /// Configuration is unusable
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// JSON encoding failed
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// IO error reading configuration or instructions
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Classify the error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceOpen { .. } => ErrorKind::SourceOpen,
            Self::Palette { .. } => ErrorKind::Palette,
            Self::Rewrite { .. } => ErrorKind::Rewrite,
            Self::Derivative { .. } => ErrorKind::Derivative,
            Self::DimensionQuery { .. } => ErrorKind::DimensionQuery,
            Self::ReportPersist { .. } => ErrorKind::ReportPersist,
            Self::InvalidInstructions(_)
            | Self::InvalidConfig(_)
            | Self::Encode { .. }
            | Self::Io { .. } => ErrorKind::Setup,
        }
    }

    /// Check if the error is absorbed rather than returned
    #[inline]
    #[must_use]
    pub fn is_absorbed(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Setup)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceOpen,
    Palette,
    Rewrite,
    Derivative,
    DimensionQuery,
    ReportPersist,
    Setup,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SourceOpen => "source-open",
            Self::Palette => "palette",
            Self::Rewrite => "rewrite",
            Self::Derivative => "derivative",
            Self::DimensionQuery => "dimension-query",
            Self::ReportPersist => "report-persist",
            Self::Setup => "setup",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(msg: &str) -> BoxError {
        msg.to_string().into()
    }

    #[test]
    fn derivative_error_display_has_context() {
        let err = ProcessError::Derivative {
            uri: "avocado.png".to_string(),
            label: Label::new("b").unwrap(),
            source: boxed("decoder exploded"),
        };

        let msg = err.to_string();
        assert!(msg.contains("avocado.png"));
        assert!(msg.contains("(b)"));
        assert!(msg.contains("decoder exploded"));
        assert_eq!(err.kind(), ErrorKind::Derivative);
    }

    #[test]
    fn source_chain_is_preserved() {
        let err = ProcessError::Rewrite {
            uri: "idsecret:///avocado.png?id=1&secret=x".to_string(),
            label: Label::original(),
            source: UriError::MissingOriginalSecret,
        };

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("original secret"));
    }

    #[test]
    fn setup_errors_are_not_absorbed() {
        assert!(!ProcessError::InvalidConfig("x".into()).is_absorbed());
        assert!(!ProcessError::InvalidInstructions("x".into()).is_absorbed());
        assert!(ProcessError::Palette {
            uri: "a".into(),
            source: boxed("b"),
        }
        .is_absorbed());
        assert!(ProcessError::ReportPersist {
            key: "a/process.json".into(),
            source: CacheError::missing("a/process.json"),
        }
        .is_absorbed());
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::DimensionQuery.to_string(), "dimension-query");
    }
}
