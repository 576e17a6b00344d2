//! Unified error type for shutterbox.
//!
//! All crates funnel their failures into [`Error`]. The sync pipeline uses
//! [`Error::is_item_level`] to tell recoverable per-file failures apart from
//! failures that must abort a run.

use std::fmt;

/// Unified error type covering all failure modes in shutterbox.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "image", "sync run").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (exiftool) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Metadata could not be read or interpreted.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A rule group failed to decode or compile.
    #[error("Rule error: {0}")]
    Rule(#[from] sb_rules::RuleError),

    /// A pipeline stage failed.
    #[error("Pipeline error [{stage}]: {message}")]
    Pipeline {
        /// The stage that failed.
        stage: String,
        /// Human-readable error description.
        message: String,
    },

    /// The run was cancelled before it completed.
    #[error("Cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error concerns a single file and should only drop that
    /// file rather than abort the run.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Tool { .. } | Error::Metadata(_)
        )
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
