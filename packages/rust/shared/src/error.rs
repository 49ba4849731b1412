//! Error types for docgraph.
//!
//! Library crates use [`DocGraphError`] via `thiserror` for operational
//! failures and violated invariants. Expected content problems (missing files,
//! include cycles, moniker conflicts) are never errors of this type: they are
//! collected as [`Diagnostic`](crate::Diagnostic) values instead.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docgraph operations.
#[derive(Debug, thiserror::Error)]
pub enum DocGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML/TOML/JSON parsing error outside of content diagnostics.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Render state was accessed while no render is active on the context.
    #[error("no active render on this context")]
    NoActiveRender,

    /// A render handle was ended out of order.
    #[error("render stack mismatch: expected depth {expected}, found {actual}")]
    RenderStackMismatch { expected: usize, actual: usize },

    /// The named pipeline parses outlines, not documents.
    #[error("the '{0}' pipeline does not render documents")]
    NotRenderable(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocGraphError>;

impl DocGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
