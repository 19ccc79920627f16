//! Error types for the tasks crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for task operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Cache layer error (invalid input, corrupt entry, ...)
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] fr2ex_cache::Error),

    /// The remote API call failed
    #[error("Remote {task} request failed")]
    #[diagnostic(code(fr2ex::tasks::remote))]
    Remote {
        /// Task whose request failed
        task: String,
        /// Error reported by the remote client
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A result does not line up with its inputs
    #[error("Unexpected {task} result shape: {message}")]
    #[diagnostic(
        code(fr2ex::tasks::shape),
        help("Results must contain exactly one entry per input, in input order")
    )]
    Shape {
        /// Task that produced the result
        task: String,
        /// What was wrong with the shape
        message: String,
    },

    /// No usable API key
    #[error("API credentials unavailable: {message}")]
    #[diagnostic(
        code(fr2ex::tasks::credentials),
        help("Set OPENAI_API_KEY or put the key in the .api_key file")
    )]
    Credentials {
        /// Why no key could be loaded
        message: String,
    },

    /// I/O error while loading task inputs or configuration
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(code(fr2ex::tasks::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed
        operation: String,
    },
}

impl Error {
    /// Wrap an error from a remote client
    #[must_use]
    pub fn remote(
        task: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Remote {
            task: task.into(),
            source: source.into(),
        }
    }

    /// Create a shape error
    #[must_use]
    pub fn shape(task: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Shape {
            task: task.into(),
            message: msg.into(),
        }
    }

    /// Create a credentials error
    #[must_use]
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }
}

/// Result type for task operations
pub type Result<T> = std::result::Result<T, Error>;
