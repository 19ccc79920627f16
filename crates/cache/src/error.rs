//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Malformed input to key building
    #[error("Invalid cache input: {message}")]
    #[diagnostic(
        code(fr2ex::cache::invalid_input),
        help("Task names may only contain ASCII letters, digits, '_', '-' and '.'")
    )]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// An entry exists under the key but could not be decoded
    #[error("Cache entry {key} is corrupt: {message}")]
    #[diagnostic(
        code(fr2ex::cache::corruption),
        help("Delete the entry, or set FR2EX_CACHE_RECOVERY=recompute to overwrite it")
    )]
    CacheCorruption {
        /// Key of the corrupt entry
        key: String,
        /// Decoder error message
        message: String,
    },

    /// I/O error during cache operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(fr2ex::cache::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// Configuration or validation error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(fr2ex::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Cache key not present in the backing store
    #[error("Cache key not found: {key}")]
    #[diagnostic(
        code(fr2ex::cache::not_found),
        help("The cache entry may have been evicted or never existed")
    )]
    NotFound {
        /// The cache key that was not found
        key: String,
    },

    /// A result could not be encoded, or bytes could not be decoded outside a lookup
    #[error("Codec error: {message}")]
    #[diagnostic(code(fr2ex::cache::codec))]
    Codec {
        /// Error message from the codec
        message: String,
    },
}

impl Error {
    /// Create an invalid input error
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create a corruption error for the entry stored under `key`
    #[must_use]
    pub fn corruption(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CacheCorruption {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
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

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a codec error
    #[must_use]
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec {
            message: msg.into(),
        }
    }

    /// Whether this error means the entry is simply absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
