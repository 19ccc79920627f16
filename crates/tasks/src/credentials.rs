//! API key loading
//!
//! Credentials are resolved once by the caller and handed to the remote
//! client when it is constructed; nothing here touches global state.

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::Path;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default key file, relative to the working directory
pub const DEFAULT_API_KEY_FILE: &str = ".api_key";

/// API key for the remote service
#[derive(Clone)]
pub struct ApiCredentials {
    key: SecretString,
}

impl ApiCredentials {
    /// Use an explicit key
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(Error::credentials("API key is empty"));
        }
        Ok(Self {
            key: SecretString::from(trimmed.to_string()),
        })
    }

    /// Read the key from [`API_KEY_ENV`], if set
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(API_KEY_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::new(value).map(Some),
            _ => Ok(None),
        }
    }

    /// Read the key from a file containing just the key
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        Self::new(contents).map_err(|_| {
            Error::credentials(format!("API key file {} is empty", path.display()))
        })
    }

    /// Resolve a key: an explicit value, then [`API_KEY_ENV`], then `key_file`
    pub fn resolve(explicit: Option<String>, key_file: impl AsRef<Path>) -> Result<Self> {
        if let Some(key) = explicit {
            return Self::new(key);
        }
        if let Some(creds) = Self::from_env()? {
            tracing::debug!("Using API key from {API_KEY_ENV}");
            return Ok(creds);
        }
        let key_file = key_file.as_ref();
        if !key_file.exists() {
            return Err(Error::credentials(format!(
                "{API_KEY_ENV} is not set and {} does not exist",
                key_file.display()
            )));
        }
        tracing::debug!(path = %key_file.display(), "Using API key file");
        Self::from_file(key_file)
    }

    /// The key itself
    ///
    /// Pass it straight to the client; never log or persist it.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.key.expose_secret()
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredentials([REDACTED])")
    }
}
