//! Deterministic cache keys for batches of input texts
//!
//! A key is `{task_name}-{digest}` where the digest is the first 128 bits of
//! SHA-256 over the compact JSON array encoding of the inputs, rendered as
//! lowercase hex. JSON arrays of strings are an unambiguous encoding, so
//! reordering, splitting or joining inputs always changes the hashed bytes.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept in a key
pub const DIGEST_BYTES: usize = 16;

/// Maximum length of a task name, in bytes
pub const MAX_TASK_NAME_LEN: usize = 64;

/// Fingerprint of one `(task_name, inputs)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    rendered: String,
    task_len: usize,
}

impl CacheKey {
    /// The full key, `{task_name}-{digest}`
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// The task name embedded in the key
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.rendered[..self.task_len]
    }

    /// The hex digest of the inputs
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.rendered[self.task_len + 1..]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

/// Builds [`CacheKey`]s from a task name and an ordered batch of inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintKeyBuilder;

impl FingerprintKeyBuilder {
    /// Create a key builder
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compute the key for `inputs` under `task_name`
    pub fn build<S: AsRef<str>>(&self, task_name: &str, inputs: &[S]) -> Result<CacheKey> {
        validate_task_name(task_name)?;
        let texts: Vec<&str> = inputs.iter().map(AsRef::as_ref).collect();
        let canonical = serde_json::to_vec(&texts)
            .map_err(|e| Error::invalid_input(format!("Failed to encode inputs: {e}")))?;
        Ok(render(task_name, &canonical))
    }

    /// Compute the key for inputs given as a JSON value, which must be an array of strings
    pub fn build_from_json(&self, task_name: &str, inputs: &serde_json::Value) -> Result<CacheKey> {
        let array = inputs.as_array().ok_or_else(|| {
            Error::invalid_input(format!("Inputs must be an array of strings, got {inputs}"))
        })?;
        let texts = array
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_str().ok_or_else(|| {
                    Error::invalid_input(format!("Input {i} is not a string: {v}"))
                })
            })
            .collect::<Result<Vec<&str>>>()?;
        self.build(task_name, &texts)
    }
}

fn render(task_name: &str, canonical: &[u8]) -> CacheKey {
    let digest = Sha256::digest(canonical);
    let hex = hex::encode(&digest[..DIGEST_BYTES]);
    CacheKey {
        rendered: format!("{task_name}-{hex}"),
        task_len: task_name.len(),
    }
}

/// Task names end up in file names, so keep them to a portable subset
fn validate_task_name(task_name: &str) -> Result<()> {
    if task_name.is_empty() {
        return Err(Error::invalid_input("Task name must not be empty"));
    }
    if task_name.len() > MAX_TASK_NAME_LEN {
        return Err(Error::invalid_input(format!(
            "Task name is longer than {MAX_TASK_NAME_LEN} bytes"
        )));
    }
    if task_name.starts_with('.') {
        return Err(Error::invalid_input(format!(
            "Task name {task_name:?} must not start with '.'"
        )));
    }
    if let Some(c) = task_name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(Error::invalid_input(format!(
            "Task name {task_name:?} contains invalid character {c:?}"
        )));
    }
    Ok(())
}
