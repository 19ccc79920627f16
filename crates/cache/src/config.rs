//! Cache configuration and data directory resolution

use crate::{Error, Result};
use dirs::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "FR2EX_DATA_DIR";

/// Environment variable selecting the [`CorruptionPolicy`]
pub const RECOVERY_ENV: &str = "FR2EX_CACHE_RECOVERY";

/// What to do when an entry exists but cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptionPolicy {
    /// Surface [`Error::CacheCorruption`] to the caller
    #[default]
    Fail,
    /// Log a warning, recompute, and overwrite the entry
    Recompute,
}

impl FromStr for CorruptionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "recompute" => Ok(Self::Recompute),
            other => Err(Error::configuration(format!(
                "Unknown corruption policy {other:?} (expected \"fail\" or \"recompute\")"
            ))),
        }
    }
}

/// Settings for a filesystem-backed cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Directory holding entry files
    pub data_dir: PathBuf,
    /// Handling of undecodable entries
    #[serde(default)]
    pub corruption_policy: CorruptionPolicy,
}

impl CacheConfig {
    /// Config with an explicit data directory and the default policy
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            corruption_policy: CorruptionPolicy::default(),
        }
    }

    /// Set the corruption policy
    #[must_use]
    pub fn with_corruption_policy(mut self, policy: CorruptionPolicy) -> Self {
        self.corruption_policy = policy;
        self
    }

    /// Resolve the config from the environment
    ///
    /// See [`DATA_DIR_ENV`] and [`RECOVERY_ENV`].
    pub fn from_env() -> Result<Self> {
        let data_dir = data_dir_from_inputs(DataDirInputs {
            fr2ex_data_dir: non_empty_env(DATA_DIR_ENV).map(PathBuf::from),
            xdg_cache_home: non_empty_env("XDG_CACHE_HOME").map(PathBuf::from),
            os_cache_dir: cache_dir(),
            home_dir: home_dir(),
            temp_dir: std::env::temp_dir(),
        })?;
        let corruption_policy = match non_empty_env(RECOVERY_ENV) {
            Some(value) => value.parse()?,
            None => CorruptionPolicy::default(),
        };
        Ok(Self {
            data_dir,
            corruption_policy,
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Inputs for determining the data directory
#[derive(Debug, Clone)]
struct DataDirInputs {
    fr2ex_data_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

/// First candidate that exists (or can be created) and accepts new files
///
/// Candidates, in order: the explicit override, `$XDG_CACHE_HOME/fr2ex`, the
/// OS cache dir, `~/.fr2ex/data`, then `$TMPDIR/fr2ex/data`.
fn data_dir_from_inputs(inputs: DataDirInputs) -> Result<PathBuf> {
    let DataDirInputs {
        fr2ex_data_dir,
        xdg_cache_home,
        os_cache_dir,
        home_dir,
        temp_dir,
    } = inputs;

    fr2ex_data_dir
        .into_iter()
        .chain(xdg_cache_home.map(|dir| dir.join("fr2ex")))
        .chain(os_cache_dir.map(|dir| dir.join("fr2ex")))
        .chain(home_dir.map(|dir| dir.join(".fr2ex").join("data")))
        .chain(std::iter::once(temp_dir.join("fr2ex").join("data")))
        .find(|dir| accepts_entries(dir))
        .ok_or_else(|| Error::configuration("Failed to determine a writable data directory"))
}

/// Create `dir` if needed and check that a file can be created inside it
///
/// The check file is anonymous, so nothing is left behind.
fn accepts_entries(dir: &Path) -> bool {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::debug!(path = %dir.display(), "Data directory unavailable: {e}");
        return false;
    }
    match tempfile::tempfile_in(dir) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(path = %dir.display(), "Data directory not writable: {e}");
            false
        }
    }
}
