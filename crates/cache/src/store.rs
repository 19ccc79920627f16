//! Backing stores for cache entries

use crate::key::CacheKey;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Persistence medium for serialized cache entries
///
/// Stores are create/replace only: an entry, once written, is only ever
/// replaced as a whole. `write` must be atomic, so a concurrent or later
/// `read` sees either the previous state or the complete new bytes.
pub trait BackingStore: Send + Sync {
    /// Whether an entry exists for `key`
    fn exists(&self, key: &CacheKey) -> Result<bool>;

    /// Read the entry for `key`
    ///
    /// Returns [`Error::NotFound`] when there is no entry.
    fn read(&self, key: &CacheKey) -> Result<Vec<u8>>;

    /// Atomically write the entry for `key`
    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()>;
}

/// Directory of entry files, one file per key named `{key}.{extension}`
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    extension: String,
}

impl FsStore {
    /// Store entries under `root` with the default `msgpack` extension
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "msgpack".to_string(),
        }
    }

    /// Use a different file extension (usually the codec's)
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Directory holding the entries
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry file for `key`
    #[must_use]
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{key}.{}", self.extension))
    }

    /// Keys of all committed entries, sorted
    ///
    /// In-flight temporary files are skipped. A missing root means an empty cache.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(e, &self.root, "read_dir")),
        };
        let suffix = format!(".{}", self.extension);
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(e, &self.root, "read_dir"))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(&suffix) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl BackingStore for FsStore {
    fn exists(&self, key: &CacheKey) -> Result<bool> {
        let path = self.entry_path(key);
        path.try_exists().map_err(|e| Error::io(e, &path, "stat"))
    }

    fn read(&self, key: &CacheKey) -> Result<Vec<u8>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found(key.as_str())),
            Err(e) => Err(Error::io(e, &path, "read")),
        }
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::io(e, &self.root, "create_dir_all"))?;

        // Same directory as the target so the rename never crosses filesystems
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{key}."))
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(|e| Error::io(e, &self.root, "create_temp"))?;
        tmp.write_all(bytes)
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(e, tmp.path(), "sync_all"))?;

        let path = self.entry_path(key);
        tmp.persist(&path)
            .map_err(|e| Error::io(e.error, &path, "rename"))?;
        tracing::debug!(
            key = %key,
            path = %path.display(),
            size = bytes.len(),
            "Committed cache entry"
        );
        Ok(())
    }
}

/// In-process store, for tests and for embedding without a filesystem
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Overwrite the raw bytes of an entry, bypassing any codec
    pub fn insert_raw(&self, key: &CacheKey, bytes: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .insert(key.as_str().to_string(), bytes.into());
    }
}

impl BackingStore for MemoryStore {
    fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.read().contains_key(key.as_str()))
    }

    fn read(&self, key: &CacheKey) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| Error::not_found(key.as_str()))
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        self.entries
            .write()
            .insert(key.as_str().to_string(), bytes.to_vec());
        Ok(())
    }
}

impl<S: BackingStore + ?Sized> BackingStore for &S {
    fn exists(&self, key: &CacheKey) -> Result<bool> {
        (**self).exists(key)
    }

    fn read(&self, key: &CacheKey) -> Result<Vec<u8>> {
        (**self).read(key)
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        (**self).write(key, bytes)
    }
}

impl<S: BackingStore + ?Sized> BackingStore for std::sync::Arc<S> {
    fn exists(&self, key: &CacheKey) -> Result<bool> {
        (**self).exists(key)
    }

    fn read(&self, key: &CacheKey) -> Result<Vec<u8>> {
        (**self).read(key)
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        (**self).write(key, bytes)
    }
}
