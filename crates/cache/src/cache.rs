//! Lookup-or-compute orchestration over a store and a codec

use crate::codec::{Codec, MsgPackCodec};
use crate::config::{CacheConfig, CorruptionPolicy};
use crate::key::{CacheKey, FingerprintKeyBuilder};
use crate::store::{BackingStore, FsStore};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Content-addressed cache of computation results
///
/// Each call to [`get_or_compute`](Self::get_or_compute) fingerprints its
/// inputs, returns the stored result when there is one, and otherwise runs the
/// compute function and stores what it returns. The cache holds no state of its
/// own beyond the store handle; there is no single-flight, so two concurrent
/// callers on a cold key may both compute, and the last write wins.
#[derive(Debug, Clone)]
pub struct ContentAddressedCache<S, C = MsgPackCodec> {
    store: S,
    codec: C,
    keys: FingerprintKeyBuilder,
    corruption_policy: CorruptionPolicy,
}

impl ContentAddressedCache<FsStore, MsgPackCodec> {
    /// Filesystem cache in `config.data_dir` using MessagePack entries
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        let codec = MsgPackCodec;
        let store = FsStore::new(&config.data_dir).with_extension(codec.extension());
        Self::new(store, codec).with_corruption_policy(config.corruption_policy)
    }
}

impl<S: BackingStore, C: Codec> ContentAddressedCache<S, C> {
    /// Cache over `store`, encoding entries with `codec`
    #[must_use]
    pub fn new(store: S, codec: C) -> Self {
        Self {
            store,
            codec,
            keys: FingerprintKeyBuilder::new(),
            corruption_policy: CorruptionPolicy::default(),
        }
    }

    /// Set the handling of undecodable entries
    #[must_use]
    pub fn with_corruption_policy(mut self, policy: CorruptionPolicy) -> Self {
        self.corruption_policy = policy;
        self
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The entry codec
    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The configured corruption policy
    #[must_use]
    pub fn corruption_policy(&self) -> CorruptionPolicy {
        self.corruption_policy
    }

    /// Key under which results for `inputs` are stored
    pub fn key<I: AsRef<str>>(&self, task_name: &str, inputs: &[I]) -> Result<CacheKey> {
        self.keys.build(task_name, inputs)
    }

    /// Whether a result for `inputs` is stored
    pub fn contains<I: AsRef<str>>(&self, task_name: &str, inputs: &[I]) -> Result<bool> {
        let key = self.key(task_name, inputs)?;
        self.store.exists(&key)
    }

    /// Read and decode the entry for `key`
    ///
    /// Absent entries are `Ok(None)`. Entries that fail to decode are
    /// [`Error::CacheCorruption`] regardless of the corruption policy.
    pub fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let bytes = match self.store.read(key) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|e| Error::corruption(key.as_str(), e.to_string()))
    }

    /// Return the stored result for `inputs`, or compute and store it
    ///
    /// `compute` is called at most once, and only on a miss. Its error is
    /// returned unchanged; cache errors are converted into the caller's error
    /// type through `From<Error>`, so `E` may be [`Error`] itself, a
    /// `miette::Report`, or an application error enum.
    ///
    /// A failure to persist the computed result is logged and otherwise
    /// ignored: the computed value is still returned.
    pub fn get_or_compute<T, E, I, F>(
        &self,
        task_name: &str,
        inputs: &[I],
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        I: AsRef<str>,
        F: FnOnce(&[I]) -> std::result::Result<T, E>,
    {
        let key = self.key(task_name, inputs)?;
        debug!(task = task_name, key = %key, inputs = inputs.len(), "Looking up cache entry");

        match self.lookup::<T>(&key) {
            Ok(Some(value)) => {
                info!(task = task_name, key = %key, "Reading cached {task_name}");
                return Ok(value);
            }
            Ok(None) => {}
            Err(err @ Error::CacheCorruption { .. })
                if self.corruption_policy == CorruptionPolicy::Recompute =>
            {
                warn!(
                    task = task_name,
                    key = %key,
                    error = %err,
                    "Discarding corrupt cache entry and recomputing"
                );
            }
            Err(err) => return Err(err.into()),
        }

        info!(task = task_name, key = %key, "Computing {task_name}");
        let value = compute(inputs)?;
        let bytes = self.codec.encode(&value)?;
        self.persist(&key, &bytes);
        Ok(value)
    }

    fn persist(&self, key: &CacheKey, bytes: &[u8]) {
        if let Err(e) = self.store.write(key, bytes) {
            warn!(
                key = %key,
                error = %e,
                "Failed to persist cache entry; returning computed result uncached"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::store::MemoryStore;
    use std::cell::Cell;

    #[derive(Debug)]
    enum TaskError {
        Cache(Error),
        Remote(String),
    }

    impl From<Error> for TaskError {
        fn from(e: Error) -> Self {
            Self::Cache(e)
        }
    }

    /// Store whose writes always fail, like a read-only filesystem
    #[derive(Debug, Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    impl BackingStore for ReadOnlyStore {
        fn exists(&self, key: &CacheKey) -> Result<bool> {
            self.inner.exists(key)
        }

        fn read(&self, key: &CacheKey) -> Result<Vec<u8>> {
            self.inner.read(key)
        }

        fn write(&self, _key: &CacheKey, _bytes: &[u8]) -> Result<()> {
            Err(Error::io_no_path(
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                "write",
            ))
        }
    }

    fn counted(
        calls: &Cell<usize>,
    ) -> impl FnOnce(&[&str]) -> std::result::Result<Vec<usize>, Error> + '_ {
        move |inputs| {
            calls.set(calls.get() + 1);
            Ok(inputs.iter().map(|s| s.len()).collect())
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), MsgPackCodec);
        let calls = Cell::new(0);

        let first: Vec<usize> = cache
            .get_or_compute("lengths", &["a", "bb"], counted(&calls))
            .unwrap();
        let second: Vec<usize> = cache
            .get_or_compute("lengths", &["a", "bb"], counted(&calls))
            .unwrap();

        assert_eq!(first, vec![1, 2]);
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.store().len(), 1);
    }

    #[test]
    fn test_contains_after_compute() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), JsonCodec);
        assert!(!cache.contains("lengths", &["a"]).unwrap());
        let _: Vec<usize> = cache
            .get_or_compute("lengths", &["a"], |_| Ok::<_, Error>(vec![1]))
            .unwrap();
        assert!(cache.contains("lengths", &["a"]).unwrap());
    }

    #[test]
    fn test_compute_error_passes_through() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), MsgPackCodec);
        let result: std::result::Result<Vec<f32>, TaskError> =
            cache.get_or_compute("embeddings", &["x"], |_| {
                Err(TaskError::Remote("503 Service Unavailable".to_string()))
            });

        match result {
            Err(TaskError::Remote(msg)) => assert_eq!(msg, "503 Service Unavailable"),
            other => panic!("expected remote error, got {other:?}"),
        }
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_invalid_task_name_never_computes() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), MsgPackCodec);
        let calls = Cell::new(0);
        let result: std::result::Result<Vec<usize>, Error> =
            cache.get_or_compute("../escape", &["x"], counted(&calls));
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_corrupt_entry_is_an_error_by_default() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), MsgPackCodec);
        let key = cache.key("lengths", &["a"]).unwrap();
        cache.store().insert_raw(&key, vec![0xc1]);
        let calls = Cell::new(0);

        let result: std::result::Result<Vec<usize>, TaskError> = cache
            .get_or_compute("lengths", &["a"], |inputs| {
                counted(&calls)(inputs).map_err(TaskError::from)
            });

        match result {
            Err(TaskError::Cache(Error::CacheCorruption { key: k, .. })) => {
                assert_eq!(k, key.as_str());
            }
            other => panic!("expected corruption, got {other:?}"),
        }
        assert_eq!(calls.get(), 0);
        assert_eq!(cache.store().read(&key).unwrap(), vec![0xc1]);
    }

    #[test]
    fn test_corrupt_entry_recompute_policy_overwrites() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), MsgPackCodec)
            .with_corruption_policy(CorruptionPolicy::Recompute);
        let key = cache.key("lengths", &["abc"]).unwrap();
        cache.store().insert_raw(&key, b"garbage".to_vec());
        let calls = Cell::new(0);

        let value: Vec<usize> = cache
            .get_or_compute("lengths", &["abc"], counted(&calls))
            .unwrap();
        assert_eq!(value, vec![3]);
        assert_eq!(calls.get(), 1);

        let decoded: Option<Vec<usize>> = cache.lookup(&key).unwrap();
        assert_eq!(decoded, Some(vec![3]));
    }

    #[test]
    fn test_persist_failure_still_returns_value() {
        let cache = ContentAddressedCache::new(ReadOnlyStore::default(), MsgPackCodec);
        let calls = Cell::new(0);

        let first: Vec<usize> = cache
            .get_or_compute("lengths", &["abcd"], counted(&calls))
            .unwrap();
        assert_eq!(first, vec![4]);

        // Nothing was stored, so the next call computes again
        let second: Vec<usize> = cache
            .get_or_compute("lengths", &["abcd"], counted(&calls))
            .unwrap();
        assert_eq!(second, vec![4]);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_unencodable_result_propagates() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), JsonCodec);
        // JSON object keys must be strings
        let result: std::result::Result<std::collections::BTreeMap<Vec<u8>, u8>, Error> = cache
            .get_or_compute("bytes", &["x"], |_| {
                Ok(std::collections::BTreeMap::from([(vec![1u8], 1u8)]))
            });
        assert!(matches!(result, Err(Error::Codec { .. })));
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_lookup_absent_is_none() {
        let cache = ContentAddressedCache::new(MemoryStore::new(), MsgPackCodec);
        let key = cache.key("t", &["x"]).unwrap();
        assert_eq!(cache.lookup::<Vec<u8>>(&key).unwrap(), None);
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config =
            CacheConfig::new(dir.path()).with_corruption_policy(CorruptionPolicy::Recompute);
        let cache = ContentAddressedCache::from_config(&config);
        assert_eq!(cache.store().root(), dir.path());
        assert_eq!(cache.corruption_policy(), CorruptionPolicy::Recompute);
        assert_eq!(cache.codec().extension(), "msgpack");
    }
}
