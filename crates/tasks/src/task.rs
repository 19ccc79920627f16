//! Named batch tasks and their cached form

use fr2ex_cache::{BackingStore, Codec, ContentAddressedCache};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A named operation over an ordered batch of texts
///
/// The name is part of every cache key, so two tasks with different names
/// never share entries even for identical inputs.
pub trait Task {
    /// Result for a whole batch, aligned with the input order
    type Output;
    /// Error reported by the operation
    type Error;

    /// Task name used to namespace cache entries
    fn name(&self) -> &str;

    /// Run the operation on `texts`
    fn compute(&self, texts: &[String]) -> Result<Self::Output, Self::Error>;

    /// Check that `output` is a valid result for `texts`
    ///
    /// [`CachedTask`] runs this on every result, including those read back
    /// from the cache, so a stored entry that no longer fits the task is
    /// rejected rather than returned.
    fn check_output(&self, _texts: &[String], _output: &Self::Output) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A [`Task`] built from a name and a closure
#[derive(Clone)]
pub struct FnTask<F> {
    name: String,
    func: F,
}

impl<F> FnTask<F> {
    /// Name a closure as a task
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> std::fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<F, T, E> Task for FnTask<F>
where
    F: Fn(&[String]) -> Result<T, E>,
{
    type Output = T;
    type Error = E;

    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, texts: &[String]) -> Result<T, E> {
        (self.func)(texts)
    }
}

/// A task whose results are served from a [`ContentAddressedCache`]
///
/// `CachedTask` is itself a [`Task`] with the same name, output and error
/// types, so it can stand in anywhere the uncached task is used.
#[derive(Debug, Clone)]
pub struct CachedTask<T, S, C> {
    inner: T,
    cache: ContentAddressedCache<S, C>,
}

impl<T, S, C> CachedTask<T, S, C>
where
    T: Task,
    S: BackingStore,
    C: Codec,
{
    /// Serve `inner` through `cache`
    pub fn new(inner: T, cache: ContentAddressedCache<S, C>) -> Self {
        Self { inner, cache }
    }

    /// The uncached task
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The cache in front of the task
    pub fn cache(&self) -> &ContentAddressedCache<S, C> {
        &self.cache
    }
}

impl<T, S, C> Task for CachedTask<T, S, C>
where
    T: Task,
    T::Output: Serialize + DeserializeOwned,
    T::Error: From<fr2ex_cache::Error>,
    S: BackingStore,
    C: Codec,
{
    type Output = T::Output;
    type Error = T::Error;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn compute(&self, texts: &[String]) -> Result<T::Output, T::Error> {
        let output = self
            .cache
            .get_or_compute(self.inner.name(), texts, |texts| self.inner.compute(texts))?;
        self.inner.check_output(texts, &output)?;
        Ok(output)
    }

    fn check_output(&self, texts: &[String], output: &T::Output) -> Result<(), T::Error> {
        self.inner.check_output(texts, output)
    }
}

/// Extension for wrapping any task in a cache
pub trait TaskExt: Task + Sized {
    /// Serve this task through `cache`
    fn cached<S: BackingStore, C: Codec>(
        self,
        cache: ContentAddressedCache<S, C>,
    ) -> CachedTask<Self, S, C> {
        CachedTask::new(self, cache)
    }
}

impl<T: Task> TaskExt for T {}
