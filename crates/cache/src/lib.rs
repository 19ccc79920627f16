//! Content-addressed result cache for remote text API calls
//!
//! This crate turns an expensive call over a batch of texts (an embeddings or
//! moderation request, say) into an idempotent, cache-checked operation:
//! - [`FingerprintKeyBuilder`] derives a deterministic key from a task name and
//!   the ordered inputs
//! - [`ContentAddressedCache`] returns the stored result for that key, or runs
//!   the compute function and stores its result
//! - [`BackingStore`] and [`Codec`] are the seams for persistence and
//!   serialization, with [`FsStore`] and [`MsgPackCodec`] as defaults
//!
//! # Guarantees
//!
//! - At most one committed entry per key; writes are atomic (temp file + rename)
//! - Undecodable entries surface as [`Error::CacheCorruption`] unless the
//!   [`CorruptionPolicy::Recompute`] policy is configured
//! - Compute errors reach the caller unchanged
//! - Failing to store a result never fails the call
//!
//! There is no single-flight: concurrent callers on a cold key may both compute.

#![expect(
    clippy::missing_errors_doc,
    reason = "Error variants are documented on the Error enum"
)]

mod cache;
mod codec;
mod config;
mod error;
mod key;
mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

pub use cache::ContentAddressedCache;
pub use codec::{Codec, JsonCodec, MsgPackCodec};
pub use config::{CacheConfig, CorruptionPolicy, DATA_DIR_ENV, RECOVERY_ENV};
pub use key::{CacheKey, DIGEST_BYTES, FingerprintKeyBuilder, MAX_TASK_NAME_LEN};
pub use store::{BackingStore, FsStore, MemoryStore};
