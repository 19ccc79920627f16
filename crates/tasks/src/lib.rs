//! Cached embeddings and moderation tasks
//!
//! This crate provides the task layer on top of `fr2ex-cache`:
//! - [`Task`]: a named operation over an ordered batch of texts
//! - [`CachedTask`]: any task served through a content-addressed cache
//! - [`EmbeddingsTask`] and [`ModerationTask`]: result validation around an
//!   injected remote client, with [`EmbeddingsMatrix`] and [`ModerationResult`]
//!   as the cached result types
//! - [`ApiCredentials`]: explicit API key resolution for those clients
//!
//! HTTP, retries and rate limiting belong to the injected client.

#![expect(
    clippy::missing_errors_doc,
    reason = "Error variants are documented on the Error enum"
)]

mod credentials;
mod embeddings;
mod error;
mod moderation;
mod task;

// Re-export error types at crate root
pub use error::{Error, Result};

pub use credentials::{API_KEY_ENV, ApiCredentials, DEFAULT_API_KEY_FILE};
pub use embeddings::{ADA_002_DIMENSION, EMBEDDINGS_TASK, EmbeddingsMatrix, EmbeddingsTask};
pub use moderation::{
    Categories, Category, CategoryMap, CategoryScores, MODERATION_TASK, ModerationResult,
    ModerationTask,
};
pub use task::{CachedTask, FnTask, Task, TaskExt};
