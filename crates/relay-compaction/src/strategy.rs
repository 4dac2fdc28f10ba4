//! The strategy contract and compaction error type.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use relay_core::{BackendError, Context};

/// Errors produced by a compaction strategy.
#[derive(Debug, Error)]
pub enum CompactionError {
    /// The summarization backend call failed.
    #[error("summarization call failed: {source}")]
    Summarization {
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// The strategy was given a config it cannot operate with.
    #[error("invalid strategy config: {message}")]
    InvalidConfig {
        /// What was invalid.
        message: String,
    },
}

/// A concrete compaction algorithm.
///
/// `compact` must never lose messages silently on failure: it either
/// returns a smaller context or an error, and the engine keeps the
/// pre-compaction context on error.
#[async_trait]
pub trait CompactionStrategy: Send + Sync {
    /// Strategy tag stamped into context metadata and event payloads.
    fn name(&self) -> &str;

    /// Whether auto-compaction should run on this context.
    ///
    /// Defaults to `false`: a strategy without an auto trigger is a valid,
    /// manual-only configuration.
    fn should_compact(&self, _context: &Context) -> bool {
        false
    }

    /// Produce a compacted context.
    ///
    /// Must preserve metadata other than the compaction stamp, and must be
    /// a no-op when the context is already at or below the strategy's
    /// retention size.
    async fn compact(&self, context: Context) -> Result<Context, CompactionError>;

    /// Describe the effective configuration.
    fn introspect(&self) -> Value {
        Value::Object(Map::new())
    }
}

impl std::fmt::Debug for dyn CompactionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionStrategy")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
