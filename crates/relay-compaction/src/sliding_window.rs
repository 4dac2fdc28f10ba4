//! Keep-last-N compaction.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use relay_core::Context;

use crate::strategy::{CompactionError, CompactionStrategy};

/// Default retention window.
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Keep only the last `window_size` messages.
///
/// Everything older is dropped with no retrievability. That loss is the
/// point of the strategy, not an accident: callers who need the history
/// preserved should use summarization or snapshot the context themselves.
#[derive(Clone, Debug)]
pub struct SlidingWindowStrategy {
    window_size: usize,
}

impl SlidingWindowStrategy {
    /// Create a strategy with the given window.
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self { window_size }
    }

    /// The retention window.
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

impl Default for SlidingWindowStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[async_trait]
impl CompactionStrategy for SlidingWindowStrategy {
    fn name(&self) -> &str {
        "sliding_window"
    }

    fn should_compact(&self, context: &Context) -> bool {
        context.len() > self.window_size
    }

    async fn compact(&self, context: Context) -> Result<Context, CompactionError> {
        let before = context.len();
        if before <= self.window_size {
            return Ok(context);
        }

        let kept = context.messages[before - self.window_size..].to_vec();
        debug!(before, after = kept.len(), "sliding window compacted context");
        Ok(context
            .with_replaced_messages(kept)
            .with_compaction_stamp("sliding_window"))
    }

    fn introspect(&self) -> Value {
        json!({ "windowSize": self.window_size })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
