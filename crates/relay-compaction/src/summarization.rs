//! Summarize-the-prefix compaction.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use relay_backend::Backend;
use relay_core::{Context, GenerationParams, Message};

use crate::strategy::{CompactionError, CompactionStrategy};

/// Default number of recent messages kept verbatim.
pub const DEFAULT_KEEP_LAST: usize = 3;

/// Marker prefix carried by every generated summary message.
pub const SUMMARY_MARKER: &str = "Conversation Summary";

/// Summarize older history through a backend call, keep the tail verbatim.
///
/// The history splits into an older prefix and a `keep_last` suffix. The
/// prefix is rendered as a transcript and sent to the summarizer backend,
/// which may differ from the primary backend; the rebuilt context is the
/// summary message followed by the untouched suffix.
///
/// Auto-compaction requires an explicit `token_threshold`; without one the
/// strategy only ever runs when invoked directly (manual-only mode).
pub struct SummarizationStrategy {
    summarizer: Arc<dyn Backend>,
    params: GenerationParams,
    keep_last: usize,
    token_threshold: Option<u64>,
}

impl SummarizationStrategy {
    /// Create a strategy with defaults: keep the last three messages,
    /// manual-only triggering.
    #[must_use]
    pub fn new(summarizer: Arc<dyn Backend>, params: GenerationParams) -> Self {
        Self {
            summarizer,
            params,
            keep_last: DEFAULT_KEEP_LAST,
            token_threshold: None,
        }
    }

    /// Set how many recent messages survive verbatim.
    #[must_use]
    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.keep_last = keep_last;
        self
    }

    /// Enable auto-compaction at this cumulative token count.
    #[must_use]
    pub fn with_token_threshold(mut self, threshold: u64) -> Self {
        self.token_threshold = Some(threshold);
        self
    }

    fn transcript(prefix: &[Message]) -> String {
        let mut out = String::new();
        for message in prefix {
            let _ = writeln!(out, "{}: {}", message.role, message.text());
        }
        out
    }
}

#[async_trait]
impl CompactionStrategy for SummarizationStrategy {
    fn name(&self) -> &str {
        "summarization"
    }

    fn should_compact(&self, context: &Context) -> bool {
        self.token_threshold
            .is_some_and(|threshold| context.total_tokens() >= threshold)
    }

    async fn compact(&self, context: Context) -> Result<Context, CompactionError> {
        let before = context.len();
        if before <= self.keep_last {
            return Ok(context);
        }

        let split = before - self.keep_last;
        let prefix = &context.messages[..split];
        let suffix = context.messages[split..].to_vec();

        let prompt = Message::user(format!(
            "Summarize the following conversation concisely, preserving decisions, \
             facts, and open threads:\n\n{}",
            Self::transcript(prefix)
        ));
        let response = self
            .summarizer
            .complete(&self.params, &[prompt])
            .await
            .map_err(|source| CompactionError::Summarization { source })?;

        let mut rebuilt = Vec::with_capacity(1 + suffix.len());
        rebuilt.push(Message::user(format!(
            "[{SUMMARY_MARKER}]\n{}",
            response.content_text()
        )));
        rebuilt.extend(suffix);

        debug!(before, after = rebuilt.len(), "summarization compacted context");
        Ok(context
            .with_replaced_messages(rebuilt)
            .with_compaction_stamp("summarization"))
    }

    fn introspect(&self) -> Value {
        json!({
            "keepLast": self.keep_last,
            "tokenThreshold": self.token_threshold,
            "summarizer": self.summarizer.id(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
