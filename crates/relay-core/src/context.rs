//! The immutable conversation-state value threaded through calls.
//!
//! A [`Context`] is an ordered message list plus a metadata map. The engine
//! never mutates a context in place: every call returns a *new* value built
//! with the `with_*` helpers, so concurrent calls over the same client are
//! safe by construction.
//!
//! Well-known metadata keys:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `total_tokens` | Cumulative token count across completed calls |
//! | `last_compaction_at` | RFC 3339 timestamp of the last compaction |
//! | `compaction_strategy` | Tag of the strategy that last compacted |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::messages::{CallInput, Message};
use crate::response::Response;

/// Metadata key holding the cumulative token count.
pub const TOTAL_TOKENS_KEY: &str = "total_tokens";
/// Metadata key holding the last compaction timestamp.
pub const LAST_COMPACTION_AT_KEY: &str = "last_compaction_at";
/// Metadata key holding the active compaction strategy tag.
pub const COMPACTION_STRATEGY_KEY: &str = "compaction_strategy";

/// Conversation state: ordered messages plus metadata.
///
/// Append-only from the engine's view, except across a compaction, which
/// replaces the message list but preserves metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Conversation history in order.
    pub messages: Vec<Message>,
    /// Metadata map (token counts, compaction stamps, caller data).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context pre-seeded with messages.
    #[must_use]
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            metadata: Map::new(),
        }
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the context holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    // ── Functional updates ──────────────────────────────────────────────

    /// Append one message, returning the new context.
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append a completed (user input, assistant response) exchange.
    #[must_use]
    pub fn with_exchange(self, input: &CallInput, response: &Response) -> Self {
        self.with_message(input.to_user_message())
            .with_message(Message::assistant(response.content_text()))
    }

    /// Replace the message list, preserving metadata.
    ///
    /// This is the compaction escape hatch; everything else appends.
    #[must_use]
    pub fn with_replaced_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Set a metadata entry, returning the new context.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.metadata.insert(key.into(), value);
        self
    }

    /// Set the cumulative token count.
    #[must_use]
    pub fn with_total_tokens(self, total: u64) -> Self {
        self.with_metadata(TOTAL_TOKENS_KEY, json!(total))
    }

    /// Stamp a completed compaction: timestamp plus strategy tag.
    #[must_use]
    pub fn with_compaction_stamp(self, strategy: &str) -> Self {
        self.with_metadata(LAST_COMPACTION_AT_KEY, json!(Utc::now().to_rfc3339()))
            .with_metadata(COMPACTION_STRATEGY_KEY, json!(strategy))
    }

    // ── Typed accessors ─────────────────────────────────────────────────

    /// Cumulative token count (zero when never set).
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.metadata
            .get(TOTAL_TOKENS_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Timestamp of the last compaction, when one has occurred.
    #[must_use]
    pub fn last_compaction_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(LAST_COMPACTION_AT_KEY)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Tag of the strategy that last compacted this context.
    #[must_use]
    pub fn strategy_tag(&self) -> Option<&str> {
        self.metadata
            .get(COMPACTION_STRATEGY_KEY)
            .and_then(Value::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Role;

    #[test]
    fn new_context_is_empty() {
        let ctx = Context::new();
        assert!(ctx.is_empty());
        assert_eq!(ctx.len(), 0);
        assert_eq!(ctx.total_tokens(), 0);
        assert!(ctx.last_compaction_at().is_none());
        assert!(ctx.strategy_tag().is_none());
    }

    #[test]
    fn with_message_appends_in_order() {
        let ctx = Context::new()
            .with_message(Message::user("one"))
            .with_message(Message::assistant("two"));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.messages[0].text(), "one");
        assert_eq!(ctx.messages[1].text(), "two");
    }

    #[test]
    fn with_message_does_not_mutate_original() {
        let ctx = Context::new().with_message(Message::user("base"));
        let extended = ctx.clone().with_message(Message::assistant("more"));
        assert_eq!(ctx.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn with_exchange_appends_user_then_assistant() {
        let input: CallInput = "question".into();
        let response = Response::text("answer");
        let ctx = Context::new().with_exchange(&input, &response);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.messages[0].role, Role::User);
        assert_eq!(ctx.messages[0].text(), "question");
        assert_eq!(ctx.messages[1].role, Role::Assistant);
        assert_eq!(ctx.messages[1].text(), "answer");
    }

    #[test]
    fn with_replaced_messages_preserves_metadata() {
        let ctx = Context::new()
            .with_message(Message::user("old"))
            .with_total_tokens(500);
        let replaced = ctx.with_replaced_messages(vec![Message::user("new")]);
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced.total_tokens(), 500);
    }

    #[test]
    fn total_tokens_roundtrip() {
        let ctx = Context::new().with_total_tokens(1234);
        assert_eq!(ctx.total_tokens(), 1234);
    }

    #[test]
    fn compaction_stamp_sets_timestamp_and_tag() {
        let ctx = Context::new().with_compaction_stamp("sliding_window");
        assert_eq!(ctx.strategy_tag(), Some("sliding_window"));
        let at = ctx.last_compaction_at().unwrap();
        assert!((Utc::now() - at).num_seconds().abs() < 5);
    }

    #[test]
    fn compaction_stamp_preserves_other_metadata() {
        let ctx = Context::new()
            .with_metadata("caller", serde_json::json!("tests"))
            .with_total_tokens(42)
            .with_compaction_stamp("summarization");
        assert_eq!(ctx.metadata["caller"], "tests");
        assert_eq!(ctx.total_tokens(), 42);
    }

    #[test]
    fn serde_roundtrip() {
        let ctx = Context::new()
            .with_message(Message::user("hello"))
            .with_total_tokens(10);
        let json = serde_json::to_string(&ctx).unwrap();
        let back: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(ctx, back);
    }
}
