//! Backend response types.
//!
//! A [`Response`] is what a backend dispatch produces: content (plain text
//! or a structured JSON value), optional reasoning text, a finish reason,
//! token usage, and free-form metadata. Immutable once constructed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Finish reason
// ─────────────────────────────────────────────────────────────────────────────

/// Why the backend stopped generating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation.
    Stop,
    /// Hit the output token limit.
    MaxTokens,
    /// Output was filtered by the backend.
    ContentFilter,
    /// The backend reported an in-band error.
    Error,
    /// Backend-specific extension reason.
    #[serde(untagged)]
    Other(String),
}

impl FinishReason {
    /// Stable string form for events and logging.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::MaxTokens => "max_tokens",
            Self::ContentFilter => "content_filter",
            Self::Error => "error",
            Self::Other(tag) => tag,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Usage
// ─────────────────────────────────────────────────────────────────────────────

/// Token usage reported by a backend.
///
/// Backends that do not report usage leave `Response::usage` as `None`;
/// an all-default `Usage` is also treated as empty by the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Input (prompt) tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output (completion) tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Backend-reported total, when it differs from input + output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// Reasoning tokens, when the backend reports them separately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

impl Usage {
    /// Derivable total: the reported total when present, else input + output.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or(self.input_tokens + self.output_tokens)
    }

    /// Whether this usage carries no information.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// Response content — plain text or a structured JSON value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    /// Plain text output.
    Text(String),
    /// Structured output (already-parsed JSON value).
    Structured(Value),
}

/// A completed backend response. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Generated content.
    pub content: ResponseContent,
    /// Reasoning text, when the backend exposes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Token usage, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Response {
    /// Create a plain-text response with a `stop` finish reason.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: ResponseContent::Text(text.into()),
            reasoning: None,
            finish_reason: FinishReason::Stop,
            usage: None,
            metadata: Map::new(),
        }
    }

    /// Create a structured response with a `stop` finish reason.
    #[must_use]
    pub fn structured(value: Value) -> Self {
        Self {
            content: ResponseContent::Structured(value),
            reasoning: None,
            finish_reason: FinishReason::Stop,
            usage: None,
            metadata: Map::new(),
        }
    }

    /// Attach usage, returning the modified response.
    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attach a finish reason, returning the modified response.
    #[must_use]
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    /// Text rendering of the content.
    ///
    /// Structured values render as compact JSON.
    #[must_use]
    pub fn content_text(&self) -> String {
        match &self.content {
            ResponseContent::Text(text) => text.clone(),
            ResponseContent::Structured(value) => value.to_string(),
        }
    }

    /// Whether usage information is present and non-empty.
    #[must_use]
    pub fn has_usage(&self) -> bool {
        self.usage.as_ref().is_some_and(|u| !u.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- FinishReason --

    #[test]
    fn finish_reason_serde() {
        assert_eq!(
            serde_json::to_string(&FinishReason::Stop).unwrap(),
            "\"stop\""
        );
        assert_eq!(
            serde_json::to_string(&FinishReason::MaxTokens).unwrap(),
            "\"max_tokens\""
        );
        assert_eq!(
            serde_json::to_string(&FinishReason::Other("tool_use".into())).unwrap(),
            "\"tool_use\""
        );
    }

    #[test]
    fn finish_reason_extension_deserializes() {
        let reason: FinishReason = serde_json::from_str("\"safety_pause\"").unwrap();
        assert_eq!(reason, FinishReason::Other("safety_pause".into()));
        assert_eq!(reason.as_str(), "safety_pause");
    }

    #[test]
    fn finish_reason_known_deserializes_as_variant() {
        let reason: FinishReason = serde_json::from_str("\"content_filter\"").unwrap();
        assert_eq!(reason, FinishReason::ContentFilter);
    }

    // -- Usage --

    #[test]
    fn usage_total_prefers_reported() {
        let usage = Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: Some(20),
            reasoning_tokens: None,
        };
        assert_eq!(usage.total(), 20);
    }

    #[test]
    fn usage_total_derives_from_parts() {
        let usage = Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: None,
            reasoning_tokens: None,
        };
        assert_eq!(usage.total(), 15);
    }

    #[test]
    fn usage_empty() {
        assert!(Usage::default().is_empty());
        assert!(
            !Usage {
                output_tokens: 1,
                ..Usage::default()
            }
            .is_empty()
        );
    }

    // -- Response --

    #[test]
    fn response_text_constructor() {
        let resp = Response::text("hello");
        assert_eq!(resp.content_text(), "hello");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert!(!resp.has_usage());
    }

    #[test]
    fn response_structured_content_text() {
        let resp = Response::structured(json!({"ok": true}));
        assert_eq!(resp.content_text(), r#"{"ok":true}"#);
    }

    #[test]
    fn response_has_usage_requires_non_empty() {
        let resp = Response::text("x").with_usage(Usage::default());
        assert!(!resp.has_usage());

        let resp = Response::text("x").with_usage(Usage {
            input_tokens: 1,
            ..Usage::default()
        });
        assert!(resp.has_usage());
    }

    #[test]
    fn response_serde_roundtrip() {
        let resp = Response::text("body")
            .with_finish_reason(FinishReason::MaxTokens)
            .with_usage(Usage {
                input_tokens: 7,
                output_tokens: 3,
                total_tokens: None,
                reasoning_tokens: Some(2),
            });
        let json = serde_json::to_string(&resp).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, back);
    }

    #[test]
    fn response_camel_case_wire_naming() {
        let resp = Response::text("x").with_finish_reason(FinishReason::Stop);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["finishReason"], "stop");
        assert!(json.get("usage").is_none());
    }
}
