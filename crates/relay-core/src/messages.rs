//! Message types for the relay conversation model.
//!
//! Messages form the conversation history passed to generation backends.
//! Three roles: system, user, and assistant. Content is an ordered list of
//! parts (text, image, file) so multimodal input and plain text share one
//! representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Backend-generated output.
    Assistant,
}

impl Role {
    /// Stable string form, matching the wire naming.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content parts
// ─────────────────────────────────────────────────────────────────────────────

/// One element of a message's content list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Image reference (URL, data URI, or backend-specific handle).
    Image {
        /// Image source.
        source: String,
        /// MIME type, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    /// File reference.
    File {
        /// File source.
        source: String,
        /// Display name, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ContentPart {
    /// Create a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Borrow the text of a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } | Self::File { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// A conversation message. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Ordered content parts.
    pub content: Vec<ContentPart>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Message {
    /// Create a message from a role and parts.
    #[must_use]
    pub fn from_parts(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            role,
            content,
            metadata: Map::new(),
        }
    }

    /// Create a system message from plain text.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::from_parts(Role::System, vec![ContentPart::text(text)])
    }

    /// Create a user message from plain text.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::from_parts(Role::User, vec![ContentPart::text(text)])
    }

    /// Create an assistant message from plain text.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::from_parts(Role::Assistant, vec![ContentPart::text(text)])
    }

    /// Attach a metadata entry, returning the modified message.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.metadata.insert(key.into(), value);
        self
    }

    /// Concatenated text of all text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns `true` if this is a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Returns `true` if this is an assistant message.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call input
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-supplied input for one call — plain text or structured parts.
///
/// This is the value the `on_call_start` hook stage transforms before the
/// outbound user message is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallInput {
    /// Simple text.
    Text(String),
    /// Structured content parts.
    Parts(Vec<ContentPart>),
}

impl CallInput {
    /// Convert into content parts for an outbound user message.
    #[must_use]
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            Self::Text(text) => vec![ContentPart::text(text)],
            Self::Parts(parts) => parts,
        }
    }

    /// Build the outbound user message without consuming the input.
    #[must_use]
    pub fn to_user_message(&self) -> Message {
        Message::from_parts(Role::User, self.clone().into_parts())
    }

    /// Concatenated text of all text content.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for CallInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for CallInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ContentPart>> for CallInput {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- Role --

    #[test]
    fn role_serde() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::User.to_string(), "user");
    }

    // -- ContentPart --

    #[test]
    fn content_part_text_accessor() {
        let part = ContentPart::text("hello");
        assert_eq!(part.as_text(), Some("hello"));

        let image = ContentPart::Image {
            source: "https://example.com/a.png".into(),
            media_type: Some("image/png".into()),
        };
        assert!(image.as_text().is_none());
    }

    #[test]
    fn content_part_serde_tagged() {
        let part = ContentPart::text("hi");
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");

        let file = ContentPart::File {
            source: "/tmp/report.pdf".into(),
            name: None,
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "file");
        assert!(json.get("name").is_none());
    }

    // -- Message --

    #[test]
    fn message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert!(Message::user("u").is_user());
        assert!(Message::assistant("a").is_assistant());
    }

    #[test]
    fn message_text_concatenates_parts() {
        let msg = Message::from_parts(
            Role::User,
            vec![
                ContentPart::text("first"),
                ContentPart::Image {
                    source: "x".into(),
                    media_type: None,
                },
                ContentPart::text("second"),
            ],
        );
        assert_eq!(msg.text(), "first\nsecond");
    }

    #[test]
    fn message_with_metadata() {
        let msg = Message::user("hi").with_metadata("origin", json!("test"));
        assert_eq!(msg.metadata["origin"], "test");
    }

    #[test]
    fn message_serde_roundtrip() {
        let msg = Message::user("round trip").with_metadata("k", json!(1));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn message_empty_metadata_skipped() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(json.get("metadata").is_none());
    }

    // -- CallInput --

    #[test]
    fn call_input_from_str() {
        let input: CallInput = "hello".into();
        assert_eq!(input.text(), "hello");
    }

    #[test]
    fn call_input_into_parts() {
        let input = CallInput::Text("hi".into());
        let parts = input.into_parts();
        assert_eq!(parts, vec![ContentPart::text("hi")]);
    }

    #[test]
    fn call_input_to_user_message() {
        let input = CallInput::Parts(vec![
            ContentPart::text("look at this"),
            ContentPart::Image {
                source: "data:...".into(),
                media_type: None,
            },
        ]);
        let msg = input.to_user_message();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content.len(), 2);
    }

    #[test]
    fn call_input_untagged_serde() {
        let text: CallInput = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(text, CallInput::Text("plain".into()));

        let parts: CallInput =
            serde_json::from_str(r#"[{"type":"text","text":"structured"}]"#).unwrap();
        assert_eq!(parts, CallInput::Parts(vec![ContentPart::text("structured")]));
    }
}
