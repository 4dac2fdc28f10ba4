//! Streaming chunk elements.
//!
//! Backends that stream yield a lazy sequence of [`StreamChunk`]s. The
//! engine instruments each chunk as the consumer pulls it; it never buffers
//! ahead of demand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of a streamed chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Incremental content text.
    Text,
    /// Incremental reasoning text.
    Reasoning,
    /// Terminal marker; `metadata` may carry usage and a finish reason.
    Done,
}

/// One element of a backend's streamed response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Chunk kind.
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// Chunk content (empty for `Done`).
    #[serde(default)]
    pub content: String,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl StreamChunk {
    /// Create a content text chunk.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Text,
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Create a reasoning text chunk.
    #[must_use]
    pub fn reasoning(content: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Reasoning,
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Create a terminal chunk.
    #[must_use]
    pub fn done() -> Self {
        Self {
            kind: ChunkKind::Done,
            content: String::new(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry, returning the modified chunk.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.metadata.insert(key.into(), value);
        self
    }
}
