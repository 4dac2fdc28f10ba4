//! Structured error taxonomy for the relay pipeline.
//!
//! Built on [`thiserror`]:
//!
//! - [`EngineError`]: top-level taxonomy returned by the execution engine
//! - [`BackendError`]: inner reason type produced by backend adapters
//! - [`HookStage`]: the ten named hook stages, used for error context and
//!   event metadata
//!
//! Every taxonomy member renders a stable human-readable string. Errors are
//! values; panics are reserved for programmer errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Hook stages
// ─────────────────────────────────────────────────────────────────────────────

/// The named hook pipeline stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStage {
    /// Transforms the raw call input.
    CallStart,
    /// Transforms the final response before the exchange is appended.
    CallEnd,
    /// Observes a call failure.
    CallError,
    /// Observes the start of a streaming call.
    StreamStart,
    /// Observes each streamed chunk as it is pulled.
    StreamChunk,
    /// Observes stream exhaustion.
    StreamEnd,
    /// Transforms the outbound message sequence.
    BackendRequest,
    /// Transforms the backend response.
    BackendResponse,
    /// Transforms the context before compaction runs.
    CompactionStart,
    /// Transforms the compacted context to finalize it.
    CompactionEnd,
}

impl HookStage {
    /// Stable `on_*` stage name used in errors and event metadata.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallStart => "on_call_start",
            Self::CallEnd => "on_call_end",
            Self::CallError => "on_call_error",
            Self::StreamStart => "on_stream_start",
            Self::StreamChunk => "on_stream_chunk",
            Self::StreamEnd => "on_stream_end",
            Self::BackendRequest => "on_backend_request",
            Self::BackendResponse => "on_backend_response",
            Self::CompactionStart => "on_compaction_start",
            Self::CompactionEnd => "on_compaction_end",
        }
    }
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BackendError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors produced by backend adapters.
///
/// The engine never retries these; it wraps them with backend identity as
/// [`EngineError::Backend`] and returns them to the caller untouched.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The generation request itself failed.
    #[error("request failed: {message}")]
    Request {
        /// Error description.
        message: String,
    },

    /// The backend returned something the adapter could not interpret.
    #[error("malformed response: {message}")]
    Malformed {
        /// Error description.
        message: String,
    },

    /// The backend does not support the requested operation.
    #[error("unsupported operation: {message}")]
    Unsupported {
        /// Error description.
        message: String,
    },
}

impl BackendError {
    /// Create a request failure.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Create a malformed-response failure.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation failure.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineError
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error taxonomy for the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A transforming hook stage returned an error.
    #[error("hook stage {stage} failed: {reason}")]
    HookStage {
        /// The stage that failed.
        stage: HookStage,
        /// Hook-supplied reason.
        reason: String,
    },

    /// The backend dispatch failed.
    #[error("backend `{backend}` failed: {source}")]
    Backend {
        /// Backend identifier.
        backend: String,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// Configuration or descriptor validation failed.
    #[error("validation failed: {message}")]
    Validation {
        /// What was invalid.
        message: String,
    },

    /// A streamed element failed after dispatch succeeded.
    #[error("stream failed: {reason}")]
    Stream {
        /// Underlying reason.
        reason: String,
    },

    /// Opaque pass-through for reasons outside the taxonomy.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl EngineError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an opaque error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// The failing hook stage, when this is a hook-stage error.
    #[must_use]
    pub fn stage(&self) -> Option<HookStage> {
        match self {
            Self::HookStage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Category string for events and logging.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::HookStage { .. } => "hook",
            Self::Backend { .. } => "backend",
            Self::Validation { .. } => "validation",
            Self::Stream { .. } => "stream",
            Self::Other { .. } => "other",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -- HookStage --

    #[test]
    fn hook_stage_names() {
        assert_eq!(HookStage::CallStart.as_str(), "on_call_start");
        assert_eq!(HookStage::BackendRequest.as_str(), "on_backend_request");
        assert_eq!(HookStage::CompactionEnd.as_str(), "on_compaction_end");
        assert_eq!(HookStage::StreamChunk.to_string(), "on_stream_chunk");
    }

    #[test]
    fn hook_stage_serde() {
        assert_eq!(
            serde_json::to_string(&HookStage::BackendResponse).unwrap(),
            "\"backend_response\""
        );
    }

    // -- rendering --

    #[test]
    fn engine_error_rendering_is_stable() {
        let err = EngineError::HookStage {
            stage: HookStage::BackendRequest,
            reason: "blocked".into(),
        };
        assert_eq!(
            err.to_string(),
            "hook stage on_backend_request failed: blocked"
        );

        let err = EngineError::Backend {
            backend: "mock".into(),
            source: BackendError::request("boom"),
        };
        assert_eq!(err.to_string(), "backend `mock` failed: request failed: boom");

        assert_eq!(
            EngineError::validation("bad descriptor").to_string(),
            "validation failed: bad descriptor"
        );
        assert_eq!(
            EngineError::Stream {
                reason: "cut".into()
            }
            .to_string(),
            "stream failed: cut"
        );
        assert_eq!(EngineError::other("legacy").to_string(), "legacy");
    }

    #[test]
    fn backend_error_rendering() {
        assert_eq!(
            BackendError::malformed("no content").to_string(),
            "malformed response: no content"
        );
        assert_eq!(
            BackendError::unsupported("streaming").to_string(),
            "unsupported operation: streaming"
        );
    }

    // -- accessors --

    #[test]
    fn stage_accessor() {
        let err = EngineError::HookStage {
            stage: HookStage::CallStart,
            reason: "r".into(),
        };
        assert_eq!(err.stage(), Some(HookStage::CallStart));
        assert_eq!(EngineError::other("x").stage(), None);
    }

    #[test]
    fn category_covers_taxonomy() {
        assert_eq!(EngineError::validation("v").category(), "validation");
        assert_eq!(
            EngineError::Backend {
                backend: "b".into(),
                source: BackendError::request("r"),
            }
            .category(),
            "backend"
        );
    }

    #[test]
    fn backend_error_is_source() {
        let err = EngineError::Backend {
            backend: "b".into(),
            source: BackendError::request("inner"),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_matches!(
            source.downcast_ref::<BackendError>(),
            Some(BackendError::Request { .. })
        );
    }
}
