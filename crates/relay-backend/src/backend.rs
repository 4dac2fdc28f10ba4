//! The [`Backend`] trait and its associated types.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use relay_core::{BackendError, GenerationParams, Message, Response, StreamChunk};

/// A pinned, boxed stream of chunk results produced by a backend.
pub type BackendStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, BackendError>> + Send>>;

/// Static description of a backend, for diagnostics and introspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    /// Provider name (adapter family).
    pub provider: String,
    /// Default model, when the backend pins one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Supported operations, e.g. `"complete"`, `"stream"`.
    pub capabilities: Vec<String>,
}

/// A generation backend.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// concurrently. Errors are reported as [`BackendError`] values; the engine
/// wraps them with the backend's identity and never retries.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable identifier used in errors, events, and metrics labels.
    fn id(&self) -> &str;

    /// Dispatch a synchronous generation request.
    async fn complete(
        &self,
        params: &GenerationParams,
        messages: &[Message],
    ) -> Result<Response, BackendError>;

    /// Dispatch a streaming generation request.
    ///
    /// A successful return means dispatch succeeded; individual elements may
    /// still fail as the stream is consumed.
    async fn stream(
        &self,
        params: &GenerationParams,
        messages: &[Message],
    ) -> Result<BackendStream, BackendError>;

    /// Describe this backend.
    fn introspect(&self) -> BackendInfo {
        BackendInfo {
            provider: self.id().to_owned(),
            model: None,
            capabilities: vec!["complete".to_owned(), "stream".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_serializes_camel_case() {
        let info = BackendInfo {
            provider: "static".into(),
            model: Some("fixture-1".into()),
            capabilities: vec!["complete".into()],
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["provider"], "static");
        assert_eq!(json["model"], "fixture-1");
        assert_eq!(json["capabilities"][0], "complete");
    }

    #[test]
    fn info_omits_absent_model() {
        let info = BackendInfo {
            provider: "static".into(),
            model: None,
            capabilities: vec![],
        };
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("model").is_none());
    }
}
