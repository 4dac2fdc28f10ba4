//! Scripted in-memory backend for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use relay_core::{BackendError, GenerationParams, Message, Response, StreamChunk};

use crate::backend::{Backend, BackendInfo, BackendStream};

/// A backend that replays scripted results in order.
///
/// Each `complete` call pops the next scripted result; each `stream` call
/// pops the next scripted chunk sequence. Every dispatch records the message
/// sequence it received, so tests can assert on what actually went out.
/// Running past the script yields a request error.
#[derive(Default)]
pub struct StaticBackend {
    id: String,
    completions: Mutex<VecDeque<Result<Response, BackendError>>>,
    streams: Mutex<VecDeque<Result<Vec<StreamChunk>, BackendError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl StaticBackend {
    /// Create an empty fixture with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Script a successful completion.
    #[must_use]
    pub fn with_response(self, response: Response) -> Self {
        self.completions.lock().push_back(Ok(response));
        self
    }

    /// Script a completion failure.
    #[must_use]
    pub fn with_error(self, error: BackendError) -> Self {
        self.completions.lock().push_back(Err(error));
        self
    }

    /// Script a successful stream of chunks.
    #[must_use]
    pub fn with_chunks(self, chunks: Vec<StreamChunk>) -> Self {
        self.streams.lock().push_back(Ok(chunks));
        self
    }

    /// Script a stream dispatch failure.
    #[must_use]
    pub fn with_stream_error(self, error: BackendError) -> Self {
        self.streams.lock().push_back(Err(error));
        self
    }

    /// The message sequences received so far, one per dispatch.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }

    /// Total number of dispatches received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn record(&self, messages: &[Message]) {
        self.requests.lock().push(messages.to_vec());
    }
}

#[async_trait]
impl Backend for StaticBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(
        &self,
        _params: &GenerationParams,
        messages: &[Message],
    ) -> Result<Response, BackendError> {
        self.record(messages);
        self.completions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::request("no scripted response")))
    }

    async fn stream(
        &self,
        _params: &GenerationParams,
        messages: &[Message],
    ) -> Result<BackendStream, BackendError> {
        self.record(messages);
        let script = self
            .streams
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::request("no scripted stream")))?;
        Ok(Box::pin(futures::stream::iter(script.into_iter().map(Ok))))
    }

    fn introspect(&self) -> BackendInfo {
        BackendInfo {
            provider: self.id.clone(),
            model: None,
            capabilities: vec!["complete".to_owned(), "stream".to_owned()],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_completions_in_order() {
        let backend = StaticBackend::new("static")
            .with_response(Response::text("first"))
            .with_response(Response::text("second"));
        let params = GenerationParams::default();

        let one = backend.complete(&params, &[Message::user("a")]).await.unwrap();
        let two = backend.complete(&params, &[Message::user("b")]).await.unwrap();
        assert_eq!(one.content_text(), "first");
        assert_eq!(two.content_text(), "second");
    }

    #[tokio::test]
    async fn records_received_messages() {
        let backend = StaticBackend::new("static").with_response(Response::text("ok"));
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let _ = backend
            .complete(&GenerationParams::default(), &messages)
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.requests()[0], messages);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let backend = StaticBackend::new("static");
        let err = backend
            .complete(&GenerationParams::default(), &[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Request { .. }));
    }

    #[tokio::test]
    async fn scripted_error_surfaces() {
        let backend =
            StaticBackend::new("static").with_error(BackendError::malformed("bad payload"));
        let err = backend
            .complete(&GenerationParams::default(), &[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Malformed { .. }));
    }

    #[tokio::test]
    async fn stream_yields_scripted_chunks() {
        let backend = StaticBackend::new("static").with_chunks(vec![
            StreamChunk::text("a"),
            StreamChunk::text("b"),
            StreamChunk::done(),
        ]);

        let stream = backend
            .stream(&GenerationParams::default(), &[Message::user("go")])
            .await
            .unwrap();
        let chunks: Vec<_> = stream.map(Result::unwrap).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "a");
    }

    #[tokio::test]
    async fn stream_dispatch_failure_surfaces() {
        let backend =
            StaticBackend::new("static").with_stream_error(BackendError::unsupported("stream"));
        let err = backend
            .stream(&GenerationParams::default(), &[Message::user("go")])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Unsupported { .. }));
    }
}
