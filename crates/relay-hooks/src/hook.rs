//! The [`Hook`] trait and per-hook stage outcomes.

use async_trait::async_trait;

use relay_core::{CallInput, Context, EngineError, Message, Response, StreamChunk};

/// What a single hook decided at a transforming stage.
#[derive(Debug)]
pub enum HookOutcome<T> {
    /// Pass the (possibly replaced) value to the next hook.
    Continue(T),
    /// Stop the pipeline and complete the call with this response.
    Halt(Response),
    /// Fail the call with this reason.
    Error(String),
}

/// A pipeline extension point.
///
/// Every stage has a pass-through default, so implementations override only
/// the stages they care about. Transforming stages take the value by move
/// and return a [`HookOutcome`]; observational stages borrow and return
/// nothing. Hooks must not assume they are the only hook at a stage — the
/// value they receive may already have been transformed.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str {
        "anonymous"
    }

    // ── Transforming stages ─────────────────────────────────────────────

    /// Runs before anything else; sees the raw call input.
    async fn on_call_start(&self, input: CallInput) -> HookOutcome<CallInput> {
        HookOutcome::Continue(input)
    }

    /// Runs just before dispatch; sees the full outbound message sequence.
    async fn on_backend_request(&self, messages: Vec<Message>) -> HookOutcome<Vec<Message>> {
        HookOutcome::Continue(messages)
    }

    /// Runs right after the backend returns.
    async fn on_backend_response(&self, response: Response) -> HookOutcome<Response> {
        HookOutcome::Continue(response)
    }

    /// Runs last; sees the final response before the exchange is recorded.
    async fn on_call_end(&self, response: Response) -> HookOutcome<Response> {
        HookOutcome::Continue(response)
    }

    /// Runs before a compaction strategy; sees the pre-compaction context.
    async fn on_compaction_start(&self, context: Context) -> HookOutcome<Context> {
        HookOutcome::Continue(context)
    }

    /// Runs after a compaction strategy; sees the compacted context.
    async fn on_compaction_end(&self, context: Context) -> HookOutcome<Context> {
        HookOutcome::Continue(context)
    }

    // ── Observational stages ────────────────────────────────────────────

    /// Observes a call failure. Runs once per failed call.
    async fn on_call_error(&self, _error: &EngineError) {}

    /// Observes the start of streaming consumption.
    async fn on_stream_start(&self) {}

    /// Observes each chunk as the consumer pulls it.
    async fn on_stream_chunk(&self, _chunk: &StreamChunk) {}

    /// Observes stream exhaustion.
    async fn on_stream_end(&self) {}
}
