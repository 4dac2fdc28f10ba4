//! The [`Client`] and its call/stream state machines.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures::{Stream, StreamExt};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use relay_backend::{Backend, BackendInfo, BackendStream};
use relay_compaction::{CompactionStrategy, normalize};
use relay_core::{
    CallInput, Context, EngineError, EventName, GenerationParams, HookStage, Message, Response,
    StreamChunk, TraceEvent, TraceRegistry,
};
use relay_hooks::{HookChain, StageOutcome};

use crate::config::{CallOptions, ClientConfig};

/// A pinned, boxed stream of instrumented chunk results.
pub type CallStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, EngineError>> + Send>>;

/// Result of a successful synchronous call.
#[derive(Clone, Debug)]
pub struct CallOutcome {
    /// The final (possibly hook-transformed) response.
    pub response: Response,
    /// The new context, with the exchange appended.
    pub context: Context,
}

/// Result of a successful streaming dispatch.
pub struct StreamOutcome {
    /// The new context: compacted history plus the user message only. The
    /// caller accumulates the streamed assistant content and appends it.
    pub context: Context,
    /// The instrumented chunk stream.
    pub stream: CallStream,
}

impl std::fmt::Debug for StreamOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOutcome")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// The execution engine: one backend, one hook list, one compaction policy.
///
/// A client is cheap to share and safe to call concurrently — conversation
/// state lives in the [`Context`] values callers thread through it, never
/// in the client.
pub struct Client {
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    summarizer: Option<(Arc<dyn Backend>, GenerationParams)>,
    registry: Arc<TraceRegistry>,
    strategy: OnceCell<Arc<dyn CompactionStrategy>>,
}

impl Client {
    /// Start building a client around a backend.
    #[must_use]
    pub fn builder(backend: Arc<dyn Backend>) -> ClientBuilder {
        ClientBuilder::new(backend)
    }

    /// The trace registry; attach sinks here to observe lifecycle events.
    #[must_use]
    pub fn traces(&self) -> &Arc<TraceRegistry> {
        &self.registry
    }

    /// Describe the configured backend.
    #[must_use]
    pub fn backend_info(&self) -> BackendInfo {
        self.backend.introspect()
    }

    /// Describe the effective compaction strategy, normalizing it if needed.
    pub fn compaction_info(&self) -> Result<Option<Value>, EngineError> {
        Ok(self.strategy()?.map(|strategy| strategy.introspect()))
    }

    // ── Synchronous call ────────────────────────────────────────────────

    /// Run one call: hooks around a backend dispatch, then compaction.
    ///
    /// On success the returned context is a new value with the (original
    /// input, final response) exchange appended and `total_tokens`
    /// accumulated when the response reports usage. On failure the caller's
    /// context is untouched — simply keep using the value passed in.
    #[instrument(skip_all, fields(backend = %self.backend.id()))]
    pub async fn call(
        &self,
        input: impl Into<CallInput>,
        context: &Context,
        options: CallOptions,
    ) -> Result<CallOutcome, EngineError> {
        let input: CallInput = input.into();
        let start = Instant::now();
        let chain = HookChain::merge(&self.config.hooks, &options.hooks);
        let params = options.params.unwrap_or_else(|| self.config.params.clone());

        self.registry.emit(
            &TraceEvent::new(EventName::CallStart)
                .with_measurement("message_count", context.len())
                .with_metadata("backend", self.backend.id()),
        );

        // Stage: raw input.
        let effective = match chain
            .transform(HookStage::CallStart, input.clone(), |hook, value| {
                async move { hook.on_call_start(value).await }
            })
            .await
        {
            StageOutcome::Continued(value) => value,
            StageOutcome::Halted(response) => {
                return Ok(self.finish_halted(start, &input, response, context.clone()));
            }
            StageOutcome::Failed { stage, reason } => {
                let error = EngineError::HookStage { stage, reason };
                return Err(self.fail(&chain, start, "call", error).await);
            }
        };

        // Stage: outbound message sequence.
        let messages = self.outbound(context, &effective);
        self.registry.emit(
            &TraceEvent::new(EventName::BackendRequest)
                .with_measurement("message_count", messages.len())
                .with_metadata("backend", self.backend.id()),
        );
        let messages = match chain
            .transform(HookStage::BackendRequest, messages, |hook, value| {
                async move { hook.on_backend_request(value).await }
            })
            .await
        {
            StageOutcome::Continued(value) => value,
            StageOutcome::Halted(response) => {
                return Ok(self.finish_halted(start, &input, response, context.clone()));
            }
            StageOutcome::Failed { stage, reason } => {
                let error = EngineError::HookStage { stage, reason };
                return Err(self.fail(&chain, start, "call", error).await);
            }
        };

        // Dispatch. No context mutation on backend failure.
        let response = match self.backend.complete(&params, &messages).await {
            Ok(response) => response,
            Err(source) => {
                let error = EngineError::Backend {
                    backend: self.backend.id().to_owned(),
                    source,
                };
                return Err(self.fail(&chain, start, "call", error).await);
            }
        };

        // Stage: backend response. A halt here adopts the halt response and
        // skips on_call_end.
        let (response, run_call_end) = match chain
            .transform(HookStage::BackendResponse, response, |hook, value| {
                async move { hook.on_backend_response(value).await }
            })
            .await
        {
            StageOutcome::Continued(value) => (value, true),
            StageOutcome::Halted(response) => (response, false),
            StageOutcome::Failed { stage, reason } => {
                let error = EngineError::HookStage { stage, reason };
                return Err(self.fail(&chain, start, "call", error).await);
            }
        };
        self.registry.emit(
            &TraceEvent::new(EventName::BackendResponse)
                .with_metadata("backend", self.backend.id())
                .with_metadata("finish_reason", response.finish_reason.as_str()),
        );

        // Stage: final response. Halt is not meaningful at call end.
        let response = if run_call_end {
            match chain
                .transform(HookStage::CallEnd, response, |hook, value| async move {
                    hook.on_call_end(value).await
                })
                .await
            {
                StageOutcome::Continued(value) => value,
                StageOutcome::Halted(_) => {
                    let error = EngineError::HookStage {
                        stage: HookStage::CallEnd,
                        reason: "halt is not supported at on_call_end".to_owned(),
                    };
                    return Err(self.fail(&chain, start, "call", error).await);
                }
                StageOutcome::Failed { stage, reason } => {
                    let error = EngineError::HookStage { stage, reason };
                    return Err(self.fail(&chain, start, "call", error).await);
                }
            }
        } else {
            response
        };

        // Record the exchange against the original input; accumulate tokens
        // only when usage carries information.
        let mut next = context.clone().with_exchange(&input, &response);
        if let Some(usage) = response.usage.as_ref().filter(|usage| !usage.is_empty()) {
            let total = next.total_tokens() + usage.total();
            next = next.with_total_tokens(total);
        }

        // Auto-compaction on the post-exchange context. Best-effort except
        // for descriptor normalization, which is a hard failure.
        let next = match self.maybe_compact(&chain, next).await {
            Ok(context) => context,
            Err(error) => return Err(self.fail(&chain, start, "call", error).await),
        };

        self.emit_call_stop(start, &response, &next);
        Ok(CallOutcome {
            response,
            context: next,
        })
    }

    // ── Streaming call ──────────────────────────────────────────────────

    /// Run one streaming call.
    ///
    /// Differs from [`call`](Self::call) in three ways: compaction runs
    /// *before* dispatch, the returned context carries only the user
    /// message (the caller accumulates and appends the streamed assistant
    /// content), and each chunk is instrumented lazily as it is pulled.
    #[instrument(skip_all, fields(backend = %self.backend.id()))]
    pub async fn stream(
        &self,
        input: impl Into<CallInput>,
        context: &Context,
        options: CallOptions,
    ) -> Result<StreamOutcome, EngineError> {
        let input: CallInput = input.into();
        let start = Instant::now();
        let chain = Arc::new(HookChain::merge(&self.config.hooks, &options.hooks));
        let params = options.params.unwrap_or_else(|| self.config.params.clone());

        self.registry.emit(
            &TraceEvent::new(EventName::CallStart)
                .with_measurement("message_count", context.len())
                .with_metadata("backend", self.backend.id())
                .with_metadata("mode", "stream"),
        );

        // Stage: raw input. A halt synthesizes the whole stream; the
        // context still carries only the user message so the caller's
        // accumulate-and-append contract stays uniform, and the synthetic
        // chunks go through the same instrumentation as dispatched ones.
        let effective = match chain
            .transform(HookStage::CallStart, input.clone(), |hook, value| {
                async move { hook.on_call_start(value).await }
            })
            .await
        {
            StageOutcome::Continued(value) => value,
            StageOutcome::Halted(response) => {
                let context = context.clone().with_message(input.to_user_message());
                let synthesized: BackendStream = Box::pin(futures::stream::iter(vec![
                    Ok(StreamChunk::text(response.content_text())),
                    Ok(StreamChunk::done()),
                ]));
                let stream = self.open_stream(&chain, synthesized).await;
                return Ok(StreamOutcome { context, stream });
            }
            StageOutcome::Failed { stage, reason } => {
                let error = EngineError::HookStage { stage, reason };
                return Err(self.fail(&chain, start, "stream", error).await);
            }
        };

        // Compaction runs before dispatch: there is no terminal exchange to
        // re-evaluate until the caller fully drains the stream.
        let context = match self.maybe_compact(&chain, context.clone()).await {
            Ok(context) => context,
            Err(error) => return Err(self.fail(&chain, start, "stream", error).await),
        };

        // Stage: outbound message sequence. Halt has no streaming
        // semantics and is treated as an error.
        let messages = self.outbound(&context, &effective);
        self.registry.emit(
            &TraceEvent::new(EventName::BackendRequest)
                .with_measurement("message_count", messages.len())
                .with_metadata("backend", self.backend.id()),
        );
        let messages = match chain
            .transform(HookStage::BackendRequest, messages, |hook, value| {
                async move { hook.on_backend_request(value).await }
            })
            .await
        {
            StageOutcome::Continued(value) => value,
            StageOutcome::Halted(_) => {
                let error = EngineError::HookStage {
                    stage: HookStage::BackendRequest,
                    reason: "halt is not supported during streaming".to_owned(),
                };
                return Err(self.fail(&chain, start, "stream", error).await);
            }
            StageOutcome::Failed { stage, reason } => {
                let error = EngineError::HookStage { stage, reason };
                return Err(self.fail(&chain, start, "stream", error).await);
            }
        };

        let backend_stream = match self.backend.stream(&params, &messages).await {
            Ok(stream) => stream,
            Err(source) => {
                let error = EngineError::Backend {
                    backend: self.backend.id().to_owned(),
                    source,
                };
                return Err(self.fail(&chain, start, "stream", error).await);
            }
        };

        let out_context = context.with_message(input.to_user_message());
        let stream = self.open_stream(&chain, backend_stream).await;

        Ok(StreamOutcome {
            context: out_context,
            stream,
        })
    }

    /// Open a stream for consumption: emit `stream.start`, notify
    /// `on_stream_start`, and wrap the inner stream in the pull-based
    /// instrumentation adapter. Every stream the engine hands out goes
    /// through here, dispatched and synthesized alike.
    async fn open_stream(&self, chain: &Arc<HookChain>, mut inner: BackendStream) -> CallStream {
        self.registry.emit(
            &TraceEvent::new(EventName::StreamStart).with_metadata("backend", self.backend.id()),
        );
        counter!(
            "relay_calls_total",
            "backend" => self.backend.id().to_owned(),
            "mode" => "stream",
            "outcome" => "ok"
        )
        .increment(1);
        chain
            .observe(|hook| async move { hook.on_stream_start().await })
            .await;

        // Chunk hooks and events fire only as the consumer demands each
        // element.
        let registry = Arc::clone(&self.registry);
        let chain = Arc::clone(chain);
        let backend_id = self.backend.id().to_owned();
        Box::pin(stream! {
            let mut pulled: u64 = 0;
            while let Some(item) = inner.next().await {
                match item {
                    Ok(chunk) => {
                        let chunk_ref = &chunk;
                        chain
                            .observe(move |hook| async move {
                                hook.on_stream_chunk(chunk_ref).await;
                            })
                            .await;
                        registry.emit(
                            &TraceEvent::new(EventName::StreamChunk)
                                .with_measurement("index", pulled)
                                .with_metadata("backend", backend_id.clone()),
                        );
                        pulled += 1;
                        yield Ok(chunk);
                    }
                    Err(source) => {
                        let error = EngineError::Stream {
                            reason: source.to_string(),
                        };
                        warn!(%error, "stream element failed");
                        registry.emit(
                            &TraceEvent::new(EventName::CallException)
                                .with_metadata("backend", backend_id.clone())
                                .with_metadata("category", error.category())
                                .with_metadata("reason", error.to_string()),
                        );
                        let error_ref = &error;
                        chain
                            .observe(move |hook| async move {
                                hook.on_call_error(error_ref).await;
                            })
                            .await;
                        yield Err(error);
                        return;
                    }
                }
            }
            chain
                .observe(|hook| async move { hook.on_stream_end().await })
                .await;
            registry.emit(
                &TraceEvent::new(EventName::StreamStop)
                    .with_measurement("chunk_count", pulled)
                    .with_metadata("backend", backend_id.clone()),
            );
        })
    }

    // ── Compaction sub-pipeline ─────────────────────────────────────────

    async fn maybe_compact(
        &self,
        chain: &HookChain,
        context: Context,
    ) -> Result<Context, EngineError> {
        let Some(strategy) = self.strategy()? else {
            return Ok(context);
        };
        if !strategy.should_compact(&context) {
            return Ok(context);
        }
        Ok(self.run_compaction(chain, &strategy, context).await)
    }

    /// Run the compaction sub-pipeline. Never fails the call: on any
    /// failure the pre-compaction context is returned and a
    /// `compaction.error` event is emitted.
    async fn run_compaction(
        &self,
        chain: &HookChain,
        strategy: &Arc<dyn CompactionStrategy>,
        context: Context,
    ) -> Context {
        let before = context.len();
        self.registry.emit(
            &TraceEvent::new(EventName::CompactionStart)
                .with_measurement("message_count", before)
                .with_metadata("strategy", strategy.name()),
        );

        let staged = match chain
            .transform(HookStage::CompactionStart, context.clone(), |hook, value| {
                async move { hook.on_compaction_start(value).await }
            })
            .await
        {
            StageOutcome::Continued(value) => value,
            StageOutcome::Halted(_) => {
                debug!(strategy = strategy.name(), "hook halted compaction");
                return context;
            }
            StageOutcome::Failed { stage, reason } => {
                self.emit_compaction_error(
                    strategy.name(),
                    before,
                    &format!("hook stage {stage} failed: {reason}"),
                );
                return context;
            }
        };

        let compacted = match strategy.compact(staged).await {
            Ok(compacted) => compacted,
            Err(error) => {
                self.emit_compaction_error(strategy.name(), before, &error.to_string());
                return context;
            }
        };

        match chain
            .transform(HookStage::CompactionEnd, compacted, |hook, value| {
                async move { hook.on_compaction_end(value).await }
            })
            .await
        {
            StageOutcome::Continued(finalized) => {
                self.registry.emit(
                    &TraceEvent::new(EventName::CompactionStop)
                        .with_measurement("messages_before", before)
                        .with_measurement("messages_after", finalized.len())
                        .with_metadata("strategy", strategy.name()),
                );
                counter!(
                    "relay_compactions_total",
                    "strategy" => strategy.name().to_owned(),
                    "outcome" => "ok"
                )
                .increment(1);
                finalized
            }
            StageOutcome::Halted(_) => {
                self.emit_compaction_error(
                    strategy.name(),
                    before,
                    "halt is not supported at on_compaction_end",
                );
                context
            }
            StageOutcome::Failed { stage, reason } => {
                self.emit_compaction_error(
                    strategy.name(),
                    before,
                    &format!("hook stage {stage} failed: {reason}"),
                );
                context
            }
        }
    }

    fn emit_compaction_error(&self, strategy: &str, before: usize, reason: &str) {
        warn!(strategy, reason, "compaction failed; keeping pre-compaction context");
        self.registry.emit(
            &TraceEvent::new(EventName::CompactionError)
                .with_measurement("message_count", before)
                .with_metadata("strategy", strategy)
                .with_metadata("reason", reason),
        );
        counter!(
            "relay_compactions_total",
            "strategy" => strategy.to_owned(),
            "outcome" => "error"
        )
        .increment(1);
    }

    fn strategy(&self) -> Result<Option<Arc<dyn CompactionStrategy>>, EngineError> {
        if let Some(strategy) = self.strategy.get() {
            return Ok(Some(Arc::clone(strategy)));
        }
        let Some(descriptor) = self.config.compaction.as_ref() else {
            return Ok(None);
        };
        let strategy = self
            .strategy
            .get_or_try_init(|| normalize(descriptor, self.summarizer.clone()))?;
        Ok(Some(Arc::clone(strategy)))
    }

    // ── Shared plumbing ─────────────────────────────────────────────────

    fn outbound(&self, context: &Context, input: &CallInput) -> Vec<Message> {
        let mut messages = Vec::with_capacity(context.len() + 2);
        if let Some(prompt) = &self.config.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(context.messages.iter().cloned());
        messages.push(input.to_user_message());
        messages
    }

    /// Complete a call halted by a pre-dispatch hook: minimal exchange from
    /// the original input and the halt response, no token accumulation, no
    /// compaction.
    fn finish_halted(
        &self,
        start: Instant,
        input: &CallInput,
        response: Response,
        context: Context,
    ) -> CallOutcome {
        let context = context.with_exchange(input, &response);
        self.emit_call_stop(start, &response, &context);
        CallOutcome { response, context }
    }

    fn emit_call_stop(&self, start: Instant, response: &Response, context: &Context) {
        self.registry.emit(
            &TraceEvent::new(EventName::CallStop)
                .with_measurement("duration_ms", start.elapsed().as_millis() as u64)
                .with_measurement("message_count", context.len())
                .with_metadata("backend", self.backend.id())
                .with_metadata("finish_reason", response.finish_reason.as_str()),
        );
        counter!(
            "relay_calls_total",
            "backend" => self.backend.id().to_owned(),
            "mode" => "call",
            "outcome" => "ok"
        )
        .increment(1);
        histogram!("relay_call_duration_seconds", "mode" => "call")
            .record(start.elapsed().as_secs_f64());
    }

    /// Report a failed call: `call.exception` event, error counter, then
    /// the observational `on_call_error` stage. Returns the error for the
    /// caller to propagate.
    async fn fail(
        &self,
        chain: &HookChain,
        start: Instant,
        mode: &'static str,
        error: EngineError,
    ) -> EngineError {
        warn!(category = error.category(), %error, "call failed");
        self.registry.emit(
            &TraceEvent::new(EventName::CallException)
                .with_measurement("duration_ms", start.elapsed().as_millis() as u64)
                .with_metadata("backend", self.backend.id())
                .with_metadata("category", error.category())
                .with_metadata("reason", error.to_string()),
        );
        counter!(
            "relay_calls_total",
            "backend" => self.backend.id().to_owned(),
            "mode" => mode,
            "outcome" => "error"
        )
        .increment(1);

        let error_ref = &error;
        chain
            .observe(move |hook| async move { hook.on_call_error(error_ref).await })
            .await;
        error
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.backend.id())
            .field("config", &self.config)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    summarizer: Option<(Arc<dyn Backend>, GenerationParams)>,
    strategy: Option<Arc<dyn CompactionStrategy>>,
}

impl ClientBuilder {
    fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            config: ClientConfig::default(),
            backend,
            summarizer: None,
            strategy: None,
        }
    }

    /// Set the client configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the backend and parameters used for summarization calls. May
    /// differ from the primary backend.
    #[must_use]
    pub fn summarizer(mut self, backend: Arc<dyn Backend>, params: GenerationParams) -> Self {
        self.summarizer = Some((backend, params));
        self
    }

    /// Install a custom compaction strategy directly, bypassing descriptor
    /// normalization.
    #[must_use]
    pub fn compaction_strategy(mut self, strategy: Arc<dyn CompactionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Finish the client.
    #[must_use]
    pub fn build(self) -> Client {
        let cell = OnceCell::new();
        if let Some(strategy) = self.strategy {
            let _ = cell.set(strategy);
        }
        Client {
            config: self.config,
            backend: self.backend,
            summarizer: self.summarizer,
            registry: Arc::new(TraceRegistry::new()),
            strategy: cell,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_backend::StaticBackend;
    use relay_compaction::{CompactionDescriptor, SlidingWindowStrategy};

    #[test]
    fn compaction_info_normalizes_descriptor() {
        let client = Client::builder(Arc::new(StaticBackend::new("b")))
            .config(
                ClientConfig::builder()
                    .compaction(CompactionDescriptor::sliding_window(4))
                    .build(),
            )
            .build();
        let info = client.compaction_info().unwrap().unwrap();
        assert_eq!(info["windowSize"], 4);
        assert!(client.compaction_info().unwrap().is_some());
    }

    #[test]
    fn custom_strategy_bypasses_descriptor() {
        let client = Client::builder(Arc::new(StaticBackend::new("b")))
            .compaction_strategy(Arc::new(SlidingWindowStrategy::new(7)))
            .build();
        let info = client.compaction_info().unwrap().unwrap();
        assert_eq!(info["windowSize"], 7);
    }

    #[test]
    fn no_compaction_is_a_valid_configuration() {
        let client = Client::builder(Arc::new(StaticBackend::new("b"))).build();
        assert!(client.compaction_info().unwrap().is_none());
        assert_eq!(client.backend_info().provider, "b");
    }
}
