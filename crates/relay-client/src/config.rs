//! Client and per-call configuration.

use std::sync::Arc;

use relay_compaction::CompactionDescriptor;
use relay_core::GenerationParams;
use relay_hooks::Hook;

/// Immutable configuration shared by every call on a client.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Default generation parameters.
    pub params: GenerationParams,
    /// System prompt prepended to every outbound message sequence.
    pub system_prompt: Option<String>,
    /// Client-level hooks, executed before any per-call hooks.
    pub hooks: Vec<Arc<dyn Hook>>,
    /// Auto-compaction policy; `None` disables compaction entirely.
    pub compaction: Option<CompactionDescriptor>,
}

impl ClientConfig {
    /// Start building a config.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("params", &self.params)
            .field("system_prompt", &self.system_prompt)
            .field("hooks", &self.hooks.len())
            .field("compaction", &self.compaction)
            .finish()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the default generation parameters.
    #[must_use]
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.config.params = params;
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Register a client-level hook. Hooks run in registration order.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.config.hooks.push(hook);
        self
    }

    /// Set the auto-compaction descriptor.
    #[must_use]
    pub fn compaction(mut self, descriptor: CompactionDescriptor) -> Self {
        self.config.compaction = Some(descriptor);
        self
    }

    /// Finish the config.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Per-call overrides.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Extra hooks for this call only, executed after client-level hooks.
    pub hooks: Vec<Arc<dyn Hook>>,
    /// Generation parameters overriding the client defaults.
    pub params: Option<GenerationParams>,
}

impl CallOptions {
    /// Options with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a per-call hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Override generation parameters for this call.
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = Some(params);
        self
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("hooks", &self.hooks.len())
            .field("params", &self.params)
            .finish()
    }
}
