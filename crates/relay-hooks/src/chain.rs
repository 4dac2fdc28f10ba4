//! Ordered hook dispatch.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use relay_core::{HookStage, Response};

use crate::hook::{Hook, HookOutcome};

/// What an entire transforming stage decided.
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Every hook continued; this is the folded value.
    Continued(T),
    /// A hook halted the pipeline with this response.
    Halted(Response),
    /// A hook failed the stage.
    Failed {
        /// The stage that failed.
        stage: HookStage,
        /// Hook-supplied reason.
        reason: String,
    },
}

/// An ordered sequence of hooks for one call.
///
/// Transforming stages fold the value left to right; the first halt or
/// error short-circuits and later hooks at that stage never run.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookChain {
    /// Build a chain from a hook list.
    #[must_use]
    pub fn new(hooks: Vec<Arc<dyn Hook>>) -> Self {
        Self { hooks }
    }

    /// Merge client-level and per-call hooks, client-level first.
    #[must_use]
    pub fn merge(client: &[Arc<dyn Hook>], call: &[Arc<dyn Hook>]) -> Self {
        let mut hooks = Vec::with_capacity(client.len() + call.len());
        hooks.extend(client.iter().cloned());
        hooks.extend(call.iter().cloned());
        Self { hooks }
    }

    /// Number of hooks in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the chain has no hooks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Fold a value through one transforming stage.
    ///
    /// `apply` binds the stage method to each hook; it receives the hook and
    /// the current value and returns that hook's outcome.
    pub async fn transform<T, F, Fut>(
        &self,
        stage: HookStage,
        mut value: T,
        mut apply: F,
    ) -> StageOutcome<T>
    where
        F: FnMut(Arc<dyn Hook>, T) -> Fut,
        Fut: Future<Output = HookOutcome<T>> + Send,
    {
        for hook in &self.hooks {
            match apply(Arc::clone(hook), value).await {
                HookOutcome::Continue(next) => value = next,
                HookOutcome::Halt(response) => {
                    debug!(stage = %stage, hook = hook.name(), "hook halted pipeline");
                    return StageOutcome::Halted(response);
                }
                HookOutcome::Error(reason) => {
                    debug!(stage = %stage, hook = hook.name(), %reason, "hook failed stage");
                    return StageOutcome::Failed { stage, reason };
                }
            }
        }
        StageOutcome::Continued(value)
    }

    /// Run one observational stage over every hook, in order.
    pub async fn observe<F, Fut>(&self, mut apply: F)
    where
        F: FnMut(Arc<dyn Hook>) -> Fut,
        Fut: Future<Output = ()> + Send,
    {
        for hook in &self.hooks {
            apply(Arc::clone(hook)).await;
        }
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("HookChain").field("hooks", &names).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
