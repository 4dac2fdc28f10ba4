//! Hook pipeline for the relay engine.
//!
//! Hooks are the extension seam around backend dispatch. A [`Hook`]
//! implements any subset of ten named stages; the engine folds registered
//! hooks over each stage's value via a [`HookChain`], in registration order,
//! with client-level hooks ahead of per-call hooks.
//!
//! Transforming stages thread a value through the chain and may halt the
//! call with a synthetic response or fail it with a reason. Observational
//! stages see borrowed data and cannot alter the call.

pub mod chain;
pub mod hook;

pub use chain::{HookChain, StageOutcome};
pub use hook::{Hook, HookOutcome};
