//! Client-side execution engine.
//!
//! A [`Client`] binds a backend, a hook list, and an optional compaction
//! descriptor, and orchestrates one call or stream at a time: hook stages
//! run in configured order around the dispatch, lifecycle events go to the
//! client's trace registry, and every call returns a *new* [`Context`] —
//! the engine never shares mutable conversation state, so concurrent calls
//! against one client are independent.
//!
//! The engine introduces no threading of its own and enforces no timeouts;
//! both are the backend's concern. Abandoning a stream before exhaustion is
//! the cancellation mechanism.
//!
//! [`Context`]: relay_core::Context

pub mod client;
pub mod config;

pub use client::{CallOutcome, CallStream, Client, ClientBuilder, StreamOutcome};
pub use config::{CallOptions, ClientConfig, ClientConfigBuilder};
