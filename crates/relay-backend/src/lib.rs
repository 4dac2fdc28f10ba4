//! Backend abstraction for the relay engine.
//!
//! A [`Backend`] turns a message sequence plus generation parameters into
//! either a complete [`Response`] or a lazy chunk stream. Backends are
//! terminal: they dispatch and report, and never invoke hooks, touch
//! conversation state, or emit lifecycle events — that is the engine's job.
//!
//! [`StaticBackend`] is the scripted in-memory adapter used throughout the
//! test suites.
//!
//! [`Response`]: relay_core::Response

pub mod backend;
pub mod fixture;

pub use backend::{Backend, BackendInfo, BackendStream};
pub use fixture::StaticBackend;
