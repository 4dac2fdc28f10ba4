//! Core data model for the relay generation pipeline.
//!
//! Everything the other relay crates agree on lives here:
//!
//! - [`messages`]: roles, content parts, conversation messages, call input
//! - [`response`]: backend responses, finish reasons, token usage
//! - [`context`]: the immutable conversation-state value threaded through calls
//! - [`chunk`]: streaming chunk elements
//! - [`params`]: generation parameters passed to backends
//! - [`errors`]: the structured error taxonomy and hook stage names
//! - [`trace`]: lifecycle trace events and the subscriber registry
//!
//! This crate deliberately has no async machinery and no I/O — it is the
//! leaf of the workspace dependency graph.

pub mod chunk;
pub mod context;
pub mod errors;
pub mod messages;
pub mod params;
pub mod response;
pub mod trace;

pub use chunk::{ChunkKind, StreamChunk};
pub use context::Context;
pub use errors::{BackendError, EngineError, HookStage};
pub use messages::{CallInput, ContentPart, Message, Role};
pub use params::GenerationParams;
pub use response::{FinishReason, Response, ResponseContent, Usage};
pub use trace::{EventName, SubscriberId, TraceEvent, TraceRegistry, TraceSink};
