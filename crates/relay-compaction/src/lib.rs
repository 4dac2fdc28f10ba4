//! Context compaction for the relay engine.
//!
//! A [`CompactionStrategy`] decides whether a [`Context`] should shrink and
//! produces a smaller context with equivalent continuation value. Two
//! built-ins ship here:
//!
//! - [`SlidingWindowStrategy`]: keep only the last N messages; older
//!   messages are dropped with no retrievability, which is intended
//!   behavior.
//! - [`SummarizationStrategy`]: summarize the older prefix through a
//!   dedicated backend call and keep the suffix verbatim.
//!
//! Callers configure compaction through a [`CompactionDescriptor`], which
//! [`normalize`] resolves into a concrete strategy at first use.
//!
//! [`Context`]: relay_core::Context

pub mod descriptor;
pub mod sliding_window;
pub mod strategy;
pub mod summarization;

pub use descriptor::{CompactionDescriptor, normalize};
pub use sliding_window::SlidingWindowStrategy;
pub use strategy::{CompactionError, CompactionStrategy};
pub use summarization::{SUMMARY_MARKER, SummarizationStrategy};
