//! Strategy descriptors and their normalization.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use relay_backend::Backend;
use relay_core::{EngineError, GenerationParams};

use crate::sliding_window::{DEFAULT_WINDOW_SIZE, SlidingWindowStrategy};
use crate::strategy::CompactionStrategy;
use crate::summarization::{DEFAULT_KEEP_LAST, SummarizationStrategy};

/// A declarative compaction configuration.
///
/// Descriptors are shorthand: they name a strategy and carry its config as
/// JSON, and are resolved into a concrete [`CompactionStrategy`] by
/// [`normalize`] at first use. Normalization failure is a hard validation
/// error, never a silent skip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompactionDescriptor {
    /// Strategy identifier: `sliding_window` or `summarization`.
    pub strategy: String,
    /// Strategy-specific config.
    #[serde(default)]
    pub config: Value,
}

impl CompactionDescriptor {
    /// Sliding-window descriptor.
    #[must_use]
    pub fn sliding_window(window_size: usize) -> Self {
        Self {
            strategy: "sliding_window".to_owned(),
            config: json!({ "windowSize": window_size }),
        }
    }

    /// Summarization descriptor in manual-only mode.
    #[must_use]
    pub fn summarization(keep_last: usize) -> Self {
        Self {
            strategy: "summarization".to_owned(),
            config: json!({ "keepLast": keep_last }),
        }
    }

    /// Summarization descriptor with an auto-compaction token threshold.
    #[must_use]
    pub fn summarization_at(keep_last: usize, token_threshold: u64) -> Self {
        Self {
            strategy: "summarization".to_owned(),
            config: json!({ "keepLast": keep_last, "tokenThreshold": token_threshold }),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SlidingWindowConfig {
    window_size: Option<usize>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SummarizationConfig {
    keep_last: Option<usize>,
    token_threshold: Option<u64>,
}

/// Resolve a descriptor into a concrete strategy.
///
/// `summarizer` supplies the backend and parameters used for summarization
/// calls; it is required when the descriptor names the summarization
/// strategy. Unknown identifiers, malformed config, and a zero window are
/// validation errors.
pub fn normalize(
    descriptor: &CompactionDescriptor,
    summarizer: Option<(Arc<dyn Backend>, GenerationParams)>,
) -> Result<Arc<dyn CompactionStrategy>, EngineError> {
    match descriptor.strategy.as_str() {
        "sliding_window" => {
            let config: SlidingWindowConfig = parse_config(&descriptor.config)?;
            let window_size = config.window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
            if window_size == 0 {
                return Err(EngineError::validation(
                    "sliding_window window size must be at least 1",
                ));
            }
            Ok(Arc::new(SlidingWindowStrategy::new(window_size)))
        }
        "summarization" => {
            let config: SummarizationConfig = parse_config(&descriptor.config)?;
            let (backend, params) = summarizer.ok_or_else(|| {
                EngineError::validation("summarization strategy requires a summarizer backend")
            })?;
            let mut strategy = SummarizationStrategy::new(backend, params)
                .with_keep_last(config.keep_last.unwrap_or(DEFAULT_KEEP_LAST));
            if let Some(threshold) = config.token_threshold {
                strategy = strategy.with_token_threshold(threshold);
            }
            Ok(Arc::new(strategy))
        }
        other => Err(EngineError::validation(format!(
            "unknown compaction strategy `{other}`"
        ))),
    }
}

fn parse_config<T: serde::de::DeserializeOwned + Default>(config: &Value) -> Result<T, EngineError> {
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone())
        .map_err(|err| EngineError::validation(format!("malformed strategy config: {err}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_backend::StaticBackend;
    use relay_core::{Context, Message};

    fn summarizer() -> Option<(Arc<dyn Backend>, GenerationParams)> {
        Some((
            Arc::new(StaticBackend::new("summarizer")),
            GenerationParams::default(),
        ))
    }

    #[test]
    fn normalizes_sliding_window() {
        let strategy =
            normalize(&CompactionDescriptor::sliding_window(5), None).unwrap();
        assert_eq!(strategy.name(), "sliding_window");
        assert_eq!(strategy.introspect()["windowSize"], 5);
    }

    #[test]
    fn sliding_window_defaults_window() {
        let descriptor = CompactionDescriptor {
            strategy: "sliding_window".to_owned(),
            config: Value::Null,
        };
        let strategy = normalize(&descriptor, None).unwrap();
        assert_eq!(strategy.introspect()["windowSize"], 20);
    }

    #[test]
    fn zero_window_is_a_validation_error() {
        let err = normalize(&CompactionDescriptor::sliding_window(0), None).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn normalizes_summarization_with_threshold() {
        let strategy = normalize(
            &CompactionDescriptor::summarization_at(2, 100),
            summarizer(),
        )
        .unwrap();
        assert_eq!(strategy.name(), "summarization");
        assert!(strategy.should_compact(&Context::new().with_total_tokens(150)));
    }

    #[test]
    fn summarization_without_threshold_is_manual_only() {
        let strategy =
            normalize(&CompactionDescriptor::summarization(2), summarizer()).unwrap();
        let loaded = Context::with_messages(vec![Message::user("m")]).with_total_tokens(10_000);
        assert!(!strategy.should_compact(&loaded));
    }

    #[test]
    fn summarization_requires_a_summarizer() {
        let err = normalize(&CompactionDescriptor::summarization(2), None).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn unknown_strategy_is_a_validation_error() {
        let descriptor = CompactionDescriptor {
            strategy: "vacuum".to_owned(),
            config: Value::Null,
        };
        let err = normalize(&descriptor, None).unwrap_err();
        assert!(err.to_string().contains("unknown compaction strategy"));
    }

    #[test]
    fn malformed_config_is_a_validation_error() {
        let descriptor = CompactionDescriptor {
            strategy: "sliding_window".to_owned(),
            config: serde_json::json!({ "windowSize": "huge" }),
        };
        let err = normalize(&descriptor, None).unwrap_err();
        assert!(err.to_string().contains("malformed strategy config"));
    }

    #[test]
    fn descriptor_serde_roundtrip() {
        let descriptor = CompactionDescriptor::summarization_at(3, 4096);
        let back: CompactionDescriptor =
            serde_json::from_str(&serde_json::to_string(&descriptor).unwrap()).unwrap();
        assert_eq!(descriptor, back);
    }
}
