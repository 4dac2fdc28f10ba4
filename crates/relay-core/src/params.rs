//! Generation parameters passed to backends.

use serde::{Deserialize, Serialize};

/// Parameters for one backend dispatch.
///
/// All fields are optional — backends use their own defaults when a field
/// is not specified. Which fields are honored is backend-specific.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    /// Model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl GenerationParams {
    /// Parameters selecting only a model.
    #[must_use]
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_none() {
        let params = GenerationParams::default();
        assert!(params.model.is_none());
        assert!(params.max_tokens.is_none());
    }

    #[test]
    fn skip_none_fields_on_wire() {
        let params = GenerationParams::for_model("sonnet");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["model"], "sonnet");
        assert!(json.get("maxTokens").is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let params = GenerationParams {
            model: Some("m".into()),
            max_tokens: Some(512),
            temperature: Some(0.2),
            top_p: None,
            stop_sequences: Some(vec!["END".into()]),
        };
        let back: GenerationParams =
            serde_json::from_str(&serde_json::to_string(&params).unwrap()).unwrap();
        assert_eq!(params, back);
    }
}
