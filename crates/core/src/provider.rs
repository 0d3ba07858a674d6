//! Reasoning provider trait: the abstraction over LLM completion backends.
//!
//! The engine hands a fully assembled prompt to a provider and gets raw text
//! back. Key handling, HTTP transport and vendor wire formats all live behind
//! this trait, outside the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Sampling parameters for a single completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// The model to use (e.g., "gpt-4", "claude-3-opus-20240229")
    pub model: String,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.2
}

impl SamplingParams {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// The reasoning provider trait.
///
/// A single `complete` call is atomic from the engine's point of view: there
/// is no partial-result handling, and cancellation is done by dropping the
/// future.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Send a prompt and get the raw completion text.
    async fn complete(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> std::result::Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_defaults() {
        let params = SamplingParams::for_model("gpt-4");
        assert!((params.temperature - 0.2).abs() < f32::EPSILON);
        assert!(params.max_tokens.is_none());
        assert!(params.stop.is_empty());
    }

    #[test]
    fn sampling_deserialize_fills_defaults() {
        let params: SamplingParams = serde_json::from_str(r#"{"model":"gpt-4o"}"#).unwrap();
        assert_eq!(params.model, "gpt-4o");
        assert!((params.temperature - 0.2).abs() < f32::EPSILON);
    }
}
