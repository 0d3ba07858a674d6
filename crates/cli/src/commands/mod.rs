pub mod assemble;
pub mod config_cmd;
pub mod correction;
pub mod models;
pub mod tokens;

use std::path::Path;
use std::sync::Arc;

use codesage_agent::{ModelRegistry, Tokenizer};
use codesage_config::AppConfig;
use codesage_core::turn::ConversationTurn;

/// Load the config from `--config`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Built-in model table with the config's `[models.*]` merged over it.
pub fn registry(config: &AppConfig) -> ModelRegistry {
    ModelRegistry::builtin().with_overrides(&config.models)
}

/// BPE tokenizer, or the heuristic one if the encoders cannot be built.
pub fn load_tokenizer() -> Arc<Tokenizer> {
    match Tokenizer::load() {
        Ok(tokenizer) => Arc::new(tokenizer),
        Err(e) => {
            tracing::warn!("{e}; falling back to heuristic token counts");
            Arc::new(Tokenizer::heuristic())
        }
    }
}

/// Read a JSON transcript (an array of turns).
pub fn read_history(path: &Path) -> Result<Vec<ConversationTurn>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    parse_history(&raw).map_err(|e| format!("Invalid transcript {}: {e}", path.display()).into())
}

pub fn parse_history(raw: &str) -> Result<Vec<ConversationTurn>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcript_is_empty_history() {
        assert!(parse_history("  \n").unwrap().is_empty());
    }

    #[test]
    fn transcript_parses_turns() {
        let raw = r#"[
            {"role": "user", "content": "where is main?", "timestamp": "2024-05-01T12:00:00Z"},
            {"role": "assistant", "content": "In src/main.rs.", "timestamp": "2024-05-01T12:00:05Z"}
        ]"#;
        let history = parse_history(raw).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].is_assistant());
    }

    #[test]
    fn config_overrides_reach_registry() {
        let config = AppConfig::from_toml_str(
            r#"
            [models.local-llama]
            token_limit = 4096
            reserved_output_tokens = 512
            provider = "other"
            "#,
        )
        .unwrap();
        let registry = registry(&config);
        assert!(registry.contains("local-llama"));
        assert!(registry.contains("gpt-4"));
        assert_eq!(registry.get("local-llama").available_prompt_tokens(), 3584);
    }
}
