//! Configuration loading, validation, and management for CodeSage.
//!
//! Loads configuration from `~/.codesage/config.toml` with environment
//! variable overrides. Validates all settings at load time. A missing file
//! is not an error, since every field has a default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Provider tags accepted in `[models.<name>]` tables.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "anthropic", "cohere", "other"];

/// Encoding hints accepted in `[models.<name>]` tables.
pub const KNOWN_ENCODINGS: &[&str] = &["cl100k_base", "o200k_base"];

/// The root configuration structure.
///
/// Maps directly to `~/.codesage/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature for reasoning calls
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Replaces the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Context gathering and packing
    #[serde(default)]
    pub context: ContextConfig,

    /// Self-correction advisory limits
    #[serde(default)]
    pub correction: CorrectionConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Custom model profiles, merged over the built-in table
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Recent conversation turns offered to the assembler
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Files fetched per folder reference
    #[serde(default = "default_folder_file_cap")]
    pub folder_file_cap: usize,

    /// Search hits offered to the assembler
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Below this many remaining tokens no truncation is attempted
    #[serde(default = "default_min_truncation_tokens")]
    pub min_truncation_tokens: usize,

    /// Fraction of the budget after which packing stops
    #[serde(default = "default_stop_ratio")]
    pub stop_ratio: f64,
}

fn default_history_window() -> usize {
    6
}
fn default_folder_file_cap() -> usize {
    10
}
fn default_max_search_results() -> usize {
    10
}
fn default_min_truncation_tokens() -> usize {
    100
}
fn default_stop_ratio() -> f64 {
    0.95
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            folder_file_cap: default_folder_file_cap(),
            max_search_results: default_max_search_results(),
            min_truncation_tokens: default_min_truncation_tokens(),
            stop_ratio: default_stop_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// How many recent turns the attempt counter inspects
    #[serde(default = "default_correction_window")]
    pub window: usize,

    /// Attempts after which the counter reports the limit as reached
    #[serde(default = "default_correction_ceiling")]
    pub ceiling: usize,
}

fn default_correction_window() -> usize {
    10
}
fn default_correction_ceiling() -> usize {
    3
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            window: default_correction_window(),
            ceiling: default_correction_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Reasoning rounds granted to a fresh user task
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// A custom model profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub token_limit: usize,

    #[serde(default = "default_reserved_output_tokens")]
    pub reserved_output_tokens: usize,

    #[serde(default = "default_model_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

fn default_reserved_output_tokens() -> usize {
    1500
}
fn default_model_provider() -> String {
    "other".into()
}

impl AppConfig {
    /// Load configuration from the default path (~/.codesage/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from a specific file path.
    ///
    /// Environment overrides (highest priority):
    /// - `CODESAGE_MODEL`
    /// - `CODESAGE_SYSTEM_PROMPT`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(model) = var("CODESAGE_MODEL") {
            tracing::debug!(model = %model, "Default model overridden from environment");
            self.default_model = model;
        }

        if let Some(prompt) = var("CODESAGE_SYSTEM_PROMPT") {
            self.system_prompt_override = Some(prompt);
        }
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".codesage")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(self.context.stop_ratio > 0.0 && self.context.stop_ratio <= 1.0) {
            return Err(ConfigError::ValidationError(
                "context.stop_ratio must be in (0.0, 1.0]".into(),
            ));
        }

        if self.context.folder_file_cap == 0 {
            return Err(ConfigError::ValidationError(
                "context.folder_file_cap must be > 0".into(),
            ));
        }

        if self.correction.window == 0 {
            return Err(ConfigError::ValidationError(
                "correction.window must be > 0".into(),
            ));
        }

        for (name, model) in &self.models {
            if model.reserved_output_tokens >= model.token_limit {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}: reserved_output_tokens ({}) must be below token_limit ({})",
                    model.reserved_output_tokens, model.token_limit
                )));
            }
            if !KNOWN_PROVIDERS.contains(&model.provider.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}: unknown provider '{}' (expected one of {})",
                    model.provider,
                    KNOWN_PROVIDERS.join(", ")
                )));
            }
            if let Some(encoding) = &model.encoding
                && !KNOWN_ENCODINGS.contains(&encoding.as_str())
            {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}: unknown encoding '{encoding}'"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            temperature: default_temperature(),
            system_prompt_override: None,
            context: ContextConfig::default(),
            correction: CorrectionConfig::default(),
            agent: AgentConfig::default(),
            models: BTreeMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_model, "gpt-4");
        assert_eq!(config.context.history_window, 6);
        assert_eq!(config.context.folder_file_cap, 10);
        assert_eq!(config.context.min_truncation_tokens, 100);
        assert_eq!(config.correction.ceiling, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.context.stop_ratio, config.context.stop_ratio);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let err = AppConfig::from_toml_str("temperature = 3.5").unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn invalid_stop_ratio_rejected() {
        let err = AppConfig::from_toml_str("[context]\nstop_ratio = 0.0").unwrap_err();
        assert!(err.to_string().contains("stop_ratio"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::read_file(Path::new("/nonexistent/codesage/config.toml")).unwrap();
        assert_eq!(config.default_model, "gpt-4");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "default_model = \"gpt-4o\"\n[context]\nhistory_window = 4\n",
        )
        .unwrap();

        let config = AppConfig::read_file(&path).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.context.history_window, 4);
        assert_eq!(config.context.folder_file_cap, 10);
    }

    #[test]
    fn overrides_apply_to_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = \"gpt-4o\"\n").unwrap();

        let mut config = AppConfig::read_file(&path).unwrap();
        config.apply_overrides(|key| match key {
            "CODESAGE_MODEL" => Some("claude-3-opus".into()),
            "CODESAGE_SYSTEM_PROMPT" => Some("Be terse.".into()),
            _ => None,
        });
        assert_eq!(config.default_model, "claude-3-opus");
        assert_eq!(config.system_prompt_override.as_deref(), Some("Be terse."));
    }

    #[test]
    fn absent_overrides_keep_file_values() {
        let mut config = AppConfig::from_toml_str("default_model = \"gpt-4o\"\n").unwrap();
        config.apply_overrides(|_| None);
        assert_eq!(config.default_model, "gpt-4o");
        assert!(config.system_prompt_override.is_none());
    }

    #[test]
    fn parse_error_reports_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn custom_model_parsing() {
        let toml_str = r#"
[models.local-llama]
token_limit = 4096
reserved_output_tokens = 512
provider = "other"

[models.my-gpt]
token_limit = 32000
provider = "openai"
encoding = "cl100k_base"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.models.len(), 2);
        let llama = &config.models["local-llama"];
        assert_eq!(llama.token_limit, 4096);
        assert_eq!(llama.reserved_output_tokens, 512);
        assert_eq!(config.models["my-gpt"].reserved_output_tokens, 1500);
        assert_eq!(config.models["my-gpt"].encoding.as_deref(), Some("cl100k_base"));
    }

    #[test]
    fn reserved_above_limit_rejected() {
        let toml_str = "[models.tiny]\ntoken_limit = 1000\nreserved_output_tokens = 1000\n";
        let err = AppConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("reserved_output_tokens"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let toml_str = "[models.x]\ntoken_limit = 9000\nprovider = \"acme\"\n";
        let err = AppConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("acme"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("default_model"));
        assert!(toml_str.contains("[context]"));
    }
}
