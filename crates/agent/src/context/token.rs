//! Model profiles and token counting.
//!
//! Counting uses a real BPE encoder when the model's profile names one and
//! the tokenizer was loaded with it. Otherwise it falls back to a
//! character-based heuristic with a per-provider divisor, floored at the
//! whitespace word count:
//!
//! | Provider  | chars / token | Confidence |
//! |-----------|---------------|------------|
//! | OpenAI    | 3.8           | medium     |
//! | Anthropic | 3.9           | medium     |
//! | Cohere    | 3.7           | medium     |
//! | other     | 3.5           | low        |
//!
//! Encoders are loaded once by the caller and shared through an `Arc`;
//! nothing in this module holds global state.

use codesage_config::ModelConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

// ── Profiles ──────────────────────────────────────────────────────────────

/// The vendor family a model belongs to. Selects the heuristic divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    OpenAi,
    Anthropic,
    Cohere,
    Other,
}

impl ModelProvider {
    /// Parse a provider tag. Unknown tags map to [`ModelProvider::Other`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "openai" => Self::OpenAi,
            "anthropic" => Self::Anthropic,
            "cohere" => Self::Cohere,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Cohere => "cohere",
            Self::Other => "other",
        }
    }

    /// Average characters per token.
    pub fn chars_per_token(&self) -> f64 {
        match self {
            Self::OpenAi => 3.8,
            Self::Anthropic => 3.9,
            Self::Cohere => 3.7,
            Self::Other => 3.5,
        }
    }
}

/// A BPE encoding the tokenizer can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Encoding {
    #[serde(rename = "cl100k_base")]
    Cl100kBase,
    #[serde(rename = "o200k_base")]
    O200kBase,
}

impl Encoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cl100k_base" => Some(Self::Cl100kBase),
            "o200k_base" => Some(Self::O200kBase),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
        }
    }
}

/// Token limits and counting hints for one model. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelProfile {
    pub name: String,
    pub token_limit: usize,
    pub reserved_output_tokens: usize,
    pub provider: ModelProvider,
    pub encoding: Option<Encoding>,
}

impl ModelProfile {
    pub fn new(
        name: impl Into<String>,
        token_limit: usize,
        reserved_output_tokens: usize,
        provider: ModelProvider,
    ) -> Self {
        Self {
            name: name.into(),
            token_limit,
            reserved_output_tokens,
            provider,
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Tokens left for the prompt once the output reservation is taken.
    pub fn available_prompt_tokens(&self) -> usize {
        available_prompt_tokens(self)
    }
}

/// Limit used for any model the registry does not know.
pub const DEFAULT_TOKEN_LIMIT: usize = 8192;
/// Output reservation used for any model the registry does not know.
pub const DEFAULT_RESERVED_OUTPUT_TOKENS: usize = 1500;

/// `max(0, token_limit - reserved_output_tokens)`.
pub fn available_prompt_tokens(profile: &ModelProfile) -> usize {
    profile
        .token_limit
        .saturating_sub(profile.reserved_output_tokens)
}

/// Inverse of the heuristic: how many characters fit in `tokens`.
pub fn estimate_chars_for_tokens(tokens: usize, provider: ModelProvider) -> usize {
    (tokens as f64 * provider.chars_per_token()).floor() as usize
}

/// Resolves model names to profiles.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    profiles: BTreeMap<String, ModelProfile>,
}

impl ModelRegistry {
    /// An empty registry. Every lookup falls back to the default profile.
    pub fn empty() -> Self {
        Self {
            profiles: BTreeMap::new(),
        }
    }

    /// The built-in model table.
    pub fn builtin() -> Self {
        use Encoding::*;
        use ModelProvider::*;

        let table = [
            ModelProfile::new("gpt-4", 8192, 1500, OpenAi).with_encoding(Cl100kBase),
            ModelProfile::new("gpt-4-32k", 32768, 2000, OpenAi).with_encoding(Cl100kBase),
            ModelProfile::new("gpt-4-turbo", 128_000, 4096, OpenAi).with_encoding(Cl100kBase),
            ModelProfile::new("gpt-4o", 128_000, 4096, OpenAi).with_encoding(O200kBase),
            ModelProfile::new("gpt-4o-mini", 128_000, 4096, OpenAi).with_encoding(O200kBase),
            ModelProfile::new("gpt-3.5-turbo", 16385, 1500, OpenAi).with_encoding(Cl100kBase),
            ModelProfile::new("claude-3-opus-20240229", 200_000, 4096, Anthropic),
            ModelProfile::new("claude-3-sonnet-20240229", 200_000, 4096, Anthropic),
            ModelProfile::new("claude-3-haiku-20240307", 200_000, 4096, Anthropic),
            ModelProfile::new("claude-3-5-sonnet-20240620", 200_000, 4096, Anthropic),
            ModelProfile::new("command-r", 128_000, 4000, Cohere),
            ModelProfile::new("command-r-plus", 128_000, 4000, Cohere),
            ModelProfile::new("gemini-1.5-pro", 1_048_576, 8192, Other),
            ModelProfile::new("gemini-1.0-pro", 32760, 2048, Other),
        ];

        let mut registry = Self::empty();
        for profile in table {
            registry.register(profile);
        }
        registry
    }

    /// Merge configured profiles over the current table.
    pub fn with_overrides(mut self, models: &BTreeMap<String, ModelConfig>) -> Self {
        for (name, cfg) in models {
            let mut profile = ModelProfile::new(
                name.clone(),
                cfg.token_limit,
                cfg.reserved_output_tokens,
                ModelProvider::from_tag(&cfg.provider),
            );
            profile.encoding = cfg.encoding.as_deref().and_then(Encoding::from_name);
            debug!(model = %name, "Registered model profile from config");
            self.register(profile);
        }
        self
    }

    pub fn register(&mut self, profile: ModelProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Exact lookup; unknown names get the default profile. Never fails.
    pub fn get(&self, name: &str) -> ModelProfile {
        match self.profiles.get(name) {
            Some(profile) => profile.clone(),
            None => {
                warn!(
                    model = %name,
                    token_limit = DEFAULT_TOKEN_LIMIT,
                    reserved = DEFAULT_RESERVED_OUTPUT_TOKENS,
                    "Unknown model, using default profile"
                );
                ModelProfile::new(
                    name,
                    DEFAULT_TOKEN_LIMIT,
                    DEFAULT_RESERVED_OUTPUT_TOKENS,
                    ModelProvider::Other,
                )
            }
        }
    }

    /// All known profiles, sorted by name.
    pub fn profiles(&self) -> impl Iterator<Item = &ModelProfile> {
        self.profiles.values()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Counting ──────────────────────────────────────────────────────────────

/// How a count was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMethod {
    Tiktoken,
    ProviderHeuristic,
    GenericHeuristic,
}

/// How much a count can be trusted. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenCount {
    pub count: usize,
    pub method: CountMethod,
    pub confidence: Confidence,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenizerError {
    #[error("Failed to load encoding {encoding}: {reason}")]
    EncoderLoad { encoding: String, reason: String },
}

/// Counts tokens for a [`ModelProfile`].
#[derive(Clone, Default)]
pub struct Tokenizer {
    cl100k: Option<Arc<CoreBPE>>,
    o200k: Option<Arc<CoreBPE>>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("cl100k", &self.cl100k.is_some())
            .field("o200k", &self.o200k.is_some())
            .finish()
    }
}

impl Tokenizer {
    /// A tokenizer with no encoders. Every count is heuristic.
    pub fn heuristic() -> Self {
        Self::default()
    }

    /// Load both BPE encodings.
    pub fn load() -> Result<Self, TokenizerError> {
        let cl100k = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError::EncoderLoad {
            encoding: Encoding::Cl100kBase.as_str().into(),
            reason: e.to_string(),
        })?;
        let o200k = tiktoken_rs::o200k_base().map_err(|e| TokenizerError::EncoderLoad {
            encoding: Encoding::O200kBase.as_str().into(),
            reason: e.to_string(),
        })?;
        debug!("Loaded cl100k_base and o200k_base encoders");
        Ok(Self {
            cl100k: Some(Arc::new(cl100k)),
            o200k: Some(Arc::new(o200k)),
        })
    }

    /// Inject an already-loaded encoder.
    pub fn with_encoder(mut self, encoding: Encoding, bpe: Arc<CoreBPE>) -> Self {
        match encoding {
            Encoding::Cl100kBase => self.cl100k = Some(bpe),
            Encoding::O200kBase => self.o200k = Some(bpe),
        }
        self
    }

    pub fn has_encoder(&self, encoding: Encoding) -> bool {
        self.encoder(encoding).is_some()
    }

    fn encoder(&self, encoding: Encoding) -> Option<&Arc<CoreBPE>> {
        match encoding {
            Encoding::Cl100kBase => self.cl100k.as_ref(),
            Encoding::O200kBase => self.o200k.as_ref(),
        }
    }

    pub fn count_tokens(&self, text: &str, profile: &ModelProfile) -> TokenCount {
        if let Some(bpe) = profile.encoding.and_then(|e| self.encoder(e)) {
            return TokenCount {
                count: bpe.encode_with_special_tokens(text).len(),
                method: CountMethod::Tiktoken,
                confidence: Confidence::High,
            };
        }
        heuristic_count(text, profile.provider)
    }
}

/// `max(ceil(chars / divisor), word_count)`.
pub fn heuristic_count(text: &str, provider: ModelProvider) -> TokenCount {
    let (method, confidence) = match provider {
        ModelProvider::Other => (CountMethod::GenericHeuristic, Confidence::Low),
        _ => (CountMethod::ProviderHeuristic, Confidence::Medium),
    };
    let chars = text.chars().count();
    let by_chars = (chars as f64 / provider.chars_per_token()).ceil() as usize;
    let words = text.split_whitespace().count();
    TokenCount {
        count: by_chars.max(words),
        method,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpt4() -> ModelProfile {
        ModelRegistry::builtin().get("gpt-4")
    }

    #[test]
    fn empty_string_is_zero() {
        let count = Tokenizer::heuristic().count_tokens("", &gpt4());
        assert_eq!(count.count, 0);
    }

    #[test]
    fn heuristic_rounds_up() {
        // 18 chars / 3.8 = 4.74 -> 5, 20 chars / 3.8 = 5.26 -> 6
        let profile = gpt4();
        let t = Tokenizer::heuristic();
        assert_eq!(t.count_tokens(&"a".repeat(18), &profile).count, 5);
        assert_eq!(t.count_tokens(&"a".repeat(20), &profile).count, 6);
    }

    #[test]
    fn word_count_floor() {
        // 9 chars but 5 words
        let count = heuristic_count("a b c d e", ModelProvider::OpenAi);
        assert_eq!(count.count, 5);
    }

    #[test]
    fn confidence_follows_provider() {
        let t = Tokenizer::heuristic();
        let openai = t.count_tokens("hello world", &gpt4());
        assert_eq!(openai.method, CountMethod::ProviderHeuristic);
        assert_eq!(openai.confidence, Confidence::Medium);

        let other = t.count_tokens("hello world", &ModelRegistry::builtin().get("mystery"));
        assert_eq!(other.method, CountMethod::GenericHeuristic);
        assert_eq!(other.confidence, Confidence::Low);
        assert!(Confidence::High > Confidence::Medium && Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn unknown_model_gets_default_profile() {
        let profile = ModelRegistry::builtin().get("no-such-model");
        assert_eq!(profile.token_limit, 8192);
        assert_eq!(profile.reserved_output_tokens, 1500);
        assert_eq!(profile.provider, ModelProvider::Other);
        assert_eq!(profile.name, "no-such-model");
    }

    #[test]
    fn builtin_table_values() {
        let registry = ModelRegistry::builtin();
        assert_eq!(available_prompt_tokens(&registry.get("gpt-4")), 6692);
        assert_eq!(registry.get("gpt-4o").encoding, Some(Encoding::O200kBase));
        assert_eq!(registry.get("claude-3-opus-20240229").token_limit, 200_000);
        assert_eq!(registry.get("command-r").provider, ModelProvider::Cohere);
    }

    #[test]
    fn available_tokens_saturate() {
        let profile = ModelProfile::new("tiny", 100, 500, ModelProvider::Other);
        assert_eq!(profile.available_prompt_tokens(), 0);
    }

    #[test]
    fn chars_estimate_is_divisor_inverse() {
        assert_eq!(estimate_chars_for_tokens(100, ModelProvider::OpenAi), 380);
        assert_eq!(estimate_chars_for_tokens(100, ModelProvider::Other), 350);
        assert_eq!(estimate_chars_for_tokens(0, ModelProvider::Cohere), 0);
    }

    #[test]
    fn config_overrides_merge() {
        let mut models = BTreeMap::new();
        models.insert(
            "gpt-4".to_string(),
            ModelConfig {
                token_limit: 4000,
                reserved_output_tokens: 500,
                provider: "openai".into(),
                encoding: None,
            },
        );
        models.insert(
            "local-llama".to_string(),
            ModelConfig {
                token_limit: 4096,
                reserved_output_tokens: 512,
                provider: "other".into(),
                encoding: Some("cl100k_base".into()),
            },
        );
        let registry = ModelRegistry::builtin().with_overrides(&models);
        assert_eq!(registry.get("gpt-4").token_limit, 4000);
        assert_eq!(registry.get("gpt-4").encoding, None);
        assert_eq!(registry.get("local-llama").encoding, Some(Encoding::Cl100kBase));
        assert!(registry.contains("gpt-4o"));
    }

    #[test]
    fn encoding_without_loaded_encoder_falls_back() {
        let count = Tokenizer::heuristic().count_tokens("fn main() {}", &gpt4());
        assert_eq!(count.method, CountMethod::ProviderHeuristic);
    }

    #[test]
    fn loaded_encoder_counts_precisely() {
        let t = Tokenizer::load().unwrap();
        assert!(t.has_encoder(Encoding::Cl100kBase));
        assert!(t.has_encoder(Encoding::O200kBase));

        let count = t.count_tokens("hello world", &gpt4());
        assert_eq!(count.count, 2);
        assert_eq!(count.method, CountMethod::Tiktoken);
        assert_eq!(count.confidence, Confidence::High);
    }

    #[test]
    fn loaded_encoder_ignored_for_non_bpe_profiles() {
        let t = Tokenizer::load().unwrap();
        let claude = ModelRegistry::builtin().get("claude-3-opus-20240229");
        let count = t.count_tokens("hello world", &claude);
        assert_eq!(count.method, CountMethod::ProviderHeuristic);
        assert_eq!(count.confidence, Confidence::Medium);
    }

    #[test]
    fn injected_encoder_is_used() {
        let bpe = Arc::new(tiktoken_rs::o200k_base().unwrap());
        let t = Tokenizer::heuristic().with_encoder(Encoding::O200kBase, bpe);
        assert!(!t.has_encoder(Encoding::Cl100kBase));

        let gpt4o = ModelRegistry::builtin().get("gpt-4o");
        assert_eq!(t.count_tokens("fn main() {}", &gpt4o).method, CountMethod::Tiktoken);
        assert_eq!(t.count_tokens("fn main() {}", &gpt4()).method, CountMethod::ProviderHeuristic);
    }
}
