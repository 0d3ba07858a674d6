//! ReAct step engine: one Thought → Action transition per call.
//!
//! The engine is stateless across calls. The caller owns the transcript,
//! passes it in whole, and gets back a new transcript with exactly one
//! assistant turn appended. Tool execution is the caller's job: on
//! `ActionProposed` they run the tool, append a `tool_observation` turn and
//! call again. `DirectResponseProvided` ends the exchange; `Error` is
//! retryable with the unchanged transcript.
//!
//! # Step
//!
//! 1. Run the self-correction trigger; a fired trigger adds a directive item
//! 2. Gather and assemble the prompt
//! 3. Call the reasoning provider (stop sequence `Observation:`)
//! 4. Parse `Thought:` / `Action:` / `Final Answer:`
//! 5. Append one assistant turn and decrement the iteration budget

use codesage_config::AppConfig;
use codesage_core::error::ProviderError;
use codesage_core::provider::{ReasoningProvider, SamplingParams};
use codesage_core::store::SearchHit;
use codesage_core::tool::ToolCatalog;
use codesage_core::turn::{ConversationTurn, ToolCallRequest};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::{
    AssemblySettings, ContextAssembler, ContextGatherer, GatherRequest, GatherSettings,
    ModelRegistry,
};
use crate::patterns::action_parser::{ActionParser, ParsedOutput};
use crate::patterns::correction::{
    CorrectionAttempts, CorrectionTrigger, ErrorContext, SELF_CORRECTION_MARKER,
};
use crate::prompt::default_system_prompt;

/// Stop sequence keeping the model from inventing its own observations.
pub const OBSERVATION_STOP: &str = "Observation:";

/// Note used when an action is proposed with no iterations left.
pub const ITERATION_EXHAUSTED_NOTE: &str =
    "I've reached the maximum number of reasoning steps for this request.";

// ── Types ─────────────────────────────────────────────────────────────────

/// Input of one ReAct step.
#[derive(Debug, Clone)]
pub struct ReActRequest {
    pub project_id: String,
    pub user_query: String,
    pub model: String,
    pub explicit_paths: Vec<String>,
    pub pinned_ids: Vec<String>,
    pub implicit_path: Option<String>,
    pub search_hits: Vec<SearchHit>,
    pub conversation_history: Vec<ConversationTurn>,
    pub max_iterations_left: u32,
}

impl ReActRequest {
    pub fn new(
        project_id: impl Into<String>,
        model: impl Into<String>,
        user_query: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_query: user_query.into(),
            model: model.into(),
            explicit_paths: Vec::new(),
            pinned_ids: Vec::new(),
            implicit_path: None,
            search_hits: Vec::new(),
            conversation_history: Vec::new(),
            max_iterations_left: 10,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.conversation_history = history;
        self
    }

    pub fn with_explicit_paths(mut self, paths: Vec<String>) -> Self {
        self.explicit_paths = paths;
        self
    }

    pub fn with_pinned_ids(mut self, ids: Vec<String>) -> Self {
        self.pinned_ids = ids;
        self
    }

    pub fn with_implicit_path(mut self, path: impl Into<String>) -> Self {
        self.implicit_path = Some(path.into());
        self
    }

    pub fn with_search_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.search_hits = hits;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations_left = max;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    ActionProposed,
    DirectResponseProvided,
    Error,
}

/// Correction state reported alongside a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionReport {
    pub error_context: ErrorContext,
    pub attempts: CorrectionAttempts,
}

/// Output of one ReAct step.
#[derive(Debug, Clone, Serialize)]
pub struct ReActStepResult {
    pub thought: String,
    pub action_details: Option<ToolCallRequest>,
    pub direct_response: Option<String>,
    pub updated_conversation_history: Vec<ConversationTurn>,
    pub iterations_remaining: u32,
    pub status: StepStatus,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub prompt_tokens: usize,
    pub correction: Option<CorrectionReport>,
}

// ── Engine ────────────────────────────────────────────────────────────────

pub struct ReActEngine {
    provider: Arc<dyn ReasoningProvider>,
    gatherer: ContextGatherer,
    assembler: ContextAssembler,
    registry: Arc<ModelRegistry>,
    trigger: CorrectionTrigger,
    parser: ActionParser,
    system_prompt: String,
    temperature: f32,
    max_iterations: u32,
}

impl ReActEngine {
    /// An engine with the built-in model table and the codebase tool catalog.
    pub fn new(provider: Arc<dyn ReasoningProvider>, gatherer: ContextGatherer) -> Self {
        let catalog = ToolCatalog::codebase_tools();
        Self {
            provider,
            assembler: ContextAssembler::new(gatherer.tokenizer()),
            gatherer,
            registry: Arc::new(ModelRegistry::builtin()),
            trigger: CorrectionTrigger::default(),
            system_prompt: default_system_prompt(&catalog),
            parser: ActionParser::new(catalog),
            temperature: 0.2,
            max_iterations: 10,
        }
    }

    /// Apply every tunable from configuration.
    pub fn from_config(
        provider: Arc<dyn ReasoningProvider>,
        gatherer: ContextGatherer,
        config: &AppConfig,
    ) -> Self {
        let gatherer = gatherer.with_settings(GatherSettings::from(&config.context));
        let mut engine = Self::new(provider, gatherer)
            .with_assembly_settings(AssemblySettings::from(&config.context))
            .with_registry(Arc::new(ModelRegistry::builtin().with_overrides(&config.models)))
            .with_trigger(CorrectionTrigger::from_config(&config.correction))
            .with_temperature(config.temperature)
            .with_max_iterations(config.agent.max_iterations);
        if let Some(prompt) = &config.system_prompt_override {
            engine = engine.with_system_prompt(prompt.clone());
        }
        engine
    }

    pub fn with_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_assembly_settings(mut self, settings: AssemblySettings) -> Self {
        self.assembler = self.assembler.with_settings(settings);
        self
    }

    pub fn with_trigger(mut self, trigger: CorrectionTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Replace the tool catalog. Regenerates the default system prompt.
    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.system_prompt = default_system_prompt(&catalog);
        self.parser = ActionParser::new(catalog);
        self
    }

    /// Replace the whole system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Iteration allowance given to requests built by [`Self::request`].
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Start a request carrying this engine's iteration allowance.
    pub fn request(
        &self,
        project_id: impl Into<String>,
        model: impl Into<String>,
        user_query: impl Into<String>,
    ) -> ReActRequest {
        ReActRequest::new(project_id, model, user_query).with_max_iterations(self.max_iterations)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Perform one reasoning transition. Never fails; errors surface as
    /// `StepStatus::Error` with the transcript unchanged.
    pub async fn perform_step(&self, request: ReActRequest) -> ReActStepResult {
        let profile = self.registry.get(&request.model);
        let history = &request.conversation_history;

        // ── Self-correction ──
        let analysis = self.trigger.analyze(history, &request.user_query);
        let correction = analysis.error_context.map(|error_context| {
            let attempts = self.trigger.attempt_count(history);
            if attempts.ceiling_reached {
                warn!(
                    attempts = attempts.count,
                    ceiling = attempts.ceiling,
                    "Correction attempt ceiling reached"
                );
            }
            CorrectionReport {
                error_context,
                attempts,
            }
        });

        // ── Gather + assemble ──
        let mut gather =
            GatherRequest::new(&request.project_id, &self.system_prompt, &request.user_query)
            .with_explicit_paths(request.explicit_paths.clone())
            .with_pinned_ids(request.pinned_ids.clone())
            .with_search_hits(request.search_hits.clone())
            .with_history(history.clone());
        if let Some(path) = &request.implicit_path {
            gather = gather.with_implicit_path(path);
        }
        if let Some(directive) = analysis.prompt_segment {
            gather = gather.with_correction(directive);
        }

        let items = self.gatherer.gather(&gather, &profile).await;
        let prompt = self.assembler.assemble(items, &profile);
        debug!(
            model = %profile.name,
            tokens = prompt.total_tokens,
            budget = prompt.budget,
            "Prompt assembled"
        );

        // ── Reason ──
        let params = SamplingParams {
            model: profile.name.clone(),
            temperature: self.temperature,
            max_tokens: Some(u32::try_from(profile.reserved_output_tokens).unwrap_or(u32::MAX)),
            stop: vec![OBSERVATION_STOP.to_string()],
        };

        let raw = match self.provider.complete(&prompt.text, &params).await {
            Ok(raw) if raw.trim().is_empty() => Err(ProviderError::EmptyResponse.to_string()),
            Ok(raw) => Ok(raw),
            Err(e) => Err(e.to_string()),
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(message) => {
                warn!(provider = %self.provider.name(), error = %message, "Reasoning call failed");
                return ReActStepResult {
                    thought: String::new(),
                    action_details: None,
                    direct_response: None,
                    updated_conversation_history: request.conversation_history,
                    iterations_remaining: request.max_iterations_left,
                    status: StepStatus::Error,
                    error: Some(message),
                    warnings: prompt.warnings,
                    prompt_tokens: prompt.total_tokens,
                    correction,
                };
            }
        };

        // ── Parse ──
        let (thought, action, direct) = match self.parser.parse(&raw) {
            ParsedOutput::Action { thought, call } if request.max_iterations_left == 0 => {
                warn!(tool = %call.name, "Action proposed with no iterations left");
                let response = if thought.is_empty() {
                    ITERATION_EXHAUSTED_NOTE.to_string()
                } else {
                    format!("{ITERATION_EXHAUSTED_NOTE} Progress so far: {thought}")
                };
                (thought, None, Some(response))
            }
            ParsedOutput::Action { thought, call } => (thought, Some(call), None),
            ParsedOutput::Answer { thought, answer } => (thought, None, Some(answer)),
        };

        // ── Transcript ──
        let body = match (&action, &direct) {
            (Some(_), _) if !thought.is_empty() => thought.clone(),
            (Some(call), _) => format!("Action: {}", call.render()),
            (None, Some(answer)) => answer.clone(),
            (None, None) => thought.clone(),
        };
        let content = if correction.is_some() {
            format!("{SELF_CORRECTION_MARKER} {body}")
        } else {
            body
        };
        let turn = match &action {
            Some(call) => ConversationTurn::assistant_action(content, call.clone()),
            None => ConversationTurn::assistant(content),
        };

        let mut updated = request.conversation_history;
        updated.push(turn);

        let status = if action.is_some() {
            StepStatus::ActionProposed
        } else {
            StepStatus::DirectResponseProvided
        };
        let iterations_remaining = request.max_iterations_left.saturating_sub(1);

        info!(
            status = ?status,
            tool = action.as_ref().map(|c| c.name.as_str()).unwrap_or("-"),
            iterations_remaining,
            corrected = correction.is_some(),
            "ReAct step complete"
        );

        ReActStepResult {
            thought,
            action_details: action,
            direct_response: direct,
            updated_conversation_history: updated,
            iterations_remaining,
            status,
            error: None,
            warnings: prompt.warnings,
            prompt_tokens: prompt.total_tokens,
            correction,
        }
    }
}
