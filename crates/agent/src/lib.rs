//! The reasoning core of CodeSage.
//!
//! Given a model's finite token budget and a ranked set of context sources,
//! produce one deterministic, budget-respecting prompt; then drive a single
//! ReAct transition over it:
//!
//! 1. **Resolve** the model profile and count tokens ([`context::token`])
//! 2. **Gather** explicit files, pinned items, history, search hits and the
//!    focused file ([`context::gatherer`])
//! 3. **Assemble** them by priority within the budget ([`context::assembler`])
//! 4. **Check** the transcript for failures worth correcting ([`patterns::correction`])
//! 5. **Reason** once and return the next conversational state ([`patterns::react`])
//!
//! Nothing here holds state between calls. Collaborators (stores, search,
//! the reasoning provider) come in as `Arc<dyn Trait>` from `codesage-core`.

pub mod context;
pub mod patterns;
pub mod prompt;

use std::sync::Arc;

use codesage_core::turn::ConversationTurn;

pub use context::{
    AssembledPrompt, AssemblyError, AssemblySettings, Confidence, ContextAssembler, ContextGatherer,
    ContextSourceItem, CountMethod, Encoding, GatherRequest, GatherSettings, ModelProfile,
    ModelProvider, ModelRegistry, SourceKind, TokenCount, Tokenizer, TokenizerError,
    TruncationStrategy,
};
pub use patterns::{
    CorrectionAnalysis, CorrectionTrigger, ErrorContext, ErrorKind, ReActEngine, ReActRequest,
    ReActStepResult, StepStatus,
};
pub use prompt::default_system_prompt;

/// Count tokens for `text` under `profile`.
pub fn count_tokens(tokenizer: &Tokenizer, text: &str, profile: &ModelProfile) -> TokenCount {
    tokenizer.count_tokens(text, profile)
}

/// Pack items into a prompt with default settings. Never fails.
pub fn assemble_context(
    tokenizer: Arc<Tokenizer>,
    items: Vec<ContextSourceItem>,
    profile: &ModelProfile,
) -> AssembledPrompt {
    ContextAssembler::new(tokenizer).assemble(items, profile)
}

/// Run one ReAct step. Never fails.
pub async fn perform_react_step(engine: &ReActEngine, request: ReActRequest) -> ReActStepResult {
    engine.perform_step(request).await
}

/// Analyze a transcript with the default keyword trigger.
pub fn analyze_correction_trigger(
    history: &[ConversationTurn],
    new_input: &str,
) -> CorrectionAnalysis {
    CorrectionTrigger::default().analyze(history, new_input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_functions_delegate() {
        let tokenizer = Arc::new(Tokenizer::heuristic());
        let profile = ModelRegistry::builtin().get("claude-3-opus-20240229");
        assert_eq!(count_tokens(&tokenizer, "abcdefgh", &profile).count, 3);

        let prompt = assemble_context(
            tokenizer,
            vec![
                ContextSourceItem::system_prompt("sys"),
                ContextSourceItem::user_query("query"),
            ],
            &profile,
        );
        assert!(prompt.warnings.is_empty());

        let history = vec![ConversationTurn::assistant("done")];
        assert!(analyze_correction_trigger(&history, "that is wrong").should_trigger);
    }
}
