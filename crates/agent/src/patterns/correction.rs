//! Self-correction trigger.
//!
//! Inspects the transcript and the new user input and decides whether the
//! next reasoning call should carry a corrective instruction. Two paths:
//!
//! - **Tool error**: the most recent tool observation (scanning back past
//!   non-observation turns) reports a failure.
//! - **User feedback**: no tool error, the new input reads as a complaint
//!   about earlier output, and there is earlier output to complain about.
//!
//! The trigger only reports. Limiting correction attempts is the caller's
//! business; [`CorrectionTrigger::attempt_count`] gives them the numbers.

use codesage_config::CorrectionConfig;
use codesage_core::turn::{ConversationTurn, TurnRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix on assistant turns produced while a correction was active.
pub const SELF_CORRECTION_MARKER: &str = "[self-correction]";

/// How much of the previous agent output is quoted in the directive.
const PREVIOUS_OUTPUT_QUOTE_CHARS: usize = 500;

const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "wrong",
    "incorrect",
    "failed",
    "didn't work",
    "bug",
    "broken",
    "issue",
    "problem",
    "mistake",
    "fix",
    "crash",
    "exception",
];

const REFERENCE_KEYWORDS: &[&str] = &["that", "your", "the code", "previous", "last"];

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolError,
    UserFeedbackError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAction {
    pub tool_name: String,
    pub tool_args: serde_json::Map<String, serde_json::Value>,
}

/// What went wrong, for the directive and for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_action: Option<FailedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_agent_output: Option<String>,
}

/// Result of one trigger analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionAnalysis {
    pub should_trigger: bool,
    pub error_context: Option<ErrorContext>,
    /// Directive text to place in the prompt when triggered.
    pub prompt_segment: Option<String>,
}

impl CorrectionAnalysis {
    fn none() -> Self {
        Self {
            should_trigger: false,
            error_context: None,
            prompt_segment: None,
        }
    }
}

/// Advisory correction-attempt count over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrectionAttempts {
    pub count: usize,
    pub ceiling: usize,
    pub ceiling_reached: bool,
}

// ── Classifier ────────────────────────────────────────────────────────────

/// Decides whether user input is negative feedback about earlier output.
pub trait FeedbackClassifier: Send + Sync {
    fn is_error_feedback(&self, input: &str) -> bool;
}

/// Keyword classifier. Needs one error keyword and one reference keyword,
/// each matched as a whole word or phrase, case-insensitively.
#[derive(Debug, Clone)]
pub struct KeywordFeedbackClassifier {
    error_keywords: Vec<Vec<String>>,
    reference_keywords: Vec<Vec<String>>,
}

impl KeywordFeedbackClassifier {
    pub fn new(error_keywords: &[&str], reference_keywords: &[&str]) -> Self {
        Self {
            error_keywords: error_keywords.iter().map(|k| words(k)).collect(),
            reference_keywords: reference_keywords.iter().map(|k| words(k)).collect(),
        }
    }
}

impl Default for KeywordFeedbackClassifier {
    fn default() -> Self {
        Self::new(ERROR_KEYWORDS, REFERENCE_KEYWORDS)
    }
}

impl FeedbackClassifier for KeywordFeedbackClassifier {
    fn is_error_feedback(&self, input: &str) -> bool {
        let tokens = words(input);
        let has = |phrases: &[Vec<String>]| {
            phrases
                .iter()
                .any(|p| !p.is_empty() && tokens.windows(p.len()).any(|w| w == p.as_slice()))
        };
        has(&self.error_keywords) && has(&self.reference_keywords)
    }
}

/// Lower-cased words; apostrophes stay inside words.
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Trigger ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CorrectionTrigger {
    classifier: Arc<dyn FeedbackClassifier>,
    window: usize,
    ceiling: usize,
}

impl Default for CorrectionTrigger {
    fn default() -> Self {
        Self {
            classifier: Arc::new(KeywordFeedbackClassifier::default()),
            window: 10,
            ceiling: 3,
        }
    }
}

impl CorrectionTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CorrectionConfig) -> Self {
        Self {
            window: config.window,
            ceiling: config.ceiling,
            ..Self::default()
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FeedbackClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn analyze(&self, history: &[ConversationTurn], new_input: &str) -> CorrectionAnalysis {
        if let Some(ctx) = find_tool_error(history) {
            info!(
                tool = ctx
                    .failed_action
                    .as_ref()
                    .map(|a| a.tool_name.as_str())
                    .unwrap_or("unknown"),
                "Self-correction triggered by tool error"
            );
            return triggered(ctx);
        }

        let previous = history.iter().rev().find(|t| t.is_assistant());
        let Some(previous) = previous else {
            return CorrectionAnalysis::none();
        };

        if !self.classifier.is_error_feedback(new_input) {
            return CorrectionAnalysis::none();
        }

        info!("Self-correction triggered by user feedback");
        triggered(ErrorContext {
            kind: ErrorKind::UserFeedbackError,
            error_message: "User reported a problem with the previous response".into(),
            failed_action: None,
            user_feedback: Some(new_input.to_string()),
            previous_agent_output: Some(previous.content.clone()),
        })
    }

    /// Count `[self-correction]` assistant turns within the last `window`.
    pub fn attempt_count(&self, history: &[ConversationTurn]) -> CorrectionAttempts {
        let start = history.len().saturating_sub(self.window);
        let count = history[start..]
            .iter()
            .filter(|t| t.is_assistant() && t.content.starts_with(SELF_CORRECTION_MARKER))
            .count();
        debug!(count, ceiling = self.ceiling, "Correction attempts in window");
        CorrectionAttempts {
            count,
            ceiling: self.ceiling,
            ceiling_reached: count >= self.ceiling,
        }
    }
}

fn triggered(ctx: ErrorContext) -> CorrectionAnalysis {
    CorrectionAnalysis {
        should_trigger: true,
        prompt_segment: Some(render_directive(&ctx)),
        error_context: Some(ctx),
    }
}

/// Scan back to the latest tool observation. A failure there fires; a
/// success stops the scan.
fn find_tool_error(history: &[ConversationTurn]) -> Option<ErrorContext> {
    for (idx, turn) in history.iter().enumerate().rev() {
        if turn.role != TurnRole::ToolObservation {
            continue;
        }
        if turn.is_successful_observation() {
            return None;
        }
        if !turn.is_failed_observation() {
            continue;
        }

        let error_message = turn
            .tool_result
            .as_ref()
            .and_then(|r| r.error.clone())
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| turn.content.clone());

        let wanted = turn.tool_call.as_ref().map(|c| c.name.as_str());
        let call = history[..idx]
            .iter()
            .rev()
            .filter(|t| t.is_assistant())
            .filter_map(|t| t.tool_call.as_ref())
            .find(|c| wanted.is_none_or(|name| c.name == name))
            .or(turn.tool_call.as_ref());

        return Some(ErrorContext {
            kind: ErrorKind::ToolError,
            error_message,
            failed_action: call.map(|c| FailedAction {
                tool_name: c.name.clone(),
                tool_args: c.parameters.clone(),
            }),
            user_feedback: None,
            previous_agent_output: None,
        });
    }
    None
}

fn render_directive(ctx: &ErrorContext) -> String {
    match ctx.kind {
        ErrorKind::ToolError => {
            let action = match &ctx.failed_action {
                Some(a) => {
                    let args = serde_json::Value::Object(a.tool_args.clone());
                    format!("`{}` with arguments {}", a.tool_name, args)
                }
                None => "the previous tool call".to_string(),
            };
            format!(
                "SELF-CORRECTION REQUIRED: The previous action {action} failed with error: {}\n\
                 Work out why it failed before continuing. Retry with corrected arguments or \
                 pick a different tool, and do not repeat the identical failing action.",
                ctx.error_message
            )
        }
        ErrorKind::UserFeedbackError => {
            let previous = ctx.previous_agent_output.as_deref().unwrap_or_default();
            let quoted: String = previous.chars().take(PREVIOUS_OUTPUT_QUOTE_CHARS).collect();
            let ellipsis = if previous.chars().count() > PREVIOUS_OUTPUT_QUOTE_CHARS {
                "..."
            } else {
                ""
            };
            format!(
                "SELF-CORRECTION REQUIRED: The user reported a problem with your previous \
                 response.\n\
                 User feedback: {}\n\
                 Your previous response: {quoted}{ellipsis}\n\
                 Identify the mistake, verify your reasoning against the code, and give a \
                 corrected answer.",
                ctx.user_feedback.as_deref().unwrap_or_default()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesage_core::turn::{ToolCallRequest, ToolOutcome};

    fn read_call(path: &str) -> ToolCallRequest {
        ToolCallRequest::new("read_file").with_arg("path", path)
    }

    #[test]
    fn tool_failure_fires_tool_error() {
        let history = vec![
            ConversationTurn::user("Show me the config loader"),
            ConversationTurn::assistant_action("I'll read it", read_call("src/config.rs")),
            ConversationTurn::tool_observation(
                Some(read_call("src/config.rs")),
                ToolOutcome::failure("file not found"),
            ),
        ];
        let analysis = CorrectionTrigger::new().analyze(&history, "continue");
        assert!(analysis.should_trigger);
        let ctx = analysis.error_context.unwrap();
        assert_eq!(ctx.kind, ErrorKind::ToolError);
        assert_eq!(ctx.error_message, "file not found");
        let action = ctx.failed_action.unwrap();
        assert_eq!(action.tool_name, "read_file");
        assert_eq!(action.tool_args["path"], "src/config.rs");
        assert!(analysis.prompt_segment.unwrap().starts_with("SELF-CORRECTION REQUIRED:"));
    }

    #[test]
    fn only_successes_do_not_fire() {
        let history = vec![
            ConversationTurn::assistant_action("reading", read_call("a.rs")),
            ConversationTurn::tool_observation(
                Some(read_call("a.rs")),
                ToolOutcome::success("fn a() {}"),
            ),
            ConversationTurn::assistant("Here is a.rs"),
        ];
        let analysis = CorrectionTrigger::new().analyze(&history, "thanks");
        assert!(!analysis.should_trigger);
        assert!(analysis.error_context.is_none());
        assert!(analysis.prompt_segment.is_none());
    }

    #[test]
    fn later_success_masks_earlier_failure() {
        let history = vec![
            ConversationTurn::tool_observation(
                Some(read_call("a.rs")),
                ToolOutcome::failure("boom"),
            ),
            ConversationTurn::tool_observation(Some(read_call("b.rs")), ToolOutcome::success("ok")),
        ];
        assert!(!CorrectionTrigger::new().analyze(&history, "next").should_trigger);
    }

    #[test]
    fn error_field_alone_marks_failure() {
        let outcome = ToolOutcome {
            success: true,
            result: serde_json::Value::Null,
            error: Some("permission denied".into()),
        };
        let history = vec![ConversationTurn::tool_observation(None, outcome)];
        let ctx = CorrectionTrigger::new().analyze(&history, "go").error_context.unwrap();
        assert_eq!(ctx.error_message, "permission denied");
        assert!(ctx.failed_action.is_none());
    }

    #[test]
    fn tool_recovered_from_matching_assistant_turn() {
        let search = ToolCallRequest::new("search_codebase").with_arg("query", "auth");
        let history = vec![
            ConversationTurn::assistant_action("search", search.clone()),
            ConversationTurn::assistant_action("read", read_call("x.rs")),
            ConversationTurn::tool_observation(
                Some(ToolCallRequest::new("search_codebase")),
                ToolOutcome::failure("index unavailable"),
            ),
        ];
        let ctx = CorrectionTrigger::new().analyze(&history, "go").error_context.unwrap();
        let action = ctx.failed_action.unwrap();
        assert_eq!(action.tool_name, "search_codebase");
        assert_eq!(action.tool_args["query"], "auth");
    }

    #[test]
    fn user_feedback_after_assistant_turn() {
        let history = vec![
            ConversationTurn::user("Write a parser"),
            ConversationTurn::assistant("Here is the parser: ..."),
        ];
        let analysis = CorrectionTrigger::new().analyze(&history, "Your code is broken");
        assert!(analysis.should_trigger);
        let ctx = analysis.error_context.unwrap();
        assert_eq!(ctx.kind, ErrorKind::UserFeedbackError);
        assert_eq!(ctx.user_feedback.as_deref(), Some("Your code is broken"));
        assert_eq!(ctx.previous_agent_output.as_deref(), Some("Here is the parser: ..."));
    }

    #[test]
    fn general_question_does_not_fire() {
        let history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")];
        let analysis = CorrectionTrigger::new().analyze(&history, "How do I prevent bugs?");
        assert!(!analysis.should_trigger);
    }

    #[test]
    fn feedback_without_assistant_turn_does_not_fire() {
        let history = vec![ConversationTurn::user("hi")];
        assert!(!CorrectionTrigger::new().analyze(&history, "Your code is broken").should_trigger);
    }

    #[test]
    fn keywords_match_whole_words_and_phrases() {
        let c = KeywordFeedbackClassifier::default();
        assert!(c.is_error_feedback("That didn't work at all"));
        assert!(c.is_error_feedback("the code throws an EXCEPTION"));
        assert!(c.is_error_feedback("Your answer didn\u{2019}t work"));
        // "fixture" and "thatch" are not keywords
        assert!(!c.is_error_feedback("add a fixture for the thatch module"));
        assert!(!c.is_error_feedback("explain the error type"));
    }

    #[test]
    fn custom_classifier_is_used() {
        struct Always;
        impl FeedbackClassifier for Always {
            fn is_error_feedback(&self, _input: &str) -> bool {
                true
            }
        }
        let trigger = CorrectionTrigger::new().with_classifier(Arc::new(Always));
        let history = vec![ConversationTurn::assistant("done")];
        assert!(trigger.analyze(&history, "ok").should_trigger);
    }

    #[test]
    fn directive_quotes_at_most_500_chars() {
        let history = vec![ConversationTurn::assistant("z".repeat(800))];
        let segment = CorrectionTrigger::new()
            .analyze(&history, "that is wrong")
            .prompt_segment
            .unwrap();
        assert!(segment.contains(&format!("{}...", "z".repeat(500))));
        assert!(!segment.contains(&"z".repeat(501)));
    }

    #[test]
    fn attempt_count_over_window() {
        let mut history = Vec::new();
        for _ in 0..3 {
            history.push(ConversationTurn::assistant(format!("{SELF_CORRECTION_MARKER} retrying")));
        }
        let trigger = CorrectionTrigger::new();
        let attempts = trigger.attempt_count(&history);
        assert_eq!(attempts.count, 3);
        assert!(attempts.ceiling_reached);

        for _ in 0..10 {
            history.push(ConversationTurn::user("filler"));
        }
        assert_eq!(trigger.attempt_count(&history).count, 0);
    }
}
