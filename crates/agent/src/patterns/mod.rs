//! Agent patterns: structured reasoning strategies.
//!
//! - **ReAct**: one Thought → Action step per call, transcript owned by the caller
//! - **Self-correction**: detects failed tools and negative feedback, and
//!   injects a corrective directive into the next prompt
//! - **Action parsing**: the `Thought:` / `Action:` / `Final Answer:` grammar

pub mod action_parser;
pub mod correction;
pub mod react;

pub use action_parser::{ActionParser, ParsedOutput};
pub use correction::{
    CorrectionAnalysis, CorrectionAttempts, CorrectionTrigger, ErrorContext, ErrorKind,
    FailedAction, FeedbackClassifier, KeywordFeedbackClassifier, SELF_CORRECTION_MARKER,
};
pub use react::{CorrectionReport, ReActEngine, ReActRequest, ReActStepResult, StepStatus};

#[cfg(test)]
pub(crate) mod test_helpers;
