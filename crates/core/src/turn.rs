//! Conversation turn domain types.
//!
//! A transcript is an ordered `Vec<ConversationTurn>` owned by the caller.
//! The engine reads it, and every transition returns a new vector; nothing
//! here mutates a caller's history in place.
//!
//! The serialized shape is the only semi-stable artifact crossing the
//! boundary, so field names are fixed:
//!
//! ```json
//! {"role": "tool_observation", "content": "...",
//!  "toolCall": {"name": "read_file", "parameters": {"path": "src/lib.rs"}},
//!  "toolResult": {"success": false, "result": null, "error": "not found"},
//!  "timestamp": "2024-05-01T12:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The end user
    User,
    /// The reasoning agent
    Assistant,
    /// Output of a tool the caller executed on the agent's behalf
    ToolObservation,
}

impl TurnRole {
    /// Upper-case label used when rendering a turn into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
            Self::ToolObservation => "TOOL_OBSERVATION",
        }
    }
}

/// A tool invocation proposed by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name, e.g. `read_file`
    pub name: String,

    /// Named arguments
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: serde_json::Map::new(),
        }
    }

    /// Builder-style helper to add a string argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    /// Render as `name(key="value", ...)`, the same grammar the agent emits.
    pub fn render(&self) -> String {
        let args: Vec<String> = self
            .parameters
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{k}={s:?}"),
                other => format!("{k}={other}"),
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

/// The outcome of a tool execution, reported back by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,

    #[serde(default)]
    pub result: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(result: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            result: result.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// A tool failed if it says so, or if it carries a non-empty error.
    pub fn is_failure(&self) -> bool {
        !self.success || self.error.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// Short textual form of the result payload.
    pub fn result_text(&self) -> String {
        match &self.result {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A single entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: TurnRole,

    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolOutcome>,

    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_result: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    /// Create a new assistant turn without an action.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    /// Create an assistant turn that proposes a tool call.
    pub fn assistant_action(content: impl Into<String>, call: ToolCallRequest) -> Self {
        let mut turn = Self::new(TurnRole::Assistant, content);
        turn.tool_call = Some(call);
        turn
    }

    /// Create a tool observation turn for the given call.
    pub fn tool_observation(call: Option<ToolCallRequest>, outcome: ToolOutcome) -> Self {
        let content = if outcome.is_failure() {
            outcome.error.clone().unwrap_or_else(|| outcome.result_text())
        } else {
            outcome.result_text()
        };
        let mut turn = Self::new(TurnRole::ToolObservation, content);
        turn.tool_call = call;
        turn.tool_result = Some(outcome);
        turn
    }

    /// Override the timestamp (deterministic transcripts in tests and replays).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.role == TurnRole::Assistant
    }

    /// A tool observation whose outcome reports a failure.
    pub fn is_failed_observation(&self) -> bool {
        self.role == TurnRole::ToolObservation
            && self.tool_result.as_ref().is_some_and(ToolOutcome::is_failure)
    }

    /// A tool observation whose outcome reports success.
    pub fn is_successful_observation(&self) -> bool {
        self.role == TurnRole::ToolObservation
            && self.tool_result.as_ref().is_some_and(|r| !r.is_failure())
    }
}
