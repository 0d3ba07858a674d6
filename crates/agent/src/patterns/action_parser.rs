//! Parser for the agent's text grammar.
//!
//! ```text
//! Thought: I need to see how the config is loaded.
//! Action: read_file(path="src/config.rs")
//! ```
//!
//! or
//!
//! ```text
//! Thought: I have what I need.
//! Final Answer: The config is loaded in `AppConfig::load`.
//! ```
//!
//! Anything that is neither is treated as a direct answer, verbatim.

use codesage_core::tool::ToolCatalog;
use codesage_core::turn::ToolCallRequest;
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::warn;

// Arguments end at the first `)` outside a quoted string.
static ACTION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?m)^[ \t]*Action:[ \t]*([A-Za-z_][A-Za-z0-9_]*)[ \t]*"#,
        r#"\(((?:[^()"]|"(?:[^"\\]|\\.)*")*)\)"#,
    ))
    .ok()
});

// Unquoted nested parentheses, e.g. `search_codebase(fn load())`: take the
// rest of the action line up to its last `)`.
static ACTION_LINE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Action:[ \t]*([A-Za-z_][A-Za-z0-9_]*)[ \t]*\((.*)\)").ok()
});

static ARG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"((?:[^"\\]|\\.)*)""#).ok()
});

static POSITIONAL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*"((?:[^"\\]|\\.)*)"\s*$"#).ok()
});

static THOUGHT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*Thought:[ \t]*(.*?)(?:^[ \t]*(?:Action|Final Answer):|\z)").ok()
});

static FINAL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*Final Answer:[ \t]*(.*)").ok()
});

/// One parsed model completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    Action { thought: String, call: ToolCallRequest },
    Answer { thought: String, answer: String },
}

/// Parses completions, resolving positional arguments against a catalog.
#[derive(Debug, Clone, Default)]
pub struct ActionParser {
    catalog: ToolCatalog,
}

impl ActionParser {
    pub fn new(catalog: ToolCatalog) -> Self {
        Self { catalog }
    }

    pub fn parse(&self, raw: &str) -> ParsedOutput {
        let thought = THOUGHT_RE
            .as_ref()
            .and_then(|re| re.captures(raw))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let action = ACTION_RE
            .as_ref()
            .and_then(|re| re.captures(raw))
            .or_else(|| ACTION_LINE_RE.as_ref().and_then(|re| re.captures(raw)));
        if let Some(caps) = action {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let args = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let call = self.build_call(name, args);

            let thought = if thought.is_empty() {
                // Free text before the action line stands in for the thought.
                let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                raw[..start].trim().to_string()
            } else {
                thought
            };
            return ParsedOutput::Action { thought, call };
        }

        if let Some(answer) = FINAL_RE
            .as_ref()
            .and_then(|re| re.captures(raw))
            .and_then(|c| c.get(1))
        {
            return ParsedOutput::Answer {
                thought,
                answer: answer.as_str().trim().to_string(),
            };
        }

        ParsedOutput::Answer {
            thought,
            answer: raw.trim().to_string(),
        }
    }

    fn build_call(&self, name: &str, args: &str) -> ToolCallRequest {
        let mut call = ToolCallRequest::new(name);
        if let Some(re) = ARG_RE.as_ref() {
            for caps in re.captures_iter(args) {
                if let (Some(k), Some(v)) = (caps.get(1), caps.get(2)) {
                    call = call.with_arg(k.as_str(), unescape(v.as_str()));
                }
            }
        }

        if call.parameters.is_empty() {
            let positional = POSITIONAL_RE
                .as_ref()
                .and_then(|re| re.captures(args))
                .and_then(|c| c.get(1));
            if let Some(v) = positional {
                let key = self
                    .catalog
                    .get(name)
                    .and_then(|t| t.parameters.first())
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "input".to_string());
                call = call.with_arg(key, unescape(v.as_str()));
            }
        }

        if !self.catalog.is_empty() && self.catalog.get(name).is_none() {
            warn!(tool = %name, "Model proposed a tool outside the catalog");
        }
        call
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
