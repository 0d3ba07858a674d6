//! Tool catalog: the capabilities the agent may request.
//!
//! The engine never executes tools itself. It describes them to the model,
//! parses the model's `Action:` line, and hands the proposed call back to the
//! caller, who runs it and reports a `tool_observation` turn.

use serde::{Deserialize, Serialize};

/// A single named argument of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Description of a tool, rendered into the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The unique name of this tool (e.g., "read_file")
    pub name: String,

    /// What the tool does
    pub description: String,

    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Builder-style helper to add a required parameter.
    pub fn param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.parameters.push(ToolParameter {
            name: name.into(),
            description: description.into(),
            required: true,
        });
        self
    }

    /// Signature line, e.g. `read_file(path="...")`.
    pub fn signature(&self) -> String {
        let args: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!("{}=\"...\"", p.name))
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

/// An ordered set of tools.
///
/// Registration order is preserved so the rendered prompt is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The tools a codebase-reasoning agent ships with.
    pub fn codebase_tools() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            ToolSpec::new(
                "search_codebase",
                "Semantic search over the uploaded project. Returns ranked snippets with file \
                 paths and line ranges.",
            )
            .param("query", "Natural-language or code search query"),
        );
        catalog.register(
            ToolSpec::new("read_file", "Read the full contents of a project file.")
                .param("path", "Project-relative file path"),
        );
        catalog.register(
            ToolSpec::new("list_directory", "List the files under a project directory.")
                .param("path", "Project-relative directory path"),
        );
        catalog.register(
            ToolSpec::new(
                "propose_edit",
                "Propose a code change as a unified diff. The user reviews and applies it.",
            )
            .param("path", "Project-relative file path")
            .param("diff", "Unified diff against the current file contents"),
        );
        catalog
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: ToolSpec) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name == tool.name) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the catalog as a prompt section.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for tool in &self.tools {
            out.push_str(&format!("- {}: {}\n", tool.signature(), tool.description));
            for p in &tool.parameters {
                let marker = if p.required { "required" } else { "optional" };
                out.push_str(&format!("    {} ({}): {}\n", p.name, marker, p.description));
            }
        }
        out
    }
}
