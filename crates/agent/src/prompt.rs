//! Default system prompt.

use codesage_core::tool::ToolCatalog;

const ROLE: &str = "You are CodeSage, an assistant that answers questions about the user's \
uploaded codebase. Ground every claim in the provided context or in tool results, \
cite file paths, and say so when you are unsure.";

const GRAMMAR: &str = "\
Respond in exactly one of these two forms.

To use a tool:
Thought: <your reasoning about what to do next>
Action: tool_name(arg=\"value\", ...)

To answer the user:
Thought: <your reasoning>
Final Answer: <your answer>

Use one action per response and wait for its Observation. \
Escape double quotes inside argument values as \\\".";

/// Role, response grammar and the rendered tool catalog.
pub fn default_system_prompt(catalog: &ToolCatalog) -> String {
    let mut prompt = format!("{ROLE}\n\n{GRAMMAR}\n");
    if !catalog.is_empty() {
        prompt.push_str("\nAvailable tools:\n");
        prompt.push_str(&catalog.render());
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_grammar_and_tools() {
        let prompt = default_system_prompt(&ToolCatalog::codebase_tools());
        assert!(prompt.contains("Final Answer:"));
        assert!(prompt.contains("Action: tool_name("));
        assert!(prompt.contains(r#"search_codebase(query="...")"#));
    }

    #[test]
    fn empty_catalog_omits_tool_section() {
        let prompt = default_system_prompt(&ToolCatalog::new());
        assert!(!prompt.contains("Available tools"));
    }
}
