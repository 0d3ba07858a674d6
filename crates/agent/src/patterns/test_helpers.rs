//! Shared test helpers for pattern tests.

use codesage_core::error::ProviderError;
use codesage_core::provider::{ReasoningProvider, SamplingParams};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted completions.
///
/// Each call to `complete` returns the next response in the queue and
/// records the prompt and sampling parameters it was given.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    calls: Mutex<Vec<(String, SamplingParams)>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that returns a single completion.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// A provider whose only call fails.
    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The prompt of the `n`th call.
    pub fn prompt(&self, n: usize) -> String {
        self.calls.lock().unwrap()[n].0.clone()
    }

    /// The sampling parameters of the `n`th call.
    pub fn params(&self, n: usize) -> SamplingParams {
        self.calls.lock().unwrap()[n].1.clone()
    }
}

#[async_trait::async_trait]
impl ReasoningProvider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if calls.len() >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                calls.len(),
                responses.len()
            );
        }

        let response = responses[calls.len()].clone();
        calls.push((prompt.to_string(), params.clone()));
        response
    }
}

/// A `Thought:` / `Action:` completion.
pub fn action_response(thought: &str, tool: &str, args: &[(&str, &str)]) -> String {
    let args: Vec<String> = args.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
    format!("Thought: {thought}\nAction: {tool}({})", args.join(", "))
}

/// A `Thought:` / `Final Answer:` completion.
pub fn answer_response(thought: &str, answer: &str) -> String {
    format!("Thought: {thought}\nFinal Answer: {answer}")
}
