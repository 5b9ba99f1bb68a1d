use super::CompletionClient;
use crate::error::CompletionError;

/// Deterministic backend: the first rule whose marker occurs in the prompt supplies the
/// response. Every prompt is recorded, including ones that fail.
#[derive(Clone, Debug, Default)]
pub struct MockCompletion {
    name: String,
    rules: Vec<(String, String)>,
    default_response: Option<String>,
    fail_on_call: Option<usize>,
    prompts: Vec<String>,
}

impl MockCompletion {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, marker: &str, response: &str) -> Self {
        self.rules.push((marker.to_string(), response.to_string()));
        self
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// The `n`-th call (1-based) fails with a request error.
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.len()
    }
}

impl CompletionClient for MockCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&mut self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.push(prompt.to_string());
        let call = self.prompts.len();
        if self.fail_on_call == Some(call) {
            return Err(CompletionError::Request(format!(
                "scripted failure on call {call}"
            )));
        }
        self.rules
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, resp)| resp.clone())
            .or_else(|| self.default_response.clone())
            .ok_or_else(|| CompletionError::Request("no canned response for prompt".to_string()))
    }
}
