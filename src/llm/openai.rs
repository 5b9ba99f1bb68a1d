use std::time::Duration;

use log::{debug, error};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::CompletionClient;
use crate::error::CompletionError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Clone, Debug, PartialEq)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token. Read on first use.
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: None,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    cfg: OpenAiConfig,
    client: Client,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Fails only when the HTTP client itself cannot be built (e.g. no TLS backend).
    pub fn new(cfg: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Request(format!("build http client: {e}")))?;
        Ok(Self {
            cfg,
            client,
            api_key: None,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.cfg
    }

    fn api_key(&mut self) -> Result<String, CompletionError> {
        if let Some(k) = self.api_key.as_ref() {
            return Ok(k.clone());
        }
        let key = std::env::var(&self.cfg.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CompletionError::MissingCredential(self.cfg.api_key_env.clone()))?;
        self.api_key = Some(key.clone());
        Ok(key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'))
    }
}

impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.cfg.model
    }

    fn complete(&mut self, prompt: &str) -> Result<String, CompletionError> {
        let key = self.api_key()?;
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.cfg.temperature,
        };
        debug!(
            "{}: POST {} ({} prompt chars)",
            self.cfg.model,
            self.endpoint(),
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "failed to read error body".to_string());
            error!("{}: completion API error ({}): {}", self.cfg.model, status, message);
            return Err(status_error(status, message));
        }

        let parsed: ChatResponse = response.json()?;
        extract_text(parsed)
    }
}

fn status_error(status: StatusCode, message: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Authentication {
            status: status.as_u16(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited(message),
        _ => CompletionError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn extract_text(response: ChatResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{extract_text, status_error, ChatRequest, ChatMessage, ChatResponse, OpenAiClient, OpenAiConfig};
    use crate::error::CompletionError;
    use crate::llm::CompletionClient;

    #[test]
    fn request_body_has_single_user_message() {
        let body = ChatRequest {
            model: "m",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: None,
        };
        let json = serde_json::to_value(&body).expect("json");
        assert_eq!(
            json,
            serde_json::json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn first_choice_content_is_the_text() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"你好"}}]}"#,
        )
        .expect("json");
        assert_eq!(extract_text(resp).expect("text"), "你好");
    }

    #[test]
    fn missing_content_is_empty_response() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("json");
        assert!(matches!(extract_text(resp), Err(CompletionError::EmptyResponse)));
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            CompletionError::Authentication { status: 401, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
            CompletionError::RateLimited(m) if m == "slow down"
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            CompletionError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn missing_key_fails_at_first_call_not_construction() {
        let cfg = OpenAiConfig {
            api_key_env: "VOCAB_TRANSLATOR_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            ..OpenAiConfig::default()
        };
        let mut client = OpenAiClient::new(cfg).expect("client");
        assert_eq!(client.name(), super::DEFAULT_MODEL);
        match client.complete("hello") {
            Err(CompletionError::MissingCredential(var)) => {
                assert_eq!(var, "VOCAB_TRANSLATOR_TEST_KEY_THAT_IS_NEVER_SET")
            }
            other => panic!("expected missing credential, got {other:?}"),
        }
    }

    #[test]
    fn construction_keeps_the_configured_timeout() {
        let cfg = OpenAiConfig {
            timeout_secs: 7,
            ..OpenAiConfig::default()
        };
        let client = OpenAiClient::new(cfg).expect("client builds with a timeout");
        assert_eq!(client.config().timeout_secs, 7);
    }
}
