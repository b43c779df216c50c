//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::base::{DialogueLine, ReplyError, ReplyGenerator, Speaker};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a warm, concise voice companion. Answer in one to three short spoken sentences without lists or markup.";

/// Settings for the chat completions client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    pub request_timeout: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: Some(150),
            request_timeout: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Reply generator backed by `/chat/completions`.
pub struct OpenAIReplyGenerator {
    config: OpenAIConfig,
    client: reqwest::Client,
}

impl OpenAIReplyGenerator {
    pub fn new(config: OpenAIConfig) -> Result<Self, ReplyError> {
        if config.api_key.is_empty() {
            return Err(ReplyError::ConfigurationError(
                "OpenAI API key is required".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|e| {
                ReplyError::ConfigurationError(format!("Invalid authorization header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout.max(1)))
            .build()
            .map_err(|e| ReplyError::ConfigurationError(format!("HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_request<'a>(
        &'a self,
        transcript: &'a str,
        history: &'a [DialogueLine],
    ) -> ChatCompletionRequest<'a> {
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: system_prompt,
        });
        for line in history {
            let role = match line.speaker {
                Speaker::User => "user",
                Speaker::Assistant => "assistant",
            };
            messages.push(ChatMessage {
                role,
                content: &line.text,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: transcript,
        });

        ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl ReplyGenerator for OpenAIReplyGenerator {
    async fn generate(
        &self,
        transcript: &str,
        history: &[DialogueLine],
    ) -> Result<String, ReplyError> {
        let url = self.completions_url();
        debug!("Sending chat completion request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(transcript, history))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReplyError::Timeout
                } else {
                    ReplyError::NetworkError(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            error!("Chat completion failed ({}): {}", status, error_text);
            return Err(ReplyError::ProviderError(format!(
                "API error ({status}): {error_text}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ReplyError::ProviderError(format!("Failed to parse API response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ReplyError::EmptyReply)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> OpenAIReplyGenerator {
        OpenAIReplyGenerator::new(OpenAIConfig {
            api_key: "sk-test".to_string(),
            base_url: "https://example.test/v1/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            OpenAIReplyGenerator::new(OpenAIConfig::default()),
            Err(ReplyError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_completions_url_trims_slash() {
        assert_eq!(
            generator().completions_url(),
            "https://example.test/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_includes_history_in_order() {
        let generator = generator();
        let history = vec![DialogueLine::user("hi"), DialogueLine::assistant("hello")];
        let request = generator.build_request("how are you", &history);
        let value = serde_json::to_value(&request).unwrap();

        let roles: Vec<&str> = value["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(value["messages"][3]["content"], "how are you");
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["max_tokens"], 150);
    }

    #[test]
    fn test_custom_system_prompt() {
        let generator = OpenAIReplyGenerator::new(OpenAIConfig {
            api_key: "sk-test".to_string(),
            system_prompt: Some("Be brief.".to_string()),
            max_tokens: None,
            ..Default::default()
        })
        .unwrap();
        let value = serde_json::to_value(generator.build_request("x", &[])).unwrap();

        assert_eq!(value["messages"][0]["content"], "Be brief.");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Peace be with you. "}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(" Peace be with you. ")
        );
    }
}
