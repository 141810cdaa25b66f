use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use landlord_core::config::{LlmConfig, LlmProvider};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/// Text-in, text-out access to a language model.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Calls a hosted or local model over HTTP.
///
/// OpenAI and Ollama share the chat-completions wire format; Anthropic uses the
/// messages API. Timeouts come from configuration and there are no retries.
pub struct HttpCompletionService {
    client: reqwest::Client,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f64,
}

impl HttpCompletionService {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build completion http client")?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(config.provider).to_string());
        let endpoint = endpoint_for(config.provider, &base_url);

        Ok(Self {
            client,
            provider: config.provider,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let Some(key) = &self.api_key else {
            return Ok(headers);
        };
        match self.provider {
            LlmProvider::Anthropic => {
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(key.expose_secret())
                        .context("api key is not a valid header value")?,
                );
                headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
            }
            LlmProvider::OpenAi | LlmProvider::Ollama => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                        .context("api key is not a valid header value")?,
                );
            }
        }
        Ok(headers)
    }

    fn body(&self, prompt: &str) -> serde_json::Value {
        let messages = vec![ChatMessage { role: "user", content: prompt }];
        match self.provider {
            LlmProvider::Anthropic => serde_json::json!({
                "model": self.model,
                "max_tokens": ANTHROPIC_MAX_TOKENS,
                "temperature": self.temperature,
                "messages": messages,
            }),
            LlmProvider::OpenAi | LlmProvider::Ollama => serde_json::json!({
                "model": self.model,
                "temperature": self.temperature,
                "messages": messages,
            }),
        }
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&self.body(prompt))
            .send()
            .await
            .with_context(|| format!("completion request to {} failed", self.endpoint))?;

        let status = response.status();
        let text = response.text().await.context("failed to read completion response")?;
        if !status.is_success() {
            return Err(anyhow!("completion service returned HTTP {status}: {text}"));
        }

        parse_completion(self.provider, &text)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

fn default_base_url(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "https://api.openai.com",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434",
    }
}

fn endpoint_for(provider: LlmProvider, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match provider {
        LlmProvider::Anthropic => format!("{base}/v1/messages"),
        LlmProvider::OpenAi | LlmProvider::Ollama => format!("{base}/v1/chat/completions"),
    }
}

fn parse_completion(provider: LlmProvider, body: &str) -> Result<String> {
    match provider {
        LlmProvider::Anthropic => {
            let parsed: MessagesResponse =
                serde_json::from_str(body).context("malformed messages response")?;
            let text = parsed
                .content
                .into_iter()
                .filter_map(|block| block.text)
                .collect::<Vec<_>>()
                .join("");
            if text.is_empty() {
                return Err(anyhow!("messages response had no text content"));
            }
            Ok(text)
        }
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            let parsed: ChatResponse =
                serde_json::from_str(body).context("malformed chat completion response")?;
            parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| anyhow!("chat completion response had no choices"))
        }
    }
}

#[cfg(test)]
mod tests {
    use landlord_core::config::{AppConfig, LlmProvider};

    use super::{endpoint_for, parse_completion, HttpCompletionService};

    #[test]
    fn endpoints_follow_provider_wire_format() {
        assert_eq!(
            endpoint_for(LlmProvider::Ollama, "http://localhost:11434/"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            endpoint_for(LlmProvider::Anthropic, "https://api.anthropic.com"),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn service_is_built_from_default_config() {
        let config = AppConfig::default();
        let service = HttpCompletionService::from_config(&config.llm).expect("client builds");
        assert_eq!(service.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn chat_completion_body_is_parsed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello there"}}]}"#;
        assert_eq!(parse_completion(LlmProvider::OpenAi, body).expect("parse"), "Hello there");
        assert!(parse_completion(LlmProvider::OpenAi, r#"{"choices":[]}"#).is_err());
    }

    #[test]
    fn messages_body_is_parsed() {
        let body = r#"{"content":[{"type":"text","text":"{\"intents\":[]}"}]}"#;
        assert_eq!(
            parse_completion(LlmProvider::Anthropic, body).expect("parse"),
            r#"{"intents":[]}"#
        );
    }
}
