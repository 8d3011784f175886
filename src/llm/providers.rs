use super::{ChatMessage, LLMConfig, LLMProvider, LLMResponse, LLM};
use crate::error::{ChapterError, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

fn build_client(config: &LLMConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(seconds) = config.timeout_seconds {
        builder = builder.timeout(Duration::from_secs(seconds));
    }
    builder
        .build()
        .map_err(|e| ChapterError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-2xx model response to an error kind
pub fn error_for_status(status: u16, retry_after: Option<u64>, body: &str) -> ChapterError {
    match status {
        401 => ChapterError::Auth,
        429 => ChapterError::RateLimited { retry_after },
        400 => ChapterError::BadRequest(api_error_message(body)),
        500..=599 => ChapterError::UpstreamUnavailable { status },
        _ => ChapterError::ApiError {
            status,
            message: api_error_message(body),
        },
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Send a prepared request and turn non-2xx statuses into typed errors
async fn send_checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.unwrap_or_default();
        return Err(error_for_status(status, retry_after, &text));
    }

    Ok(response)
}

/// Chat-completions provider, used for OpenAI and local OpenAI-compatible servers
pub struct OpenAIProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u32,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.provider.requires_api_key() && config.api_key.is_none() {
            return Err(ChapterError::Config(format!(
                "{:?} API key required",
                config.provider
            )));
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for OpenAIProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let endpoint = self.config.endpoint();
        let request = OpenAIRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending chat request to {} ({})", endpoint, self.config.model);

        let mut builder = self.client.post(endpoint).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = send_checked(builder).await?;
        let body: OpenAIResponse = response.json().await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ChapterError::EmptyModelResponse)?;

        Ok(LLMResponse {
            content,
            tokens_used: body.usage.map(|u| u.total_tokens),
        })
    }

    fn provider_type(&self) -> LLMProvider {
        self.config.provider
    }
}

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(ChapterError::Config("Anthropic API key required".to_string()));
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    /// Anthropic takes the system prompt as a top-level field
    fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ChatMessage>) {
        let mut system: Vec<String> = Vec::new();
        let mut rest = Vec::new();
        for message in messages {
            if message.role == "system" {
                system.push(message.content);
            } else {
                rest.push(message);
            }
        }
        let system = if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        };
        (system, rest)
    }
}

#[async_trait]
impl LLM for AnthropicProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ChapterError::Config("Anthropic API key not configured".to_string()))?;

        let (system, messages) = Self::split_system(messages);
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages,
        };

        debug!("Sending request to Anthropic API ({})", self.config.model);

        let builder = self
            .client
            .post(self.config.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);

        let response = send_checked(builder).await?;
        let body: AnthropicResponse = response.json().await?;

        let content = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(ChapterError::EmptyModelResponse);
        }

        Ok(LLMResponse {
            content,
            tokens_used: body.usage.map(|u| u.input_tokens + u.output_tokens),
        })
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Anthropic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status_mapping() {
        assert!(matches!(error_for_status(401, None, ""), ChapterError::Auth));
        assert!(matches!(
            error_for_status(429, Some(12), ""),
            ChapterError::RateLimited { retry_after: Some(12) }
        ));
        assert!(matches!(
            error_for_status(503, None, "down"),
            ChapterError::UpstreamUnavailable { status: 503 }
        ));
        assert!(matches!(error_for_status(404, None, "nope"), ChapterError::ApiError { status: 404, .. }));
    }

    #[test]
    fn test_bad_request_uses_api_message() {
        let body = r#"{"error": {"message": "max_tokens is too large", "type": "invalid_request_error"}}"#;
        match error_for_status(400, None, body) {
            ChapterError::BadRequest(message) => assert_eq!(message, "max_tokens is too large"),
            other => panic!("Expected BadRequest, got {:?}", other),
        }

        match error_for_status(400, None, "  plain text  ") {
            ChapterError::BadRequest(message) => assert_eq!(message, "plain text"),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_split_system_messages() {
        let (system, rest) = AnthropicProvider::split_system(vec![
            ChatMessage::system("rules"),
            ChatMessage::user("hello"),
        ]);
        assert_eq!(system.as_deref(), Some("rules"));
        assert_eq!(rest, vec![ChatMessage::user("hello")]);
    }

    mod http_tests {
        use super::*;
        use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

        fn openai_config(uri: String) -> LLMConfig {
            LLMConfig {
                endpoint: Some(uri),
                api_key: Some("test-key".to_string()),
                ..LLMConfig::default()
            }
        }

        #[tokio::test]
        async fn test_openai_chat_success() {
            let mock_server = MockServer::start().await;

            let body = serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "0:00 Intro"}}],
                "usage": {"total_tokens": 42}
            });

            Mock::given(matchers::method("POST"))
                .and(matchers::header("authorization", "Bearer test-key"))
                .and(matchers::body_partial_json(serde_json::json!({
                    "model": "gpt-4o-mini",
                    "max_tokens": 1000
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = OpenAIProvider::new(openai_config(mock_server.uri())).unwrap();
            let response = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap();
            assert_eq!(response.content, "0:00 Intro");
            assert_eq!(response.tokens_used, Some(42));
        }

        #[tokio::test]
        async fn test_openai_unauthorized() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(401).set_body_string(
                    r#"{"error": {"message": "Incorrect API key provided"}}"#,
                ))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = OpenAIProvider::new(openai_config(mock_server.uri())).unwrap();
            let err = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();
            assert!(matches!(err, ChapterError::Auth));
            assert!(err.to_string().contains("Invalid API key"));
        }

        #[tokio::test]
        async fn test_openai_rate_limited_with_retry_after() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(
                    ResponseTemplate::new(429)
                        .insert_header("retry-after", "20")
                        .set_body_string(r#"{"error": {"message": "Rate limit reached"}}"#),
                )
                .mount(&mock_server)
                .await;

            let provider = OpenAIProvider::new(openai_config(mock_server.uri())).unwrap();
            let err = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();
            assert!(matches!(err, ChapterError::RateLimited { retry_after: Some(20) }));
            assert!(err.to_string().contains("20 seconds"));
        }

        #[tokio::test]
        async fn test_openai_empty_choices() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
                .mount(&mock_server)
                .await;

            let provider = OpenAIProvider::new(openai_config(mock_server.uri())).unwrap();
            let err = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();
            assert!(matches!(err, ChapterError::EmptyModelResponse));
        }

        #[tokio::test]
        async fn test_openai_invalid_json_is_parse_error() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
                .mount(&mock_server)
                .await;

            let provider = OpenAIProvider::new(openai_config(mock_server.uri())).unwrap();
            let err = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();
            assert!(matches!(err, ChapterError::Parse(_)));
        }

        #[tokio::test]
        async fn test_lmstudio_sends_no_auth_header() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::header_exists("authorization"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&mock_server)
                .await;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "ok"}}]
                })))
                .mount(&mock_server)
                .await;

            let config = LLMConfig {
                provider: LLMProvider::LMStudio,
                endpoint: Some(mock_server.uri()),
                ..LLMConfig::default()
            };
            let provider = OpenAIProvider::new(config).unwrap();
            let response = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap();
            assert_eq!(response.content, "ok");
            assert_eq!(provider.provider_type(), LLMProvider::LMStudio);
        }

        #[tokio::test]
        async fn test_anthropic_chat_success() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::header("x-api-key", "test-key"))
                .and(matchers::header("anthropic-version", ANTHROPIC_VERSION))
                .and(matchers::body_partial_json(serde_json::json!({"system": "rules"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "content": [{"type": "text", "text": "0:00 Welcome"}],
                    "usage": {"input_tokens": 10, "output_tokens": 5}
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let config = LLMConfig {
                provider: LLMProvider::Anthropic,
                endpoint: Some(mock_server.uri()),
                api_key: Some("test-key".to_string()),
                model: LLMProvider::Anthropic.default_model().to_string(),
                ..LLMConfig::default()
            };
            let provider = AnthropicProvider::new(config).unwrap();
            let response = provider
                .chat(vec![ChatMessage::system("rules"), ChatMessage::user("hi")])
                .await
                .unwrap();
            assert_eq!(response.content, "0:00 Welcome");
            assert_eq!(response.tokens_used, Some(15));
        }

        #[tokio::test]
        async fn test_anthropic_server_error() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
                .mount(&mock_server)
                .await;

            let config = LLMConfig {
                provider: LLMProvider::Anthropic,
                endpoint: Some(mock_server.uri()),
                api_key: Some("test-key".to_string()),
                ..LLMConfig::default()
            };
            let provider = AnthropicProvider::new(config).unwrap();
            let err = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();
            assert!(matches!(err, ChapterError::UpstreamUnavailable { status: 529 }));
        }

        #[tokio::test]
        async fn test_connection_refused_is_network_error() {
            let config = LLMConfig {
                provider: LLMProvider::LMStudio,
                endpoint: Some("http://127.0.0.1:1".to_string()),
                ..LLMConfig::default()
            };
            let provider = OpenAIProvider::new(config).unwrap();
            let err = provider.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();
            assert!(matches!(err, ChapterError::Network(_)));
            assert!(err.is_model_error());
        }
    }
}
