pub mod providers;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    LMStudio,
}

impl LLMProvider {
    /// Parse a provider name as written in config files or environment variables
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(LLMProvider::OpenAI),
            "anthropic" | "claude" => Some(LLMProvider::Anthropic),
            "lmstudio" | "lm-studio" | "local" => Some(LLMProvider::LMStudio),
            _ => None,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI => "https://api.openai.com/v1/chat/completions",
            LLMProvider::Anthropic => "https://api.anthropic.com/v1/messages",
            LLMProvider::LMStudio => "http://localhost:1234/v1/chat/completions",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI => "gpt-4o-mini",
            LLMProvider::Anthropic => "claude-3-5-haiku-latest",
            LLMProvider::LMStudio => "local-model",
        }
    }

    /// Whether requests must carry an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LLMProvider::LMStudio)
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LLMProvider::OpenAI => Some("OPENAI_API_KEY"),
            LLMProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            LLMProvider::LMStudio => None,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    /// Overrides the provider's default endpoint
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// No client-side timeout unless set
    pub timeout_seconds: Option<u64>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            endpoint: None,
            api_key: None,
            model: LLMProvider::OpenAI.default_model().to_string(),
            max_tokens: 1000,
            temperature: 0.3,
            timeout_seconds: None,
        }
    }
}

impl LLMConfig {
    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse>;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    match config.provider {
        LLMProvider::OpenAI | LLMProvider::LMStudio => {
            Ok(Box::new(providers::OpenAIProvider::new(config.clone())?))
        }
        LLMProvider::Anthropic => Ok(Box::new(providers::AnthropicProvider::new(config.clone())?)),
    }
}
