use crate::chapters::PipelineConfig;
use crate::error::{ChapterError, Result};
use crate::llm::{LLMConfig, LLMProvider};
use crate::transcript::ExtractorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for transcript extraction and chapter generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Model provider settings
    pub llm: LLMConfig,

    /// Transcript panel and polling settings
    pub extractor: ExtractorConfig,

    /// Chapter generation settings
    pub pipeline: PipelineConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "chapter_forge=info,warn".to_string(),
        }
    }
}

impl Config {
    /// Locations searched by `load`, in order
    pub const SEARCH_PATHS: [&'static str; 2] = ["chapter-forge.toml", "config/chapter-forge.toml"];

    /// Load configuration from the first config file found, then apply
    /// environment overrides. Falls back to defaults plus environment when
    /// no file exists. A file that exists but cannot be parsed is an error.
    pub fn load() -> Result<Self> {
        Self::load_first(&Self::SEARCH_PATHS[..])
    }

    /// Load the first of `paths` that exists
    pub fn load_first<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        for path in paths {
            let path = path.as_ref();
            if path.exists() {
                return Self::load_from(path);
            }
        }

        tracing::debug!("No config file found, using defaults and environment");
        Ok(Self::from_env())
    }

    /// Load configuration from a specific file, then apply environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&config_str)
            .map_err(|e| ChapterError::Config(format!("{}: {}", path.display(), e)))?;
        config.apply_env();

        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override settings from environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = var("CHAPTER_FORGE_PROVIDER").as_deref().and_then(LLMProvider::from_name) {
            if provider != self.llm.provider {
                self.llm.provider = provider;
                self.llm.model = provider.default_model().to_string();
            }
        }

        if let Some(model) = var("CHAPTER_FORGE_MODEL") {
            self.llm.model = model;
        }

        if let Some(endpoint) = var("CHAPTER_FORGE_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }

        if self.llm.api_key.is_none() {
            self.llm.api_key = self.llm.provider.api_key_env().and_then(|k| var(k));
        }

        if let Some(level) = var("CHAPTER_FORGE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str =
            toml::to_string_pretty(self).map_err(|e| ChapterError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider.requires_api_key() && self.llm.api_key.is_none() {
            return Err(ChapterError::Config(format!(
                "API key required for {:?} provider",
                self.llm.provider
            )));
        }

        if self.llm.model.trim().is_empty() {
            return Err(ChapterError::Config("llm.model must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ChapterError::Config("llm.temperature must be between 0 and 2".to_string()));
        }

        if self.llm.max_tokens == 0 {
            return Err(ChapterError::Config("llm.max_tokens must be greater than 0".to_string()));
        }

        if self.extractor.poll_interval_ms == 0 {
            return Err(ChapterError::Config(
                "extractor.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.extractor.wait_timeout_ms < self.extractor.poll_interval_ms {
            return Err(ChapterError::Config(
                "extractor.wait_timeout_ms must be at least one poll interval".to_string(),
            ));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Chapter Forge Configuration:\n\
            - Provider: {:?}\n\
            - Model: {}\n\
            - Endpoint: {}\n\
            - Temperature: {}\n\
            - Max Tokens: {}\n\
            - Segment Wait: {}ms (poll {}ms)\n\
            - Min Transcript: {} chars\n\
            - Spelling Correction: {}",
            self.llm.provider,
            self.llm.model,
            self.llm.endpoint(),
            self.llm.temperature,
            self.llm.max_tokens,
            self.extractor.wait_timeout_ms,
            self.extractor.poll_interval_ms,
            self.pipeline.min_transcript_chars,
            self.pipeline.enable_spelling_correction
        )
    }
}

/// Configuration builder for easy setup
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_provider(mut self, provider: LLMProvider) -> Self {
        self.config.llm.provider = provider;
        self.config.llm.model = provider.default_model().to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.llm.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.llm.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_wait_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.extractor.wait_timeout_ms = timeout_ms;
        self
    }

    pub fn with_min_transcript_chars(mut self, chars: usize) -> Self {
        self.config.extractor.min_transcript_chars = chars;
        self.config.pipeline.min_transcript_chars = chars;
        self
    }

    pub fn enable_spelling_correction(mut self, enable: bool) -> Self {
        self.config.pipeline.enable_spelling_correction = enable;
        self
    }

    pub fn with_prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.config.pipeline.draft_prompt_file = Some(dir.join("draft_chapters.txt"));
        self.config.pipeline.spelling_prompt_file = Some(dir.join("spelling_correction.txt"));
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
