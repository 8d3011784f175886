use thiserror::Error;

/// Result type for extraction and chapter generation
pub type Result<T> = std::result::Result<T, ChapterError>;

/// Error types for transcript extraction and chapter generation.
///
/// The `Display` text of every variant is written to be shown to the user as a
/// single status line.
#[derive(Error, Debug)]
pub enum ChapterError {
    #[error("{0}")]
    ExtractionNotFound(String),

    #[error("Timed out after {waited_ms}ms waiting for transcript segments to load")]
    ExtractionTimeout { waited_ms: u64 },

    #[error("Transcript too short ({length} chars, need at least {minimum}). The transcript may not have loaded correctly.")]
    TranscriptTooShort { length: usize, minimum: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API key. Check the configured key for this provider.")]
    Auth,

    #[error("{}", rate_limit_message(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Model service unavailable (HTTP {status}). Please try again later.")]
    UpstreamUnavailable { status: u16 },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("The model returned an empty response")]
    EmptyModelResponse,

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

fn rate_limit_message(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(seconds) => format!("Rate limit exceeded. Retry after {} seconds.", seconds),
        None => "Rate limit exceeded. Please wait and try again.".to_string(),
    }
}

impl From<reqwest::Error> for ChapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChapterError::Parse(err.to_string())
        } else {
            ChapterError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChapterError {
    fn from(err: serde_json::Error) -> Self {
        ChapterError::Parse(err.to_string())
    }
}

impl ChapterError {
    /// Whether the error came from talking to the model service
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            ChapterError::Network(_)
                | ChapterError::Auth
                | ChapterError::RateLimited { .. }
                | ChapterError::BadRequest(_)
                | ChapterError::UpstreamUnavailable { .. }
                | ChapterError::ApiError { .. }
                | ChapterError::EmptyModelResponse
                | ChapterError::Parse(_)
        )
    }

    /// Whether the error came from reading the page
    pub fn is_extraction_error(&self) -> bool {
        matches!(
            self,
            ChapterError::ExtractionNotFound(_)
                | ChapterError::ExtractionTimeout { .. }
                | ChapterError::TranscriptTooShort { .. }
        )
    }
}
