/// Two-stage chapter generation: draft, then name-spelling correction
use super::correction::SpellingCorrector;
use super::prompts::{self, draft_user_prompt, DRAFT_SYSTEM_PROMPT, SPELLING_SYSTEM_PROMPT};
use super::{parse_chapters, unverified_chapters};
use crate::error::{ChapterError, Result};
use crate::llm::{create_llm, ChatMessage, LLMConfig, LLM};
use crate::transcript::video_duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for chapter generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transcripts shorter than this are rejected before any model call
    pub min_transcript_chars: usize,
    /// Run the name-spelling pass after drafting
    pub enable_spelling_correction: bool,
    /// Optional override for the draft system prompt
    pub draft_prompt_file: Option<PathBuf>,
    /// Optional override for the spelling system prompt
    pub spelling_prompt_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_transcript_chars: 100,
            enable_spelling_correction: true,
            draft_prompt_file: None,
            spelling_prompt_file: None,
        }
    }
}

/// Output of a full generation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterResult {
    /// Stage 1 output
    pub draft: String,
    /// Final chapter text
    pub chapters: String,
    /// Duration hint sent with the draft request
    pub video_duration: String,
    /// Whether the spelling pass succeeded
    pub corrected: bool,
}

/// Chapter generation pipeline
pub struct ChapterPipeline {
    llm: Arc<dyn LLM>,
    corrector: SpellingCorrector,
    draft_prompt: String,
    config: PipelineConfig,
}

impl ChapterPipeline {
    /// Create a pipeline around an existing model with the built-in prompts
    pub fn new(llm: Arc<dyn LLM>, config: PipelineConfig) -> Self {
        Self {
            corrector: SpellingCorrector::new(llm.clone()),
            llm,
            draft_prompt: DRAFT_SYSTEM_PROMPT.to_string(),
            config,
        }
    }

    /// Create the model from configuration and load any prompt overrides
    pub async fn from_config(llm_config: &LLMConfig, config: PipelineConfig) -> Result<Self> {
        let llm: Arc<dyn LLM> = Arc::from(create_llm(llm_config)?);

        let draft_prompt = prompts::load_prompt(config.draft_prompt_file.as_deref(), DRAFT_SYSTEM_PROMPT).await;
        let spelling_prompt =
            prompts::load_prompt(config.spelling_prompt_file.as_deref(), SPELLING_SYSTEM_PROMPT).await;

        info!(
            "✅ Chapter pipeline initialized with {:?} provider ({})",
            llm_config.provider, llm_config.model
        );

        Ok(Self {
            corrector: SpellingCorrector::with_prompt(llm.clone(), spelling_prompt),
            llm,
            draft_prompt,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reject transcripts too short to be a real extraction
    pub fn validate(&self, transcript: &str) -> Result<()> {
        let length = transcript.trim().chars().count();
        if length < self.config.min_transcript_chars {
            return Err(ChapterError::TranscriptTooShort {
                length,
                minimum: self.config.min_transcript_chars,
            });
        }
        Ok(())
    }

    /// Stage 1: draft chapters from the transcript
    pub async fn draft(&self, transcript: &str) -> Result<String> {
        self.validate(transcript)?;
        self.request_draft(transcript).await
    }

    /// Stage 1 model call for a transcript that already passed `validate`
    pub(crate) async fn request_draft(&self, transcript: &str) -> Result<String> {
        let duration = video_duration(transcript);
        debug!("Drafting chapters (duration hint: {})", duration);

        let messages = vec![
            ChatMessage::system(self.draft_prompt.clone()),
            ChatMessage::user(draft_user_prompt(transcript, &duration)),
        ];

        let response = self.llm.chat(messages).await?;
        debug!("Draft completed (tokens: {:?})", response.tokens_used);

        let draft = response.content.trim();
        if draft.is_empty() {
            return Err(ChapterError::EmptyModelResponse);
        }
        Ok(draft.to_string())
    }

    /// Stage 2: best-effort name correction; never fails
    pub async fn correct_spelling(&self, draft: &str) -> (String, bool) {
        if !self.config.enable_spelling_correction {
            debug!("Spelling correction disabled");
            return (draft.to_string(), false);
        }
        self.corrector.correct(draft).await
    }

    /// Run both stages
    pub async fn generate(&self, transcript: &str) -> Result<ChapterResult> {
        let draft = self.draft(transcript).await?;
        let (chapters, corrected) = self.correct_spelling(&draft).await;
        Ok(self.finish(transcript, draft, chapters, corrected))
    }

    /// Assemble the final result and report chapters that miss a transcript marker
    pub(crate) fn finish(&self, transcript: &str, draft: String, chapters: String, corrected: bool) -> ChapterResult {
        report_unverified(&chapters, transcript);

        ChapterResult {
            draft,
            chapters,
            video_duration: video_duration(transcript),
            corrected,
        }
    }
}

/// Log chapters that do not start on a transcript marker
fn report_unverified(chapters: &str, transcript: &str) {
    let parsed = parse_chapters(chapters);
    let unverified = unverified_chapters(&parsed, transcript);
    if !unverified.is_empty() {
        warn!(
            "⚠️ {} of {} chapters do not start on a transcript timestamp: {}",
            unverified.len(),
            parsed.len(),
            unverified
                .iter()
                .map(|c| c.timestamp.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
