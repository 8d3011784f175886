/// End-to-end chapter generation for one page at a time
use crate::chapters::{ChapterPipeline, ChapterResult};
use crate::clipboard::ClipboardSink;
use crate::error::{ChapterError, Result};
use crate::state::{GenerationRun, PipelineStage};
use crate::transcript::{Page, TranscriptExtractor};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Result of a successful generation along with its stage history
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub result: ChapterResult,
    pub run: GenerationRun,
}

/// Owns the extractor and pipeline, and keeps the last generated chapters
/// around for copying.
pub struct ChapterSession {
    extractor: TranscriptExtractor,
    pipeline: ChapterPipeline,
    clipboard: Option<Box<dyn ClipboardSink>>,
    last_result: Arc<RwLock<Option<String>>>,
}

impl ChapterSession {
    pub fn new(extractor: TranscriptExtractor, pipeline: ChapterPipeline) -> Self {
        Self {
            extractor,
            pipeline,
            clipboard: None,
            last_result: Arc::new(RwLock::new(None)),
        }
    }

    /// Copy each successful result to `clipboard`
    pub fn with_clipboard(mut self, clipboard: Box<dyn ClipboardSink>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn extractor(&self) -> &TranscriptExtractor {
        &self.extractor
    }

    pub fn pipeline(&self) -> &ChapterPipeline {
        &self.pipeline
    }

    /// Chapters from the most recent successful generation
    pub async fn last_result(&self) -> Option<String> {
        self.last_result.read().await.clone()
    }

    /// Extract the page's transcript and generate chapters for it
    pub async fn generate_for_page(&self, page: &dyn Page) -> Result<GenerationOutcome> {
        let mut run = GenerationRun::new();

        run.advance(PipelineStage::ExtractingTranscript)?;
        let transcript = match self.extractor.fetch_transcript(page).await {
            Ok(transcript) => transcript,
            Err(e) => {
                run.fail(e.to_string())?;
                return Err(e);
            }
        };

        self.generate_from_transcript(&transcript, run).await
    }

    /// Generate chapters for an already extracted transcript
    pub async fn generate_for_transcript(&self, transcript: &str) -> Result<GenerationOutcome> {
        self.generate_from_transcript(transcript, GenerationRun::new()).await
    }

    async fn generate_from_transcript(&self, transcript: &str, mut run: GenerationRun) -> Result<GenerationOutcome> {
        run.advance(PipelineStage::ValidatingLength)?;
        if let Err(e) = self.pipeline.validate(transcript) {
            run.fail(e.to_string())?;
            return Err(e);
        }

        run.advance(PipelineStage::DraftGenerating)?;
        let draft = match self.pipeline.request_draft(transcript).await {
            Ok(draft) => draft,
            Err(e) => {
                run.fail(e.to_string())?;
                return Err(e);
            }
        };

        run.advance(PipelineStage::SpellingCorrecting)?;
        let (chapters, corrected) = self.pipeline.correct_spelling(&draft).await;
        run.advance(PipelineStage::Done)?;

        let result = self.pipeline.finish(transcript, draft, chapters, corrected);

        *self.last_result.write().await = Some(result.chapters.clone());
        if let Some(clipboard) = &self.clipboard {
            match clipboard.set_text(&result.chapters) {
                Ok(()) => info!("📋 Chapters copied to clipboard"),
                Err(e) => warn!("Failed to copy chapters to clipboard: {}", e),
            }
        }

        info!("🎉 Generated chapters in {}ms", run.elapsed_ms());

        Ok(GenerationOutcome { result, run })
    }

    /// Copy the last result again
    pub async fn copy_last_result(&self) -> Result<String> {
        let Some(chapters) = self.last_result().await else {
            return Err(ChapterError::Clipboard("No chapters generated yet".to_string()));
        };
        let clipboard = self
            .clipboard
            .as_ref()
            .ok_or_else(|| ChapterError::Clipboard("No clipboard configured".to_string()))?;
        clipboard.set_text(&chapters)?;
        Ok(chapters)
    }
}
