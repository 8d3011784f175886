use crate::error::{ChapterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Stages of a single chapter generation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,

    /// Opening the transcript panel and reading segments
    ExtractingTranscript,

    /// Checking the transcript is long enough to send
    ValidatingLength,

    /// Stage 1 model call
    DraftGenerating,

    /// Stage 2 model call
    SpellingCorrecting,

    Done,

    Failed(String),
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed(_))
    }

    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: &PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Idle, ExtractingTranscript)
                | (Idle, ValidatingLength)
                | (ExtractingTranscript, ValidatingLength)
                | (ExtractingTranscript, Failed(_))
                | (ValidatingLength, DraftGenerating)
                | (ValidatingLength, Failed(_))
                | (DraftGenerating, SpellingCorrecting)
                | (DraftGenerating, Done)
                | (DraftGenerating, Failed(_))
                | (SpellingCorrecting, Done)
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Failed(reason) => write!(f, "Failed({})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Stage tracking for one generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRun {
    current: PipelineStage,
    history: Vec<(PipelineStage, DateTime<Utc>)>,
}

impl GenerationRun {
    pub fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
            history: vec![(PipelineStage::Idle, Utc::now())],
        }
    }

    pub fn stage(&self) -> &PipelineStage {
        &self.current
    }

    /// Stages visited so far with the time each was entered
    pub fn history(&self) -> &[(PipelineStage, DateTime<Utc>)] {
        &self.history
    }

    /// Stages visited so far, without timestamps
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.history.iter().map(|(stage, _)| stage.clone()).collect()
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn advance(&mut self, next: PipelineStage) -> Result<()> {
        if !self.current.can_transition_to(&next) {
            return Err(ChapterError::InvalidTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }

        debug!("Pipeline stage: {} -> {}", self.current, next);
        self.current = next.clone();
        self.history.push((next, Utc::now()));
        Ok(())
    }

    /// Record a failure for the current stage
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.advance(PipelineStage::Failed(reason.into()))
    }

    /// Time from the first to the latest stage, in milliseconds
    pub fn elapsed_ms(&self) -> i64 {
        match (self.history.first(), self.history.last()) {
            (Some((_, start)), Some((_, end))) => (*end - *start).num_milliseconds(),
            _ => 0,
        }
    }
}

impl Default for GenerationRun {
    fn default() -> Self {
        Self::new()
    }
}
