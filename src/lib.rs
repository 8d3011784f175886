/// Chapter Forge - YouTube chapter generation
///
/// Pulls the transcript out of a YouTube watch page and turns it into a
/// chapter list with two model calls: a timing-aware draft followed by a
/// best-effort spelling pass.

pub mod error;
pub mod config;
pub mod llm;
pub mod transcript;
pub mod chapters;
pub mod state;
pub mod session;
pub mod messages;
pub mod clipboard;

// Re-export main types for easy access
pub use crate::error::{ChapterError, Result};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::llm::{create_llm, LLMConfig, LLMProvider, LLM};
pub use crate::transcript::{ExtractorConfig, Page, ScriptedPage, SnapshotPage, TranscriptExtractor, VideoInfo};
pub use crate::chapters::{ChapterPipeline, ChapterResult, PipelineConfig, SpellingCorrector};
pub use crate::state::{GenerationRun, PipelineStage};
pub use crate::session::{ChapterSession, GenerationOutcome};
pub use crate::messages::{ExtensionRequest, ExtensionResponse};
pub use crate::clipboard::{ClipboardSink, MemoryClipboard};

#[cfg(feature = "clipboard")]
pub use crate::clipboard::SystemClipboard;
