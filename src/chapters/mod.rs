/// Chapter synthesis from transcripts
///
/// This module turns a marked-up transcript into `mm:ss Title` chapter lines
/// through a draft model call followed by a best-effort spelling pass.

pub mod prompts;
pub mod correction;
pub mod pipeline;

// Re-export main types
pub use correction::SpellingCorrector;
pub use pipeline::{ChapterPipeline, ChapterResult, PipelineConfig};

use crate::transcript::{parse_timestamp, timestamp_markers};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Represents a single chapter line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterEntry {
    /// Timestamp as written, e.g. `0:19`
    pub timestamp: String,
    /// Timestamp in seconds from start of video
    pub seconds: u32,
    pub title: String,
}

fn chapter_line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*]\s*)?\[?(\d{1,2}(?::\d{2}){1,2})\]?\s*(?:[-–:]\s*)?(.+?)\s*$")
            .expect("chapter line pattern is valid")
    })
}

/// Parse the chapter lines out of model output, ignoring anything else
pub fn parse_chapters(text: &str) -> Vec<ChapterEntry> {
    text.lines()
        .filter_map(|line| {
            let captures = chapter_line_regex().captures(line)?;
            let timestamp = captures.get(1)?.as_str().to_string();
            let seconds = parse_timestamp(&timestamp)?;
            let title = captures.get(2)?.as_str().to_string();
            Some(ChapterEntry {
                timestamp,
                seconds,
                title,
            })
        })
        .collect()
}

/// Render chapters as `mm:ss Title` lines
pub fn format_chapters(chapters: &[ChapterEntry]) -> String {
    chapters
        .iter()
        .map(|c| format!("{} {}", c.timestamp, c.title))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Chapters whose timestamp is not one of the transcript's segment markers.
///
/// Chapter boundaries come from a model following a natural-language rule, so
/// this is only reported, never enforced.
pub fn unverified_chapters<'a>(chapters: &'a [ChapterEntry], transcript: &str) -> Vec<&'a ChapterEntry> {
    let known: HashSet<u32> = timestamp_markers(transcript)
        .into_iter()
        .filter_map(parse_timestamp)
        .collect();

    chapters
        .iter()
        .filter(|chapter| !known.contains(&chapter.seconds))
        .collect()
}
