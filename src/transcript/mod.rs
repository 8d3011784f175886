/// Transcript acquisition from a rendered watch page
///
/// The extractor opens the platform's transcript panel through a list of
/// locator strategies, waits for caption segments to render and flattens them
/// into a single string with `[mm:ss]` markers.

pub mod page;
pub mod locator;
pub mod extractor;

pub use extractor::{ExtractorConfig, TranscriptExtractor, VideoInfo};
pub use locator::PanelLocator;
pub use page::{ClickTarget, Page, ScriptedPage, SnapshotPage};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Placeholder used when a transcript carries no timestamp markers
pub const UNKNOWN_DURATION: &str = "unknown";

/// One caption line as rendered by the transcript panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    /// Display timestamp, `m:ss` or `h:mm:ss`
    pub timestamp: String,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(timestamp: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }
}

/// Flatten segments into marked-up transcript text.
///
/// A `[timestamp]` marker is written only when the timestamp changes from the
/// previous kept segment. Segments with blank text are dropped.
pub fn build_transcript(segments: &[TranscriptSegment]) -> String {
    let mut transcript = String::new();
    let mut last_timestamp: Option<&str> = None;

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }

        let timestamp = segment.timestamp.trim();
        if last_timestamp != Some(timestamp) {
            transcript.push('[');
            transcript.push_str(timestamp);
            transcript.push_str("] ");
            last_timestamp = Some(timestamp);
        }

        transcript.push_str(text);
        transcript.push(' ');
    }

    transcript.trim().to_string()
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\[(\d{1,2}(?::\d{2}){1,2})\]").expect("marker pattern is valid"))
}

/// All `[timestamp]` markers in order of appearance
pub fn timestamp_markers(transcript: &str) -> Vec<&str> {
    marker_regex()
        .captures_iter(transcript)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Video duration as the last marker in the transcript
pub fn video_duration(transcript: &str) -> String {
    timestamp_markers(transcript)
        .last()
        .map(|ts| ts.to_string())
        .unwrap_or_else(|| UNKNOWN_DURATION.to_string())
}

/// Convert `m:ss` or `h:mm:ss` to seconds
pub fn parse_timestamp(timestamp: &str) -> Option<u32> {
    let parts: Vec<&str> = timestamp.trim().split(':').collect();
    let numbers: Option<Vec<u32>> = parts.iter().map(|p| p.parse::<u32>().ok()).collect();
    let numbers = numbers?;

    match numbers.as_slice() {
        [minutes, seconds] if *seconds < 60 => Some(minutes * 60 + seconds),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => {
            Some(hours * 3600 + minutes * 60 + seconds)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_timestamps_share_marker() {
        let segments = vec![
            TranscriptSegment::new("0:00", "Welcome back."),
            TranscriptSegment::new("0:00", "Great to see you."),
            TranscriptSegment::new("0:02", "Here's the play."),
        ];

        assert_eq!(
            build_transcript(&segments),
            "[0:00] Welcome back. Great to see you. [0:02] Here's the play."
        );
    }

    #[test]
    fn test_repeated_timestamp_after_gap_gets_new_marker() {
        let segments = vec![
            TranscriptSegment::new("0:05", "one"),
            TranscriptSegment::new("0:06", "two"),
            TranscriptSegment::new("0:05", "three"),
        ];

        assert_eq!(build_transcript(&segments), "[0:05] one [0:06] two [0:05] three");
    }

    #[test]
    fn test_blank_segments_are_skipped() {
        let segments = vec![
            TranscriptSegment::new("0:00", "Hello"),
            TranscriptSegment::new("0:03", "   "),
            TranscriptSegment::new("0:04", "world"),
        ];

        assert_eq!(build_transcript(&segments), "[0:00] Hello [0:04] world");
        assert_eq!(build_transcript(&[]), "");
    }

    #[test]
    fn test_video_duration_is_last_marker() {
        let transcript = "[0:00] Welcome back. [0:02] Here's the play. [0:19] What a goal by Caufield!";
        assert_eq!(video_duration(transcript), "0:19");
        assert_eq!(timestamp_markers(transcript), vec!["0:00", "0:02", "0:19"]);
    }

    #[test]
    fn test_video_duration_placeholder() {
        assert_eq!(video_duration("no markers here"), UNKNOWN_DURATION);
        assert_eq!(video_duration("[1:02:03] long video"), "1:02:03");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("0:19"), Some(19));
        assert_eq!(parse_timestamp("12:05"), Some(725));
        assert_eq!(parse_timestamp("1:02:03"), Some(3723));
        assert_eq!(parse_timestamp("1:75"), None);
        assert_eq!(parse_timestamp("abc"), None);
    }
}
