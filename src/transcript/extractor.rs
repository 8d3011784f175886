/// Transcript extraction coordinator
use super::locator::{self, is_hidden, PanelLocator};
use super::page::Page;
use super::{build_transcript, TranscriptSegment};
use crate::error::{ChapterError, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const SEGMENT_SELECTORS: &[&str] = &[
    "ytd-transcript-segment-renderer",
    "transcript-segment-view-model",
];
const SEGMENT_TIMESTAMP_SELECTORS: &[&str] = &[".segment-timestamp", ".ytwTranscriptSegmentViewModelTimestamp"];
const SEGMENT_TEXT_SELECTORS: &[&str] = &[".segment-text", "yt-formatted-string", ".ytAttributedStringHost"];

const TITLE_SELECTORS: &[&str] = &[
    "h1.ytd-watch-metadata yt-formatted-string",
    "ytd-watch-metadata h1",
    "h1.title",
];

/// Configuration for transcript extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Interval between DOM polls while waiting for segments
    pub poll_interval_ms: u64,
    /// How long to wait for segments after opening the panel
    pub wait_timeout_ms: u64,
    /// Pause after intermediate clicks such as expanding the description
    pub click_settle_ms: u64,
    /// Transcripts shorter than this are treated as failed extraction
    pub min_transcript_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            wait_timeout_ms: 10_000,
            click_settle_ms: 500,
            min_transcript_chars: 100,
        }
    }
}

/// Video identity read from the watch page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub video_id: String,
    pub title: String,
}

/// Reads a video's caption transcript out of a rendered watch page
#[derive(Debug, Clone)]
pub struct TranscriptExtractor {
    config: ExtractorConfig,
    locators: Vec<PanelLocator>,
}

impl TranscriptExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            locators: PanelLocator::ORDER.to_vec(),
        }
    }

    /// Replace the ordered list of panel locators
    pub fn with_locators(mut self, locators: Vec<PanelLocator>) -> Self {
        self.locators = locators;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Open the transcript panel using the first locator that works
    pub async fn open_transcript_panel(&self, page: &dyn Page) -> Result<PanelLocator> {
        let settle = Duration::from_millis(self.config.click_settle_ms);
        match locator::open_with(&self.locators, page, settle).await? {
            Some(used) => Ok(used),
            None => {
                warn!("❌ All {} transcript locators failed", self.locators.len());
                Err(ChapterError::ExtractionNotFound(
                    "Could not find transcript button. This video may not have a transcript available."
                        .to_string(),
                ))
            }
        }
    }

    /// Poll until segment nodes render, returning how many were found
    pub async fn wait_for_segments(&self, page: &dyn Page, timeout_ms: u64) -> Result<usize> {
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        // An unrepresentable deadline means wait indefinitely
        let deadline = Instant::now().checked_add(Duration::from_millis(timeout_ms));

        loop {
            let html = page.html().await?;
            let count = count_segments(&html);
            if count > 0 {
                debug!("Found {} transcript segments", count);
                return Ok(count);
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(ChapterError::ExtractionTimeout { waited_ms: timeout_ms });
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Read the rendered segments and flatten them into transcript text
    pub async fn extract(&self, page: &dyn Page) -> Result<String> {
        let html = page.html().await?;
        let segments = parse_segments(&html);
        debug!("Read {} visible segments", segments.len());
        Ok(build_transcript(&segments))
    }

    /// Open the panel, wait for it to render and extract the transcript
    pub async fn fetch_transcript(&self, page: &dyn Page) -> Result<String> {
        info!("🔍 Fetching transcript from {}", page.url());

        self.open_transcript_panel(page).await?;
        self.wait_for_segments(page, self.config.wait_timeout_ms).await?;
        let transcript = self.extract(page).await?;

        let length = transcript.chars().count();
        if length < self.config.min_transcript_chars {
            warn!("⚠️ Transcript only {} chars, treating extraction as failed", length);
            return Err(ChapterError::TranscriptTooShort {
                length,
                minimum: self.config.min_transcript_chars,
            });
        }

        info!("✅ Extracted transcript ({} chars)", length);
        Ok(transcript)
    }

    /// Video id from the URL and title from the DOM
    pub async fn video_info(&self, page: &dyn Page) -> Result<VideoInfo> {
        let video_id = video_id_from_url(page.url()).ok_or_else(|| {
            ChapterError::ExtractionNotFound("Could not find video ID in URL".to_string())
        })?;
        let html = page.html().await?;
        let title = page_title(&html).unwrap_or_default();

        Ok(VideoInfo { video_id, title })
    }
}

impl Default for TranscriptExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

/// Video id from `watch?v=`, `youtu.be/<id>` or `/shorts/<id>` URLs
pub fn video_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str().unwrap_or("");

    let id = if host.ends_with("youtu.be") {
        url.path_segments()?.next().map(str::to_string)
    } else if let Some((_, v)) = url.query_pairs().find(|(key, _)| key == "v") {
        Some(v.into_owned())
    } else {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("shorts") | Some("embed") | Some("live") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    id.filter(|id| !id.is_empty())
}

fn first_text(element: &ElementRef, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(found) = element.select(&selector).next() {
            let text = found.text().collect::<Vec<_>>().join(" ");
            return Some(normalize_whitespace(&text));
        }
    }
    None
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn count_segments(html: &str) -> usize {
    let document = Html::parse_document(html);
    SEGMENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .map(|selector| document.select(&selector).filter(|e| !is_hidden(e)).count())
        .find(|count| *count > 0)
        .unwrap_or(0)
}

/// Visible segments in document order
pub fn parse_segments(html: &str) -> Vec<TranscriptSegment> {
    let document = Html::parse_document(html);

    for selector_str in SEGMENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };

        let segments: Vec<TranscriptSegment> = document
            .select(&selector)
            .filter(|element| !is_hidden(element))
            .filter_map(|element| {
                let timestamp = first_text(&element, SEGMENT_TIMESTAMP_SELECTORS)?;
                let text = first_text(&element, SEGMENT_TEXT_SELECTORS).unwrap_or_default();
                Some(TranscriptSegment { timestamp, text })
            })
            .collect();

        if !segments.is_empty() {
            return segments;
        }
    }

    Vec::new()
}

fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for selector_str in TITLE_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let title = normalize_whitespace(&element.text().collect::<String>());
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse(r#"meta[property="og:title"]"#) {
        if let Some(content) = document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("content"))
        {
            return Some(content.trim().to_string());
        }
    }

    let selector = Selector::parse("title").ok()?;
    let title = document.select(&selector).next()?.text().collect::<String>();
    let title = title.trim().trim_end_matches("- YouTube").trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::page::{ScriptedPage, SnapshotPage};

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s";

    fn segment(ts: &str, text: &str) -> String {
        format!(
            r#"<ytd-transcript-segment-renderer><div class="segment-timestamp"> {} </div><yt-formatted-string class="segment-text">{}</yt-formatted-string></ytd-transcript-segment-renderer>"#,
            ts, text
        )
    }

    fn fast_config() -> ExtractorConfig {
        ExtractorConfig {
            poll_interval_ms: 5,
            wait_timeout_ms: 200,
            click_settle_ms: 0,
            min_transcript_chars: 20,
        }
    }

    #[test]
    fn test_video_id_from_url() {
        assert_eq!(video_id_from_url(URL).as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id_from_url("https://youtu.be/abc123?t=5").as_deref(), Some("abc123"));
        assert_eq!(
            video_id_from_url("https://www.youtube.com/shorts/xyz789").as_deref(),
            Some("xyz789")
        );
        assert_eq!(video_id_from_url("https://www.youtube.com/feed/trending"), None);
        assert_eq!(video_id_from_url("not a url"), None);
    }

    #[test]
    fn test_parse_segments_skips_hidden() {
        let html = format!(
            "{}{}<ytd-transcript-segment-renderer hidden><div class=\"segment-timestamp\">0:09</div><yt-formatted-string class=\"segment-text\">ghost</yt-formatted-string></ytd-transcript-segment-renderer>",
            segment("0:00", "Welcome back."),
            segment("0:02", "Here's   the\n play.")
        );
        let segments = parse_segments(&html);
        assert_eq!(
            segments,
            vec![
                TranscriptSegment::new("0:00", "Welcome back."),
                TranscriptSegment::new("0:02", "Here's the play."),
            ]
        );
    }

    #[test]
    fn test_segments_in_hidden_panel_are_skipped() {
        let html = format!(
            r#"<ytd-engagement-panel-section-list-renderer visibility="ENGAGEMENT_PANEL_VISIBILITY_HIDDEN">{}{}</ytd-engagement-panel-section-list-renderer>"#,
            segment("0:00", "Welcome back."),
            segment("0:02", "Here's the play.")
        );
        assert!(parse_segments(&html).is_empty());
        assert_eq!(count_segments(&html), 0);
    }

    #[tokio::test]
    async fn test_wait_for_segments_with_huge_timeout() {
        let page = SnapshotPage::new(URL, segment("0:00", "Welcome back."));
        let count = TranscriptExtractor::new(fast_config())
            .wait_for_segments(&page, u64::MAX)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_page_title_fallbacks() {
        let heading = r#"<ytd-watch-metadata><h1 class="ytd-watch-metadata"><yt-formatted-string>Game 7 Highlights</yt-formatted-string></h1></ytd-watch-metadata>"#;
        assert_eq!(page_title(heading).as_deref(), Some("Game 7 Highlights"));

        let og = r#"<head><meta property="og:title" content="From OG"><title>Ignored - YouTube</title></head>"#;
        assert_eq!(page_title(og).as_deref(), Some("From OG"));

        let plain = "<head><title>Plain Title - YouTube</title></head>";
        assert_eq!(page_title(plain).as_deref(), Some("Plain Title"));
    }

    #[tokio::test]
    async fn test_extract_merges_consecutive_timestamps() {
        let html = format!(
            "{}{}{}",
            segment("0:00", "Welcome back."),
            segment("0:00", "Big night."),
            segment("0:02", "Here's the play.")
        );
        let page = SnapshotPage::new(URL, html);
        let transcript = TranscriptExtractor::new(fast_config()).extract(&page).await.unwrap();
        assert_eq!(transcript, "[0:00] Welcome back. Big night. [0:02] Here's the play.");
    }

    #[tokio::test]
    async fn test_wait_for_segments_times_out() {
        let page = SnapshotPage::new(URL, "<div>no segments</div>");
        let err = TranscriptExtractor::new(fast_config())
            .wait_for_segments(&page, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterError::ExtractionTimeout { waited_ms: 30 }));
    }

    #[tokio::test]
    async fn test_fetch_transcript_waits_for_render() {
        let initial = r#"<ytd-video-description-transcript-section-renderer><button>Show transcript</button></ytd-video-description-transcript-section-renderer>"#;
        let rendered = format!(
            "{}{}{}",
            segment("0:00", "Welcome back to the broadcast."),
            segment("0:02", "Here's the play."),
            segment("0:19", "What a goal by Caufield!")
        );
        let page = ScriptedPage::new(URL, initial).on_click_frames(
            "ytd-video-description-transcript-section-renderer button",
            0,
            vec![initial.to_string(), initial.to_string(), rendered],
        );

        let transcript = TranscriptExtractor::new(fast_config())
            .with_locators(vec![PanelLocator::StructuredDescription])
            .fetch_transcript(&page)
            .await
            .unwrap();
        assert!(transcript.starts_with("[0:00] Welcome back"));
        assert!(transcript.ends_with("[0:19] What a goal by Caufield!"));
    }

    #[tokio::test]
    async fn test_fetch_transcript_rejects_short_output() {
        let html = format!(
            r#"<ytd-engagement-panel-section-list-renderer target-id="engagement-panel-searchable-transcript" visibility="ENGAGEMENT_PANEL_VISIBILITY_EXPANDED">{}</ytd-engagement-panel-section-list-renderer>"#,
            segment("0:00", "Hi.")
        );
        let page = SnapshotPage::new(URL, html);
        let err = TranscriptExtractor::new(fast_config())
            .fetch_transcript(&page)
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterError::TranscriptTooShort { minimum: 20, .. }));
    }

    #[tokio::test]
    async fn test_fetch_transcript_without_panel() {
        let page = SnapshotPage::new(URL, "<p>Comments are turned off.</p>");
        let err = TranscriptExtractor::new(fast_config())
            .fetch_transcript(&page)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Could not find transcript button"));
    }

    #[tokio::test]
    async fn test_video_info() {
        let page = SnapshotPage::new(URL, "<title>Game 7 - YouTube</title>");
        let info = TranscriptExtractor::default().video_info(&page).await.unwrap();
        assert_eq!(
            info,
            VideoInfo {
                video_id: "dQw4w9WgXcQ".to_string(),
                title: "Game 7".to_string()
            }
        );
    }
}
