//! Built-in prompts for chapter generation

use std::path::Path;
use tracing::warn;

/// Draft generation system prompt.
///
/// Caption timestamps mark when a line was spoken, which is usually a few
/// seconds after the moment being described begins.
pub const DRAFT_SYSTEM_PROMPT: &str = r#"You create YouTube chapter markers from video transcripts.

The transcript is given as text blocks, each preceded by a [m:ss] timestamp marking when those words were SPOKEN.

CRITICAL TIMING RULE:
A caption timestamp is when the commentator or speaker said the line, not when the thing they are talking about started. Speech lags the action. When a line reacts to or describes a moment ("What a goal!", "Look at that pass"), the segment that should be chaptered began EARLIER. Look back through the preceding timestamps to find where that segment actually starts and use that earlier timestamp as the chapter start.

Rules:
1. The first chapter starts at 0:00.
2. Only use timestamps that appear as [m:ss] markers in the transcript.
3. Chapters must be in ascending order and no later than the video duration.
4. Give each chapter a short, specific title (2-8 words). Keep names of people, teams and places exactly as they should be spelled.
5. Aim for one chapter per distinct topic or moment; do not pad with trivial chapters.

Output format, one chapter per line and nothing else:
0:00 Title
1:23 Title"#;

/// Spelling correction system prompt. Only personal names may change.
pub const SPELLING_SYSTEM_PROMPT: &str = r#"You proofread YouTube chapter lists.

Fix misspelled names of people (players, speakers, guests, public figures) that were produced by automatic captions. Use the correct, commonly accepted spelling.

Rules:
1. Change ONLY misspelled personal names.
2. Do not change timestamps, line order, line count, punctuation or any other words.
3. Do not add commentary, headings or explanations.
4. If nothing needs fixing, return the list exactly as given.

Return the full chapter list in the same "m:ss Title" format."#;

/// User message for the draft call
pub fn draft_user_prompt(transcript: &str, video_duration: &str) -> String {
    format!(
        "Video duration: {}\n\nCreate chapters for this transcript:\n\n{}",
        video_duration, transcript
    )
}

/// User message for the spelling call
pub fn spelling_user_prompt(draft: &str) -> String {
    format!("Correct the spelling of personal names in these chapters:\n\n{}", draft)
}

/// Load a prompt override, falling back to `default` when it cannot be read
pub async fn load_prompt(path: Option<&Path>, default: &str) -> String {
    let Some(path) = path else {
        return default.to_string();
    };

    match tokio::fs::read_to_string(path).await {
        Ok(content) if !content.trim().is_empty() => content.trim().to_string(),
        Ok(_) => {
            warn!("Prompt file {} is empty, using default prompt", path.display());
            default.to_string()
        }
        Err(e) => {
            warn!("Failed to read prompt file {}: {}, using default prompt", path.display(), e);
            default.to_string()
        }
    }
}
