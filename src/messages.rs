//! Request/response messages exchanged between the extension UI and the page script.

use crate::transcript::{Page, TranscriptExtractor};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Actions the UI can ask the page for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExtensionRequest {
    GetVideoInfo,
    GetTranscript,
}

/// Replies sent back to the UI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ExtensionResponse {
    VideoInfo {
        #[serde(rename = "videoId")]
        video_id: String,
        title: String,
    },
    Transcript {
        transcript: String,
    },
    Error {
        error: String,
    },
}

impl ExtensionResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ExtensionResponse::Error {
            error: message.into(),
        }
    }
}

/// Answer one request against the current page
pub async fn handle_request(
    extractor: &TranscriptExtractor,
    page: &dyn Page,
    request: &ExtensionRequest,
) -> ExtensionResponse {
    debug!("Handling extension request: {:?}", request);

    match request {
        ExtensionRequest::GetVideoInfo => match extractor.video_info(page).await {
            Ok(info) => ExtensionResponse::VideoInfo {
                video_id: info.video_id,
                title: info.title,
            },
            Err(e) => ExtensionResponse::error(e.to_string()),
        },
        ExtensionRequest::GetTranscript => match extractor.fetch_transcript(page).await {
            Ok(transcript) => ExtensionResponse::Transcript { transcript },
            Err(e) => {
                warn!("Transcript request failed: {}", e);
                ExtensionResponse::error(e.to_string())
            }
        },
    }
}

/// Decode a raw JSON message, answer it and encode the reply
pub async fn handle_json(extractor: &TranscriptExtractor, page: &dyn Page, raw: &str) -> String {
    let response = match serde_json::from_str::<ExtensionRequest>(raw) {
        Ok(request) => handle_request(extractor, page, &request).await,
        Err(e) => ExtensionResponse::error(format!("Unknown request: {}", e)),
    };

    serde_json::to_string(&response)
        .unwrap_or_else(|e| format!(r#"{{"error":"Failed to encode response: {}"}}"#, e))
}
