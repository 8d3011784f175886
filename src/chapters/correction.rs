use super::prompts::{spelling_user_prompt, SPELLING_SYSTEM_PROMPT};
use crate::error::{ChapterError, Result};
use crate::llm::{ChatMessage, LLM};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name-spelling pass over drafted chapters
pub struct SpellingCorrector {
    llm: Arc<dyn LLM>,
    prompt: String,
}

impl SpellingCorrector {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self::with_prompt(llm, SPELLING_SYSTEM_PROMPT.to_string())
    }

    pub fn with_prompt(llm: Arc<dyn LLM>, prompt: String) -> Self {
        Self { llm, prompt }
    }

    /// Ask the model for corrected chapters, surfacing any failure
    pub async fn try_correct(&self, draft: &str) -> Result<String> {
        debug!("Requesting spelling correction ({} chars)", draft.len());

        let messages = vec![
            ChatMessage::system(self.prompt.clone()),
            ChatMessage::user(spelling_user_prompt(draft)),
        ];

        let response = self.llm.chat(messages).await?;
        debug!("Spelling correction completed (tokens: {:?})", response.tokens_used);

        let corrected = response.content.trim();
        if corrected.is_empty() {
            return Err(ChapterError::EmptyModelResponse);
        }
        Ok(corrected.to_string())
    }

    /// Corrected chapters, or the draft unchanged if the pass fails.
    ///
    /// Returns the text and whether the correction was applied.
    pub async fn correct(&self, draft: &str) -> (String, bool) {
        match self.try_correct(draft).await {
            Ok(corrected) => {
                if corrected != draft {
                    info!("✏️ Spelling pass updated chapter names");
                }
                (corrected, true)
            }
            Err(e) => {
                warn!("Spelling correction failed, keeping draft: {}", e);
                (draft.to_string(), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMProvider, LLMResponse};
    use async_trait::async_trait;

    struct FixedLLM(std::result::Result<&'static str, u16>);

    #[async_trait]
    impl LLM for FixedLLM {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<LLMResponse> {
            match self.0 {
                Ok(content) => Ok(LLMResponse {
                    content: content.to_string(),
                    tokens_used: None,
                }),
                Err(status) => Err(crate::llm::providers::error_for_status(status, None, "")),
            }
        }

        fn provider_type(&self) -> LLMProvider {
            LLMProvider::OpenAI
        }
    }

    #[tokio::test]
    async fn test_correct_applies_model_output() {
        let corrector = SpellingCorrector::new(Arc::new(FixedLLM(Ok("0:15 Goal by Caufield\n"))));
        let (text, applied) = corrector.correct("0:15 Goal by Caulfield").await;
        assert_eq!(text, "0:15 Goal by Caufield");
        assert!(applied);
    }

    #[tokio::test]
    async fn test_correct_keeps_draft_on_error() {
        let corrector = SpellingCorrector::new(Arc::new(FixedLLM(Err(503))));
        let draft = "0:00 Intro\n0:15 Goal by Caulfield";
        let (text, applied) = corrector.correct(draft).await;
        assert_eq!(text, draft);
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_empty_correction_is_an_error() {
        let corrector = SpellingCorrector::new(Arc::new(FixedLLM(Ok("   "))));
        let err = corrector.try_correct("0:00 Intro").await.unwrap_err();
        assert!(matches!(err, ChapterError::EmptyModelResponse));

        let (text, applied) = corrector.correct("0:00 Intro").await;
        assert_eq!(text, "0:00 Intro");
        assert!(!applied);
    }
}
