use crate::error::Result;
use crate::gemini::{GeminiClient, GeminiConfig, GeminiError};
use crate::prompt::PromptBuilder;

pub const CONFIGURATION_ERROR_REPLY: &str = "Configuration error. Please contact Soren directly!";
pub const BUSY_REPLY: &str =
    "Sorry, I'm having trouble right now. Please try again later or contact Soren directly!";
pub const GENERIC_ERROR_REPLY: &str = "Sorry, something went wrong. Please contact Soren directly!";

/// Answers visitor questions as the portfolio persona
pub struct ChatService {
    prompts: PromptBuilder,
    client: GeminiClient,
}

impl ChatService {
    pub fn new(portfolio: &str, gemini: GeminiConfig) -> Result<Self> {
        Ok(Self {
            prompts: PromptBuilder::new(portfolio),
            client: GeminiClient::new(gemini)?,
        })
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }

    /// Produce the text shown to the visitor. Upstream failures become
    /// fixed fallback replies and are logged here.
    pub async fn reply(&self, message: &str) -> String {
        let prompt = self.prompts.build(message);

        match self.client.generate(&prompt).await {
            Ok(text) => text,
            Err(GeminiError::MissingApiKey) => {
                tracing::warn!("GEMINI_API_KEY is not set, returning configuration error reply");
                CONFIGURATION_ERROR_REPLY.to_string()
            }
            Err(GeminiError::Status { status, body }) => {
                tracing::warn!(status = %status, body = %body, "Gemini API error");
                BUSY_REPLY.to_string()
            }
            Err(err) => {
                tracing::error!(error = %err, "Error calling Gemini");
                GENERIC_ERROR_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_without_api_key() {
        let service = ChatService::new(
            "Likes ramen.",
            GeminiConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                ..GeminiConfig::default()
            },
        )
        .unwrap();

        assert_eq!(service.reply("hello").await, CONFIGURATION_ERROR_REPLY);
    }

    #[tokio::test]
    async fn test_reply_on_transport_failure() {
        // Nothing listens on port 1, so the connection is refused.
        let service = ChatService::new(
            "Likes ramen.",
            GeminiConfig {
                api_key: Some("test-key".to_string()),
                base_url: "http://127.0.0.1:1".to_string(),
                ..GeminiConfig::default()
            },
        )
        .unwrap();

        assert_eq!(service.reply("hello").await, GENERIC_ERROR_REPLY);
    }
}
