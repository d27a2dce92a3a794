//! Hosted model access
//!
//! The orchestrator talks to the model only through [`ChatModel`] and
//! [`ImageGenerator`], so tests can script responses without a network.

mod gemini;
mod image;
mod prompt;
mod types;

use async_trait::async_trait;

pub use gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiClient};
pub use image::{DEFAULT_IMAGE_BASE_URL, PollinationsImages};
pub use prompt::SYSTEM_PROMPT;
pub use types::{
    Candidate, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateContentResponse,
    GroundingChunk, GroundingMetadata, InlineData, Part, PromptFeedback, WebChunk, WireContent,
};

use crate::Result;
use crate::chat::SourceCitation;

/// Search-grounded answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedAnswer {
    pub text: String,
    pub sources: Vec<SourceCitation>,
}

/// Generated image payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    /// Base64-encoded image bytes
    pub data: String,
}

impl GeneratedImage {
    /// Render as a `data:` URL
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Conversational model with function calling and search grounding
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the next model content for `contents`, offering `tools`
    async fn generate(
        &self,
        contents: &[WireContent],
        tools: &[FunctionDeclaration],
    ) -> Result<GenerateContentResponse>;

    /// Answer `prompt` with web-search grounding
    async fn search(&self, prompt: &str) -> Result<GroundedAnswer>;
}

/// Text-to-image backend
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `prompt`
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage>;
}
