//! Gemini REST client

use async_trait::async_trait;

use super::types::{GenerateContentRequest, RequestTool};
use super::{
    ChatModel, FunctionDeclaration, GenerateContentResponse, GroundedAnswer, Part, WireContent,
};
use crate::{Error, Result};

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the Gemini `generateContent` endpoint
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    system_prompt: Option<String>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            system_prompt: None,
        })
    }

    /// Use a specific model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the system instruction for chat requests
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send(&self, request: &GenerateContentRequest<'_>) -> Result<GenerateContentResponse> {
        tracing::debug!(
            model = %self.model,
            contents = request.contents.len(),
            tools = request.tools.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Gemini API error");
            return Err(Error::Model(format!("Gemini API error {status}: {body}")));
        }

        let parsed: GenerateContentResponse = response.json().await?;

        if parsed.candidates.is_empty() {
            let reason = parsed
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(Error::Model(format!("empty response: {reason}")));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(
        &self,
        contents: &[WireContent],
        tools: &[FunctionDeclaration],
    ) -> Result<GenerateContentResponse> {
        let request = GenerateContentRequest {
            contents,
            system_instruction: self.system_prompt.as_ref().map(|p| WireContent {
                role: None,
                parts: vec![Part::text(p.clone())],
            }),
            tools: if tools.is_empty() {
                Vec::new()
            } else {
                vec![RequestTool::FunctionDeclarations(tools.to_vec())]
            },
        };

        self.send(&request).await
    }

    async fn search(&self, prompt: &str) -> Result<GroundedAnswer> {
        let contents = [WireContent::user(vec![Part::text(prompt)])];
        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: None,
            tools: vec![RequestTool::GoogleSearch(serde_json::Map::new())],
        };

        let response = self.send(&request).await?;
        let sources = response.sources();
        tracing::debug!(sources = sources.len(), "search grounding complete");

        Ok(GroundedAnswer {
            text: response.text(),
            sources,
        })
    }
}
