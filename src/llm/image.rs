//! Image generation through the Pollinations prompt endpoint

use async_trait::async_trait;
use base64::Engine;

use super::{GeneratedImage, ImageGenerator};
use crate::{Error, Result};

/// Default Pollinations base URL
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.pollinations.ai";

/// Fetches generated images from `<base>/prompt/<prompt>`
#[derive(Debug, Clone)]
pub struct PollinationsImages {
    client: reqwest::Client,
    base_url: String,
}

impl Default for PollinationsImages {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_BASE_URL)
    }
}

impl PollinationsImages {
    /// Create a generator against `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, prompt: &str) -> String {
        format!("{}/prompt/{}", self.base_url, urlencoding::encode(prompt))
    }
}

#[async_trait]
impl ImageGenerator for PollinationsImages {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let url = self.url_for(prompt);
        tracing::debug!(%url, "requesting generated image");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Image(format!("image service returned {status}")));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map_or_else(|| "image/jpeg".to_string(), ToString::to_string);

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(Error::Image("image service returned no data".to_string()));
        }

        Ok(GeneratedImage {
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        })
    }
}
