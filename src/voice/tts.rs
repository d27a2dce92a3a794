//! Text-to-speech synthesis

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// TTS provider backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    OpenAI,
    ElevenLabs,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes MP3 speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
    base_url: Option<String>,
}

impl std::fmt::Debug for TextToSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextToSpeech")
            .field("provider", &self.provider)
            .field("voice", &self.voice)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl TextToSpeech {
    /// `OpenAI` speech with the `tts-1` model
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_openai(api_key: String, voice: String, speed: f32) -> Result<Self> {
        Self::new(TtsProvider::OpenAI, api_key, voice, "tts-1".to_string(), speed)
    }

    /// ElevenLabs speech for `voice_id`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_elevenlabs(api_key: String, voice_id: String) -> Result<Self> {
        Self::new(
            TtsProvider::ElevenLabs,
            api_key,
            voice_id,
            "eleven_monolingual_v1".to_string(),
            1.0,
        )
    }

    /// Create a synthesizer for any provider
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        provider: TtsProvider,
        api_key: String,
        voice: String,
        model: String,
        speed: f32,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{provider:?} API key required for TTS"
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider,
            base_url: None,
        })
    }

    /// Send requests to a different endpoint
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the provider rejects the request
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = match self.provider {
            TtsProvider::OpenAI => self.openai_request(text),
            TtsProvider::ElevenLabs => self.elevenlabs_request(text),
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!(
                "{:?} TTS error {status}: {body}",
                self.provider
            )));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), chars = text.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    fn openai_request(&self, text: &str) -> reqwest::RequestBuilder {
        #[derive(Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let url = self.base_url.as_deref().unwrap_or(OPENAI_SPEECH_URL);
        self.client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&TtsRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                speed: self.speed,
            })
    }

    fn elevenlabs_request(&self, text: &str) -> reqwest::RequestBuilder {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let base = self.base_url.as_deref().unwrap_or(ELEVENLABS_URL);
        self.client
            .post(format!("{base}/{}", self.voice))
            .header("xi-api-key", &self.api_key)
            .json(&ElevenLabsRequest {
                text,
                model_id: &self.model,
            })
    }
}
