//! Configuration management for the Cozmo assistant
//!
//! Every value resolves as environment variable, then config file, then
//! built-in default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::llm::{DEFAULT_BASE_URL, DEFAULT_IMAGE_BASE_URL, DEFAULT_MODEL};
use crate::tools::DEFAULT_GEO_URL;
use crate::vision::DEFAULT_CAPTURE_COMMAND;
use crate::voice::TtsProvider;
use crate::{Error, Result};

use file::CozmoConfigFile;

/// Cozmo assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for history, database, and other state
    pub data_dir: PathBuf,
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub vision: VisionConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    pub image: ImageConfig,
}

/// Hosted model settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tool_rounds: usize,
}

/// Speech output settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub provider: TtsProvider,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f32,
}

impl VoiceConfig {
    /// API key for the selected provider
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            TtsProvider::OpenAI => self.openai_api_key.as_deref(),
            TtsProvider::ElevenLabs => self.elevenlabs_api_key.as_deref(),
        }
    }
}

/// Camera settings
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub enabled: bool,
    pub capture_command: Vec<String>,
    pub still_path: Option<PathBuf>,
    pub timeout: Duration,
}

/// Built-in tool settings
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Fixed coordinates; when absent the location tool uses IP lookup
    pub location: Option<(f64, f64)>,
    pub geo_url: String,
    pub probe_addr: String,
}

/// Auth backend settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: Option<String>,
    pub token_ttl: Duration,
    pub database_path: PathBuf,
}

/// Image generation settings
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub base_url: String,
}

/// Default data directory (`~/.local/share/cozmo` on Linux)
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "cozmo").map_or_else(
        || PathBuf::from(".cozmo"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load from the environment and `~/.config/cozmo/config.toml`
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load(disable_voice: bool) -> Result<Self> {
        Self::from_sources(
            file::load_config_file(),
            |key| std::env::var(key).ok(),
            disable_voice,
        )
    }

    /// Resolve configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn from_sources(
        fc: CozmoConfigFile,
        env: impl Fn(&str) -> Option<String>,
        disable_voice: bool,
    ) -> Result<Self> {
        let env_parse = |key: &str| -> Option<String> { env(key).filter(|v| !v.trim().is_empty()) };

        let data_dir = env_parse("COZMO_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        let llm = LlmConfig {
            api_key: env_parse("GEMINI_API_KEY")
                .or_else(|| env_parse("API_KEY"))
                .or(fc.llm.api_key),
            model: env_parse("COZMO_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env_parse("COZMO_GEMINI_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tool_rounds: env_parse("COZMO_MAX_TOOL_ROUNDS")
                .and_then(|v| v.parse().ok())
                .or(fc.llm.max_tool_rounds)
                .unwrap_or(crate::agent::DEFAULT_MAX_TOOL_ROUNDS),
        };

        let provider = match env_parse("COZMO_TTS_PROVIDER").or(fc.voice.provider) {
            Some(name) => name.parse()?,
            None => TtsProvider::default(),
        };
        let default_voice = match provider {
            TtsProvider::OpenAI => "alloy",
            TtsProvider::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        };
        let default_model = match provider {
            TtsProvider::OpenAI => "tts-1",
            TtsProvider::ElevenLabs => "eleven_monolingual_v1",
        };

        let voice = VoiceConfig {
            enabled: !disable_voice
                && env_parse("COZMO_VOICE_ENABLED")
                    .and_then(|v| parse_bool(&v))
                    .or(fc.voice.enabled)
                    .unwrap_or(true),
            provider,
            openai_api_key: env_parse("OPENAI_API_KEY").or(fc.voice.openai_api_key),
            elevenlabs_api_key: env_parse("ELEVENLABS_API_KEY").or(fc.voice.elevenlabs_api_key),
            tts_model: env_parse("COZMO_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| default_model.to_string()),
            tts_voice: env_parse("COZMO_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| default_voice.to_string()),
            tts_speed: env_parse("COZMO_TTS_SPEED")
                .and_then(|v| v.parse().ok())
                .or(fc.voice.tts_speed)
                .unwrap_or(1.0),
        };

        let vision = VisionConfig {
            enabled: env_parse("COZMO_VISION_ENABLED")
                .and_then(|v| parse_bool(&v))
                .or(fc.vision.enabled)
                .unwrap_or(true),
            capture_command: env_parse("COZMO_CAPTURE_COMMAND")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .or(fc.vision.capture_command)
                .unwrap_or_else(|| {
                    DEFAULT_CAPTURE_COMMAND
                        .iter()
                        .map(ToString::to_string)
                        .collect()
                }),
            still_path: env_parse("COZMO_VISION_STILL")
                .or(fc.vision.still_path)
                .map(PathBuf::from),
            timeout: Duration::from_secs(fc.vision.timeout_secs.unwrap_or(10)),
        };

        let latitude = env_parse("COZMO_LATITUDE")
            .and_then(|v| v.parse().ok())
            .or(fc.tools.latitude);
        let longitude = env_parse("COZMO_LONGITUDE")
            .and_then(|v| v.parse().ok())
            .or(fc.tools.longitude);
        let tools = ToolsConfig {
            location: latitude.zip(longitude),
            geo_url: env_parse("COZMO_GEO_URL")
                .or(fc.tools.geo_url)
                .unwrap_or_else(|| DEFAULT_GEO_URL.to_string()),
            probe_addr: env_parse("COZMO_PROBE_ADDR")
                .or(fc.tools.probe_addr)
                .unwrap_or_else(|| "1.1.1.1:443".to_string()),
        };

        let server = ServerConfig {
            host: env_parse("COZMO_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse("PORT")
                .and_then(|v| v.parse().ok())
                .or(fc.server.port)
                .unwrap_or(5000),
            jwt_secret: env_parse("JWT_SECRET").or(fc.server.jwt_secret),
            token_ttl: Duration::from_secs(
                env_parse("COZMO_TOKEN_TTL_SECS")
                    .and_then(|v| v.parse().ok())
                    .or(fc.server.token_ttl_secs)
                    .unwrap_or(3600),
            ),
            database_path: env_parse("COZMO_DATABASE")
                .or(fc.server.database_path)
                .map_or_else(|| data_dir.join("cozmo.db"), PathBuf::from),
        };

        let image = ImageConfig {
            base_url: env_parse("COZMO_IMAGE_BASE_URL")
                .or(fc.image.base_url)
                .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string()),
        };

        if !(0.25..=4.0).contains(&voice.tts_speed) {
            return Err(Error::Config(format!(
                "tts speed {} out of range 0.25-4.0",
                voice.tts_speed
            )));
        }

        Ok(Self {
            data_dir,
            llm,
            voice,
            vision,
            tools,
            server,
            image,
        })
    }

    /// The Gemini API key, required for any model access
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn gemini_api_key(&self) -> Result<&str> {
        self.llm.api_key.as_deref().ok_or_else(|| {
            Error::Config("GEMINI_API_KEY not set (or llm.api_key in config file)".to_string())
        })
    }

    /// The JWT signing secret, required by the auth backend
    ///
    /// # Errors
    ///
    /// Returns error if no secret is configured
    pub fn jwt_secret(&self) -> Result<&str> {
        self.server.jwt_secret.as_deref().ok_or_else(|| {
            Error::Config("JWT_SECRET not set (or server.jwt_secret in config file)".to_string())
        })
    }

    /// Where the conversation log is persisted
    #[must_use]
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }
}
