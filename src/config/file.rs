//! TOML configuration file loading
//!
//! Supports `~/.config/cozmo/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CozmoConfigFile {
    /// Directory for history, database, and other state
    pub data_dir: Option<String>,
    pub llm: LlmFileConfig,
    pub voice: VoiceFileConfig,
    pub vision: VisionFileConfig,
    pub tools: ToolsFileConfig,
    pub server: ServerFileConfig,
    pub image: ImageFileConfig,
}

/// Hosted model configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LlmFileConfig {
    pub api_key: Option<String>,
    /// Model identifier (e.g. "gemini-2.5-flash")
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tool_rounds: Option<usize>,
}

/// Speech output configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VoiceFileConfig {
    pub enabled: Option<bool>,
    /// "openai" or "elevenlabs"
    pub provider: Option<String>,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub tts_model: Option<String>,
    /// Voice name (`OpenAI`) or voice id (ElevenLabs)
    pub tts_voice: Option<String>,
    pub tts_speed: Option<f32>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VisionFileConfig {
    pub enabled: Option<bool>,
    /// Program and arguments that write one frame to stdout
    pub capture_command: Option<Vec<String>>,
    /// Serve this image file instead of running a capture command
    pub still_path: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Built-in tool configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ToolsFileConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geo_url: Option<String>,
    /// `host:port` used to test connectivity
    pub probe_addr: Option<String>,
}

/// Auth backend configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub database_path: Option<String>,
}

/// Image generation configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImageFileConfig {
    pub base_url: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CozmoConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CozmoConfigFile {
    config_file_path().map_or_else(CozmoConfigFile::default, |path| load_from(&path))
}

/// Load a config file from `path`, falling back to defaults
pub fn load_from(path: &Path) -> CozmoConfigFile {
    if !path.exists() {
        return CozmoConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CozmoConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CozmoConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/cozmo/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cozmo").join("config.toml"))
}
