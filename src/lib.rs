//! Cozmo - voice-enabled AI chat assistant
//!
//! This library provides the core functionality for the Cozmo assistant:
//! - Conversation turns against a hosted Gemini model with tool calling
//! - Web-grounded search, image generation, and camera questions
//! - Sentence-by-sentence speech output
//! - A small account backend (registration, login, bearer tokens)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        REPL  │  one-shot ask  │  HTTP backend       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Assistant                         │
//! │   Intents  │  Turn runner  │  Tools  │  Speech      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Hosted services                      │
//! │   Gemini  │  Image generation  │  TTS  │  Geo IP    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod security;
pub mod tools;
pub mod vision;
pub mod voice;

pub use agent::{AbortHandle, Assistant, Intent, TurnOutcome, TurnRunner};
pub use chat::{ConversationLog, Message, Role};
pub use config::Config;
pub use db::DbPool;
pub use error::{Error, Result};
pub use llm::{ChatModel, GeminiClient, ImageGenerator};
pub use tools::{Tool, ToolRegistry};
