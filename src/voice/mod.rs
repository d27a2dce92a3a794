//! Speech output
//!
//! Replies are split into sentences and spoken one at a time by a single
//! queue worker. Synthesis goes through a hosted TTS provider.

#[cfg(feature = "audio")]
mod playback;
mod queue;
mod speaker;
mod tts;

#[cfg(feature = "audio")]
pub use playback::AudioPlayback;
pub use queue::{SpeechCanceller, SpeechQueue, Speaker, segment};
pub use speaker::{ConsoleSpeaker, TtsSpeaker};
pub use tts::{TextToSpeech, TtsProvider};
