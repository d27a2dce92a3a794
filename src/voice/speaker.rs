//! [`Speaker`] implementations

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{Speaker, TextToSpeech};
use crate::{Error, Result};

/// Players that accept MP3 on stdin, in preference order
const STDIN_PLAYERS: &[(&str, &[&str])] = &[
    ("mpg123", &["-q", "-"]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet", "-"]),
    ("mpv", &["--no-video", "--really-quiet", "-"]),
];

/// Prints utterances instead of playing them
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSpeaker;

#[async_trait]
impl Speaker for ConsoleSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "  🔊 {text}")?;
        Ok(())
    }
}

/// Where synthesized audio goes
enum Output {
    #[cfg(feature = "audio")]
    Device(super::AudioPlayback),
    Player { program: PathBuf, args: &'static [&'static str] },
}

/// Synthesizes each utterance and plays it
pub struct TtsSpeaker {
    tts: TextToSpeech,
    output: Arc<Output>,
}

impl std::fmt::Debug for TtsSpeaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsSpeaker")
            .field("tts", &self.tts)
            .finish_non_exhaustive()
    }
}

/// Sets the stop flag when the utterance future is dropped
#[cfg(feature = "audio")]
struct StopOnDrop(Arc<std::sync::atomic::AtomicBool>);

#[cfg(feature = "audio")]
impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, std::sync::atomic::Ordering::Relaxed);
    }
}

impl TtsSpeaker {
    /// Play through the sound card when built with audio support, otherwise
    /// through the first command-line player found on `PATH`
    ///
    /// # Errors
    ///
    /// Returns error if no audio output is available
    pub fn new(tts: TextToSpeech) -> Result<Self> {
        #[cfg(feature = "audio")]
        match super::AudioPlayback::new() {
            Ok(device) => {
                return Ok(Self {
                    tts,
                    output: Arc::new(Output::Device(device)),
                });
            }
            Err(e) => tracing::warn!(error = %e, "audio device unavailable; trying players"),
        }

        let (program, args) = STDIN_PLAYERS
            .iter()
            .find_map(|(name, args)| which::which(name).ok().map(|p| (p, *args)))
            .ok_or_else(|| Error::Audio("no audio output or MP3 player found".to_string()))?;

        tracing::debug!(player = %program.display(), "using external audio player");
        Ok(Self {
            tts,
            output: Arc::new(Output::Player { program, args }),
        })
    }
}

#[async_trait]
impl Speaker for TtsSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let audio = self.tts.synthesize(text).await?;

        match self.output.as_ref() {
            #[cfg(feature = "audio")]
            Output::Device(_) => {
                let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
                let _guard = StopOnDrop(Arc::clone(&stop));
                let output = Arc::clone(&self.output);
                tokio::task::spawn_blocking(move || match output.as_ref() {
                    Output::Device(device) => device.play_mp3_blocking(&audio, &stop),
                    Output::Player { .. } => Ok(()),
                })
                .await
                .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
            }
            Output::Player { program, args } => {
                let mut child = tokio::process::Command::new(program)
                    .args(*args)
                    .stdin(std::process::Stdio::piped())
                    .stdout(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| Error::Audio(format!("failed to spawn player: {e}")))?;

                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(&audio).await?;
                }

                let status = child.wait().await?;
                if !status.success() {
                    return Err(Error::Audio(format!("player exited with {status}")));
                }
                Ok(())
            }
        }
    }
}
