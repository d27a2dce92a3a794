//! Camera frame capture

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;

use crate::chat::ContentPart;
use crate::{Error, Result};

/// Shown when no frame is available
pub const NO_FRAME_MESSAGE: &str = "Could not capture frame from vision system.";

/// Default capture command: one MJPEG frame from the first V4L2 camera
pub const DEFAULT_CAPTURE_COMMAND: &[&str] = &[
    "ffmpeg",
    "-hide_banner",
    "-loglevel",
    "error",
    "-f",
    "v4l2",
    "-i",
    "/dev/video0",
    "-frames:v",
    "1",
    "-f",
    "image2pipe",
    "-vcodec",
    "mjpeg",
    "-",
];

const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// A single captured image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Frame {
    /// Inline image part for a user message
    #[must_use]
    pub fn to_content_part(&self) -> ContentPart {
        ContentPart::Image {
            mime_type: self.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&self.data),
        }
    }
}

/// Source of camera frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Grab the current frame, `None` if the source produced nothing
    async fn capture(&self) -> Result<Option<Frame>>;
}

/// Runs an external command that writes one encoded frame to stdout
#[derive(Debug, Clone)]
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
    mime_type: String,
    timeout: Duration,
}

impl Default for CommandFrameSource {
    fn default() -> Self {
        let mut parts = DEFAULT_CAPTURE_COMMAND.iter().map(ToString::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            mime_type: "image/jpeg".to_string(),
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }
}

impl CommandFrameSource {
    /// Capture with `command` (program followed by arguments)
    ///
    /// # Errors
    ///
    /// Returns error if `command` is empty
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config("capture command is empty".to_string()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl FrameSource for CommandFrameSource {
    async fn capture(&self) -> Result<Option<Frame>> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::Vision(format!("failed to spawn {}: {e}", self.program)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Vision(format!("capture timed out ({}s)", self.timeout.as_secs()))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Vision(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Ok(None);
        }

        tracing::debug!(bytes = output.stdout.len(), "frame captured");
        Ok(Some(Frame {
            mime_type: self.mime_type.clone(),
            data: output.stdout,
        }))
    }
}

/// Serves a fixed image file as the current frame
#[derive(Debug, Clone)]
pub struct StillFrameSource {
    path: PathBuf,
}

impl StillFrameSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for StillFrameSource {
    async fn capture(&self) -> Result<Option<Frame>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(Frame {
            mime_type: mime_for_path(&self.path).to_string(),
            data,
        }))
    }
}

/// Image MIME type from a file extension; unknown types default to JPEG
#[must_use]
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
