//! `open_website`: hand a URL to the desktop's browser

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, get_string_arg};
use crate::llm::FunctionDeclaration;
use crate::{Error, Result};

/// Launchers tried in order
const LAUNCHERS: &[&str] = &["xdg-open", "open", "wslview", "gio"];

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can open a URL for the user
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn open(&self, url: &url::Url) -> Result<()>;
}

/// Opens URLs with the first launcher found on `PATH`
#[derive(Debug, Clone, Default)]
pub struct SystemOpener;

#[async_trait]
impl UrlOpener for SystemOpener {
    async fn open(&self, url: &url::Url) -> Result<()> {
        let Some((name, program)) = LAUNCHERS
            .iter()
            .find_map(|name| which::which(name).ok().map(|p| (*name, p)))
        else {
            return Err(Error::Tool("no URL launcher found on PATH".to_string()));
        };

        let mut cmd = tokio::process::Command::new(program);
        if name == "gio" {
            cmd.arg("open");
        }
        cmd.arg(url.as_str());

        run_launcher(cmd, name, LAUNCH_TIMEOUT).await
    }
}

/// Run a launcher to completion; it is killed if `timeout` elapses first
async fn run_launcher(
    mut cmd: tokio::process::Command,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| Error::Tool(format!("failed to spawn {name}: {e}")))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| Error::Tool(format!("{name} timed out")))?
        .map_err(|e| Error::Tool(format!("{name} process error: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Tool(format!(
            "{name} exited with {}: {stderr}",
            output.status
        )));
    }

    Ok(())
}

/// Opens http(s) URLs on request
pub struct OpenWebsiteTool {
    opener: Arc<dyn UrlOpener>,
}

impl OpenWebsiteTool {
    #[must_use]
    pub fn new(opener: Arc<dyn UrlOpener>) -> Self {
        Self { opener }
    }
}

#[async_trait]
impl Tool for OpenWebsiteTool {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "open_website".to_string(),
            description: "Opens a given URL in a new browser tab.".to_string(),
            parameters: Some(serde_json::json!({
                "type": "OBJECT",
                "properties": {
                    "url": {
                        "type": "STRING",
                        "description": "The full URL of the website to open (e.g., https://www.google.com)."
                    }
                },
                "required": ["url"]
            })),
        }
    }

    async fn invoke(&self, args: &Value) -> Result<Value> {
        let raw = get_string_arg(args, "url")?;
        let url = url::Url::parse(raw.trim())
            .map_err(|e| Error::Tool(format!("invalid url {raw}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Tool(format!(
                "refusing to open non-web url scheme: {}",
                url.scheme()
            )));
        }

        self.opener.open(&url).await?;
        tracing::info!(url = %url, "opened website");

        Ok(serde_json::json!({
            "success": true,
            "url": url.as_str(),
        }))
    }
}
