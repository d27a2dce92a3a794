//! `set_reminder`: deliver a message after a delay

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{Tool, get_number_arg, get_string_arg};
use crate::llm::FunctionDeclaration;
use crate::{Error, Result};

/// Longest accepted delay (one week)
const MAX_DELAY_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// A reminder that has come due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub message: String,
}

/// Schedules reminders on the runtime and emits them when due
#[derive(Debug, Clone)]
pub struct ReminderTool {
    due: mpsc::UnboundedSender<Reminder>,
}

impl ReminderTool {
    /// Create the tool and the receiver that due reminders arrive on
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Reminder>) {
        let (due, rx) = mpsc::unbounded_channel();
        (Self { due }, rx)
    }
}

#[async_trait]
impl Tool for ReminderTool {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "set_reminder".to_string(),
            description: "Sets a reminder for the user after a specified time.".to_string(),
            parameters: Some(serde_json::json!({
                "type": "OBJECT",
                "properties": {
                    "time": {
                        "type": "NUMBER",
                        "description": "The time in seconds to wait before showing the reminder."
                    },
                    "message": {
                        "type": "STRING",
                        "description": "The message to display in the reminder."
                    }
                },
                "required": ["time", "message"]
            })),
        }
    }

    async fn invoke(&self, args: &Value) -> Result<Value> {
        let time = get_number_arg(args, "time")?;
        let message = get_string_arg(args, "message")?;

        if !time.is_finite() || time < 0.0 {
            return Err(Error::Tool(format!("invalid reminder time: {time}")));
        }
        if time > MAX_DELAY_SECS {
            return Err(Error::Tool(format!(
                "reminder time {time}s exceeds the one-week limit"
            )));
        }

        let delay = Duration::from_secs_f64(time);
        let due = self.due.clone();
        let text = message.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!(message = %text, "reminder due");
            // Receiver gone means the session ended
            let _ = due.send(Reminder { message: text });
        });

        tracing::debug!(seconds = time, %message, "reminder scheduled");
        Ok(serde_json::json!({
            "success": true,
            "message": format!("Reminder set for {time} seconds."),
        }))
    }
}
