//! Function-calling turn loop

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chat::{Content, ContentPart, ConversationLog, Message, Role, ToolResult};
use crate::llm::{ChatModel, GenerateContentResponse, Part, WireContent};
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// Default bound on tool round-trips per turn
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Progress notifications emitted while a turn runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A tool is about to run
    ToolStart { name: String },
    /// A tool finished
    ToolFinished { name: String, ok: bool },
}

/// Drives one user turn through the model, executing requested tools
pub struct TurnRunner {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    max_tool_rounds: usize,
}

impl std::fmt::Debug for TurnRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnRunner")
            .field("tools", &self.tools)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish_non_exhaustive()
    }
}

impl TurnRunner {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Bound the number of tool round-trips per turn
    #[must_use]
    pub const fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// The model this runner talks to
    #[must_use]
    pub const fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Run a turn whose user message is the last entry of `log`
    ///
    /// Appends one tool-call and one tool-result entry per executed tool and
    /// the final model message. Only the first call of each response runs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Aborted` when `cancel` fires, or the first model,
    /// tool, or round-limit error
    pub async fn run(
        &self,
        log: &mut ConversationLog,
        cancel: &CancellationToken,
        on_event: &(dyn Fn(TurnEvent) + Send + Sync),
    ) -> Result<String> {
        let Some((user, history)) = log.messages().split_last() else {
            return Err(Error::Agent("no user message to answer".to_string()));
        };

        let mut contents = history_contents(history);
        contents.push(user_content(user));
        let declarations = self.tools.declarations();

        let mut rounds = 0;
        loop {
            let response = tokio::select! {
                () = cancel.cancelled() => return Err(Error::Aborted),
                r = self.model.generate(&contents, &declarations) => r?,
            };

            let calls = response.function_calls();
            let Some(call) = calls.first().cloned() else {
                return finish(log, &response);
            };

            if rounds >= self.max_tool_rounds {
                return Err(Error::Agent(format!(
                    "gave up after {} tool rounds",
                    self.max_tool_rounds
                )));
            }
            rounds += 1;

            if calls.len() > 1 {
                tracing::debug!(
                    issued = calls.len(),
                    executing = %call.name,
                    "model issued several calls; running the first"
                );
            }

            on_event(TurnEvent::ToolStart {
                name: call.name.clone(),
            });
            let outcome = tokio::select! {
                () = cancel.cancelled() => return Err(Error::Aborted),
                r = self.tools.dispatch(&call) => r,
            };
            on_event(TurnEvent::ToolFinished {
                name: call.name.clone(),
                ok: outcome.is_ok(),
            });
            let output = outcome?;

            contents.push(response.model_content());
            contents.push(WireContent::user(vec![Part::function_response(
                call.name.clone(),
                &output,
            )]));

            log.push(Message::tool_calls(calls));
            log.push(Message::tool_result(ToolResult {
                name: call.name,
                output,
            }));
        }
    }
}

fn finish(log: &mut ConversationLog, response: &GenerateContentResponse) -> Result<String> {
    let text = response.text();
    if text.trim().is_empty() {
        return Err(Error::Model("model returned no text".to_string()));
    }
    log.push(Message::model(text.clone()));
    Ok(text)
}

/// Translate prior log entries into wire contents
///
/// Images are not re-sent. Tool results travel in a user turn.
pub(crate) fn history_contents(messages: &[Message]) -> Vec<WireContent> {
    messages
        .iter()
        .filter_map(|msg| {
            let mut parts = Vec::new();

            let text = msg.content.text();
            if !text.is_empty() {
                parts.push(Part::text(text));
            }
            for call in msg.tool_calls.iter().flatten() {
                parts.push(Part::function_call(call));
            }
            for result in msg.tool_results.iter().flatten() {
                parts.push(Part::function_response(result.name.clone(), &result.output));
            }

            if parts.is_empty() {
                return None;
            }

            let is_result = msg.tool_results.as_ref().is_some_and(|r| !r.is_empty());
            Some(if is_result || msg.role == Role::User {
                WireContent::user(parts)
            } else {
                WireContent::model(parts)
            })
        })
        .collect()
}

/// The new user message, including any attached image
fn user_content(message: &Message) -> WireContent {
    let parts = match &message.content {
        Content::Text(text) => vec![Part::text(text.clone())],
        Content::Parts(parts) => parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => Part::text(text.clone()),
                ContentPart::Image { mime_type, data } => Part::inline(mime_type, data),
            })
            .collect(),
    };
    WireContent::user(parts)
}
