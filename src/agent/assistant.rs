//! Conversation session controller
//!
//! [`Assistant`] owns the log and routes each submission to the chat, search,
//! image, or vision flow. Every flow runs under a cancellation token; an
//! aborted turn rolls the log back to where it was before the user spoke,
//! and any other failure is recorded as a single apology message.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use super::intent::Intent;
use super::runner::{TurnEvent, TurnRunner};
use crate::chat::{Content, ContentPart, ConversationLog, Message};
use crate::llm::ImageGenerator;
use crate::tools::Reminder;
use crate::vision::{Frame, FrameSource, NO_FRAME_MESSAGE};
use crate::voice::{SpeechCanceller, SpeechQueue};
use crate::{Error, Result};

/// Prefix of the message recorded when a turn fails
pub const ERROR_PREFIX: &str = "Apologies, Operator. I've encountered a system malfunction.";

/// Question asked about a frame when the user gives none
const DEFAULT_LOOK_PROMPT: &str = "Describe what you see.";

const TOOL_NOTICE: &str = "Executing command.";
const SEARCH_NOTICE: &str = "Here is what I found, Operator.";
const IMAGE_NOTICE: &str = "Your image is ready, Operator.";

/// How a submission ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The final message appended for this turn
    Answered(Message),
    /// The turn failed; carries the recorded error message
    Failed(String),
    /// The turn was aborted and the log rolled back
    Aborted,
    /// Blank input; nothing happened
    Ignored,
}

/// Aborts whichever turn is currently in flight
///
/// Cloneable so another task (a Ctrl-C watcher, a voice-activity hook) can
/// abort while the owner is awaiting [`Assistant::submit`].
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    slot: Arc<Mutex<Option<CancellationToken>>>,
    speech: Option<SpeechCanceller>,
}

impl AbortHandle {
    /// Silence speech and abort the in-flight turn; returns whether a turn
    /// was running
    pub fn interrupt(&self) -> bool {
        if let Some(speech) = &self.speech {
            speech.cancel();
        }
        self.abort()
    }

    /// Abort the in-flight turn; returns whether one was running
    pub fn abort(&self) -> bool {
        let token = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        token.is_some_and(|t| {
            t.cancel();
            true
        })
    }

    /// Whether a turn is in flight
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    fn finish(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// A chat session: log, model access, speech output, and optional camera
pub struct Assistant {
    log: ConversationLog,
    runner: TurnRunner,
    images: Arc<dyn ImageGenerator>,
    vision: Option<Arc<dyn FrameSource>>,
    speech: Option<SpeechQueue>,
    audio_enabled: bool,
    in_flight: AbortHandle,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("messages", &self.log.len())
            .field("runner", &self.runner)
            .field("vision", &self.vision.is_some())
            .field("audio_enabled", &self.audio_enabled)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    #[must_use]
    pub fn new(log: ConversationLog, runner: TurnRunner, images: Arc<dyn ImageGenerator>) -> Self {
        Self {
            log,
            runner,
            images,
            vision: None,
            speech: None,
            audio_enabled: false,
            in_flight: AbortHandle::default(),
        }
    }

    /// Attach a camera for `/look`
    #[must_use]
    pub fn with_vision(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.vision = Some(source);
        self
    }

    /// Speak replies through `queue`
    ///
    /// Handles taken afterwards also silence this queue on interrupt.
    #[must_use]
    pub fn with_speech(mut self, queue: SpeechQueue) -> Self {
        self.in_flight.speech = Some(queue.canceller());
        self.speech = Some(queue);
        self.audio_enabled = true;
        self
    }

    #[must_use]
    pub const fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Drop the whole conversation, persisted copy included
    pub fn clear_history(&mut self) {
        self.log.clear();
    }

    /// Handle for aborting the in-flight turn from another task
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.in_flight.clone()
    }

    #[must_use]
    pub const fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// Toggle spoken output; turning it off silences the current utterance
    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
        if !enabled && let Some(speech) = &self.speech {
            speech.cancel();
        }
    }

    /// The user started talking: stop speaking and abandon the current turn
    pub fn interrupt(&self) {
        if self.in_flight.interrupt() {
            tracing::info!("in-flight turn interrupted");
        }
    }

    /// Wait until everything queued for speech has been spoken
    pub async fn finish_speaking(&self) {
        if let Some(speech) = &self.speech {
            speech.wait_idle().await;
        }
    }

    /// Record a due reminder and announce it
    pub fn deliver_reminder(&mut self, reminder: &Reminder) -> Message {
        let message = Message::model(format!("Reminder: {}", reminder.message));
        self.log.push(message.clone());
        self.say(&format!("Reminder. {}", reminder.message));
        message
    }

    /// Process one line of user input
    pub async fn submit(&mut self, input: &str) -> TurnOutcome {
        self.submit_inner(input, None).await
    }

    /// Process user input with an attached picture
    ///
    /// Chat turns send the picture alongside the text, and `/look` answers
    /// about it instead of capturing a camera frame.
    pub async fn submit_with_image(&mut self, input: &str, image: Frame) -> TurnOutcome {
        self.submit_inner(input, Some(image)).await
    }

    async fn submit_inner(&mut self, input: &str, image: Option<Frame>) -> TurnOutcome {
        let input = input.trim();
        if input.is_empty() {
            return TurnOutcome::Ignored;
        }

        if let Some(speech) = &self.speech {
            speech.cancel();
        }
        let token = self.in_flight.begin();
        let checkpoint = self.log.len();

        let result = match Intent::parse(input) {
            Ok(intent) => self.run_intent(input, intent, image, &token).await,
            Err(e) => {
                self.log.push(Message::user(input));
                Err(e)
            }
        };
        self.in_flight.finish();

        match result {
            Ok(spoken) => {
                self.say(&spoken);
                self.log
                    .last()
                    .cloned()
                    .map_or(TurnOutcome::Ignored, TurnOutcome::Answered)
            }
            Err(Error::Aborted) => {
                tracing::info!(
                    discarded = self.log.len().saturating_sub(checkpoint),
                    "turn aborted; log restored"
                );
                self.log.truncate(checkpoint);
                TurnOutcome::Aborted
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                let text = format!("{ERROR_PREFIX} {e}");
                self.log.push(Message::model(text.clone()));
                self.say(&text);
                TurnOutcome::Failed(text)
            }
        }
    }

    /// Run the flow for `intent`, returning the text to speak
    async fn run_intent(
        &mut self,
        input: &str,
        intent: Intent,
        image: Option<Frame>,
        token: &CancellationToken,
    ) -> Result<String> {
        match (intent, image) {
            (Intent::Chat(text), None) => {
                self.log.push(Message::user(text));
                self.run_chat(token).await
            }
            (Intent::Chat(text), Some(frame)) => {
                self.log.push(Message::user(Content::Parts(vec![
                    ContentPart::Text { text },
                    frame.to_content_part(),
                ])));
                self.run_chat(token).await
            }
            (Intent::Look(question), image) => self.run_look(question, image, token).await,
            (Intent::Search(_) | Intent::Imagine(_), Some(_)) => {
                self.log.push(Message::user(input));
                Err(Error::InvalidInput(
                    "an image can only accompany a chat message or /look".to_string(),
                ))
            }
            (Intent::Search(query), None) => {
                self.log.push(Message::user(input));
                self.run_search(&query, token).await
            }
            (Intent::Imagine(prompt), None) => {
                self.log.push(Message::user(input));
                self.run_imagine(&prompt, token).await
            }
        }
    }

    async fn run_chat(&mut self, token: &CancellationToken) -> Result<String> {
        let speech = self.speech.as_ref().filter(|_| self.audio_enabled);
        let on_event = move |event: TurnEvent| match event {
            TurnEvent::ToolStart { name } => {
                tracing::info!(tool = %name, "tool started");
                if let Some(speech) = speech {
                    speech.speak(TOOL_NOTICE);
                }
            }
            TurnEvent::ToolFinished { name, ok } => {
                tracing::debug!(tool = %name, ok, "tool finished");
            }
        };

        self.runner.run(&mut self.log, token, &on_event).await
    }

    async fn run_look(
        &mut self,
        question: String,
        attached: Option<Frame>,
        token: &CancellationToken,
    ) -> Result<String> {
        let question = if question.is_empty() {
            DEFAULT_LOOK_PROMPT.to_string()
        } else {
            question
        };

        if let Some(frame) = attached {
            self.log.push(Message::user(Content::Parts(vec![
                ContentPart::Text { text: question },
                frame.to_content_part(),
            ])));
            return self.run_chat(token).await;
        }

        let Some(source) = self.vision.clone() else {
            self.log.push(Message::user(question));
            return Err(Error::Vision("no camera configured".to_string()));
        };

        let frame = match cancellable(token, source.capture()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.log.push(Message::user(question));
                return Err(Error::Vision(NO_FRAME_MESSAGE.to_string()));
            }
            Err(Error::Aborted) => return Err(Error::Aborted),
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed");
                self.log.push(Message::user(question));
                return Err(Error::Vision(NO_FRAME_MESSAGE.to_string()));
            }
        };

        self.log.push(Message::user(Content::Parts(vec![
            ContentPart::Text { text: question },
            frame.to_content_part(),
        ])));
        self.run_chat(token).await
    }

    async fn run_search(&mut self, query: &str, token: &CancellationToken) -> Result<String> {
        if query.is_empty() {
            return Err(Error::InvalidInput("/search needs a query".to_string()));
        }

        let model = Arc::clone(self.runner.model());
        let answer = cancellable(token, model.search(query)).await?;
        if answer.text.trim().is_empty() {
            return Err(Error::Model("search returned no answer".to_string()));
        }

        tracing::info!(sources = answer.sources.len(), "search answered");
        self.log
            .push(Message::model(answer.text).with_sources(answer.sources));
        Ok(SEARCH_NOTICE.to_string())
    }

    async fn run_imagine(&mut self, prompt: &str, token: &CancellationToken) -> Result<String> {
        if prompt.is_empty() {
            return Err(Error::InvalidInput("/imagine needs a prompt".to_string()));
        }

        let placeholder_at = self.log.len();
        let placeholder =
            Message::model(format!("Generating an image of: {prompt}")).with_image(String::new());
        let id = placeholder.id.clone();
        self.log.push(placeholder);

        let images = Arc::clone(&self.images);
        match cancellable(token, images.generate_image(prompt)).await {
            Ok(image) => {
                self.log.fill_image(&id, image.data_url())?;
                Ok(IMAGE_NOTICE.to_string())
            }
            Err(e) => {
                if !e.is_aborted() {
                    self.log.truncate(placeholder_at);
                }
                Err(e)
            }
        }
    }

    fn say(&self, text: &str) {
        if !self.audio_enabled {
            return;
        }
        if let Some(speech) = &self.speech {
            speech.speak(text);
        }
    }
}

/// Race `fut` against `token`
async fn cancellable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        () = token.cancelled() => Err(Error::Aborted),
        r = fut => r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_handle_cancels_current_token() {
        let handle = AbortHandle::default();
        assert!(!handle.abort());

        let token = handle.begin();
        assert!(handle.is_active());
        assert!(handle.abort());
        assert!(token.is_cancelled());
        assert!(!handle.is_active());
    }

    #[test]
    fn beginning_a_turn_cancels_the_previous_one() {
        let handle = AbortHandle::default();
        let first = handle.begin();
        let second = handle.begin();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        handle.finish();
        assert!(!handle.is_active());
    }
}
