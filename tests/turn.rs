//! Conversation turn integration tests
//!
//! The model, image backend, tools, and camera are scripted so every flow
//! runs without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use cozmo_assistant::agent::ERROR_PREFIX;
use cozmo_assistant::chat::{Content, ContentPart, HistoryStore, MemoryHistoryStore, SourceCitation};
use cozmo_assistant::llm::{
    FunctionDeclaration, GenerateContentResponse, GeneratedImage, GroundedAnswer, WireContent,
};
use cozmo_assistant::tools::Reminder;
use cozmo_assistant::vision::{Frame, FrameSource};
use cozmo_assistant::voice::{SpeechQueue, Speaker};
use cozmo_assistant::{
    Assistant, ChatModel, ConversationLog, Error, ImageGenerator, Result, Role, Tool,
    ToolRegistry, TurnOutcome, TurnRunner,
};

/// Model that replays canned responses and records every request
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<GenerateContentResponse>>,
    requests: Mutex<Vec<Vec<WireContent>>>,
    searches: Mutex<Vec<String>>,
    search_answer: Option<GroundedAnswer>,
    stall: bool,
    stall_search: bool,
}

impl ScriptedModel {
    fn replying(replies: Vec<GenerateContentResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<Vec<WireContent>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(
        &self,
        contents: &[WireContent],
        _tools: &[FunctionDeclaration],
    ) -> Result<GenerateContentResponse> {
        self.requests.lock().unwrap().push(contents.to_vec());
        if self.stall {
            std::future::pending::<()>().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Model("script exhausted".to_string()))
    }

    async fn search(&self, prompt: &str) -> Result<GroundedAnswer> {
        self.searches.lock().unwrap().push(prompt.to_string());
        if self.stall_search {
            std::future::pending::<()>().await;
        }
        self.search_answer
            .clone()
            .ok_or_else(|| Error::Model("no search scripted".to_string()))
    }
}

struct FakeImages {
    fail: bool,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage> {
        if self.fail {
            return Err(Error::Image("backend unavailable".to_string()));
        }
        Ok(GeneratedImage {
            mime_type: "image/png".to_string(),
            data: "iVBORw0KGgo=".to_string(),
        })
    }
}

/// Image backend that never answers
#[derive(Default)]
struct StalledImages {
    started: AtomicBool,
}

#[async_trait]
impl ImageGenerator for StalledImages {
    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage> {
        self.started.store(true, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Records finished utterances; each one takes `delay` to say
#[derive(Default)]
struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
    started: AtomicUsize,
    delay: Duration,
}

impl RecordingSpeaker {
    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    async fn wait_started(&self) {
        while self.started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Tool that records its arguments
struct RecordingTool {
    name: &'static str,
    calls: Arc<Mutex<Vec<Value>>>,
    behavior: Behavior,
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Stall,
}

impl RecordingTool {
    fn new(name: &'static str, behavior: Behavior) -> (Self, Arc<Mutex<Vec<Value>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name,
                calls: Arc::clone(&calls),
                behavior,
            },
            calls,
        )
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.to_string(),
            description: "test tool".to_string(),
            parameters: None,
        }
    }

    async fn invoke(&self, args: &Value) -> Result<Value> {
        self.calls.lock().unwrap().push(args.clone());
        match self.behavior {
            Behavior::Succeed => Ok(json!({ "ok": true, "tool": self.name })),
            Behavior::Fail => Err(Error::Tool("sensor offline".to_string())),
            Behavior::Stall => std::future::pending().await,
        }
    }
}

struct StaticCamera(Option<Frame>);

#[async_trait]
impl FrameSource for StaticCamera {
    async fn capture(&self) -> Result<Option<Frame>> {
        Ok(self.0.clone())
    }
}

fn text_reply(text: &str) -> GenerateContentResponse {
    serde_json::from_value(json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    }))
    .unwrap()
}

fn call_reply(calls: &[(&str, Value)]) -> GenerateContentResponse {
    let parts: Vec<Value> = calls
        .iter()
        .map(|(name, args)| json!({ "functionCall": { "name": name, "args": args } }))
        .collect();
    serde_json::from_value(json!({
        "candidates": [{ "content": { "role": "model", "parts": parts } }]
    }))
    .unwrap()
}

fn assistant_with(model: &Arc<ScriptedModel>, tools: ToolRegistry) -> Assistant {
    let runner = TurnRunner::new(Arc::clone(model) as Arc<dyn ChatModel>, tools);
    Assistant::new(
        ConversationLog::new(),
        runner,
        Arc::new(FakeImages { fail: false }),
    )
}

fn speaking_assistant(
    model: &Arc<ScriptedModel>,
    tools: ToolRegistry,
    speaker: &Arc<RecordingSpeaker>,
) -> Assistant {
    assistant_with(model, tools)
        .with_speech(SpeechQueue::spawn(Arc::clone(speaker) as Arc<dyn Speaker>))
}

fn jpeg_frame() -> Frame {
    Frame {
        mime_type: "image/jpeg".to_string(),
        data: vec![0xff, 0xd8, 0xff],
    }
}

#[tokio::test]
async fn test_plain_chat_appends_user_and_model() {
    let model = Arc::new(ScriptedModel::replying(vec![text_reply("Hello, Operator.")]));
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant.submit("hi there").await;

    let TurnOutcome::Answered(message) = outcome else {
        panic!("expected an answer, got {outcome:?}");
    };
    assert_eq!(message.content.text(), "Hello, Operator.");

    let log = assistant.log().messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[0].content.text(), "hi there");
    assert_eq!(log[1].role, Role::Model);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let model = Arc::new(ScriptedModel::default());
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    assert_eq!(assistant.submit("   ").await, TurnOutcome::Ignored);
    assert!(assistant.log().is_empty());
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn test_tool_round_trip_runs_one_call_per_round() {
    let model = Arc::new(ScriptedModel::replying(vec![
        call_reply(&[
            ("get_location", json!({})),
            ("get_device_status", json!({})),
        ]),
        text_reply("You are in Paris."),
    ]));
    let (location, location_calls) = RecordingTool::new("get_location", Behavior::Succeed);
    let (status, status_calls) = RecordingTool::new("get_device_status", Behavior::Succeed);
    let tools = ToolRegistry::new()
        .with(Arc::new(location))
        .with(Arc::new(status));
    let mut assistant = assistant_with(&model, tools);

    let outcome = assistant.submit("where am I?").await;
    assert!(matches!(outcome, TurnOutcome::Answered(_)));

    assert_eq!(location_calls.lock().unwrap().len(), 1);
    assert!(status_calls.lock().unwrap().is_empty());

    let log = assistant.log().messages();
    assert_eq!(log.len(), 4);
    // Every issued call is recorded; only the first ran
    let recorded_calls = log[1].tool_calls.as_ref().unwrap();
    assert_eq!(recorded_calls.len(), 2);
    assert_eq!(recorded_calls[0].name, "get_location");
    assert_eq!(log[2].tool_results.as_ref().unwrap().len(), 1);
    assert_eq!(log[2].tool_results.as_ref().unwrap()[0].output["tool"], "get_location");
    assert_eq!(log[3].content.text(), "You are in Paris.");

    // Second round carries the call and its result back to the model
    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second.len(), 3);
    assert!(second[2].parts[0].function_response.is_some());
}

#[tokio::test]
async fn test_tool_failure_becomes_error_message() {
    let model = Arc::new(ScriptedModel::replying(vec![call_reply(&[(
        "get_location",
        json!({}),
    )])]));
    let (tool, _) = RecordingTool::new("get_location", Behavior::Fail);
    let mut assistant = assistant_with(&model, ToolRegistry::new().with(Arc::new(tool)));

    let outcome = assistant.submit("where am I?").await;

    let TurnOutcome::Failed(text) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(text.starts_with(ERROR_PREFIX));
    assert!(text.contains("sensor offline"));

    let log = assistant.log().messages();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|m| !m.is_tool_entry()));
    assert_eq!(log[1].content.text(), text);
}

#[tokio::test]
async fn test_round_limit_fails_the_turn() {
    let replies = (0..5)
        .map(|_| call_reply(&[("get_location", json!({}))]))
        .collect();
    let model = Arc::new(ScriptedModel::replying(replies));
    let (tool, calls) = RecordingTool::new("get_location", Behavior::Succeed);
    let runner = TurnRunner::new(
        Arc::clone(&model) as Arc<dyn ChatModel>,
        ToolRegistry::new().with(Arc::new(tool)),
    )
    .with_max_tool_rounds(2);
    let mut assistant = Assistant::new(
        ConversationLog::new(),
        runner,
        Arc::new(FakeImages { fail: false }),
    );

    let outcome = assistant.submit("loop forever").await;

    assert!(matches!(outcome, TurnOutcome::Failed(ref t) if t.contains("gave up after 2 tool rounds")));
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_model_text_is_an_error() {
    let model = Arc::new(ScriptedModel::replying(vec![text_reply("  ")]));
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant.submit("say nothing").await;

    assert!(matches!(outcome, TurnOutcome::Failed(ref t) if t.contains("model returned no text")));
}

#[tokio::test]
async fn test_abort_while_model_is_thinking_restores_log() {
    let model = Arc::new(ScriptedModel::stalled());
    let mut assistant = assistant_with(&model, ToolRegistry::new());
    let handle = assistant.abort_handle();

    let aborter = async {
        while !handle.is_active() {
            tokio::task::yield_now().await;
        }
        assert!(handle.abort());
    };
    let (outcome, ()) = tokio::join!(assistant.submit("take your time"), aborter);

    assert_eq!(outcome, TurnOutcome::Aborted);
    assert!(assistant.log().is_empty());
    assert!(!handle.is_active());
    assert!(!handle.abort());
}

#[tokio::test]
async fn test_abort_during_tool_leaves_no_partial_entries() {
    let model = Arc::new(ScriptedModel::replying(vec![
        text_reply("Earlier answer."),
        call_reply(&[("get_location", json!({}))]),
    ]));
    let (tool, calls) = RecordingTool::new("get_location", Behavior::Stall);
    let mut assistant = assistant_with(&model, ToolRegistry::new().with(Arc::new(tool)));

    assistant.submit("first question").await;
    let before = assistant.log().messages().to_vec();

    let handle = assistant.abort_handle();
    let aborter = async {
        while calls.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        handle.abort();
    };
    let (outcome, ()) = tokio::join!(assistant.submit("where am I?"), aborter);

    assert_eq!(outcome, TurnOutcome::Aborted);
    assert_eq!(assistant.log().messages(), before.as_slice());
}

#[tokio::test]
async fn test_search_records_sources() {
    let model = Arc::new(ScriptedModel {
        search_answer: Some(GroundedAnswer {
            text: "Rust 1.88 shipped let chains.".to_string(),
            sources: vec![SourceCitation {
                uri: "https://blog.rust-lang.org".to_string(),
                title: "Rust Blog".to_string(),
            }],
        }),
        ..ScriptedModel::default()
    });
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant.submit("/search latest rust release").await;

    let TurnOutcome::Answered(message) = outcome else {
        panic!("expected an answer, got {outcome:?}");
    };
    assert_eq!(message.content.text(), "Rust 1.88 shipped let chains.");
    assert_eq!(message.sources.as_ref().unwrap()[0].title, "Rust Blog");
    assert_eq!(
        assistant.log().messages()[0].content.text(),
        "/search latest rust release"
    );
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn test_search_without_query_is_rejected() {
    let model = Arc::new(ScriptedModel::default());
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant.submit("/search").await;

    assert!(matches!(outcome, TurnOutcome::Failed(ref t) if t.contains("needs a query")));
}

#[tokio::test]
async fn test_imagine_fills_placeholder_with_data_url() {
    let model = Arc::new(ScriptedModel::default());
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant.submit("/imagine a robot on the moon").await;

    let TurnOutcome::Answered(message) = outcome else {
        panic!("expected an answer, got {outcome:?}");
    };
    assert_eq!(
        message.image_url.as_deref(),
        Some("data:image/png;base64,iVBORw0KGgo=")
    );
    assert_eq!(assistant.log().len(), 2);
}

#[tokio::test]
async fn test_failed_imagine_drops_placeholder() {
    let model = Arc::new(ScriptedModel::default());
    let runner = TurnRunner::new(Arc::clone(&model) as Arc<dyn ChatModel>, ToolRegistry::new());
    let mut assistant = Assistant::new(
        ConversationLog::new(),
        runner,
        Arc::new(FakeImages { fail: true }),
    );

    let outcome = assistant.submit("/imagine a robot").await;

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    let log = assistant.log().messages();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|m| m.image_url.is_none()));
}

#[tokio::test]
async fn test_unknown_command_is_reported() {
    let model = Arc::new(ScriptedModel::default());
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant.submit("/teleport home").await;

    assert!(matches!(outcome, TurnOutcome::Failed(ref t) if t.contains("unknown command /teleport")));
    assert_eq!(assistant.log().messages()[0].content.text(), "/teleport home");
}

#[tokio::test]
async fn test_look_sends_frame_to_model() {
    let model = Arc::new(ScriptedModel::replying(vec![text_reply("A coffee mug.")]));
    let camera = StaticCamera(Some(Frame {
        mime_type: "image/jpeg".to_string(),
        data: vec![0xff, 0xd8, 0xff],
    }));
    let mut assistant =
        assistant_with(&model, ToolRegistry::new()).with_vision(Arc::new(camera));

    let outcome = assistant.submit("/look what is on my desk?").await;
    assert!(matches!(outcome, TurnOutcome::Answered(_)));

    let user = &assistant.log().messages()[0];
    let Content::Parts(parts) = &user.content else {
        panic!("expected text and image parts");
    };
    assert!(matches!(&parts[0], ContentPart::Text { text } if text == "what is on my desk?"));
    assert!(matches!(&parts[1], ContentPart::Image { mime_type, .. } if mime_type == "image/jpeg"));

    let request = &model.requests()[0];
    let last = request.last().unwrap();
    assert_eq!(last.parts.len(), 2);
    assert!(last.parts[1].inline_data.is_some());
}

#[tokio::test]
async fn test_look_without_frame_reports_vision_failure() {
    let model = Arc::new(ScriptedModel::default());
    let mut assistant =
        assistant_with(&model, ToolRegistry::new()).with_vision(Arc::new(StaticCamera(None)));

    let outcome = assistant.submit("/look").await;

    assert!(matches!(
        outcome,
        TurnOutcome::Failed(ref t) if t.contains("Could not capture frame from vision system.")
    ));
    assert_eq!(
        assistant.log().messages()[0].content.text(),
        "Describe what you see."
    );
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn test_history_survives_reload() {
    let store = Arc::new(MemoryHistoryStore::new());
    let model = Arc::new(ScriptedModel::replying(vec![text_reply("Noted.")]));
    let runner = TurnRunner::new(Arc::clone(&model) as Arc<dyn ChatModel>, ToolRegistry::new());
    let mut assistant = Assistant::new(
        ConversationLog::load(Arc::clone(&store) as Arc<dyn HistoryStore>),
        runner,
        Arc::new(FakeImages { fail: false }),
    );

    assistant.submit("remember this").await;
    assistant.deliver_reminder(&Reminder {
        message: "stretch".to_string(),
    });

    let reloaded = ConversationLog::load(Arc::clone(&store) as Arc<dyn HistoryStore>);
    assert_eq!(reloaded.messages(), assistant.log().messages());
    assert_eq!(reloaded.last().unwrap().content.text(), "Reminder: stretch");

    assistant.clear_history();
    assert!(ConversationLog::load(store).is_empty());
}

#[tokio::test]
async fn test_abort_during_search_restores_log() {
    let model = Arc::new(ScriptedModel {
        replies: Mutex::new(vec![text_reply("Earlier answer.")].into()),
        stall_search: true,
        ..ScriptedModel::default()
    });
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    assistant.submit("first question").await;
    let before = assistant.log().messages().to_vec();

    let handle = assistant.abort_handle();
    let aborter = async {
        while model.searches.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(handle.abort());
    };
    let (outcome, ()) = tokio::join!(assistant.submit("/search rust news"), aborter);

    assert_eq!(outcome, TurnOutcome::Aborted);
    assert_eq!(assistant.log().messages(), before.as_slice());
}

#[tokio::test]
async fn test_abort_during_imagine_removes_placeholder() {
    let model = Arc::new(ScriptedModel::replying(vec![text_reply("Earlier answer.")]));
    let images = Arc::new(StalledImages::default());
    let runner = TurnRunner::new(Arc::clone(&model) as Arc<dyn ChatModel>, ToolRegistry::new());
    let mut assistant = Assistant::new(
        ConversationLog::new(),
        runner,
        Arc::clone(&images) as Arc<dyn ImageGenerator>,
    );

    assistant.submit("first question").await;
    let before = assistant.log().messages().to_vec();

    let handle = assistant.abort_handle();
    let aborter = async {
        while !images.started.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        assert!(handle.abort());
    };
    let (outcome, ()) = tokio::join!(assistant.submit("/imagine a castle"), aborter);

    assert_eq!(outcome, TurnOutcome::Aborted);
    assert_eq!(assistant.log().messages(), before.as_slice());
    assert!(assistant.log().messages().iter().all(|m| m.image_url.is_none()));
}

#[tokio::test]
async fn test_tool_notice_and_answer_are_spoken() {
    let model = Arc::new(ScriptedModel::replying(vec![
        call_reply(&[("get_location", json!({}))]),
        text_reply("You are **home**. Stay safe."),
    ]));
    let (tool, _) = RecordingTool::new("get_location", Behavior::Succeed);
    let speaker = RecordingSpeaker::with_delay(Duration::ZERO);
    let mut assistant =
        speaking_assistant(&model, ToolRegistry::new().with(Arc::new(tool)), &speaker);

    let outcome = assistant.submit("where am I?").await;
    assert!(matches!(outcome, TurnOutcome::Answered(_)));
    assistant.finish_speaking().await;

    assert_eq!(
        speaker.spoken(),
        ["Executing command.", "You are home.", "Stay safe."]
    );
}

#[tokio::test]
async fn test_failure_is_spoken() {
    let model = Arc::new(ScriptedModel::default());
    let speaker = RecordingSpeaker::with_delay(Duration::ZERO);
    let mut assistant = speaking_assistant(&model, ToolRegistry::new(), &speaker);

    let outcome = assistant.submit("/teleport home").await;
    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assistant.finish_speaking().await;

    let spoken = speaker.spoken();
    assert_eq!(spoken[0], "Apologies, Operator.");
    assert!(spoken.iter().any(|s| s.contains("/teleport")));
}

#[tokio::test]
async fn test_new_submission_silences_previous_reply() {
    let model = Arc::new(ScriptedModel::replying(vec![
        text_reply("First answer. It goes on for a while."),
        text_reply("Second answer."),
    ]));
    let speaker = RecordingSpeaker::with_delay(Duration::from_millis(300));
    let mut assistant = speaking_assistant(&model, ToolRegistry::new(), &speaker);

    assistant.submit("first").await;
    speaker.wait_started().await;

    assistant.submit("second").await;
    assistant.finish_speaking().await;

    assert_eq!(speaker.spoken(), ["Second answer."]);
}

#[tokio::test]
async fn test_interrupt_aborts_turn_and_silences_speech() {
    let model = Arc::new(ScriptedModel::replying(vec![call_reply(&[(
        "get_location",
        json!({}),
    )])]));
    let (tool, calls) = RecordingTool::new("get_location", Behavior::Stall);
    let speaker = RecordingSpeaker::with_delay(Duration::from_secs(5));
    let mut assistant =
        speaking_assistant(&model, ToolRegistry::new().with(Arc::new(tool)), &speaker);

    let handle = assistant.abort_handle();
    let interrupter = async {
        // The tool notice is being spoken while the tool hangs
        speaker.wait_started().await;
        while calls.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(handle.interrupt());
    };
    let (outcome, ()) = tokio::join!(assistant.submit("where am I?"), interrupter);

    assert_eq!(outcome, TurnOutcome::Aborted);
    assert!(assistant.log().is_empty());

    tokio::time::timeout(Duration::from_secs(1), assistant.finish_speaking())
        .await
        .unwrap();
    assert!(speaker.spoken().is_empty());
}

#[tokio::test]
async fn test_interrupt_stops_reply_being_spoken() {
    let model = Arc::new(ScriptedModel::replying(vec![text_reply(
        "A long answer. With several sentences.",
    )]));
    let speaker = RecordingSpeaker::with_delay(Duration::from_secs(5));
    let mut assistant = speaking_assistant(&model, ToolRegistry::new(), &speaker);

    assistant.submit("tell me everything").await;
    speaker.wait_started().await;
    assistant.interrupt();

    tokio::time::timeout(Duration::from_secs(1), assistant.finish_speaking())
        .await
        .unwrap();
    assert!(speaker.spoken().is_empty());
    assert_eq!(assistant.log().len(), 2);
}

#[tokio::test]
async fn test_muting_silences_current_utterance() {
    let model = Arc::new(ScriptedModel::replying(vec![
        text_reply("Slow answer."),
        text_reply("Muted answer."),
        text_reply("Loud answer."),
    ]));
    let speaker = RecordingSpeaker::with_delay(Duration::from_millis(500));
    let mut assistant = speaking_assistant(&model, ToolRegistry::new(), &speaker);

    assistant.submit("one").await;
    speaker.wait_started().await;
    assistant.set_audio_enabled(false);
    assert!(!assistant.audio_enabled());

    tokio::time::timeout(Duration::from_millis(200), assistant.finish_speaking())
        .await
        .unwrap();
    assistant.submit("two").await;
    assistant.finish_speaking().await;
    assert!(speaker.spoken().is_empty());

    assistant.set_audio_enabled(true);
    assistant.submit("three").await;
    assistant.finish_speaking().await;
    assert_eq!(speaker.spoken(), ["Loud answer."]);
}

#[tokio::test]
async fn test_chat_with_image_sends_picture() {
    let model = Arc::new(ScriptedModel::replying(vec![text_reply("A tiny JPEG.")]));
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant
        .submit_with_image("what is this?", jpeg_frame())
        .await;
    assert!(matches!(outcome, TurnOutcome::Answered(_)));

    let Content::Parts(parts) = &assistant.log().messages()[0].content else {
        panic!("expected text and image parts");
    };
    assert!(matches!(&parts[0], ContentPart::Text { text } if text == "what is this?"));
    assert!(matches!(&parts[1], ContentPart::Image { mime_type, .. } if mime_type == "image/jpeg"));

    let last = model.requests()[0].last().cloned().unwrap();
    assert!(last.parts[1].inline_data.is_some());
}

#[tokio::test]
async fn test_look_uses_attached_image_without_camera() {
    let model = Arc::new(ScriptedModel::replying(vec![text_reply("A tiny JPEG.")]));
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant.submit_with_image("/look", jpeg_frame()).await;
    assert!(matches!(outcome, TurnOutcome::Answered(_)));

    let user = &assistant.log().messages()[0];
    assert_eq!(user.content.text(), "Describe what you see.");
    let last = model.requests()[0].last().cloned().unwrap();
    assert!(last.parts[1].inline_data.is_some());
}

#[tokio::test]
async fn test_image_with_search_is_rejected() {
    let model = Arc::new(ScriptedModel::default());
    let mut assistant = assistant_with(&model, ToolRegistry::new());

    let outcome = assistant
        .submit_with_image("/search what is this", jpeg_frame())
        .await;

    assert!(matches!(outcome, TurnOutcome::Failed(ref t) if t.contains("can only accompany")));
    assert!(model.searches.lock().unwrap().is_empty());
}
