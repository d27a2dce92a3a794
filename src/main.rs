use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use base64::Engine as _;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cozmo_assistant::api::ApiServerBuilder;
use cozmo_assistant::chat::FileHistoryStore;
use cozmo_assistant::llm::{PollinationsImages, SYSTEM_PROMPT};
use cozmo_assistant::security::TokenIssuer;
use cozmo_assistant::tools::{
    DeviceStatusTool, GeoLocator, LocationTool, OpenWebsiteTool, Reminder, ReminderTool,
    SystemOpener, SystemProbe,
};
use cozmo_assistant::vision::{CommandFrameSource, FrameSource, StillFrameSource};
use cozmo_assistant::voice::{ConsoleSpeaker, SpeechQueue, Speaker, TextToSpeech, TtsSpeaker};
use cozmo_assistant::{
    Assistant, Config, ConversationLog, GeminiClient, Message, Role, ToolRegistry, TurnOutcome,
    TurnRunner, db,
};

/// Cozmo - voice-enabled AI chat assistant
#[derive(Parser)]
#[command(name = "cozmo", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable spoken output
    #[arg(long, env = "COZMO_DISABLE_VOICE", global = true)]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat session (default)
    Chat,
    /// Run a single turn and print the reply
    Ask {
        /// What to say; slash commands such as `/search` work here too
        text: String,
        /// Attach this image to the message; `/look` uses it instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Run the account backend
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the saved conversation
    History {
        /// Delete it instead
        #[arg(long)]
        clear: bool,
    },
    /// Speak a sentence through the speech queue
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello, Operator. All systems are functioning normally.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,cozmo_assistant=info",
        1 => "info,cozmo_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.disable_voice)?;
    tracing::debug!(data_dir = %config.data_dir.display(), "loaded configuration");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&config).await,
        Command::Ask { text, image } => ask(&config, &text, image).await,
        Command::Serve { port } => serve(&config, port).await,
        Command::History { clear } => history(&config, clear),
        Command::TestTts { text } => test_tts(&config, &text).await,
    }
}

/// Interactive read-eval-print loop
async fn chat(config: &Config) -> anyhow::Result<()> {
    let (mut assistant, mut reminders) = build_assistant(config)?;

    let quit = CancellationToken::new();
    spawn_interrupt_watcher(&assistant, quit.clone());

    println!("Cozmo online. Type :help for commands, Ctrl-C to interrupt, Ctrl-D to exit.");
    if !assistant.log().is_empty() {
        println!("({} messages restored from history)", assistant.log().len());
    }
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = quit.cancelled() => break,
            Some(reminder) = reminders.recv() => {
                println!();
                print_message(config, &assistant.deliver_reminder(&reminder));
                prompt();
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    ":quit" | ":exit" => break,
                    ":help" => print_help(),
                    ":clear" => {
                        assistant.clear_history();
                        println!("History cleared.");
                    }
                    ":mute" => assistant.set_audio_enabled(false),
                    ":unmute" => assistant.set_audio_enabled(true),
                    ":stop" => assistant.interrupt(),
                    input => {
                        let before = assistant.log().len();
                        let outcome = assistant.submit(input).await;
                        report(config, &assistant, before, &outcome);
                    }
                }
                prompt();
            }
        }
    }

    println!();
    Ok(())
}

/// One turn, then exit once speech has drained
async fn ask(config: &Config, text: &str, image: Option<PathBuf>) -> anyhow::Result<()> {
    let attachment = match image {
        Some(path) => {
            let frame = StillFrameSource::new(&path).capture().await?;
            let Some(frame) = frame else {
                anyhow::bail!("could not read image {}", path.display());
            };
            Some(frame)
        }
        None => None,
    };
    let (mut assistant, _reminders) = build_assistant(config)?;

    let quit = CancellationToken::new();
    spawn_interrupt_watcher(&assistant, quit.clone());

    let before = assistant.log().len();
    let outcome = match attachment {
        Some(frame) => assistant.submit_with_image(text, frame).await,
        None => assistant.submit(text).await,
    };
    report(config, &assistant, before, &outcome);

    tokio::select! {
        () = assistant.finish_speaking() => {}
        () = quit.cancelled() => {}
    }

    if matches!(outcome, TurnOutcome::Failed(_)) {
        anyhow::bail!("turn failed");
    }
    Ok(())
}

/// Run the HTTP backend until Ctrl-C
async fn serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let pool = db::init(&config.server.database_path)?;
    let tokens = TokenIssuer::new(config.jwt_secret()?)?.with_ttl(config.server.token_ttl);

    let server = ApiServerBuilder::new(pool, tokens)
        .host(config.server.host.clone())
        .port(port.unwrap_or(config.server.port))
        .build();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
        }
        signal.cancel();
    });

    server.run(shutdown).await?;
    Ok(())
}

/// Print or delete the saved conversation
fn history(config: &Config, clear: bool) -> anyhow::Result<()> {
    let mut log = ConversationLog::load(Arc::new(FileHistoryStore::new(config.history_dir())));

    if clear {
        log.clear();
        println!("Conversation history cleared.");
        return Ok(());
    }

    if log.is_empty() {
        println!("No saved conversation.");
        return Ok(());
    }

    for message in log.messages() {
        if message.is_tool_entry() {
            continue;
        }
        match message.role {
            Role::User => println!("you> {}", message.content.text()),
            Role::Model => print_message(config, message),
        }
    }
    Ok(())
}

/// Speak through the same path replies use
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let queue = SpeechQueue::spawn(build_speaker(config)?);
    println!("Speaking: \"{text}\"");
    queue.speak(text);
    queue.wait_idle().await;
    println!("If you heard the speech, TTS is working!");
    Ok(())
}

fn build_assistant(
    config: &Config,
) -> anyhow::Result<(Assistant, mpsc::UnboundedReceiver<Reminder>)> {
    let model = GeminiClient::new(config.gemini_api_key()?.to_string())?
        .with_model(config.llm.model.clone())
        .with_base_url(config.llm.base_url.clone())
        .with_system_prompt(SYSTEM_PROMPT);

    let locator = match config.tools.location {
        Some((latitude, longitude)) => GeoLocator::Fixed {
            latitude,
            longitude,
        },
        None => GeoLocator::ip_lookup(config.tools.geo_url.clone()),
    };
    let (reminder_tool, reminders) = ReminderTool::new();

    let tools = ToolRegistry::new()
        .with(Arc::new(DeviceStatusTool::new(Arc::new(SystemProbe::new(
            config.tools.probe_addr.clone(),
        )))))
        .with(Arc::new(LocationTool::new(locator)))
        .with(Arc::new(reminder_tool))
        .with(Arc::new(OpenWebsiteTool::new(Arc::new(SystemOpener))));
    tracing::debug!(tools = ?tools.names(), "tools registered");

    let runner = TurnRunner::new(Arc::new(model), tools)
        .with_max_tool_rounds(config.llm.max_tool_rounds);
    let log = ConversationLog::load(Arc::new(FileHistoryStore::new(config.history_dir())));
    let images = Arc::new(PollinationsImages::new(config.image.base_url.clone()));

    let mut assistant = Assistant::new(log, runner, images);

    if config.vision.enabled {
        let source: Arc<dyn FrameSource> = match &config.vision.still_path {
            Some(path) => Arc::new(StillFrameSource::new(path.clone())),
            None => Arc::new(
                CommandFrameSource::new(&config.vision.capture_command)?
                    .with_timeout(config.vision.timeout),
            ),
        };
        assistant = assistant.with_vision(source);
    }

    if config.voice.enabled {
        assistant = assistant.with_speech(SpeechQueue::spawn(build_speaker(config)?));
    }

    Ok((assistant, reminders))
}

/// TTS when a provider key is configured, otherwise spoken lines go to the console
fn build_speaker(config: &Config) -> anyhow::Result<Arc<dyn Speaker>> {
    let Some(key) = config.voice.api_key() else {
        tracing::warn!(
            provider = ?config.voice.provider,
            "no TTS API key configured; speech will be printed"
        );
        return Ok(Arc::new(ConsoleSpeaker));
    };

    let tts = TextToSpeech::new(
        config.voice.provider,
        key.to_string(),
        config.voice.tts_voice.clone(),
        config.voice.tts_model.clone(),
        config.voice.tts_speed,
    )?;

    match TtsSpeaker::new(tts) {
        Ok(speaker) => Ok(Arc::new(speaker)),
        Err(e) => {
            tracing::warn!(error = %e, "no audio output; speech will be printed");
            Ok(Arc::new(ConsoleSpeaker))
        }
    }
}

/// Ctrl-C aborts the in-flight turn; with nothing in flight it quits
fn spawn_interrupt_watcher(assistant: &Assistant, quit: CancellationToken) {
    let abort = assistant.abort_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if abort.interrupt() {
                tracing::debug!("turn aborted by Ctrl-C");
            } else {
                quit.cancel();
                break;
            }
        }
    });
}

/// Print what a turn added to the log
fn report(config: &Config, assistant: &Assistant, before: usize, outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Ignored => {}
        TurnOutcome::Aborted => println!("(interrupted)"),
        TurnOutcome::Answered(_) | TurnOutcome::Failed(_) => {
            let added = assistant.log().messages().get(before..).unwrap_or_default();
            for message in added {
                if message.role == Role::Model && !message.is_tool_entry() {
                    print_message(config, message);
                }
            }
        }
    }
}

fn print_message(config: &Config, message: &Message) {
    let text = message.content.text();
    if !text.is_empty() {
        println!("cozmo> {text}");
    }

    if let Some(sources) = &message.sources {
        for (i, source) in sources.iter().enumerate() {
            println!("  [{}] {} <{}>", i + 1, source.title, source.uri);
        }
    }

    if let Some(url) = message.image_url.as_deref().filter(|u| !u.is_empty()) {
        match save_image(&config.data_dir.join("images"), &message.id, url) {
            Ok(path) => println!("  image saved to {}", path.display()),
            Err(e) => tracing::warn!(error = %e, "failed to save generated image"),
        }
    }
}

/// Write a `data:` image URL to `dir`, returning the file path
fn save_image(dir: &Path, id: &str, url: &str) -> anyhow::Result<PathBuf> {
    let (header, data) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(|| anyhow::anyhow!("not a base64 data URL"))?;

    let extension = match header {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "img",
    };

    let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{id}.{extension}"));
    if !path.exists() {
        std::fs::write(&path, bytes)?;
    }
    Ok(path)
}

fn prompt() {
    print!("you> ");
    let _ = std::io::stdout().flush();
}

fn print_help() {
    println!("  /search <query>   answer from the web, with sources");
    println!("  /imagine <prompt> generate an image");
    println!("  /look [question]  ask about what the camera sees");
    println!("  :stop             stop speaking and abandon the current reply");
    println!("  :mute / :unmute   toggle spoken replies");
    println!("  :clear            forget the conversation");
    println!("  :quit             exit");
}
