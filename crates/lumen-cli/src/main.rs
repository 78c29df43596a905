mod files;
mod logging;
mod prompt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lumen_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use lumen_contracts::composer::{AspectRatio, Composer, ImageSize, Submission};
use lumen_contracts::conversation::{Message, Role};
use lumen_contracts::models::{Capability, ModelRegistry};
use lumen_engine::{
    new_session_id, Conversation, CredentialProvider, CredentialState, EngineConfig, EventBus,
    SessionController, SessionError, TurnOutcome, TurnPipeline, TurnTicket,
};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::warn;

use crate::prompt::{InputClosed, InputLines, PromptCredentials};

#[derive(Debug, Parser)]
#[command(name = "lumen", version, about = "Structured-prompt image generation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session; every message becomes one generation turn.
    Chat(ChatArgs),
    /// A single turn: prints the structured payload and writes the image.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct EngineArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    size: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long, default_value = "lumen-out")]
    out: PathBuf,
    #[arg(long)]
    ratio: Option<String>,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, num_args = 1..)]
    attach: Vec<PathBuf>,
    #[arg(long)]
    ratio: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    engine: EngineArgs,
}

const PREVIEW_MAX_CHARS: usize = 96;

#[tokio::main]
async fn main() {
    logging::init();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lumen error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args).await?;
            Ok(0)
        }
        Command::Run(args) => run_once(args).await,
    }
}

fn build_session(args: &EngineArgs, input: InputLines) -> Result<SessionController> {
    let mut config = EngineConfig::from_env();
    let registry = ModelRegistry::default();
    if let Some(model) = args.text_model.as_deref() {
        config.reasoning_model = select_model(&registry, model, Capability::Reasoning)?;
    }
    if let Some(model) = args.image_model.as_deref() {
        config.image_model = select_model(&registry, model, Capability::Image)?;
    }
    if let Some(size) = args.size.as_deref() {
        config.image_size =
            ImageSize::from_hint(size).ok_or_else(|| anyhow!("unsupported image size: {size}"))?;
    }

    let credentials: Arc<dyn CredentialProvider> = Arc::new(PromptCredentials::new(input));
    let pipeline = TurnPipeline::gemini(&config, credentials.clone());
    let events = match &args.events {
        Some(path) => EventBus::with_log(new_session_id(), path),
        None => EventBus::new(new_session_id()),
    };
    Ok(SessionController::new(credentials, pipeline, events))
}

fn select_model(registry: &ModelRegistry, requested: &str, capability: Capability) -> Result<String> {
    let selection = registry.select(Some(requested), capability)?;
    if let Some(fallback) = &selection.fallback {
        println!("{fallback} Using {} ({}).", selection.model.label, selection.model.name);
    }
    Ok(selection.model.name)
}

fn initial_ratio(raw: Option<&str>) -> Result<AspectRatio> {
    let Some(raw) = raw else {
        return Ok(AspectRatio::default());
    };
    let (ratio, warning) =
        AspectRatio::snap(raw).ok_or_else(|| anyhow!("unsupported aspect ratio: {raw}"))?;
    if let Some(warning) = warning {
        warn!(requested = raw, snapped = %ratio, "{warning}");
    }
    Ok(ratio)
}

/// Blocks until a credential is connected. `false` when input closes first.
async fn connect_screen(session: &SessionController) -> Result<bool> {
    println!("Lumen needs a Gemini API key before it can generate images.");
    println!("Paste a key below, or set GEMINI_API_KEY and restart. Ctrl-D quits.");
    loop {
        match session.connect().await {
            Ok(_) => {
                println!("Connected.");
                return Ok(true);
            }
            Err(err) if err.is::<InputClosed>() => return Ok(false),
            Err(err) => println!("Connect failed: {err:#}"),
        }
    }
}

async fn run_chat(args: ChatArgs) -> Result<()> {
    let input = InputLines::stdin();
    let session = build_session(&args.engine, input.clone())?;
    let mut composer = Composer::new(initial_ratio(args.ratio.as_deref())?);
    let mut turns: JoinSet<()> = JoinSet::new();
    let printer = spawn_event_printer(session.events().subscribe());

    println!("Lumen chat started. Type /help for commands.");
    if session.initialize().await != CredentialState::Present && !connect_screen(&session).await? {
        printer.abort();
        return Ok(());
    }
    let conversation = session.conversation()?.clone();

    loop {
        while let Some(finished) = turns.try_join_next() {
            if let Err(err) = finished {
                warn!(error = %err, "turn task ended abnormally");
            }
        }
        if session.state() != CredentialState::Present && !connect_screen(&session).await? {
            break;
        }

        let line = match input.read_line("> ").await {
            Ok(line) => line,
            Err(err) if err.is::<InputClosed>() => break,
            Err(err) => return Err(err),
        };
        let intent = parse_intent(&line);
        match intent.action.as_str() {
            "noop" => {}
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            "set_aspect_ratio" => set_aspect_ratio(&mut composer, &intent),
            "set_image_size" => match intent.arg_str("size") {
                None => println!("Image size: {}", conversation.image_size()),
                Some(raw) => match ImageSize::from_hint(raw) {
                    Some(size) => {
                        conversation.set_image_size(size);
                        println!("Image size set to {size}");
                    }
                    None => println!("Unsupported image size: {raw} (use 1K, 2K or 4K)"),
                },
            },
            "set_text_model" => {
                let current = conversation.reasoning_model();
                let requested = intent.arg_str("model").unwrap_or(current.as_str()).to_string();
                match select_model(&ModelRegistry::default(), &requested, Capability::Reasoning) {
                    Ok(model) => {
                        conversation.set_reasoning_model(&model);
                        println!("Text model set to {model}");
                    }
                    Err(err) => println!("{err}"),
                }
            }
            "set_image_model" => {
                let current = conversation.image_model();
                let requested = intent.arg_str("model").unwrap_or(current.as_str()).to_string();
                match select_model(&ModelRegistry::default(), &requested, Capability::Image) {
                    Ok(model) => {
                        conversation.set_image_model(&model);
                        println!("Image model set to {model}");
                    }
                    Err(err) => println!("{err}"),
                }
            }
            "attach" => attach_files(&mut composer, &intent.arg_list("paths")),
            "detach" => {
                let removed = composer.clear_media();
                println!("Removed {removed} attachment(s).");
            }
            "history" => print_history(&conversation.messages()),
            "show_payload" => show_payload(&conversation.messages(), intent.arg_str("index")),
            "save_image" => save_image(&conversation.messages(), intent.arg_str("path")),
            "status" => print_status(&session, &conversation, &composer, turns.len()),
            "connect" => {
                if !connect_screen(&session).await? {
                    break;
                }
            }
            "quit" => break,
            "submit" => {
                composer.set_text(intent.prompt.clone().unwrap_or_default());
                let Some(submission) = composer.take_submission() else {
                    continue;
                };
                let draft = submission.clone();
                match conversation.begin_turn(submission) {
                    Ok(Some(ticket)) => {
                        let conversation = conversation.clone();
                        let out_dir = args.out.clone();
                        turns.spawn(async move {
                            let outcome = conversation.run_turn(ticket.clone()).await;
                            report_turn(&conversation, &ticket, &outcome, &out_dir);
                        });
                    }
                    Ok(None) => {}
                    Err(SessionError::CredentialRequired) => {
                        println!("{}", restore_attachments(&mut composer, draft));
                    }
                }
            }
            _ => println!("Unknown command: {}", intent.raw.trim()),
        }
    }

    if !turns.is_empty() {
        println!("Waiting for {} running turn(s)…", turns.len());
        while let Some(finished) = turns.join_next().await {
            if let Err(err) = finished {
                warn!(error = %err, "turn task ended abnormally");
            }
        }
    }
    printer.abort();
    Ok(())
}

async fn run_once(args: RunArgs) -> Result<i32> {
    let session = build_session(&args.engine, InputLines::stdin())?;
    if session.initialize().await != CredentialState::Present && !connect_screen(&session).await? {
        bail!("no API key connected");
    }

    let mut composer = Composer::new(initial_ratio(args.ratio.as_deref())?);
    for path in &args.attach {
        composer.attach(files::load_attachment(path)?.item);
    }
    composer.set_text(args.prompt);
    let Some(submission) = composer.take_submission() else {
        bail!("nothing to submit: the prompt is empty");
    };

    let conversation = session.conversation()?;
    let Some(ticket) = conversation.begin_turn(submission)? else {
        bail!("nothing to submit: the prompt is empty");
    };
    match conversation.run_turn(ticket.clone()).await {
        TurnOutcome::Complete => {
            let message = conversation
                .message(ticket.message_id())
                .context("completed turn is missing from the conversation")?;
            if let Some(payload) = &message.payload {
                println!("{}", serde_json::to_string_pretty(&payload.to_value())?);
            }
            let image = message
                .image
                .as_ref()
                .context("completed turn has no image")?;
            let saved = files::save_generated_image(&args.out, image)?;
            println!("Saved {}{}", saved.path.display(), format_dimensions(saved.dimensions));
            Ok(0)
        }
        TurnOutcome::Errored(message) => {
            eprintln!("Generation failed: {message}");
            Ok(1)
        }
        TurnOutcome::CredentialReset => {
            eprintln!("The API key was rejected.");
            Ok(1)
        }
    }
}

fn set_aspect_ratio(composer: &mut Composer, intent: &Intent) {
    let Some(raw) = intent.arg_str("ratio") else {
        let options: Vec<&str> = AspectRatio::ALL.iter().map(|ratio| ratio.as_str()).collect();
        println!(
            "Aspect ratio: {} (options: {})",
            composer.aspect_ratio(),
            options.join(", ")
        );
        return;
    };
    match AspectRatio::snap(raw) {
        Some((ratio, warning)) => {
            if let Some(warning) = warning {
                warn!(requested = raw, snapped = %ratio, "{warning}");
            }
            composer.set_aspect_ratio(ratio);
            println!("Aspect ratio set to {ratio}");
        }
        None => println!("Unsupported aspect ratio: {raw}"),
    }
}

fn attach_files(composer: &mut Composer, paths: &[String]) {
    if paths.is_empty() {
        println!("/attach requires at least one path");
        return;
    }
    for raw in paths {
        let path = Path::new(raw);
        match files::load_attachment(path) {
            Ok(attachment) => {
                println!(
                    "Attached {} ({}{})",
                    path.display(),
                    attachment.item.mime_type,
                    format_dimensions(attachment.dimensions)
                );
                composer.attach(attachment.item);
            }
            Err(err) => println!("Attach failed: {err:#}"),
        }
    }
}

/// The gate closed while the line was typed. That line may be a key meant
/// for the connect screen, so only the attachments go back to the composer.
fn restore_attachments(composer: &mut Composer, draft: Submission) -> String {
    let kept = draft.media.len();
    for item in draft.media {
        composer.attach(item);
    }
    match kept {
        0 => "Not connected; the message was not sent.".to_string(),
        _ => format!("Not connected; the message was not sent. Kept {kept} attachment(s)."),
    }
}

fn report_turn(conversation: &Conversation, ticket: &TurnTicket, outcome: &TurnOutcome, out_dir: &Path) {
    let tag = short_id(&ticket.message_id().to_string());
    match outcome {
        TurnOutcome::Complete => {
            let Some(message) = conversation.message(ticket.message_id()) else {
                return;
            };
            println!("[{tag}] {}", preview(&message.content, PREVIEW_MAX_CHARS));
            let Some(image) = &message.image else {
                return;
            };
            match files::save_generated_image(out_dir, image) {
                Ok(saved) => println!(
                    "[{tag}] saved {}{}",
                    saved.path.display(),
                    format_dimensions(saved.dimensions)
                ),
                Err(err) => println!("[{tag}] image could not be saved: {err:#}"),
            }
        }
        TurnOutcome::Errored(message) => println!("[{tag}] failed: {message}"),
        TurnOutcome::CredentialReset => {
            println!("[{tag}] the API key was rejected; enter a new one to continue.")
        }
    }
}

fn spawn_event_printer(mut events: broadcast::Receiver<Value>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Progress lines for in-flight turns. Outcomes are printed by the turn task.
fn describe_event(event: &Value) -> Option<String> {
    let tag = short_id(
        event
            .get("message_id")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );
    match event.get("type").and_then(Value::as_str)? {
        "turn_started" => Some(format!("[{tag}] choosing fields…")),
        "turn_prompt_ready" => {
            let fields: Vec<&str> = event
                .get("fields")
                .and_then(Value::as_array)
                .map(|fields| fields.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            Some(format!(
                "[{tag}] prompt ready ({}); rendering…",
                fields.join(", ")
            ))
        }
        "credential_state" => match event.get("state").and_then(Value::as_str)? {
            "absent" => Some("Not connected.".to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages yet.");
        return;
    }
    for (index, message) in messages.iter().enumerate() {
        let role = match message.role {
            Role::User => "you",
            Role::Assistant => "lumen",
        };
        let status = message
            .status
            .map(|status| format!(" [{}]", status.as_str()))
            .unwrap_or_default();
        let attachments = if message.media.is_empty() {
            String::new()
        } else {
            format!(" (+{} image(s))", message.media.len())
        };
        println!(
            "{:>3}. {role}{status}: {}{attachments}",
            index + 1,
            preview(&message.content, PREVIEW_MAX_CHARS)
        );
    }
}

fn show_payload(messages: &[Message], index: Option<&str>) {
    match select_message(messages, index, |message| message.payload.is_some()) {
        Ok(message) => {
            let payload = message
                .payload
                .as_ref()
                .map(|payload| payload.to_value())
                .unwrap_or(Value::Null);
            match serde_json::to_string_pretty(&payload) {
                Ok(text) => println!("{text}"),
                Err(err) => println!("Payload could not be printed: {err}"),
            }
        }
        Err(reason) => println!("{reason}"),
    }
}

fn save_image(messages: &[Message], path: Option<&str>) {
    let Some(path) = path else {
        println!("/save requires a path");
        return;
    };
    let message = match select_message(messages, None, |message| message.image.is_some()) {
        Ok(message) => message,
        Err(reason) => {
            println!("{reason}");
            return;
        }
    };
    let Some(image) = &message.image else {
        return;
    };
    match files::save_image_to(Path::new(path), image) {
        Ok(()) => println!("Saved {path}"),
        Err(err) => println!("Save failed: {err:#}"),
    }
}

/// Picks the message at a 1-based history index, or the latest one that
/// satisfies `wanted` when no index is given.
fn select_message<'a>(
    messages: &'a [Message],
    index: Option<&str>,
    wanted: impl Fn(&Message) -> bool,
) -> Result<&'a Message, String> {
    let Some(raw) = index else {
        return messages
            .iter()
            .rev()
            .find(|message| wanted(message))
            .ok_or_else(|| "Nothing to show yet.".to_string());
    };
    let position = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Not a history number: {raw}"))?;
    let message = position
        .checked_sub(1)
        .and_then(|offset| messages.get(offset))
        .ok_or_else(|| format!("No message #{position}."))?;
    if !wanted(message) {
        return Err(format!("Message #{position} has nothing to show."));
    }
    Ok(message)
}

fn print_status(
    session: &SessionController,
    conversation: &Conversation,
    composer: &Composer,
    running: usize,
) {
    println!("Credential: {}", session.state().as_str());
    println!(
        "Text model: {} | Image model: {} | Size: {} | Ratio: {}",
        conversation.reasoning_model(),
        conversation.image_model(),
        conversation.image_size(),
        composer.aspect_ratio()
    );
    println!(
        "Pending attachments: {} | Messages: {} | Running turns: {running}",
        composer.pending_media().len(),
        conversation.len()
    );
    match session.events().log_path() {
        Some(path) => println!("Events: {}", path.display()),
        None => println!("Events: not logged"),
    }
}

fn format_dimensions(dimensions: Option<(u32, u32)>) -> String {
    dimensions
        .map(|(width, height)| format!(", {width}x{height}"))
        .unwrap_or_default()
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn preview(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    flattened.chars().take(max_chars).collect::<String>() + "…"
}
