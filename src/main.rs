use anyhow::{Context, Result};
use clap::Parser;
use intelliml_chat::audio::{AudioFile, CaptureConstraints, CaptureDevice, CaptureError, CaptureStream};
use intelliml_chat::conversation::{suggestion_prompt, QUICK_QUESTIONS};
use intelliml_chat::markup::{self, MarkupNode};
use intelliml_chat::{
    Config, ConversationController, DirectorySink, HttpAssistantClient, Message, RecordingSession,
    Role, SendOutcome, Suggestion, TerminalRenderer, VoiceOutcome, WavFileDevice,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "intelliml-chat", about = "Chat with the IntelliML data assistant")]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/intelliml-chat")]
    config: String,

    /// Override the backend URL
    #[arg(long)]
    base_url: Option<String>,

    /// Override the visualization download directory
    #[arg(long)]
    downloads: Option<PathBuf>,

    /// Disable ANSI colors
    #[arg(long)]
    no_color: bool,
}

/// Capture device that replays whichever WAV file `/voice` last named
struct SelectedFile {
    path: Mutex<Option<PathBuf>>,
}

impl SelectedFile {
    fn select(&self, path: PathBuf) {
        if let Ok(mut current) = self.path.lock() {
            *current = Some(path);
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for SelectedFile {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let path = self
            .path
            .lock()
            .ok()
            .and_then(|p| p.clone())
            .ok_or(CaptureError::NoDevice)?;
        WavFileDevice::new(path).acquire(constraints).await
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let base_url = args.base_url.unwrap_or(cfg.service.base_url.clone());
    let downloads = args.downloads.unwrap_or_else(|| PathBuf::from(&cfg.downloads.dir));

    info!("IntelliML chat v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", base_url);

    let client = HttpAssistantClient::new(&base_url, cfg.service.request_timeout())?;
    let device = Arc::new(SelectedFile {
        path: Mutex::new(None),
    });
    let session = RecordingSession::new(device.clone(), cfg.recording.clone());
    let controller =
        ConversationController::new(Arc::new(client), session, cfg.service.request_timeout());

    let sink = DirectorySink::new(downloads);
    let renderer = TerminalRenderer::new(!args.no_color);
    let mut suggestions: Vec<Suggestion> = Vec::new();

    println!("Ask anything about your data. Try one of:");
    for (i, question) in QUICK_QUESTIONS.iter().enumerate() {
        println!("  {}. {}", i + 1, question);
    }
    println!("Commands: /voice <file.wav>, /ideas, /pick <n>, /save <n>, /clear, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let shown = controller.message_count().await;

        match command {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                controller.clear().await;
                println!("Conversation cleared.");
                continue;
            }
            "/ideas" => {
                suggestions = controller.suggestions().await;
                if suggestions.is_empty() {
                    println!("No suggestions available.");
                }
                for (i, s) in suggestions.iter().enumerate() {
                    println!("  {}. {} [{}] {}", i + 1, s.title, s.kind, s.description);
                }
                continue;
            }
            "/pick" => {
                let Some(suggestion) = pick(rest, &suggestions) else {
                    println!("Usage: /pick <n> (after /ideas)");
                    continue;
                };
                report_send(controller.send(&suggestion_prompt(suggestion)).await);
            }
            "/save" => {
                match save(&controller, rest, &sink).await {
                    Ok(name) => println!("Saved {}", sink.dir().join(name).display()),
                    Err(e) => println!("Could not save: {:#}", e),
                }
                continue;
            }
            "/voice" => {
                if rest.is_empty() {
                    println!("Usage: /voice <file.wav>");
                    continue;
                }
                device.select(PathBuf::from(rest));
                voice_turn(&controller, rest).await;
            }
            _ => {
                let text = quick_question(line).unwrap_or(line);
                report_send(controller.send(text).await);
            }
        }

        let messages = controller.messages().await;
        for (index, message) in messages.iter().enumerate().skip(shown) {
            print_message(&renderer, index + 1, message);
        }
    }

    Ok(())
}

/// A bare number selects one of the quick questions
fn quick_question(line: &str) -> Option<&'static str> {
    let n: usize = line.parse().ok()?;
    QUICK_QUESTIONS.get(n.checked_sub(1)?).copied()
}

fn pick<'a>(arg: &str, suggestions: &'a [Suggestion]) -> Option<&'a Suggestion> {
    let n: usize = arg.parse().ok()?;
    suggestions.get(n.checked_sub(1)?)
}

async fn save(controller: &ConversationController, arg: &str, sink: &DirectorySink) -> Result<String> {
    let n: usize = arg.parse().context("Usage: /save <message number>")?;
    let index = n.checked_sub(1).context("Message numbers start at 1")?;
    controller.export_visualization(index, sink).await
}

/// Replay a WAV file as a voice turn, stopping when the file runs out
async fn voice_turn(controller: &ConversationController, path: &str) {
    let duration = match AudioFile::open(path) {
        Ok(audio) => Duration::from_secs_f64(audio.duration_seconds),
        Err(e) => {
            println!("Cannot open {}: {:#}", path, e);
            return;
        }
    };

    match controller.start_voice().await {
        VoiceOutcome::Started => println!("Recording {:.1}s from {}...", duration.as_secs_f64(), path),
        VoiceOutcome::Failed(e) => {
            println!("Voice error: {}", e);
            return;
        }
        _ => {
            println!("Voice input is busy.");
            return;
        }
    }

    let deadline = tokio::time::Instant::now() + duration;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if let Some(e) = controller.pump_voice().await {
            println!("Voice error: {}", e);
            return;
        }
    }

    println!("Transcribing...");
    match controller.stop_voice().await {
        VoiceOutcome::Sent(outcome) => report_send(outcome),
        VoiceOutcome::Failed(e) => println!("Voice error: {}", e),
        other => warn!("Unexpected voice outcome: {:?}", other),
    }
}

fn report_send(outcome: SendOutcome) {
    if let SendOutcome::Busy(text) = outcome {
        println!("Still waiting for the previous answer; kept \"{}\" as draft.", text);
    }
}

fn print_message(renderer: &TerminalRenderer, number: usize, message: &Message) {
    let who = match (message.role, message.error) {
        (Role::User, _) => "You",
        (Role::Assistant, false) => "Assistant",
        (Role::Assistant, true) => "Assistant (error)",
    };
    println!("\n[{}] {} · {}", number, who, message.time_label());
    println!("{}", renderer.render(&message.markup()));

    if let Some(code) = &message.code {
        let block = MarkupNode::CodeBlock {
            language: markup::DEFAULT_LANGUAGE.to_string(),
            code: code.clone(),
            tokens: markup::tokenize(code),
        };
        println!("Code:\n{}", renderer.render(&[block]));
    }
    if let Some(output) = &message.output {
        println!("Output:");
        for line in output.lines() {
            println!("  {}", line);
        }
    }
    if message.visualization.is_some() {
        println!("[visualization attached: /save {}]", number);
    }
}
