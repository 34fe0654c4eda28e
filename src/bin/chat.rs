//! Interactive chat binary.
//!
//! Reads user turns from stdin, prints each validated reply, and
//! optionally synthesizes replies to MP3 files in the temp directory.

use clap::Parser;
use std::io::Write as _;
use std::path::PathBuf;
use toi::config::EngineConfig;
use toi::persona::GREETING;
use toi::provider::GeminiBackend;
use toi::speech::SpeechSynthesizer;
use toi::{ChatSession, ReplyOrchestrator, SignalTracker};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Toi: a quiet thinking partner that only ever asks one question.
#[derive(Parser)]
#[command(name = "toi-chat", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Synthesize each reply to an MP3 file (requires a synthesis API key).
    #[arg(long)]
    speak: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the conversation stays readable on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("toi=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => {
            let mut config = EngineConfig::from_file(path)?;
            config.overlay_env();
            config
        }
        None => EngineConfig::load()?,
    };
    if cli.speak {
        config.synthesis.enabled = true;
    }
    config.validate()?;

    let backend = GeminiBackend::new(config.build_generation()?);
    let orchestrator = ReplyOrchestrator::new(backend)
        .with_contract(config.contract.build()?)
        .with_options(config.generation_options())
        .with_max_attempts(config.session.max_attempts);
    let mut session = ChatSession::new(orchestrator)
        .with_tracker(SignalTracker::with_rules(config.governor.clone()))
        .with_window(config.session.history_window);

    let synthesizer = config
        .synthesis
        .enabled
        .then(|| config.build_synthesis())
        .transpose()?
        .map(SpeechSynthesizer::new);

    println!("toi v{}", env!("CARGO_PKG_VERSION"));
    println!("あなたの「考えごと」を静かに整理する、思考ナビゲーター。");
    println!("/reset でやり直し、/quit で終了します。");
    println!();
    println!("トイ: {GREETING}");

    let stdin = std::io::stdin();
    let mut line = String::new();
    let mut turn = 0u32;
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("トイ: {GREETING}");
                continue;
            }
            _ => {}
        }

        match session.submit(input).await {
            Ok(reply) => {
                turn += 1;
                println!("トイ: {}", reply.text);
                if let Some(ref synthesizer) = synthesizer {
                    speak_reply(synthesizer, &reply.text, session.id(), turn).await;
                }
            }
            Err(e) => eprintln!("入力エラー: {e}"),
        }
    }

    Ok(())
}

/// Synthesize one reply into the temp directory. Failure is logged, never
/// fatal to the conversation.
async fn speak_reply(synthesizer: &SpeechSynthesizer, text: &str, session: uuid::Uuid, turn: u32) {
    match synthesizer.synthesize(text).await {
        Ok(audio) => {
            let path = std::env::temp_dir().join(format!("toi-{session}-{turn:03}.mp3"));
            match std::fs::write(&path, &audio) {
                Ok(()) => println!("  audio: {}", path.display()),
                Err(e) => warn!(error = %e, "failed to write audio file"),
            }
        }
        Err(e) => warn!(error = %e, "synthesis failed"),
    }
}
