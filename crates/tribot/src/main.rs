mod commands;

use anyhow::{bail, Context, Result};
use clap::Parser;
use commands::Command;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use triage::config::REQUIRED_ENV_VARS;
use triage::{
    ConversationSession, Language, TranscriptionClient, TriageConfig, TriageOrchestrator,
    TurnReply,
};

const CONSENT_NOTICE: &str = "\
By using TRIBOT, you consent to the collection and processing of your data for medical \
triage purposes. This includes symptom analysis, cultural considerations, and emergency \
response coordination.";

const HALT_MESSAGE: &str = "System halted. Please restart to continue.";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Multilingual emergency triage assistant", long_about = None)]
struct Args {
    /// Path to a TOML config file (environment variables override it)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Preferred patient language
    #[arg(long, default_value = "english")]
    language: String,

    /// Send one message, print the reply and exit
    #[arg(long)]
    message: Option<String>,

    /// Print full turn replies as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Accept the research consent notice without prompting
    #[arg(long, default_value_t = false)]
    accept_consent: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config =
        TriageConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let orchestrator =
        TriageOrchestrator::from_config(&config).context("Failed to create analysis client")?;
    if !orchestrator.is_configured() {
        print_configuration_required();
        bail!("analysis API is not configured");
    }
    let transcription = TranscriptionClient::new(config.transcription.clone())
        .context("Failed to create transcription client")?;

    info!(
        deployment = %config.analysis.deployment,
        voice = transcription.is_configured(),
        "TRIBOT starting"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !args.accept_consent && !ask_consent(&mut lines).await? {
        println!("Consent is required to use TRIBOT. Goodbye.");
        return Ok(());
    }

    let mut session = ConversationSession::new();
    let mut language = args.language.to_lowercase();

    if let Some(message) = args.message.as_deref() {
        let reply = orchestrator
            .submit(&mut session, message, &language)
            .await
            .context("Triage analysis failed")?;
        render(&session, &reply, args.json)?;
        return Ok(());
    }

    println!(
        "TRIBOT ready. Preferred language: {}. Type /help for commands.",
        Language::normalize(&language).display_name()
    );

    loop {
        prompt()?;
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        let text = match commands::parse(&line) {
            Command::Empty => continue,
            Command::Help => {
                println!("{}", commands::HELP);
                continue;
            }
            Command::Invalid(message) => {
                println!("{message}");
                continue;
            }
            Command::Quit => break,
            Command::Stop => {
                println!("{HALT_MESSAGE}");
                warn!(session_id = %session.short_id(), "Kill switch activated");
                return Ok(());
            }
            Command::New => {
                session.reset();
                println!("Started a new conversation.");
                continue;
            }
            Command::Lang(label) => {
                match Language::from_hint(&label) {
                    Some(lang) => println!("Preferred language: {}", lang.display_name()),
                    None => println!(
                        "Unrecognised language {label:?}; replies will follow the language you write in."
                    ),
                }
                language = label;
                continue;
            }
            Command::Transcribe(path) => match transcribe(&transcription, &path).await {
                Some(text) => text,
                None => continue,
            },
            Command::Message(text) => text,
        };

        let reply = orchestrator
            .submit(&mut session, &text, &language)
            .await
            .context("Triage analysis failed")?;
        render(&session, &reply, args.json)?;
    }

    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}

async fn ask_consent(
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
) -> Result<bool> {
    println!("Research Consent\n\n{CONSENT_NOTICE}\n");
    print!("Do you consent? [yes/no] ");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let answer = lines
        .next_line()
        .await
        .context("Failed to read consent answer")?
        .unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn transcribe(client: &TranscriptionClient, path: &std::path::Path) -> Option<String> {
    if !client.is_configured() {
        println!("Voice input is not available: transcription credentials are not configured.");
        return None;
    }
    let audio = match tokio::fs::read(path).await {
        Ok(audio) => audio,
        Err(e) => {
            println!("Could not read {}: {e}", path.display());
            return None;
        }
    };
    match client.transcribe(audio).await {
        Ok(transcription) if transcription.is_empty() => {
            println!("No speech was recognised in that recording.");
            None
        }
        Ok(transcription) => {
            println!("You said: {}", transcription.text);
            Some(transcription.text)
        }
        Err(e) => {
            println!("Transcription failed: {e}");
            None
        }
    }
}

fn render(session: &ConversationSession, reply: &TurnReply, json: bool) -> Result<()> {
    if !session.is_current(reply.user_turn_id) {
        return Ok(());
    }
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(reply).context("Failed to serialize reply")?
        );
        return Ok(());
    }

    println!("TRIBOT: {}", reply.message());

    if let (true, Some(analysis)) = (reply.decision.understood, &reply.decision.analysis) {
        println!(
            "  Triage: ATS {} | confidence {}% | {}",
            analysis.triage_level,
            analysis.confidence,
            analysis.detected_language.display_name()
        );
        for question in &analysis.follow_up_questions {
            println!("  ? {question}");
        }
        if analysis.is_final_assessment {
            for step in &analysis.next_steps {
                println!("  - {step}");
            }
        }
    }

    if let Some(handoff) = &reply.handoff {
        println!("TRIBOT: {}", handoff.message);
        println!("  Call: {}", handoff.dial_uri);
    }
    Ok(())
}

fn print_configuration_required() {
    println!("Configuration Required\n");
    println!("TRIBOT needs access to the analysis service before it can assess symptoms.");
    println!("Set the following environment variables (or provide them in --config):\n");
    for var in REQUIRED_ENV_VARS {
        println!("  {var}");
    }
    println!("\nOptional, for voice input:\n");
    println!("  {}", triage::config::ENV_WHISPER_API_KEY);
    println!("  {}", triage::config::ENV_WHISPER_API_ENDPOINT);
}
