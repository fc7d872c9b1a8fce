use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use studymate_backends::build_backends;
use studymate_core::config::{Config, Settings};
use studymate_core::error::Error;
use studymate_core::types::{Availability, BackendCall, BackendId, Document, OutlineKind, Query};
use studymate_embed::load_embedder;
use studymate_orchestrator::{Answer, StudySession};

#[derive(Parser, Debug)]
#[command(name = "studymate", version, about = "Ask questions about a study document", long_about = None)]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a document and answer one question
    Ask {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        question: String,
    },
    /// Ingest a document once and answer one question per line of input
    Chat {
        #[command(flatten)]
        target: Target,
    },
    /// Show which backends are ready
    Status,
}

#[derive(Args, Debug)]
struct Target {
    /// Text file; pages are separated by form feeds
    #[arg(short, long)]
    document: PathBuf,
    /// Backend ids to ask; defaults to every available backend
    #[arg(short, long = "backend")]
    backends: Vec<String>,
    /// Format the answer as a 7 or 14 mark outline
    #[arg(short, long, value_parser = parse_marks)]
    marks: Option<OutlineKind>,
}

fn parse_marks(s: &str) -> Result<OutlineKind, String> {
    s.parse::<u8>()
        .ok()
        .and_then(OutlineKind::from_marks)
        .ok_or_else(|| format!("unsupported mark scheme '{s}', expected 7 or 14"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let cli = Cli::parse();
    let settings = Config::load_from_dir(&cli.config_dir)
        .and_then(|c| c.settings())
        .map_err(|e| {
            eprintln!("Error loading config: {e}");
            e
        })?;

    match cli.command {
        Command::Status => {
            let session = StudySession::new(&settings, build_backends(&settings.backends), None);
            print_status(&session);
        }
        Command::Ask { target, question } => {
            let session = open_session(&settings, &target).await?;
            let query = Query { text: question, requested_backends: requested(&session, &target) };
            match session.ask(&query, target.marks).await {
                Ok(answer) => print_answer(&answer),
                Err(e) => {
                    report_failure(&e);
                    return Err(e.into());
                }
            }
        }
        Command::Chat { target } => {
            let session = open_session(&settings, &target).await?;
            chat_loop(&session, &target).await?;
        }
    }
    Ok(())
}

async fn open_session(settings: &Settings, target: &Target) -> anyhow::Result<StudySession> {
    let embedder = match load_embedder(&settings.embedding) {
        Ok(embedder) => embedder,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "embedding model unavailable; using lexical retrieval");
            None
        }
    };
    let session = StudySession::new(settings, build_backends(&settings.backends), embedder).with_progress(true);

    let document = read_document(&target.document)?;
    let index = session.ingest(document).await?;
    println!("📄 Indexed {} passages from {}", index.len(), target.document.display());
    if index.is_lexical_only() {
        println!("⚠️  Keyword search only (no embeddings)");
    }
    Ok(session)
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let id = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "document".to_string());
    Ok(Document::new(id, text.split('\x0c').map(str::to_string).collect()))
}

fn requested(session: &StudySession, target: &Target) -> BTreeSet<BackendId> {
    if !target.backends.is_empty() {
        return target.backends.iter().map(|b| BackendId::new(b.as_str())).collect();
    }
    session
        .backend_status()
        .into_iter()
        .filter(|(_, a)| *a == Availability::Available)
        .map(|(id, _)| id)
        .collect()
}

fn print_status(session: &StudySession) {
    println!("Backends");
    println!("========");
    for (id, availability) in session.backend_status() {
        let name = session.orchestrator().backend(&id).map(|b| b.display_name().to_string()).unwrap_or_default();
        let mark = match availability {
            Availability::Available => "✅",
            Availability::Unavailable => "❌",
        };
        println!("  {mark} {id:<8} {name}");
    }
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", answer.render());
    println!();
    if !answer.grounded {
        println!("⚠️  No passage matched the question; the answer is not grounded in the document");
    }
    print_calls(&answer.calls);
    if !answer.retrieval.is_empty() {
        println!("📚 Sources:");
        for (i, sp) in answer.retrieval.passages.iter().enumerate() {
            println!("  {}. page {} (score {:.3}): {}", i + 1, sp.passage.source_page + 1, sp.score, snippet(&sp.passage.text, 120));
        }
    }
}

fn print_calls(calls: &[BackendCall]) {
    for call in calls {
        let latency = call.latency.as_secs_f32();
        match (&call.error, &call.error_message) {
            (Some(kind), message) => {
                println!("  ❌ {} {kind} ({latency:.1}s) {}", call.backend, message.as_deref().unwrap_or(""));
            }
            (None, _) => println!("  ✅ {} ({latency:.1}s)", call.backend),
        }
    }
}

fn report_failure(error: &Error) {
    println!("❌ {error}");
    if let Error::AllBackendsFailed { calls } = error {
        print_calls(calls);
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

async fn chat_loop(session: &StudySession, target: &Target) -> anyhow::Result<()> {
    let backends = requested(session, target);
    let mut marks = target.marks;

    println!("🎯 Commands: /status, /marks <7|14|off>, /history, /quit");
    println!();

    loop {
        print!("ask> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/q" | "quit" | "exit" => break,
            "/status" => print_status(session),
            "/history" => {
                for entry in session.history() {
                    let who: Vec<&str> = entry.contributors.iter().map(BackendId::as_str).collect();
                    println!("  {} [{}] {}", entry.asked_at.format("%H:%M:%S"), who.join(", "), entry.question);
                }
                let stats = session.stats();
                println!("📊 {} questions, {} words", stats.questions, stats.total_words);
                for (backend, count) in &stats.responses {
                    println!("  • {backend}: {count} responses");
                }
            }
            _ if input.starts_with("/marks") => {
                let arg = input.trim_start_matches("/marks").trim();
                if arg == "off" {
                    marks = None;
                    println!("Plain answers");
                } else {
                    match parse_marks(arg) {
                        Ok(kind) => {
                            marks = Some(kind);
                            println!("Answers formatted for {} marks", kind.total_marks());
                        }
                        Err(e) => println!("❌ {e}"),
                    }
                }
            }
            question => {
                let query = Query { text: question.to_string(), requested_backends: backends.clone() };
                match session.ask(&query, marks).await {
                    Ok(answer) => print_answer(&answer),
                    Err(e) => report_failure(&e),
                }
            }
        }
        println!();
    }
    println!("👋 Goodbye!");
    Ok(())
}
