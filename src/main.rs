//! # docqa CLI
//!
//! Upload documents into a local vector index and ask questions about them.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa ingest <files..>` | Extract, chunk, embed, and index files |
//! | `docqa ask "<question>"` | Answer one question from the indexed documents |
//! | `docqa chat` | Interactive session with conversation memory |
//! | `docqa stats` | Show what the index contains |
//!
//! ## Examples
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! docqa ingest handbook.pdf notes.docx faq.txt
//! docqa ask "What is the refund policy?" --show-sources
//! docqa chat
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use docqa::config::{self, Config};
use docqa::embedding::{create_embedder, Embedder};
use docqa::generation::{GeminiClient, Generator};
use docqa::models::Chunk;
use docqa::session::Session;

/// Question answering over your own documents.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one or more PDF, Word, or text files.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a single question.
    Ask {
        question: String,

        /// Print the file and page of each chunk used.
        #[arg(long)]
        show_sources: bool,
    },

    /// Interactive chat. `/clear` resets the conversation, `/quit` exits.
    Chat {
        /// Files to index before the first question.
        files: Vec<PathBuf>,
    },

    /// Show index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { files } => {
            let session = open_session(&cfg).await?;
            let report = session.add_documents(&files).await;
            for (path, reason) in &report.failures {
                eprintln!("  failed: {}: {}", path.display(), reason);
            }
            println!(
                "Successfully processed {} document(s) ({} chunks)",
                report.processed, report.chunks
            );
            if !report.is_clean() {
                anyhow::bail!("{} file(s) could not be indexed", report.failures.len());
            }
        }
        Commands::Ask {
            question,
            show_sources,
        } => {
            let mut session = open_session(&cfg).await?;
            let outcome = session.ask(&question).await;
            println!("{}", outcome.message());
            if show_sources {
                print_sources(outcome.sources());
            }
        }
        Commands::Chat { files } => {
            let mut session = open_session(&cfg).await?;
            if !files.is_empty() {
                let report = session.add_documents(&files).await;
                for (path, reason) in &report.failures {
                    eprintln!("  failed: {}: {}", path.display(), reason);
                }
                println!("Successfully processed {} document(s)", report.processed);
            }
            run_chat(&mut session).await?;
        }
        Commands::Stats => {
            let path = cfg.index_db_path();
            let stats = docqa::index::VectorIndex::stats_at(&path).await?;
            println!("index: {}", path.display());
            println!("  documents: {}", stats.documents);
            println!("  entries:   {}", stats.entries);
            println!(
                "  model:     {}",
                stats.model.as_deref().unwrap_or("(empty)")
            );
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "docqa=debug" } else { "docqa=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_session(cfg: &Config) -> anyhow::Result<Session> {
    let api_key = cfg.require_api_key()?;
    let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&cfg.embedding)?);
    let generator: Arc<dyn Generator> = Arc::new(GeminiClient::new(&cfg.generation, api_key)?);
    Ok(Session::open(cfg, embedder, generator).await?)
}

async fn run_chat(session: &mut Session) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask about your documents. /clear resets the conversation, /quit exits.");

    loop {
        match editor.readline("you> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();

                match line {
                    "/quit" | "/exit" => break,
                    "/clear" => {
                        session.clear_history();
                        println!("Conversation cleared.");
                    }
                    question => {
                        let reply = session.query(question).await;
                        println!("{}\n", reply);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    session.index().close().await;
    Ok(())
}

fn print_sources(sources: &[Chunk]) {
    if sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for (i, chunk) in sources.iter().enumerate() {
        match chunk.page {
            Some(page) => println!("  [{}] {} (page {})", i + 1, chunk.source, page),
            None => println!("  [{}] {}", i + 1, chunk.source),
        }
    }
}
