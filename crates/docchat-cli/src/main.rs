//! CLI entry point for docchat: fetch docs, build the index, ask questions, serve the chat UI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use docchat_core::{
    app_data_dir, build_index, chunk_documents, invalidate_snapshot, load_config,
    load_config_from, load_documents, save_config, status, Config, GithubFetcher, IndexOutcome,
    OllamaClient, RetrievalChat, RetrievalOptions, Transcript,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "docchat: chat with a GitHub repository's documentation")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the one in the app data directory.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where docchat stores its config, docs and index (app data directory).
    DataDir,
    /// Write the default config file to the app data directory.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config.
    Config,
    /// Download documentation from the configured GitHub repositories.
    Fetch,
    /// Load and chunk the fetched documents and list them.
    Load,
    /// Build the vector index, or reuse the persisted one.
    Index {
        /// Discard the persisted index and embed everything again.
        #[arg(long)]
        rebuild: bool,
    },
    /// Ask a single question.
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
    },
    /// Chat in the terminal. Each line is a question; an empty line or EOF quits.
    Chat,
    /// Serve the chat UI.
    Serve {
        /// Address to listen on (defaults to the configured server address).
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config(),
    };

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("docchat backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::Init { force } => {
            let path = docchat_core::config::config_path()
                .context("could not determine app data directory")?;
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let path = save_config(&Config::default())?;
            println!("Wrote {}", path.display());
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Fetch => fetch(&config).await?,
        Commands::Load => {
            let docs_dir = config.docs_dir()?;
            let documents = load_documents(&docs_dir, &config.glob)?;
            let chunks = chunk_documents(&documents, &config.chunking)?;
            println!(
                "Loaded {} document(s), {} chunk(s) under {}",
                documents.len(),
                chunks.len(),
                docs_dir.display()
            );
            for d in &documents {
                let first = d.text.lines().next().unwrap_or("").trim();
                let preview: String = first.chars().take(60).collect();
                println!("  {}  {}", d.source.display(), preview);
            }
        }
        Commands::Index { rebuild } => {
            let client = OllamaClient::from_config(&config.ollama)?;
            let built = build_index(&config, &client, rebuild).await?;
            match built.outcome {
                IndexOutcome::Built => println!("Built index with {} chunk(s)", built.store.len()),
                IndexOutcome::Reused { stale: false } => {
                    println!("Reused index with {} chunk(s)", built.store.len())
                }
                IndexOutcome::Reused { stale: true } => println!(
                    "Reused index with {} chunk(s); documents changed since it was built (run with --rebuild to refresh)",
                    built.store.len()
                ),
            }
        }
        Commands::Ask { question } => {
            let chat = retrieval_chat(&config).await?;
            let answer = chat.answer(&question, &Transcript::new()).await?;
            println!("{}", answer.text);
            print_sources(&answer.sources);
        }
        Commands::Chat => {
            let chat = retrieval_chat(&config).await?;
            chat_loop(&chat).await?;
        }
        Commands::Serve { addr } => {
            let chat = retrieval_chat(&config).await?;
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            let ttl = Duration::from_secs(config.server.session_ttl_secs);
            docchat_web::serve(&addr, docchat_web::AppState::with_session_ttl(chat, ttl)).await?;
        }
    }
    Ok(())
}

async fn fetch(config: &Config) -> anyhow::Result<()> {
    let token = config.github_token()?;
    if token.is_none() {
        tracing::info!("no GitHub token configured, fetching anonymously");
    }
    let fetcher = GithubFetcher::from_config(&config.github, token)?;
    let docs_dir = config.docs_dir()?;
    let report = fetcher.fetch_all(&config.github.repos, &docs_dir).await?;
    if let Some(snapshot) = config.documents_snapshot() {
        invalidate_snapshot(&snapshot)?;
    }
    println!(
        "Fetched {} file(s) into {} ({} directories visited, {} empty removed)",
        report.files_written,
        docs_dir.display(),
        report.dirs_visited,
        report.removed_dirs
    );
    Ok(())
}

/// Builds (or reuses) the index once and wires it to the configured models.
async fn retrieval_chat(config: &Config) -> anyhow::Result<RetrievalChat> {
    let client = OllamaClient::from_config(&config.ollama)?;
    let built = build_index(config, &client, false).await?;
    if built.store.is_empty() {
        tracing::warn!("index is empty; run `docchat fetch` first");
    }
    Ok(RetrievalChat::new(
        Arc::new(built.store),
        Arc::new(client.clone()),
        Arc::new(client),
        RetrievalOptions {
            top_k: config.index.top_k,
            condense_question: config.index.condense_question,
        },
    ))
}

async fn chat_loop(chat: &RetrievalChat) -> anyhow::Result<()> {
    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Ask a question (empty line to quit).");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }
        match chat.submit(&mut transcript, &line).await {
            Ok(answer) => {
                println!("{}", answer.text);
                print_sources(&answer.sources);
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    Ok(())
}

fn print_sources(sources: &[PathBuf]) {
    if sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for s in sources {
        println!("  {}", s.display());
    }
}
