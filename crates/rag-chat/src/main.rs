//! Interactive chat CLI.
//!
//! Loads the index snapshot lazily on the first question, retrieves
//! context for each user turn, and streams the generated answer to the
//! terminal token by token. The conversation accumulates across turns
//! and feeds back into every prompt.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=... rag-chat --index data/index
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use rag_embeddings::{Embedder, OpenAiEmbedder, RemoteEmbedderConfig};
use rag_generation::{
    AnswerConfig, AnswerError, GeneratorConfig, OpenAiGenerator, StreamingAnswerAssembler,
};
use rag_retrieval::RetrievalPipeline;
use rag_types::{ChatTurn, RagConfig};
use rag_vector::IndexStore;

/// Club knowledge chat
#[derive(Parser, Debug)]
#[command(name = "rag-chat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the index snapshot
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Entries to retrieve per question
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Path to config file (overrides default ~/.config/club-rag/config.*)
    #[arg(short, long)]
    config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(cli.log_level.as_deref().unwrap_or("warn"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rag-chat: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = RagConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(index) = cli.index {
        config.data.index_path = index;
    }
    if let Some(top_k) = cli.top_k {
        config.retrieval.top_k = top_k;
    }
    config.validate()?;
    let api_key = config.api_key()?;

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        RemoteEmbedderConfig::from_settings(&config.embedder, api_key.clone()),
    )?);
    let store = Arc::new(IndexStore::new(config.data.index_path.clone()));
    let retrieval = Arc::new(RetrievalPipeline::new(
        store,
        embedder,
        config.retrieval.top_k,
    ));
    let generator = Arc::new(OpenAiGenerator::new(GeneratorConfig::from_settings(
        &config.generation,
        config.embedder.base_url.clone(),
        api_key,
    ))?);
    let assembler = StreamingAnswerAssembler::new(
        retrieval,
        generator,
        AnswerConfig::from_settings(&config.retrieval, &config.generation),
    );

    println!("club-rag chat. Ask about clubs; empty line or Ctrl-D exits.");

    let stdin = io::stdin();
    let mut history: Vec<ChatTurn> = Vec::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        history.push(ChatTurn::user(question));
        match answer_turn(&assembler, &history).await {
            Ok(answer) => history.push(ChatTurn::assistant(answer)),
            Err(e) => {
                // The failed turn stays out of the history.
                history.pop();
                eprintln!("error: {e:#}");
            }
        }
    }

    Ok(())
}

/// Stream one answer to stdout, returning the full text for the history.
async fn answer_turn(
    assembler: &StreamingAnswerAssembler,
    history: &[ChatTurn],
) -> Result<String, AnswerError> {
    let mut rx = assembler.answer(history).await?;

    let mut answer = String::new();
    while let Some(item) = rx.recv().await {
        match item {
            Ok(token) => {
                print!("{token}");
                let _ = io::stdout().flush();
                answer.push_str(&token);
            }
            Err(e) => {
                // Partial answer stands; make the break visible.
                warn!(error = %e, "Answer stream broke");
                eprintln!("\n[stream interrupted: {e}]");
                break;
            }
        }
    }
    println!();
    Ok(answer)
}
