mod config;
mod docs;
mod error;
mod gist;
mod llm;
mod metrics;
#[cfg(test)]
mod testing;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};

use config::GistConfig;
use docs::ingest::AnySource;
use docs::types::DocumentSnapshot;
use gist::recall::RecallAnswer;
use gist::GistAgent;
use llm::{ChatModel, LlmClient};

/// Read long documents into gist memory and answer questions about them.
#[derive(Parser)]
#[command(name = "gist-agent", version)]
struct Cli {
    /// Model ID (overrides LLM_MODEL).
    #[arg(long, global = true)]
    model: Option<String>,

    /// Stream completions from the endpoint.
    #[arg(long, global = true)]
    stream: bool,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Paginate and summarize a document (file path or http(s) URL).
    Process {
        locator: String,
        /// Write the processed document to this JSON file.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Answer a question from a saved document.
    Ask { snapshot: PathBuf, question: String },
    /// Process a document, then answer questions read from stdin.
    Chat { locator: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let config = GistConfig::from_env()?;
    let mut client = LlmClient::from_env()?;
    if let Some(model) = cli.model {
        client = client.with_model(model);
    }
    if cli.stream {
        client = client.with_stream(true);
    }
    info!(model = client.model(), "LLM client initialized");
    let model: Arc<dyn ChatModel> = Arc::new(client);

    match cli.command {
        Commands::Process { locator, save } => {
            let mut agent = GistAgent::new(model, config);
            process(&mut agent, &locator).await?;
            if let Some(path) = save {
                agent.snapshot().await?.save(&path).await?;
                println!("Saved to {}", path.display());
            }
            println!("\n{}", agent.metrics().await);
        }
        Commands::Ask { snapshot, question } => {
            let snapshot = DocumentSnapshot::load(&snapshot).await?;
            let agent = GistAgent::from_snapshot(model, config, snapshot)?;
            if let Some(document) = agent.document() {
                info!(
                    title = %document.title,
                    pages = document.pages.len(),
                    "snapshot loaded"
                );
            }
            let result = agent.answer(&question).await?;
            print_answer(&result);
            println!("\n{}", agent.metrics().await);
        }
        Commands::Chat { locator } => {
            let mut agent = GistAgent::new(model, config);
            process(&mut agent, &locator).await?;
            println!("\n{}", agent.metrics().await);
            chat(&agent).await?;
        }
    }

    Ok(())
}

async fn process(agent: &mut GistAgent, locator: &str) -> Result<()> {
    let source = AnySource::new()?;
    let document = agent.process_document(&source, locator).await?;
    println!("Title: {}", document.title);
    println!(
        "Pages: {} ({} paragraphs)",
        document.pages.len(),
        document.paragraph_count()
    );
    Ok(())
}

async fn chat(agent: &GistAgent) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nAsk a question about the document (or type 'exit' to quit): ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match agent.answer(question).await {
            Ok(result) => print_answer(&result),
            Err(e) => eprintln!("Failed to generate an answer: {}", e),
        }
        println!("\n{}", agent.metrics().await);
    }
    Ok(())
}

fn print_answer(result: &RecallAnswer) {
    if let Some(rationale) = &result.rationale {
        println!("\n--- Lookup Rationale ---\n{}", rationale);
    }
    if result.pages_read.is_empty() {
        println!("\nRe-read pages: none");
    } else {
        println!("\nRe-read pages: {:?}", result.pages_read);
    }
    println!("\n--- Answer ---\n{}", result.answer);
}
