//! Newsbrief CLI
//!
//! Entry point for the newsbrief command-line tool: grounded Q&A over a
//! local news-document corpus, plus corpus management.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand};
use newsbrief_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Newsbrief CLI - grounded Q&A over insurance industry news
#[derive(Parser, Debug)]
#[command(name = "newsbrief")]
#[command(about = "Grounded Q&A over insurance industry news", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the document database
    #[arg(short, long, global = true, env = "NEWSBRIEF_DB")]
    db: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "NEWSBRIEF_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama)
    #[arg(short, long, global = true, env = "NEWSBRIEF_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "NEWSBRIEF_MODEL")]
    model: Option<String>,

    /// Provider endpoint URL
    #[arg(long, global = true, env = "NEWSBRIEF_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question over the news corpus
    Ask(AskCommand),

    /// Load documents into the corpus from a JSON file
    Ingest(IngestCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    let config = config.with_overrides(
        cli.db,
        cli.config,
        cli.provider,
        cli.model,
        cli.endpoint,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Newsbrief CLI starting");
    tracing::debug!("Database: {:?}", config.db_path);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Ingest(_) => "ingest",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
