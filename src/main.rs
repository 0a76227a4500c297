//! Main entry point for the alignment translator CLI

#![forbid(unsafe_code)]

use alignment_translator::cli::commands::{self, Commands};
use alignment_translator::core::config::TranslatorConfig;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Alignment translator - Marian translation service backed by Azure Blob Storage
#[derive(Parser, Debug)]
#[command(name = "alignment-translator", version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON); environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("alignment_translator={},tower_http={}", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TranslatorConfig::load(args.config.as_deref())?;

    // Execute command
    match args.command {
        Some(Commands::Server { host, port }) => {
            commands::handle_server(config, host, port).await?;
        }
        Some(Commands::LoadModel) => {
            commands::handle_load_model(config).await?;
        }
        Some(Commands::Translate { text }) => {
            commands::handle_translate(config, text).await?;
        }
        None => {
            commands::handle_server(config, None, None).await?;
        }
    }

    Ok(())
}
