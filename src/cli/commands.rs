//! CLI command definitions and handlers

use clap::Subcommand;
use std::io::Read;

use crate::core::config::TranslatorConfig;

/// Commands for the alignment translator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP API server (default)
    Server {
        /// Bind address (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Download model artifacts and load the model once
    LoadModel,

    /// Translate text from the argument or stdin
    Translate {
        /// Text to translate; read from stdin when omitted
        text: Option<String>,
    },
}

/// Handle server command
pub async fn handle_server(
    mut config: TranslatorConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    use crate::server::api::run_server;
    use tracing::info;

    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    info!("Starting HTTP server on {}:{}", config.host, config.port);
    println!("🚀 Server starting on http://{}:{}", config.host, config.port);
    println!(
        "📄 OpenAPI document: http://{}:{}/api-docs/openapi.json",
        config.host, config.port
    );

    run_server(config).await?;

    Ok(())
}

/// Handle load-model command
pub async fn handle_load_model(config: TranslatorConfig) -> anyhow::Result<()> {
    use crate::core::translator::AsyncTranslator;
    use crate::storage::artifacts::{fetch_artifact, ArtifactStatus};
    use crate::storage::blob::AzureBlobStore;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Instant;
    use tracing::info;

    let start_time = Instant::now();

    info!("Model directory: {}", config.model_dir.display());
    info!(
        "Source: {}/{}/{}",
        config.storage.endpoint_url(),
        config.storage.container,
        config.storage.blob_folder
    );

    let store = AzureBlobStore::new(&config.storage)?;
    tokio::fs::create_dir_all(&config.model_dir).await?;

    let pb = ProgressBar::new(config.artifacts.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("=>-"));

    let mut downloaded = 0;
    let mut present = 0;

    for name in &config.artifacts {
        pb.set_message(format!("Fetching: {}", name));

        match fetch_artifact(&store, &config.model_dir, name).await {
            Ok(ArtifactStatus::Downloaded { .. }) => downloaded += 1,
            Ok(ArtifactStatus::AlreadyPresent) => present += 1,
            Err(e) => {
                pb.abandon_with_message(format!("Failed: {}", name));
                return Err(e.into());
            }
        }
        pb.inc(1);
    }

    pb.set_message("Loading model");
    let translator = AsyncTranslator::from_config(&config)?;
    let loaded = translator.load_model().await?;
    pb.finish_with_message("Completed");

    let duration = start_time.elapsed();
    info!(
        "Model ready: {} downloaded, {} already present in {:?}",
        downloaded, present, duration
    );

    println!("\n✅ Model and tokenizer successfully loaded.");
    println!("   Downloaded: {}", downloaded);
    println!("   Already present: {}", present);
    println!("   Loaded at: {}", loaded.loaded_at.to_rfc3339());
    println!("   Time: {:?}", duration);

    Ok(())
}

/// Handle translate command
pub async fn handle_translate(config: TranslatorConfig, text: Option<String>) -> anyhow::Result<()> {
    use crate::core::models::TranslationRequest;
    use crate::core::translator::AsyncTranslator;
    use tracing::info;

    let text = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let translator = AsyncTranslator::from_config(&config)?;
    let result = translator.translate(&TranslationRequest::new(text)).await?;

    info!(
        "Translated {} units using {} segmentation",
        result.unit_count, result.strategy
    );
    println!("{}", result.translated_text);

    Ok(())
}
