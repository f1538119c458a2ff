use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use topical::config::Config;
use topical::output::terminal;
use topical::pipeline::{AnalyzeRequest, Pipeline, StreamEvent};
use topical::topics::registry::EmbedderRegistry;

/// Topical: streaming topic discovery for comment threads.
///
/// Clusters comments into topics, labels them (hosted LLM, local keyword
/// re-ranking, or plain keywords), and optionally summarises the discussion.
#[derive(Parser)]
#[command(name = "topical", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (GET /health, POST /analyze)
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on (default: TOPICAL_PORT or 5001)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: TOPICAL_BIND or 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Download the ONNX sentence embedding model (~90 MB)
    DownloadModel,

    /// Analyze a JSON request file and print the topics
    Analyze {
        /// Path to a JSON file shaped like the POST /analyze body
        file: PathBuf,

        /// Override the post title in the file
        #[arg(long)]
        title: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("topical=info,tower_http=info")
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            config.require_embedder()?;
            let port = port.unwrap_or(config.port);
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            topical::web::run_server(config, port, &bind).await?;
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading ONNX embedding model...");
            println!("  Destination: {}", model_dir.display());

            topical::download::download_model(model_dir, &config.embedding_model).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `topical serve` or `topical analyze <file.json>`.");
        }

        Commands::Analyze { file, title } => {
            let config = Config::load()?;
            config.require_embedder()?;

            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut request: AnalyzeRequest = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid analyze request", file.display()))?;
            if title.is_some() {
                request.post_title = title;
            }
            request.validate()?;

            info!(file = %file.display(), comments = request.comments.len(), "Analyzing file");

            let registry = Arc::new(EmbedderRegistry::new(config.embedder_loader()));
            let pipeline = Pipeline::new(
                registry,
                Arc::new(config.chat_factory()),
                config.pipeline_config(),
            );

            let mut rx = pipeline.start(request);
            let mut failed = false;
            while let Some(event) = rx.recv().await {
                terminal::display_event(&event);
                failed |= matches!(event, StreamEvent::Error { .. });
            }
            if failed {
                anyhow::bail!("Analysis failed");
            }
        }
    }

    Ok(())
}
