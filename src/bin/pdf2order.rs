//! CLI binary for pdf2order.
//!
//! A thin shim over the library crate: maps flags to `PipelineConfig`,
//! assembles the engine chain, runs one document, prints the order JSON.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2order::engine::chain::ExtractionChain;
use pdf2order::engine::pdf_text::{LopdfTextEngine, PdfExtractEngine};
use pdf2order::engine::remote_ocr::{RemoteOcrConfig, RemoteOcrEngine};
use pdf2order::engine::ExtractionEngine;
use pdf2order::reasoning::OpenAiReasoningEngine;
use pdf2order::{IngestionPipeline, PipelineConfig, ProfileRepository};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Extract a structured order from a PDF document.
#[derive(Parser, Debug)]
#[command(name = "pdf2order", version, about)]
struct Cli {
    /// Path to the order document.
    input: PathBuf,

    /// Customer profile id (falls back to the default profile when unknown).
    #[arg(short = 'p', long)]
    profile: Option<String>,

    /// Path to a JSON profile store.
    #[arg(long, env = "PDF2ORDER_PROFILES")]
    profile_store: Option<PathBuf>,

    /// Customer form id within the profile.
    #[arg(long)]
    form: Option<String>,

    /// Reasoning model identifier.
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Reasoning API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Reasoning API endpoint override.
    #[arg(long, env = "PDF2ORDER_REASONING_ENDPOINT")]
    reasoning_endpoint: Option<String>,

    /// Remote OCR endpoint. OCR is skipped when unset.
    #[arg(long, env = "PDF2ORDER_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Remote OCR API key.
    #[arg(long, env = "PDF2ORDER_OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,

    /// Minimum characters for extracted text to pass the quality gate.
    #[arg(long)]
    min_characters: Option<usize>,

    /// Write the order JSON here instead of stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = PipelineConfig::builder();
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(endpoint) = &cli.reasoning_endpoint {
        builder = builder.reasoning_endpoint(endpoint);
    }
    if let Some(min_characters) = cli.min_characters {
        builder = builder.min_characters(min_characters);
    }
    let config = builder.build()?;

    let mut engines: Vec<Arc<dyn ExtractionEngine>> =
        vec![Arc::new(LopdfTextEngine), Arc::new(PdfExtractEngine)];
    match (&cli.ocr_endpoint, &cli.ocr_api_key) {
        (Some(endpoint), Some(api_key)) => {
            engines.push(Arc::new(RemoteOcrEngine::new(RemoteOcrConfig {
                endpoint: endpoint.clone(),
                api_key: api_key.clone(),
                timeout_secs: config.ocr_timeout_secs,
                render_dpi: config.ocr_render_dpi,
            })?));
        }
        (None, None) => {
            tracing::info!("remote OCR disabled — no endpoint configured");
        }
        _ => {
            anyhow::bail!("remote OCR needs both --ocr-endpoint and --ocr-api-key");
        }
    }
    let chain = ExtractionChain::new(engines, config.min_characters, config.min_alpha_ratio);

    let reasoning = Arc::new(OpenAiReasoningEngine::new(&config, &cli.api_key)?);
    let mut pipeline = IngestionPipeline::new(chain, reasoning, config);
    if let Some(store) = &cli.profile_store {
        pipeline = pipeline.with_profile_repository(Arc::new(
            ProfileRepository::from_path(store)
                .with_context(|| format!("loading profile store {}", store.display()))?,
        ));
    }

    let raw_filename = cli
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.input.display().to_string());

    let order = pipeline
        .run(
            &cli.input,
            &raw_filename,
            cli.profile.as_deref(),
            cli.form.as_deref(),
        )
        .await?;

    let json = serde_json::to_string_pretty(&order)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
