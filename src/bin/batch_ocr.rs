use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use mistral_ocr_backend::config::AppConfig;
use mistral_ocr_backend::services::ocr::{self, MistralOcrClient};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Run every PDF/JPEG/PNG in a folder through Mistral OCR
#[derive(Parser, Debug)]
#[command(name = "batch_ocr", version)]
struct Args {
    /// Folder containing the documents to process
    input: PathBuf,

    /// Folder to write .md/.json results into (created if missing)
    #[arg(short, long, default_value = "ocr_output")]
    output: PathBuf,

    /// Override the OCR model from the environment/config
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batch_ocr=info,mistral_ocr_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(model) = args.model {
        config.ocr_model = model;
    }
    if config.api_key.is_empty() {
        anyhow::bail!("MISTRAL_API_KEY is not set");
    }

    let documents = find_documents(&args.input)?;
    if documents.is_empty() {
        warn!(
            "No supported documents ({}) found in {}",
            SUPPORTED_EXTENSIONS.join("/"),
            args.input.display()
        );
        return Ok(());
    }
    info!("📂 Found {} documents to process", documents.len());

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output folder {}", args.output.display()))?;

    let client = MistralOcrClient::new(&config);

    let mut processed = 0usize;
    let mut failed = 0usize;
    for path in &documents {
        match process_one(&client, path, &args.output).await {
            Ok(pages) => {
                processed += 1;
                info!("✅ {} ({} pages)", path.display(), pages);
            }
            Err(e) => {
                failed += 1;
                error!("❌ {}: {:#}", path.display(), e);
            }
        }
    }

    info!("🏁 Done: {} processed, {} failed", processed, failed);
    Ok(())
}

/// Supported documents in `input`, sorted for a stable processing order.
fn find_documents(input: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(input)
        .with_context(|| format!("input folder does not exist: {}", input.display()))?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        if ext.as_deref().is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e)) {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

async fn process_one(client: &MistralOcrClient, path: &Path, output: &Path) -> Result<usize> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    let result = client.process_bytes(&data, &filename).await?;
    let document = ocr::combine_results(vec![result], "batch");
    let markdown = ocr::render_markdown(&document);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    std::fs::write(output.join(format!("{stem}.md")), &markdown)?;
    std::fs::write(
        output.join(format!("{stem}.json")),
        serde_json::to_vec_pretty(&document)?,
    )?;

    Ok(document.document_info.total_pages)
}
