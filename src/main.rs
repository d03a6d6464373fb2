mod cli;
mod mcp;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands};
use pdftask::tasks::{
    annotate, compress, decrypt, delete_pages, encrypt, extract_text, html_to_pdf, images_to_pdf,
    merge, metadata, ocr, pdf_to_images, rotate, split, watermark,
};
use pdftask::{Config, TaskContext, TaskKind};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries results and the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(cli.config.as_deref())?);

    match cli.command {
        Commands::Serve => mcp::run_server(config).await?,
        Commands::Run { task, params } => {
            let value = read_params(&params)?;
            execute(task, config, |ctx| task.run_json(value, ctx))?
        }
        Commands::Split(p) => execute(TaskKind::Split, config, |ctx| split::run(p, ctx))?,
        Commands::DeletePages(p) => {
            execute(TaskKind::DeletePages, config, |ctx| delete_pages::run(p, ctx))?
        }
        Commands::Rotate(p) => execute(TaskKind::Rotate, config, |ctx| rotate::run(p, ctx))?,
        Commands::Merge(p) => execute(TaskKind::Merge, config, |ctx| merge::run(p, ctx))?,
        Commands::Watermark(p) => {
            execute(TaskKind::Watermark, config, |ctx| watermark::run(p, ctx))?
        }
        Commands::Annotate(p) => execute(TaskKind::Annotate, config, |ctx| annotate::run(p, ctx))?,
        Commands::Encrypt(p) => execute(TaskKind::Encrypt, config, |ctx| encrypt::run(p, ctx))?,
        Commands::Decrypt(p) => execute(TaskKind::Decrypt, config, |ctx| decrypt::run(p, ctx))?,
        Commands::ExtractText(p) => {
            execute(TaskKind::ExtractText, config, |ctx| extract_text::run(p, ctx))?
        }
        Commands::Compress(p) => execute(TaskKind::Compress, config, |ctx| compress::run(p, ctx))?,
        Commands::Ocr(p) => execute(TaskKind::Ocr, config, |ctx| ocr::run(p, ctx))?,
        Commands::HtmlToPdf(p) => {
            execute(TaskKind::HtmlToPdf, config, |ctx| html_to_pdf::run(p, ctx))?
        }
        Commands::ImagesToPdf(p) => {
            execute(TaskKind::ImagesToPdf, config, |ctx| images_to_pdf::run(p, ctx))?
        }
        Commands::PdfToImages(p) => {
            execute(TaskKind::PdfToImages, config, |ctx| pdf_to_images::run(p, ctx))?
        }
        Commands::Metadata(p) => execute(TaskKind::Metadata, config, |ctx| metadata::run(p, ctx))?,
    }

    Ok(())
}

/// Run one task and print its result as pretty JSON.
fn execute<O, F>(kind: TaskKind, config: Arc<Config>, task: F) -> Result<()>
where
    O: Serialize,
    F: FnOnce(&TaskContext) -> pdftask::Result<O>,
{
    let ctx = TaskContext::new(config).with_progress(|value| debug!(progress = value, "Progress"));
    let output = task(&ctx).map_err(|e| anyhow!(kind.describe_failure(&e)))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_params(source: &str) -> Result<serde_json::Value> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read parameters from stdin")?;
        text
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read parameters from {}", source))?
    };
    serde_json::from_str(&text).context("Parameters are not valid JSON")
}
