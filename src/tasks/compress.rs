use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::optimize::{optimize, OptimizeOptions};
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

const MAX_LEVEL: u32 = 9;

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub input_pdf: PathBuf,
    #[arg(long)]
    pub output_path: PathBuf,
    /// zlib level 0-9 (default 6)
    #[arg(long)]
    pub compression_level: Option<u32>,
    #[arg(long, action = clap::ArgAction::Set)]
    pub optimize_images: Option<bool>,
    /// Drop the document information dictionary and XMP metadata
    #[arg(long, action = clap::ArgAction::Set)]
    pub remove_metadata: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
    /// Bytes.
    pub original_size: f64,
    pub compressed_size: f64,
    /// Percent saved, two decimals; negative if the file grew.
    pub compression_ratio: f64,
}

#[instrument(skip_all, fields(pdf = %params.input_pdf.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let defaults = ctx.defaults();
    let level = params.compression_level.unwrap_or(defaults.compression_level);
    if level > MAX_LEVEL {
        return Err(TaskError::invalid_parameter(format!(
            "compression_level must be between 0 and {}, got {}",
            MAX_LEVEL, level
        )));
    }
    let options = OptimizeOptions {
        level,
        optimize_images: params.optimize_images.unwrap_or(defaults.optimize_images),
        remove_metadata: params.remove_metadata.unwrap_or(defaults.remove_metadata),
    };

    let mut pdf = PdfDocument::open(&params.input_pdf)?;
    let original_size = std::fs::metadata(&params.input_pdf)?.len() as f64;

    let mut progress = ctx.progress(1).with_ceiling(90.0);
    progress.checkpoint()?;
    let report = optimize(&mut pdf.doc, &params.output_path, options)?;
    progress.advance();

    let compressed_size = std::fs::metadata(&params.output_path)?.len() as f64;
    let compression_ratio = ratio(original_size, compressed_size);
    progress.finish();

    info!(
        original_size,
        compressed_size,
        compression_ratio,
        streams = report.streams_compressed,
        images = report.images_compressed,
        "PDF compressed"
    );
    Ok(Output {
        output_path: params.output_path,
        original_size,
        compressed_size,
        compression_ratio,
    })
}

fn ratio(original: f64, compressed: f64) -> f64 {
    if original <= 0.0 {
        return 0.0;
    }
    ((original - compressed) / original * 10_000.0).round() / 100.0
}
