use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    #[arg(long)]
    pub output_path: PathBuf,
    /// Clockwise degrees: 90, 180 or 270 (any multiple of 90 is accepted)
    #[arg(long, allow_hyphen_values = true)]
    pub rotation_angle: i64,
    /// Pages to rotate (default "all")
    #[arg(long)]
    pub page_range: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
    pub pages_rotated: usize,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display(), angle = params.rotation_angle))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    if params.rotation_angle % 90 != 0 {
        return Err(TaskError::invalid_parameter(format!(
            "rotation_angle must be a multiple of 90, got {}",
            params.rotation_angle
        )));
    }

    let mut pdf = PdfDocument::open(&params.pdf_path)?;
    let expression = params.page_range.as_deref().unwrap_or("all");
    let selected = ctx.selector().parse_as_set(expression, pdf.page_count())?;

    let mut progress = ctx.progress(selected.len()).with_ceiling(90.0);
    for page in selected.page_numbers() {
        progress.checkpoint()?;
        let page_id = pdf.page_id(page)?;
        let rotation = pdf.rotate_page(page_id, params.rotation_angle)?;
        debug!(page, rotation, "Page rotated");
        progress.advance();
    }

    PdfDocument::save(&mut pdf.doc, &params.output_path)?;
    progress.finish();

    info!(pages = selected.len(), "PDF rotated");
    Ok(Output {
        output_path: params.output_path,
        pages_rotated: selected.len(),
    })
}
