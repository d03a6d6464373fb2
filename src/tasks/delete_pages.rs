use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    #[arg(long)]
    pub output_path: PathBuf,
    /// Pages to remove, e.g. "2,4-6"
    #[arg(long)]
    pub pages_to_delete: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
    pub pages_deleted: usize,
    pub remaining_pages: u32,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display(), pages = %params.pages_to_delete))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let mut pdf = PdfDocument::open(&params.pdf_path)?;
    let total = pdf.page_count();
    let selected = ctx.selector().parse_as_set(&params.pages_to_delete, total)?;

    if selected.len() as u32 == total {
        return Err(TaskError::invalid_parameter(
            "Cannot delete every page; the result would be an empty PDF",
        ));
    }

    let mut progress = ctx.progress(1).with_ceiling(90.0);
    progress.checkpoint()?;
    pdf.delete_pages(&selected.page_numbers());
    progress.advance();

    PdfDocument::save(&mut pdf.doc, &params.output_path)?;
    progress.finish();

    let remaining_pages = pdf.page_count();
    info!(deleted = selected.len(), remaining_pages, "Pages deleted");
    Ok(Output {
        output_path: params.output_path,
        pages_deleted: selected.len(),
        remaining_pages,
    })
}
