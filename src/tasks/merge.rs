use crate::batch::{BestEffort, Skipped};
use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::document::media_box;
use crate::pdf::merge::merge_documents;
use crate::pdf::overlay::{Layer, Overlay, Rgb, StandardFont};
use crate::pdf::PdfDocument;
use lopdf::Document;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

const PAGE_NUMBER_SIZE: f32 = 10.0;
const PAGE_NUMBER_BASELINE: f32 = 20.0;

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    /// PDF files in merge order; missing or unreadable files are skipped
    #[arg(long, num_args = 1.., required = true)]
    pub pdf_files: Vec<PathBuf>,
    #[arg(long)]
    pub output_path: PathBuf,
    /// Carry every file's bookmarks over to the merged document
    #[arg(long)]
    #[serde(default)]
    pub preserve_bookmarks: bool,
    /// Stamp continuous page numbers at the bottom center of every page
    #[arg(long)]
    #[serde(default)]
    pub add_page_numbers: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
    pub total_pages: u32,
    pub file_count: usize,
    pub skipped: Vec<Skipped>,
}

#[instrument(skip_all, fields(files = params.pdf_files.len()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    if params.pdf_files.is_empty() {
        return Err(TaskError::invalid_parameter("No PDF files provided for merging"));
    }

    let mut progress = ctx.progress(params.pdf_files.len()).with_ceiling(90.0);
    let mut batch: BestEffort<Document> = BestEffort::new();
    for path in &params.pdf_files {
        progress.checkpoint()?;
        match PdfDocument::open(path) {
            Ok(pdf) => batch.accept(pdf.doc),
            Err(err) => batch.skip(path, err),
        }
        progress.advance();
    }
    if batch.is_empty() {
        return Err(TaskError::invalid_parameter("None of the PDF files could be read"));
    }

    let file_count = batch.accepted.len();
    let mut merged = merge_documents(batch.accepted, params.preserve_bookmarks)?;

    if params.add_page_numbers {
        number_pages(&mut merged, ctx)?;
    }

    PdfDocument::save(&mut merged, &params.output_path)?;
    progress.finish();

    let total_pages = merged.get_pages().len() as u32;
    info!(file_count, total_pages, skipped = batch.skipped.len(), "PDFs merged");
    Ok(Output {
        output_path: params.output_path,
        total_pages,
        file_count,
        skipped: batch.skipped,
    })
}

fn number_pages(doc: &mut Document, ctx: &TaskContext) -> Result<()> {
    let pages: Vec<_> = doc.get_pages().into_iter().collect();
    for (number, page_id) in pages {
        ctx.check_cancelled()?;
        let [x0, _, x1, _] = media_box(doc, page_id);
        let mut overlay = Overlay::new();
        overlay.fill_color(Rgb::BLACK).centered_text(
            StandardFont::Helvetica,
            PAGE_NUMBER_SIZE,
            (x1 - x0).abs() / 2.0,
            PAGE_NUMBER_BASELINE,
            &number.to_string(),
        );
        overlay.apply(doc, page_id, Layer::Foreground)?;
    }
    Ok(())
}
