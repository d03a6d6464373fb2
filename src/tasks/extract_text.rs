use super::file_stem;
use crate::context::TaskContext;
use crate::error::Result;
use crate::pdf::document::ensure_parent_dir;
use crate::pdf::text::{extract_text_pages, simplify_layout, PageText};
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    /// Markdown file to write (default: <temp dir>/<name>_extracted.md)
    #[arg(long)]
    pub output_file: Option<PathBuf>,
    /// Pages to extract (default "all")
    #[arg(long)]
    pub page_range: Option<String>,
    /// Keep the extractor's line layout; when false, whitespace is collapsed
    #[arg(long, action = clap::ArgAction::Set)]
    pub preserve_formatting: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub markdown_file: PathBuf,
    pub pages_processed: usize,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let pdf = PdfDocument::open(&params.pdf_path)?;
    let expression = params.page_range.as_deref().unwrap_or("all");
    let selected = ctx.selector().parse_as_set(expression, pdf.page_count())?;
    let preserve = params
        .preserve_formatting
        .unwrap_or(ctx.defaults().preserve_formatting);

    let mut progress = ctx.progress(selected.len()).with_ceiling(90.0);
    progress.checkpoint()?;
    let pages = extract_text_pages(&params.pdf_path, &selected.page_numbers())?;

    let mut sections = Vec::with_capacity(pages.len());
    for page in &pages {
        progress.checkpoint()?;
        if let Some(section) = page_section(page, preserve) {
            sections.push(section);
        }
        progress.advance();
    }

    let markdown_file = params.output_file.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("{}_extracted.md", file_stem(&params.pdf_path)))
    });
    ensure_parent_dir(&markdown_file)?;
    std::fs::write(&markdown_file, sections.join("\n"))?;
    progress.finish();

    info!(pages = selected.len(), file = %markdown_file.display(), "Text extracted");
    Ok(Output {
        markdown_file,
        pages_processed: selected.len(),
    })
}

/// `## Page N` followed by the page text; pages without text are left out.
fn page_section(page: &PageText, preserve_formatting: bool) -> Option<String> {
    let text = if preserve_formatting {
        page.text.trim().to_string()
    } else {
        simplify_layout(&page.text)
    };
    if text.is_empty() {
        return None;
    }
    Some(format!("## Page {}\n{}\n", page.page, text))
}
