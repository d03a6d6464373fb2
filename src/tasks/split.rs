use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::page_range::PageSpan;
use crate::pdf::toc::bookmark_start_pages;
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    clap::ValueEnum,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SplitMode {
    /// One file per page
    SinglePages,
    /// One file per range of `page_ranges`
    PageRanges,
    /// One file per bookmarked section
    Bookmarks,
    /// Files of `pages_per_part` pages
    EqualParts,
}

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    /// PDF file to split
    #[arg(long)]
    pub pdf_path: PathBuf,
    /// Directory for the parts
    #[arg(long)]
    pub output_dir: PathBuf,
    #[arg(long, value_enum)]
    pub split_mode: SplitMode,
    /// Ranges such as "1-3,5-7,10", required for page_ranges mode
    #[arg(long)]
    pub page_ranges: Option<String>,
    /// Pages per file in equal_parts mode (default 10)
    #[arg(long)]
    pub pages_per_part: Option<u32>,
    /// File name prefix (default "page")
    #[arg(long)]
    pub filename_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_files: Vec<PathBuf>,
    pub files_created: usize,
}

/// One output file: its name and 1-indexed pages.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    file_name: String,
    pages: Vec<u32>,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display(), mode = ?params.split_mode))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let pdf = PdfDocument::open(&params.pdf_path)?;
    let total = pdf.page_count();
    let defaults = ctx.defaults();
    let prefix = params
        .filename_prefix
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| defaults.filename_prefix.clone());

    let parts = match params.split_mode {
        SplitMode::SinglePages => single_pages(&prefix, total),
        SplitMode::PageRanges => {
            let expression = params
                .page_ranges
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| {
                    TaskError::invalid_parameter(
                        "Page ranges must be specified for page_ranges mode",
                    )
                })?;
            let spans = ctx.selector().parse_as_range_list(&expression, total)?;
            range_parts(&prefix, &spans)
        }
        SplitMode::Bookmarks => {
            let starts = bookmark_start_pages(&pdf.doc);
            if starts.is_empty() {
                return Err(TaskError::invalid_parameter("PDF has no bookmarks to split by"));
            }
            bookmark_parts(&prefix, &starts, total)
        }
        SplitMode::EqualParts => {
            let per_part = params.pages_per_part.unwrap_or(defaults.pages_per_part);
            if per_part == 0 {
                return Err(TaskError::invalid_parameter("pages_per_part must be at least 1"));
            }
            equal_parts(&prefix, total, per_part)
        }
    };

    std::fs::create_dir_all(&params.output_dir)?;
    let output_files = write_parts(&pdf, &parts, &params.output_dir, ctx)?;

    info!(files = output_files.len(), "PDF split");
    Ok(Output {
        files_created: output_files.len(),
        output_files,
    })
}

/// Write every part, removing the ones already written if a later one fails.
fn write_parts(
    pdf: &PdfDocument,
    parts: &[Part],
    dir: &Path,
    ctx: &TaskContext,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(parts.len());
    let mut progress = ctx.progress(parts.len());

    for part in parts {
        let path = dir.join(&part.file_name);
        let step = progress
            .checkpoint()
            .and_then(|()| pdf.extract_pages(&part.pages))
            .and_then(|mut doc| PdfDocument::save(&mut doc, &path));
        if let Err(err) = step {
            for path in &written {
                let _ = std::fs::remove_file(path);
            }
            return Err(err);
        }
        written.push(path);
        progress.advance();
    }
    Ok(written)
}

fn single_pages(prefix: &str, total: u32) -> Vec<Part> {
    (1..=total)
        .map(|page| Part {
            file_name: format!("{}_{:03}.pdf", prefix, page),
            pages: vec![page],
        })
        .collect()
}

fn range_parts(prefix: &str, spans: &[PageSpan]) -> Vec<Part> {
    spans
        .iter()
        .enumerate()
        .map(|(i, span)| Part {
            file_name: format!("{}_range_{}_{}.pdf", prefix, i + 1, span),
            pages: span.pages().collect(),
        })
        .collect()
}

/// Each bookmarked page starts a section that runs up to the next one.
/// Pages before the first bookmark form a section of their own.
fn bookmark_parts(prefix: &str, starts: &[u32], total: u32) -> Vec<Part> {
    let mut bounds: Vec<u32> = starts.iter().copied().filter(|&p| p >= 1 && p <= total).collect();
    if bounds.first() != Some(&1) {
        bounds.insert(0, 1);
    }
    bounds.push(total + 1);

    bounds
        .windows(2)
        .filter(|w| w[0] < w[1])
        .enumerate()
        .map(|(i, w)| Part {
            file_name: format!("{}_bookmark_{}.pdf", prefix, i + 1),
            pages: (w[0]..w[1]).collect(),
        })
        .collect()
}

fn equal_parts(prefix: &str, total: u32, per_part: u32) -> Vec<Part> {
    (1..=total)
        .step_by(per_part as usize)
        .enumerate()
        .map(|(i, start)| Part {
            file_name: format!("{}_part_{:02}.pdf", prefix, i + 1),
            pages: (start..=(start + per_part - 1).min(total)).collect(),
        })
        .collect()
}
