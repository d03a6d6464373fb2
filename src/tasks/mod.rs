//! Task handlers. Each module takes a flat parameter object, does its work
//! through [`crate::pdf`] or a collaborator, and returns a flat result.

pub mod annotate;
pub mod compress;
pub mod decrypt;
pub mod delete_pages;
pub mod encrypt;
pub mod extract_text;
pub mod html_to_pdf;
pub mod images_to_pdf;
pub mod merge;
pub mod metadata;
pub mod ocr;
pub mod pdf_to_images;
pub mod rotate;
pub mod split;
pub mod watermark;

use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Split,
    DeletePages,
    Rotate,
    Merge,
    Watermark,
    Annotate,
    Encrypt,
    Decrypt,
    ExtractText,
    Compress,
    Ocr,
    HtmlToPdf,
    ImagesToPdf,
    PdfToImages,
    Metadata,
}

impl TaskKind {
    pub const ALL: [TaskKind; 15] = [
        TaskKind::Split,
        TaskKind::DeletePages,
        TaskKind::Rotate,
        TaskKind::Merge,
        TaskKind::Watermark,
        TaskKind::Annotate,
        TaskKind::Encrypt,
        TaskKind::Decrypt,
        TaskKind::ExtractText,
        TaskKind::Compress,
        TaskKind::Ocr,
        TaskKind::HtmlToPdf,
        TaskKind::ImagesToPdf,
        TaskKind::PdfToImages,
        TaskKind::Metadata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Split => "split",
            TaskKind::DeletePages => "delete_pages",
            TaskKind::Rotate => "rotate",
            TaskKind::Merge => "merge",
            TaskKind::Watermark => "watermark",
            TaskKind::Annotate => "annotate",
            TaskKind::Encrypt => "encrypt",
            TaskKind::Decrypt => "decrypt",
            TaskKind::ExtractText => "extract_text",
            TaskKind::Compress => "compress",
            TaskKind::Ocr => "ocr",
            TaskKind::HtmlToPdf => "html_to_pdf",
            TaskKind::ImagesToPdf => "images_to_pdf",
            TaskKind::PdfToImages => "pdf_to_images",
            TaskKind::Metadata => "metadata",
        }
    }

    /// Operation phrase that starts every user-facing failure message.
    pub fn failure_prefix(self) -> &'static str {
        match self {
            TaskKind::Split => "Error splitting PDF",
            TaskKind::DeletePages => "Error deleting pages from PDF",
            TaskKind::Rotate => "Error rotating PDF",
            TaskKind::Merge => "Error merging PDFs",
            TaskKind::Watermark => "Error adding watermark to PDF",
            TaskKind::Annotate => "Error adding annotation to PDF",
            TaskKind::Encrypt => "Error encrypting PDF",
            TaskKind::Decrypt => "Error decrypting PDF",
            TaskKind::ExtractText => "Error extracting text from PDF",
            TaskKind::Compress => "Error compressing PDF",
            TaskKind::Ocr => "Error performing OCR on PDF",
            TaskKind::HtmlToPdf => "Error converting HTML to PDF",
            TaskKind::ImagesToPdf => "Error converting images to PDF",
            TaskKind::PdfToImages => "Error converting PDF to images",
            TaskKind::Metadata => "Error reading PDF metadata",
        }
    }

    /// `"<prefix>: <error>"`, the message every surface shows.
    pub fn describe_failure(self, err: &TaskError) -> String {
        format!("{}: {}", self.failure_prefix(), err)
    }

    /// Run the task on a JSON parameter object, returning its JSON result.
    pub fn run_json(
        self,
        params: serde_json::Value,
        ctx: &TaskContext,
    ) -> Result<serde_json::Value> {
        match self {
            TaskKind::Split => dispatch(split::run, params, ctx),
            TaskKind::DeletePages => dispatch(delete_pages::run, params, ctx),
            TaskKind::Rotate => dispatch(rotate::run, params, ctx),
            TaskKind::Merge => dispatch(merge::run, params, ctx),
            TaskKind::Watermark => dispatch(watermark::run, params, ctx),
            TaskKind::Annotate => dispatch(annotate::run, params, ctx),
            TaskKind::Encrypt => dispatch(encrypt::run, params, ctx),
            TaskKind::Decrypt => dispatch(decrypt::run, params, ctx),
            TaskKind::ExtractText => dispatch(extract_text::run, params, ctx),
            TaskKind::Compress => dispatch(compress::run, params, ctx),
            TaskKind::Ocr => dispatch(ocr::run, params, ctx),
            TaskKind::HtmlToPdf => dispatch(html_to_pdf::run, params, ctx),
            TaskKind::ImagesToPdf => dispatch(images_to_pdf::run, params, ctx),
            TaskKind::PdfToImages => dispatch(pdf_to_images::run, params, ctx),
            TaskKind::Metadata => dispatch(metadata::run, params, ctx),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = TaskError;

    /// Accepts snake_case or kebab-case names.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().replace('-', "_");
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| TaskError::invalid_parameter(format!("unknown task '{}'", s)))
    }
}

fn dispatch<P, O>(
    run: fn(P, &TaskContext) -> Result<O>,
    params: serde_json::Value,
    ctx: &TaskContext,
) -> Result<serde_json::Value>
where
    P: DeserializeOwned,
    O: Serialize,
{
    let params: P = serde_json::from_value(params)
        .map_err(|e| TaskError::invalid_parameter(e.to_string()))?;
    let output = run(params, ctx)?;
    serde_json::to_value(output).map_err(|e| TaskError::library("Failed to encode result", e))
}

/// File name without directory or extension, `"document"` if there is none.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// `name` inside the context's session directory, creating the directory.
pub(crate) fn session_output(ctx: &TaskContext, name: &str) -> Result<PathBuf> {
    Ok(ctx.ensure_session_dir()?.join(name))
}

/// A required string parameter that must not be blank.
pub(crate) fn require_text<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(TaskError::invalid_parameter(format!("{} must not be empty", name)));
    }
    Ok(value)
}
