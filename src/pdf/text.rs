use crate::error::{Result, TaskError};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// Extract text from specific pages (1-indexed) of a PDF.
///
/// pdf-extract handles layout better but gives up on some font setups; in
/// that case each page falls back to lopdf's simpler extractor.
pub fn extract_text_pages<P: AsRef<Path>>(path: P, pages: &[u32]) -> Result<Vec<PageText>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let doc = lopdf::Document::load_mem(&bytes)
        .map_err(|e| TaskError::library(format!("Failed to parse PDF: {}", path.display()), e))?;
    let total_pages = doc.get_pages().len() as u32;

    for &page in pages {
        if page == 0 || page > total_pages {
            return Err(TaskError::PageOutOfRange {
                page: i64::from(page),
                page_count: total_pages,
            });
        }
    }

    let by_page = match pdf_extract::extract_text_from_mem_by_pages(&bytes) {
        Ok(texts) if texts.len() == total_pages as usize => Some(texts),
        Ok(texts) => {
            warn!(
                extracted = texts.len(),
                expected = total_pages,
                "pdf-extract page count mismatch, using lopdf"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed, using lopdf");
            None
        }
    };

    let mut results = Vec::with_capacity(pages.len());
    for &page in pages {
        let text = match &by_page {
            Some(texts) => texts[(page - 1) as usize].clone(),
            None => doc.extract_text(&[page]).map_err(|e| {
                TaskError::library(format!("Failed to extract text from page {}", page), e)
            })?,
        };
        debug!(page, chars = text.len(), "Extracted page text");
        results.push(PageText { page, text });
    }

    Ok(results)
}

/// Collapse layout whitespace: trim every line and drop blank ones.
pub fn simplify_layout(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
