use crate::collab::RecognizedWord;
use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::builder::PdfBuilder;
use crate::pdf::images::{embed_image, open_image};
use crate::pdf::overlay::{Overlay, Rgb, StandardFont};
use crate::pdf::PdfDocument;
use image::GenericImageView;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

const TEXT_LAYER_SIZE: f32 = 12.0;
/// Text rendering mode that paints nothing but keeps text selectable.
const INVISIBLE: i64 = 3;

fn keep_images() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    #[arg(long)]
    pub output_path: PathBuf,
    /// Recognition language, e.g. "eng" or "deu+eng" (default "eng")
    #[arg(long)]
    pub language: Option<String>,
    /// Rendering resolution for recognition (default 300)
    #[arg(long)]
    pub dpi: Option<u32>,
    /// Keep the page image behind the text layer; when false only the text remains
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(default = "keep_images")]
    pub preserve_images: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
    pub pages_processed: usize,
    /// Mean per-page confidence (0-100), two decimals.
    pub confidence_score: f64,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let defaults = ctx.defaults();
    let language = params
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| defaults.ocr_language.clone());
    let dpi = params.dpi.unwrap_or(defaults.ocr_dpi);
    if dpi == 0 {
        return Err(TaskError::invalid_parameter("dpi must be greater than 0"));
    }

    // Fail on unreadable or locked input before starting any tool.
    PdfDocument::open(&params.pdf_path)?;

    let work = tempfile::tempdir()?;
    let collaborators = ctx.collaborators();
    let images = collaborators
        .rasterizer
        .rasterize(&params.pdf_path, dpi, work.path())?;

    let mut builder = PdfBuilder::new();
    let mut total_confidence = 0.0;
    let mut progress = ctx.progress(images.len()).with_ceiling(90.0);
    for (index, image_path) in images.iter().enumerate() {
        progress.checkpoint()?;
        let img = open_image(image_path)?;
        let (width, height) = img.dimensions();
        let (width, height) = (width as f32, height as f32);
        let words = collaborators.recognizer.recognize(image_path, &language)?;
        let confidence = page_confidence(&words);
        total_confidence += confidence;

        let mut overlay = Overlay::new();
        if params.preserve_images {
            let image_id = embed_image(builder.document_mut(), &img, 1.0)?;
            overlay.image(image_id, 0.0, 0.0, width, height);
        }
        let placed = text_layer(&mut overlay, &words, height, defaults.ocr_min_confidence);
        overlay.into_page(&mut builder, width, height)?;

        debug!(page = index + 1, words = placed, confidence, "Page recognized");
        progress.advance();
    }

    let pages_processed = images.len();
    let confidence_score = if pages_processed == 0 {
        0.0
    } else {
        (total_confidence / pages_processed as f64 * 100.0).round() / 100.0
    };

    let mut doc = builder.finish();
    PdfDocument::save(&mut doc, &params.output_path)?;
    progress.finish();

    info!(pages_processed, confidence_score, %language, "OCR complete");
    Ok(Output {
        output_path: params.output_path,
        pages_processed,
        confidence_score,
    })
}

/// Mean confidence of the words the engine scored at all.
fn page_confidence(words: &[RecognizedWord]) -> f64 {
    let scored: Vec<f64> = words
        .iter()
        .filter(|w| w.confidence > 0.0)
        .map(|w| f64::from(w.confidence))
        .collect();
    if scored.is_empty() {
        return 0.0;
    }
    scored.iter().sum::<f64>() / scored.len() as f64
}

/// Invisible words placed at their image position. Returns how many were kept.
fn text_layer(
    overlay: &mut Overlay,
    words: &[RecognizedWord],
    page_height: f32,
    min_confidence: f32,
) -> usize {
    overlay.render_mode(INVISIBLE).fill_color(Rgb::BLACK);
    let mut placed = 0;
    for word in words {
        let text = word.text.trim();
        if text.is_empty() || word.confidence <= min_confidence {
            continue;
        }
        overlay.text(
            StandardFont::Helvetica,
            TEXT_LAYER_SIZE,
            word.left,
            // Image rows grow downwards; the baseline sits on the box bottom
            page_height - (word.top + word.height),
            text,
        );
        placed += 1;
    }
    placed
}
