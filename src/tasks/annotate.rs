use super::require_text;
use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::overlay::{Layer, Overlay, Rgb, StandardFont};
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

const TEXT_SIZE: f32 = 12.0;
const NOTE_TEXT_SIZE: f32 = 8.0;
const STAMP_TEXT_SIZE: f32 = 10.0;
const NOTE_RADIUS: f32 = 8.0;
const HIGHLIGHT_OPACITY: f32 = 0.3;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    /// Plain text in the annotation color
    #[default]
    Text,
    /// Translucent box behind black text
    Highlight,
    /// Colored dot with a small caption beside it
    Note,
    /// Bold text inside an outlined box
    Stamp,
}

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    #[arg(long)]
    pub output_path: PathBuf,
    #[arg(long)]
    pub annotation_text: String,
    #[arg(long, value_enum)]
    pub annotation_type: Option<AnnotationType>,
    /// 1-indexed page to annotate (default 1)
    #[arg(long, allow_hyphen_values = true)]
    pub page_number: Option<i64>,
    /// Horizontal position as a fraction of the page width (default 0.1)
    #[arg(long)]
    pub x_position: Option<f32>,
    /// Vertical position as a fraction of the page height (default 0.9)
    #[arg(long)]
    pub y_position: Option<f32>,
    /// #RRGGBB; unreadable colors fall back to yellow
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let text = require_text(&params.annotation_text, "annotation_text")?;
    let defaults = ctx.defaults();
    let kind = params.annotation_type.unwrap_or_default();
    let color_name = params.color.as_deref().unwrap_or(&defaults.annotation_color);
    let color = Rgb::parse_hex(color_name).unwrap_or_else(|| {
        warn!(color = color_name, "Unreadable annotation color, using yellow");
        Rgb::YELLOW
    });

    let mut pdf = PdfDocument::open(&params.pdf_path)?;
    let page_count = pdf.page_count();
    let page = params.page_number.unwrap_or(1);
    let page_id = u32::try_from(page)
        .ok()
        .filter(|p| (1..=page_count).contains(p))
        .ok_or(TaskError::PageOutOfRange { page, page_count })
        .and_then(|p| pdf.page_id(p))?;

    let (width, height) = pdf.page_size(page_id);
    let x = params.x_position.unwrap_or(defaults.annotation_x) * width;
    let y = params.y_position.unwrap_or(defaults.annotation_y) * height;

    let mut progress = ctx.progress(1).with_ceiling(90.0);
    progress.checkpoint()?;
    let mut overlay = Overlay::new();
    draw(&mut overlay, kind, text, x, y, color);
    overlay.apply(&mut pdf.doc, page_id, Layer::Foreground)?;
    progress.advance();

    PdfDocument::save(&mut pdf.doc, &params.output_path)?;
    progress.finish();

    info!(?kind, page, "Annotation added");
    Ok(Output {
        output_path: params.output_path,
    })
}

fn draw(overlay: &mut Overlay, kind: AnnotationType, text: &str, x: f32, y: f32, color: Rgb) {
    let chars = text.chars().count() as f32;
    match kind {
        AnnotationType::Text => {
            overlay
                .fill_color(color)
                .text(StandardFont::Helvetica, TEXT_SIZE, x, y, text);
        }
        AnnotationType::Highlight => {
            overlay
                .save_state()
                .opacity(HIGHLIGHT_OPACITY)
                .fill_color(color)
                .fill_rect(x, y - 2.0, chars * 7.0, 14.0)
                .restore_state()
                .fill_color(Rgb::BLACK)
                .text(StandardFont::Helvetica, TEXT_SIZE, x, y, text);
        }
        AnnotationType::Note => {
            overlay
                .fill_color(color)
                .stroke_color(color)
                .circle(x, y, NOTE_RADIUS)
                .fill_color(Rgb::BLACK)
                .text(StandardFont::Helvetica, NOTE_TEXT_SIZE, x + 15.0, y - 3.0, text);
        }
        AnnotationType::Stamp => {
            overlay
                .stroke_color(color)
                .stroke_rect(x, y, chars * 8.0, 20.0)
                .fill_color(Rgb::BLACK)
                .text(StandardFont::HelveticaBold, STAMP_TEXT_SIZE, x + 5.0, y + 5.0, text);
        }
    }
}
