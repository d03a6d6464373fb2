use super::{file_stem, session_output};
use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::images::{embed_image, fit_scale, open_image};
use crate::pdf::overlay::{Layer, Overlay, Rgb, StandardFont};
use crate::pdf::PdfDocument;
use image::GenericImageView;
use lopdf::ObjectId;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Image watermarks are scaled down to this share of the shorter page side.
const IMAGE_MAX_SHARE: f32 = 0.3;

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    /// Text to stamp; takes precedence over watermark_image
    #[arg(long)]
    pub watermark_text: Option<String>,
    /// Image file to stamp
    #[arg(long)]
    pub watermark_image: Option<PathBuf>,
    /// Default: <session_dir>/<name>_watermarked_<job_id>.pdf
    #[arg(long)]
    pub output_path: Option<PathBuf>,
    /// Horizontal center as a fraction of the page width (default 0.5)
    #[arg(long)]
    pub position_x: Option<f32>,
    /// Vertical center as a fraction of the page height (default 0.5)
    #[arg(long)]
    pub position_y: Option<f32>,
    #[arg(long, value_enum)]
    pub layer: Option<Layer>,
    /// 0.0 (invisible) to 1.0 (opaque)
    #[arg(long)]
    pub opacity: Option<f32>,
    #[arg(long)]
    pub font_size: Option<f32>,
    /// Counter-clockwise degrees
    #[arg(long, allow_hyphen_values = true)]
    pub rotation: Option<f32>,
    /// Text color as #RRGGBB
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
}

enum Mark {
    Text { text: String, color: Rgb, font_size: f32 },
    Image { id: ObjectId, width: f32, height: f32 },
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let defaults = ctx.defaults();
    let opacity = params.opacity.unwrap_or(defaults.watermark_opacity);
    if !(0.0..=1.0).contains(&opacity) {
        return Err(TaskError::invalid_parameter("opacity must be between 0 and 1"));
    }
    let rotation = params.rotation.unwrap_or(defaults.watermark_rotation);
    let (fx, fy) = (params.position_x.unwrap_or(0.5), params.position_y.unwrap_or(0.5));
    let layer = params.layer.unwrap_or_default();

    let mut pdf = PdfDocument::open(&params.pdf_path)?;

    let text = params.watermark_text.filter(|t| !t.trim().is_empty());
    let mark = match (text, params.watermark_image) {
        (Some(text), _) => {
            let color_name = params.color.unwrap_or_else(|| defaults.watermark_color.clone());
            let color = Rgb::parse_hex(&color_name).ok_or_else(|| {
                TaskError::invalid_parameter(format!("invalid color '{}'", color_name))
            })?;
            Mark::Text {
                text,
                color,
                font_size: params.font_size.unwrap_or(defaults.watermark_font_size),
            }
        }
        (None, Some(path)) => {
            let img = open_image(&path)?;
            let (width, height) = img.dimensions();
            // Opacity is baked into the soft mask, so every page shares one XObject.
            let id = embed_image(&mut pdf.doc, &img, opacity)?;
            Mark::Image {
                id,
                width: width as f32,
                height: height as f32,
            }
        }
        (None, None) => {
            return Err(TaskError::invalid_parameter(
                "Either watermark_text or watermark_image must be provided",
            ))
        }
    };

    let pages = pdf.page_ids();
    let mut progress = ctx.progress(pages.len()).with_ceiling(90.0);
    for (_, page_id) in pages {
        progress.checkpoint()?;
        let (page_width, page_height) = pdf.page_size(page_id);
        let mut overlay = Overlay::new();
        overlay
            .save_state()
            .translate_rotate(fx * page_width, fy * page_height, rotation);
        match &mark {
            Mark::Text {
                text,
                color,
                font_size,
            } => {
                overlay
                    .opacity(opacity)
                    .fill_color(*color)
                    .centered_text(StandardFont::Helvetica, *font_size, 0.0, 0.0, text);
            }
            Mark::Image { id, width, height } => {
                let max = page_width.min(page_height) * IMAGE_MAX_SHARE;
                let scale = fit_scale(*width, *height, max, max);
                let (w, h) = (width * scale, height * scale);
                overlay.image(*id, -w / 2.0, -h / 2.0, w, h);
            }
        }
        overlay.restore_state();
        overlay.apply(&mut pdf.doc, page_id, layer)?;
        progress.advance();
    }

    let output_path = match params.output_path {
        Some(path) => path,
        None => session_output(
            ctx,
            &format!("{}_watermarked_{}.pdf", file_stem(&params.pdf_path), ctx.job_id),
        )?,
    };
    PdfDocument::save(&mut pdf.doc, &output_path)?;
    progress.finish();

    info!(output = %output_path.display(), "Watermark added");
    Ok(Output { output_path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::recording_context;
    use crate::pdf::fixtures;

    fn params(pdf_path: PathBuf) -> Params {
        Params {
            pdf_path,
            watermark_text: None,
            watermark_image: None,
            output_path: None,
            position_x: None,
            position_y: None,
            layer: None,
            opacity: None,
            font_size: None,
            rotation: None,
            color: None,
        }
    }

    fn page_content(path: &std::path::Path, page: u32) -> String {
        let pdf = PdfDocument::open(path).unwrap();
        let id = pdf.page_id(page).unwrap();
        String::from_utf8_lossy(&pdf.doc.get_page_content(id).unwrap()).into_owned()
    }

    #[test]
    fn test_text_watermark_on_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 2);
        let out = dir.path().join("out.pdf");
        let (ctx, _) = recording_context();

        let mut p = params(pdf);
        p.watermark_text = Some("CONFIDENTIAL".into());
        p.output_path = Some(out.clone());
        run(p, &ctx).unwrap();

        for page in 1..=2 {
            let content = page_content(&out, page);
            assert!(content.contains("(CONFIDENTIAL) Tj"));
            assert!(content.contains("/PtkGS300 gs"));
        }
    }

    #[test]
    fn test_default_output_in_session_dir() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "report.pdf", 1);
        let (ctx, _) = recording_context();
        let ctx = ctx.with_session_dir(dir.path().join("session")).with_job_id("job42");

        let mut p = params(pdf);
        p.watermark_text = Some("DRAFT".into());
        let result = run(p, &ctx).unwrap();
        assert_eq!(
            result.output_path,
            dir.path().join("session").join("report_watermarked_job42.pdf")
        );
        assert!(result.output_path.exists());
    }

    #[test]
    fn test_image_watermark_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 1);
        let logo = fixtures::write_png(dir.path(), "logo.png", 400, 200);
        let out = dir.path().join("out.pdf");
        let (ctx, _) = recording_context();

        let mut p = params(pdf);
        p.watermark_image = Some(logo);
        p.layer = Some(Layer::Background);
        p.output_path = Some(out.clone());
        run(p, &ctx).unwrap();

        let content = page_content(&out, 1);
        assert!(content.starts_with("q"));
        assert!(content.contains("Do"));
        let saved = PdfDocument::open(&out).unwrap();
        let page = saved.page_id(1).unwrap();
        let resources = saved.doc.get_dictionary(page).unwrap().get(b"Resources").unwrap();
        let xobjects = resources.as_dict().unwrap().get(b"XObject").unwrap().as_dict().unwrap();
        assert_eq!(xobjects.len(), 1);
    }

    #[test]
    fn test_watermark_needs_text_or_image() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 1);
        let (ctx, _) = recording_context();
        let err = run(params(pdf), &ctx).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_rejects_bad_opacity() {
        let (ctx, _) = recording_context();
        let mut p = params("in.pdf".into());
        p.watermark_text = Some("x".into());
        p.opacity = Some(1.5);
        assert!(run(p, &ctx).is_err());
    }
}
