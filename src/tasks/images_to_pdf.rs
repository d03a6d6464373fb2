use crate::batch::{BestEffort, Skipped};
use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::builder::{set_info, PdfBuilder};
use crate::pdf::images::{embed_image, open_image};
use crate::pdf::overlay::Overlay;
use crate::pdf::PdfDocument;
use image::{DynamicImage, GenericImageView};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    /// Image files, or directories whose images are taken in name order
    #[arg(long, num_args = 1.., required = true)]
    pub image_paths: Vec<PathBuf>,
    /// Output file; a path not ending in .pdf is treated as a directory
    #[arg(long)]
    pub pdf_file_path: Option<PathBuf>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub pdf_file_path: PathBuf,
    pub page_count: usize,
    pub skipped: Vec<Skipped>,
}

#[instrument(skip_all, fields(inputs = params.image_paths.len()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let pdf_file_path = output_path(params.pdf_file_path.as_deref(), ctx)?;

    // Every input is fully decoded here; anything that fails is skipped.
    let mut batch: BestEffort<(PathBuf, DynamicImage)> = BestEffort::new();
    for path in expand_inputs(&params.image_paths) {
        ctx.check_cancelled()?;
        match open_image(&path) {
            Ok(img) => batch.accept((path, img)),
            Err(err) => batch.skip(&path, err),
        }
    }
    if batch.is_empty() {
        return Err(TaskError::invalid_parameter("No valid images found in the input list"));
    }

    let resolution = ctx.defaults().image_resolution;
    let mut builder = PdfBuilder::new();
    let mut progress = ctx.progress(batch.accepted.len()).with_ceiling(90.0);
    for (path, img) in &batch.accepted {
        progress.checkpoint()?;
        let (width, height) = img.dimensions();
        let page_width = width as f32 * 72.0 / resolution;
        let page_height = height as f32 * 72.0 / resolution;

        let image_id = embed_image(builder.document_mut(), img, 1.0)?;
        let mut overlay = Overlay::new();
        overlay.image(image_id, 0.0, 0.0, page_width, page_height);
        overlay.into_page(&mut builder, page_width, page_height)?;
        debug!(image = %path.display(), page_width, page_height, "Image page added");
        progress.advance();
    }

    let page_count = builder.page_count();
    let mut doc = builder.finish();
    let mut info_entries = Vec::new();
    if let Some(title) = &params.title {
        info_entries.push(("Title", title.as_str()));
    }
    if let Some(author) = &params.author {
        info_entries.push(("Author", author.as_str()));
    }
    set_info(&mut doc, &info_entries)?;

    PdfDocument::save(&mut doc, &pdf_file_path)?;
    progress.finish();

    info!(
        page_count,
        skipped = batch.skipped.len(),
        output = %pdf_file_path.display(),
        "Images converted"
    );
    Ok(Output {
        pdf_file_path,
        page_count,
        skipped: batch.skipped,
    })
}

/// Where the PDF goes. Anything not named `*.pdf` is a directory that gets
/// `<job_id>.pdf`; no path at all means the session directory.
fn output_path(requested: Option<&Path>, ctx: &TaskContext) -> Result<PathBuf> {
    let file_name = format!("{}.pdf", ctx.job_id);
    match requested {
        Some(path) if has_pdf_extension(path) => Ok(path.to_path_buf()),
        Some(dir) => Ok(dir.join(file_name)),
        None => super::session_output(ctx, &file_name),
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Files stay as given; directories contribute their files sorted by name.
fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                WalkDir::new(input)
                    .min_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.into_path()),
            );
        } else {
            files.push(input.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::recording_context;
    use crate::pdf::fixtures;

    #[test]
    fn test_images_become_pages() {
        let dir = tempfile::tempdir().unwrap();
        let a = fixtures::write_png(dir.path(), "a.png", 200, 100);
        let b = fixtures::write_png(dir.path(), "b.png", 50, 50);
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "not an image").unwrap();
        let out = dir.path().join("album.pdf");
        let (ctx, seen) = recording_context();

        let result = run(
            Params {
                image_paths: vec![a, notes.clone(), b],
                pdf_file_path: Some(out.clone()),
                title: Some("Album".into()),
                author: Some("Me".into()),
            },
            &ctx,
        )
        .unwrap();

        assert_eq!(result.page_count, 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].path, notes);
        assert_eq!(*seen.lock().unwrap(), vec![45.0, 90.0, 100.0]);

        let saved = PdfDocument::open(&out).unwrap();
        assert_eq!(saved.page_count(), 2);
        // 200 px at 100 ppi is 144 pt
        assert_eq!(saved.page_size(saved.page_id(1).unwrap()), (144.0, 72.0));
        assert_eq!(saved.info().get("Title").map(String::as_str), Some("Album"));
        assert_eq!(saved.info().get("Author").map(String::as_str), Some("Me"));
    }

    #[test]
    fn test_directory_input_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("scans");
        std::fs::create_dir(&images).unwrap();
        fixtures::write_png(&images, "2.png", 10, 20);
        fixtures::write_png(&images, "1.png", 20, 10);

        let files = expand_inputs(&[images.clone()]);
        assert_eq!(files, vec![images.join("1.png"), images.join("2.png")]);
    }

    #[test]
    fn test_output_path_rules() {
        let (ctx, _) = recording_context();
        let ctx = ctx
            .with_job_id("job7")
            .with_session_dir(std::env::temp_dir().join("pdftask-out"));

        assert_eq!(
            output_path(Some(Path::new("/x/book.PDF")), &ctx).unwrap(),
            PathBuf::from("/x/book.PDF")
        );
        assert_eq!(
            output_path(Some(Path::new("/x/exports")), &ctx).unwrap(),
            PathBuf::from("/x/exports/job7.pdf")
        );
        assert_eq!(
            output_path(None, &ctx).unwrap(),
            std::env::temp_dir().join("pdftask-out").join("job7.pdf")
        );
    }

    #[test]
    fn test_truncated_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = fixtures::write_png(dir.path(), "good.png", 40, 40);
        let whole = fixtures::write_png(dir.path(), "whole.png", 64, 64);
        let bytes = std::fs::read(&whole).unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, &bytes[..bytes.len() / 2]).unwrap();
        let (ctx, _) = recording_context();

        let result = run(
            Params {
                image_paths: vec![good, bad.clone()],
                pdf_file_path: Some(dir.path().join("out.pdf")),
                title: None,
                author: None,
            },
            &ctx,
        )
        .unwrap();

        assert_eq!(result.page_count, 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].path, bad);
    }

    #[test]
    fn test_no_valid_images() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = recording_context();
        let err = run(
            Params {
                image_paths: vec![dir.path().join("missing.png")],
                pdf_file_path: Some(dir.path().join("out.pdf")),
                title: None,
                author: None,
            },
            &ctx,
        )
        .unwrap_err();
        assert!(err.to_string().contains("No valid images found in the input list"));
    }
}
