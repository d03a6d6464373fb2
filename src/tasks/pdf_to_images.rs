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
    /// Directory for page_<n>.png files (default: the session directory)
    #[arg(long)]
    pub image_dir: Option<PathBuf>,
    /// Rendering resolution (default 200)
    #[arg(long)]
    pub dpi: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub image_dir: PathBuf,
    pub image_files: Vec<PathBuf>,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let dpi = params.dpi.unwrap_or(ctx.defaults().raster_dpi);
    if dpi == 0 {
        return Err(TaskError::invalid_parameter("dpi must be greater than 0"));
    }
    PdfDocument::open(&params.pdf_path)?;

    let image_dir = match params.image_dir {
        Some(dir) => dir,
        None => ctx.ensure_session_dir()?.to_path_buf(),
    };
    std::fs::create_dir_all(&image_dir)?;

    // Render into scratch space so a failed run leaves image_dir untouched.
    let work = tempfile::tempdir()?;
    let rendered = ctx
        .collaborators()
        .rasterizer
        .rasterize(&params.pdf_path, dpi, work.path())?;

    let mut image_files = Vec::with_capacity(rendered.len());
    let mut progress = ctx.progress(rendered.len());
    for (index, source) in rendered.iter().enumerate() {
        if let Err(err) = progress.checkpoint() {
            remove_all(&image_files);
            return Err(err);
        }
        let target = image_dir.join(format!("page_{}.png", index + 1));
        if let Err(err) = std::fs::copy(source, &target) {
            remove_all(&image_files);
            return Err(err.into());
        }
        image_files.push(target);
        progress.advance();
    }

    info!(pages = image_files.len(), dpi, dir = %image_dir.display(), "PDF rendered to images");
    Ok(Output {
        image_dir,
        image_files,
    })
}

fn remove_all(files: &[PathBuf]) {
    for file in files {
        let _ = std::fs::remove_file(file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Collaborators, Rasterizer};
    use crate::config::ToolPaths;
    use crate::context::tests::recording_context;
    use crate::pdf::fixtures;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    struct FakeRasterizer(Arc<Mutex<Vec<u32>>>);

    impl Rasterizer for FakeRasterizer {
        fn rasterize(&self, pdf: &Path, dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
            self.0.lock().unwrap().push(dpi);
            let pages = PdfDocument::open(pdf)?.page_count();
            Ok((1..=pages)
                .map(|n| fixtures::write_png(out_dir, &format!("page-{}.png", n), 8, 8))
                .collect())
        }
    }

    fn context_with_rasterizer() -> (TaskContext, Arc<Mutex<Vec<f64>>>, Arc<Mutex<Vec<u32>>>) {
        let dpis = Arc::new(Mutex::new(Vec::new()));
        let mut collaborators = Collaborators::system(&ToolPaths::default());
        collaborators.rasterizer = Box::new(FakeRasterizer(Arc::clone(&dpis)));
        let (ctx, seen) = recording_context();
        (ctx.with_collaborators(collaborators), seen, dpis)
    }

    #[test]
    fn test_pages_written_as_numbered_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 3);
        let images = dir.path().join("images");
        let (ctx, seen, dpis) = context_with_rasterizer();

        let result = run(
            Params {
                pdf_path: pdf,
                image_dir: Some(images.clone()),
                dpi: None,
            },
            &ctx,
        )
        .unwrap();

        assert_eq!(result.image_dir, images);
        assert_eq!(
            result.image_files,
            vec![images.join("page_1.png"), images.join("page_2.png"), images.join("page_3.png")]
        );
        assert!(result.image_files.iter().all(|f| f.exists()));
        assert_eq!(*dpis.lock().unwrap(), vec![200]);
        assert_eq!(seen.lock().unwrap().last(), Some(&100.0));
    }

    #[test]
    fn test_default_dir_is_session_dir() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 1);
        let (ctx, _, _) = context_with_rasterizer();
        let ctx = ctx.with_session_dir(dir.path().join("session"));

        let result = run(
            Params {
                pdf_path: pdf,
                image_dir: None,
                dpi: Some(72),
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(result.image_dir, dir.path().join("session"));
        assert_eq!(result.image_files.len(), 1);
    }

    #[test]
    fn test_cancelled_run_leaves_no_images() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 2);
        let images = dir.path().join("images");
        let (ctx, _, _) = context_with_rasterizer();
        ctx.cancel_token().cancel();

        let err = run(
            Params {
                pdf_path: pdf,
                image_dir: Some(images.clone()),
                dpi: None,
            },
            &ctx,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Cancelled);
        assert_eq!(std::fs::read_dir(&images).unwrap().count(), 0);
    }
}
