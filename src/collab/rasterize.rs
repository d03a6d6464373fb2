use super::{locate, run_tool};
use crate::error::{Result, TaskError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Renders every page of a PDF to a PNG file.
pub trait Rasterizer {
    /// Write one PNG per page into `out_dir`, returned in page order.
    fn rasterize(&self, pdf: &Path, dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// `pdftoppm` from poppler-utils.
#[derive(Debug, Clone, Default)]
pub struct Pdftoppm {
    path: Option<PathBuf>,
}

impl Pdftoppm {
    pub fn new(path: Option<PathBuf>) -> Self {
        Pdftoppm { path }
    }
}

impl Rasterizer for Pdftoppm {
    #[instrument(skip(self), fields(pdf = %pdf.display()))]
    fn rasterize(&self, pdf: &Path, dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let program = locate("pdftoppm", self.path.as_deref())?;
        std::fs::create_dir_all(out_dir)?;

        let prefix = out_dir.join("page");
        let dpi = dpi.to_string();
        run_tool(
            "pdftoppm",
            &program,
            [
                OsStr::new("-png"),
                OsStr::new("-r"),
                OsStr::new(&dpi),
                pdf.as_os_str(),
                prefix.as_os_str(),
            ],
        )?;

        let pages = rendered_pages(out_dir)?;
        if pages.is_empty() {
            return Err(TaskError::Collaborator {
                tool: "pdftoppm".to_string(),
                message: "produced no images".to_string(),
            });
        }
        debug!(pages = pages.len(), "Pages rendered");
        Ok(pages)
    }
}

/// `page-<n>.png` files in `dir`, sorted by `n`. The width of `n` depends
/// on the page count, so a plain name sort is not enough.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let number = stem.strip_prefix("page-")?.parse().ok()?;
            let is_png = path.extension().is_some_and(|ext| ext == "png");
            is_png.then_some((number, path))
        })
        .collect();
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_pages_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-1.png", "notes.txt", "page-3.ppm"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = rendered_pages(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-02.png", "page-10.png"]);
    }

    #[test]
    fn test_missing_binary_is_tool_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let rasterizer = Pdftoppm::new(Some(dir.path().join("pdftoppm")));
        let err = rasterizer
            .rasterize(Path::new("in.pdf"), 72, dir.path())
            .unwrap_err();
        assert!(matches!(err, TaskError::ToolNotFound { .. }));
    }
}
