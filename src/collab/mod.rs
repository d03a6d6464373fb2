//! External programs that do the work this crate does not do itself:
//! rendering pages, recognizing text, laying out HTML and decrypting
//! files the PDF library cannot.
//!
//! Each concern is a trait so tasks can be tested with fakes; the default
//! implementations shell out to well-known command-line tools.

pub mod html;
pub mod ocr;
pub mod qpdf;
pub mod rasterize;

use crate::config::ToolPaths;
use crate::error::{Result, TaskError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, instrument};

pub use html::{HtmlRenderer, HtmlSource, Margins, Orientation, PageSetup, PageSize};
pub use ocr::{RecognizedWord, TextRecognizer};
pub use qpdf::Decryptor;
pub use rasterize::Rasterizer;

/// The collaborators a task may call, one per concern.
pub struct Collaborators {
    pub rasterizer: Box<dyn Rasterizer + Send + Sync>,
    pub recognizer: Box<dyn TextRecognizer + Send + Sync>,
    pub html_renderer: Box<dyn HtmlRenderer + Send + Sync>,
    pub decryptor: Box<dyn Decryptor + Send + Sync>,
}

impl Collaborators {
    /// Command-line implementations, located through `tools` or `PATH`.
    pub fn system(tools: &ToolPaths) -> Self {
        Collaborators {
            rasterizer: Box::new(rasterize::Pdftoppm::new(tools.pdftoppm.clone())),
            recognizer: Box::new(ocr::Tesseract::new(tools.tesseract.clone())),
            html_renderer: Box::new(html::CommandLineRenderer::new(
                tools.weasyprint.clone(),
                tools.wkhtmltopdf.clone(),
            )),
            decryptor: Box::new(qpdf::Qpdf::new(tools.qpdf.clone())),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Resolve `tool` to an executable: the configured path if given, else `PATH`.
pub fn locate(tool: &str, configured: Option<&Path>) -> Result<PathBuf> {
    let not_found = || TaskError::ToolNotFound {
        tool: tool.to_string(),
    };
    match configured {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => {
            debug!(tool, path = %path.display(), "Configured tool path does not exist");
            Err(not_found())
        }
        None => which::which(tool).map_err(|_| not_found()),
    }
}

/// Run `program` to completion, turning a non-zero exit into a
/// [`TaskError::Collaborator`] that carries stderr.
#[instrument(skip(args), fields(program = %program.display()))]
pub(crate) fn run_tool<I, S>(tool: &str, program: &Path, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| TaskError::Collaborator {
            tool: tool.to_string(),
            message: format!("failed to start: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TaskError::Collaborator {
            tool: tool.to_string(),
            message: match stderr.trim() {
                "" => format!("exited with {}", output.status),
                text => text.to_string(),
            },
        });
    }
    debug!("Tool finished");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_configured_path() {
        let err = locate("pdftoppm", Some(Path::new("/no/such/pdftoppm"))).unwrap_err();
        assert!(matches!(err, TaskError::ToolNotFound { ref tool } if tool == "pdftoppm"));
    }

    #[test]
    fn test_locate_unknown_tool_on_path() {
        let err = locate("pdftask-no-such-tool", None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ToolNotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_reports_failure() {
        let err = run_tool("false", Path::new("/bin/sh"), ["-c", "echo broken >&2; exit 3"])
            .unwrap_err();
        match err {
            TaskError::Collaborator { tool, message } => {
                assert_eq!(tool, "false");
                assert_eq!(message, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_captures_stdout() {
        let output = run_tool("sh", Path::new("/bin/sh"), ["-c", "printf ok"]).unwrap();
        assert_eq!(output.stdout, b"ok");
    }
}
