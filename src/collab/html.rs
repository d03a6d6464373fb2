use super::{locate, run_tool};
use crate::error::{Result, TaskError};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub enum HtmlSource {
    File(PathBuf),
    Markup(String),
    Url(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageSize {
    /// Unknown names fall back to A4.
    pub fn from_name(name: &str) -> PageSize {
        match name.trim().to_ascii_lowercase().as_str() {
            "a3" => PageSize::A3,
            "a5" => PageSize::A5,
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            _ => PageSize::A4,
        }
    }

    /// Portrait width and height as CSS lengths.
    fn dimensions(self) -> (&'static str, &'static str) {
        match self {
            PageSize::A3 => ("297mm", "420mm"),
            PageSize::A4 => ("210mm", "297mm"),
            PageSize::A5 => ("148mm", "210mm"),
            PageSize::Letter => ("8.5in", "11in"),
            PageSize::Legal => ("8.5in", "14in"),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageSetup {
    pub size: PageSize,
    pub orientation: Orientation,
    pub margins: Margins,
}

impl PageSetup {
    /// Width and height after applying the orientation.
    pub fn dimensions(&self) -> (&'static str, &'static str) {
        let (width, height) = self.size.dimensions();
        match self.orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        }
    }

    /// An `@page` rule carrying size and margins.
    pub fn stylesheet(&self) -> String {
        let (width, height) = self.dimensions();
        let m = self.margins;
        let mut css = String::new();
        let _ = writeln!(css, "@page {{");
        let _ = writeln!(css, "    size: {} {};", width, height);
        let _ = writeln!(css, "    margin-top: {}mm;", m.top);
        let _ = writeln!(css, "    margin-bottom: {}mm;", m.bottom);
        let _ = writeln!(css, "    margin-left: {}mm;", m.left);
        let _ = writeln!(css, "    margin-right: {}mm;", m.right);
        css.push('}');
        css.push('\n');
        css
    }
}

/// Lays out HTML into a PDF file.
pub trait HtmlRenderer {
    fn render(&self, source: &HtmlSource, setup: &PageSetup, output: &Path) -> Result<()>;
}

/// `weasyprint`, or `wkhtmltopdf` when weasyprint is not installed.
#[derive(Debug, Clone, Default)]
pub struct CommandLineRenderer {
    weasyprint: Option<PathBuf>,
    wkhtmltopdf: Option<PathBuf>,
}

impl CommandLineRenderer {
    pub fn new(weasyprint: Option<PathBuf>, wkhtmltopdf: Option<PathBuf>) -> Self {
        CommandLineRenderer {
            weasyprint,
            wkhtmltopdf,
        }
    }
}

impl HtmlRenderer for CommandLineRenderer {
    #[instrument(skip(self, source), fields(output = %output.display()))]
    fn render(&self, source: &HtmlSource, setup: &PageSetup, output: &Path) -> Result<()> {
        let work = tempfile::tempdir()?;
        let input = match source {
            HtmlSource::File(path) => path.as_os_str().to_os_string(),
            HtmlSource::Url(url) => OsString::from(url),
            HtmlSource::Markup(html) => {
                let path = work.path().join("input.html");
                std::fs::write(&path, html)?;
                path.into_os_string()
            }
        };

        if let Ok(program) = locate("weasyprint", self.weasyprint.as_deref()) {
            let stylesheet = work.path().join("page.css");
            std::fs::write(&stylesheet, setup.stylesheet())?;
            run_tool(
                "weasyprint",
                &program,
                [
                    OsStr::new("-s"),
                    stylesheet.as_os_str(),
                    input.as_os_str(),
                    output.as_os_str(),
                ],
            )?;
            debug!("Rendered with weasyprint");
            return Ok(());
        }

        let program = locate("wkhtmltopdf", self.wkhtmltopdf.as_deref()).map_err(|_| {
            TaskError::ToolNotFound {
                tool: "weasyprint or wkhtmltopdf".to_string(),
            }
        })?;
        info!("weasyprint not found, falling back to wkhtmltopdf");
        let mut args = wkhtmltopdf_args(setup);
        args.push(input);
        args.push(output.as_os_str().to_os_string());
        run_tool("wkhtmltopdf", &program, args)?;
        Ok(())
    }
}

fn wkhtmltopdf_args(setup: &PageSetup) -> Vec<OsString> {
    let (width, height) = setup.dimensions();
    let m = setup.margins;
    [
        ("--page-width", width.to_string()),
        ("--page-height", height.to_string()),
        ("--margin-top", format!("{}mm", m.top)),
        ("--margin-bottom", format!("{}mm", m.bottom)),
        ("--margin-left", format!("{}mm", m.left)),
        ("--margin-right", format!("{}mm", m.right)),
    ]
    .into_iter()
    .flat_map(|(flag, value)| [OsString::from(flag), OsString::from(value)])
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_names() {
        assert_eq!(PageSize::from_name("letter"), PageSize::Letter);
        assert_eq!(PageSize::from_name("A3"), PageSize::A3);
        assert_eq!(PageSize::from_name("B5"), PageSize::A4);
    }

    #[test]
    fn test_landscape_swaps_dimensions() {
        let setup = PageSetup {
            size: PageSize::A4,
            orientation: Orientation::Landscape,
            ..Default::default()
        };
        assert_eq!(setup.dimensions(), ("297mm", "210mm"));
    }

    #[test]
    fn test_stylesheet_has_size_and_margins() {
        let setup = PageSetup {
            size: PageSize::Letter,
            orientation: Orientation::Portrait,
            margins: Margins {
                top: 20.0,
                bottom: 15.5,
                left: 10.0,
                right: 10.0,
            },
        };
        let css = setup.stylesheet();
        assert!(css.starts_with("@page {"));
        assert!(css.contains("size: 8.5in 11in;"));
        assert!(css.contains("margin-top: 20mm;"));
        assert!(css.contains("margin-bottom: 15.5mm;"));
    }

    #[test]
    fn test_wkhtmltopdf_flags() {
        let args = wkhtmltopdf_args(&PageSetup::default());
        assert_eq!(args[0], "--page-width");
        assert_eq!(args[1], "210mm");
        assert_eq!(args.len(), 12);
    }

    #[test]
    fn test_no_renderer_installed() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CommandLineRenderer::new(
            Some(dir.path().join("weasyprint")),
            Some(dir.path().join("wkhtmltopdf")),
        );
        let err = renderer
            .render(
                &HtmlSource::Markup("<p>hi</p>".into()),
                &PageSetup::default(),
                &dir.path().join("out.pdf"),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::ToolNotFound { .. }));
    }
}
