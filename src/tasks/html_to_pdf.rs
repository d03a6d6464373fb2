use crate::collab::{HtmlSource, Margins, Orientation, PageSetup, PageSize};
use crate::context::TaskContext;
use crate::error::{Result, TaskError};
use crate::pdf::document::ensure_parent_dir;
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum InputSource {
    HtmlFile,
    HtmlString,
    Url,
}

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    /// Which of html_file, html_string or url to render
    #[arg(long, value_enum)]
    pub input_source: InputSource,
    #[arg(long)]
    pub html_file: Option<PathBuf>,
    #[arg(long)]
    pub html_string: Option<String>,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub output_path: PathBuf,
    /// A3, A4, A5, Letter or Legal (default A4)
    #[arg(long)]
    pub page_size: Option<String>,
    #[arg(long, value_enum)]
    pub orientation: Option<Orientation>,
    /// Millimetres (default 20)
    #[arg(long)]
    pub margin_top: Option<f32>,
    #[arg(long)]
    pub margin_bottom: Option<f32>,
    #[arg(long)]
    pub margin_left: Option<f32>,
    #[arg(long)]
    pub margin_right: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
}

fn html_source(params: &Params) -> Result<HtmlSource> {
    let present = |s: &Option<String>| {
        s.as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
    };
    match params.input_source {
        InputSource::HtmlFile => match &params.html_file {
            Some(path) if path.is_file() => Ok(HtmlSource::File(path.clone())),
            Some(path) => Err(TaskError::SourceNotFound(path.clone())),
            None => Err(TaskError::invalid_parameter("HTML file not specified")),
        },
        InputSource::HtmlString => present(&params.html_string)
            .map(HtmlSource::Markup)
            .ok_or_else(|| TaskError::invalid_parameter("HTML string not provided")),
        InputSource::Url => present(&params.url)
            .map(HtmlSource::Url)
            .ok_or_else(|| TaskError::invalid_parameter("URL not provided")),
    }
}

#[instrument(
    skip_all,
    fields(source = ?params.input_source, output = %params.output_path.display())
)]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let source = html_source(&params)?;
    let defaults = ctx.defaults();
    let margin = |value: Option<f32>| value.unwrap_or(defaults.html_margin);
    let setup = PageSetup {
        size: PageSize::from_name(params.page_size.as_deref().unwrap_or(&defaults.page_size)),
        orientation: params.orientation.unwrap_or_default(),
        margins: Margins {
            top: margin(params.margin_top),
            bottom: margin(params.margin_bottom),
            left: margin(params.margin_left),
            right: margin(params.margin_right),
        },
    };

    let mut progress = ctx.progress(1).with_ceiling(90.0);
    progress.checkpoint()?;
    ensure_parent_dir(&params.output_path)?;
    ctx.collaborators()
        .html_renderer
        .render(&source, &setup, &params.output_path)?;
    progress.advance();

    // A renderer that exits cleanly but writes garbage should still fail here.
    let pages = PdfDocument::open(&params.output_path)?.page_count();
    progress.finish();

    info!(pages, size = ?setup.size, orientation = ?setup.orientation, "HTML converted");
    Ok(Output {
        output_path: params.output_path,
    })
}
