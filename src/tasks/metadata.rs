use super::file_stem;
use crate::context::TaskContext;
use crate::error::Result;
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    /// PDF to inspect
    #[arg(long)]
    pub pdf: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    /// File name without extension.
    pub name: String,
    /// Document information entries such as Title, Author and Producer.
    pub meta: BTreeMap<String, String>,
    pub page_count: u32,
}

#[instrument(skip_all, fields(pdf = %params.pdf.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    ctx.check_cancelled()?;
    let pdf = PdfDocument::open(&params.pdf)?;
    let output = Output {
        name: file_stem(&params.pdf),
        meta: pdf.info(),
        page_count: pdf.page_count(),
    };
    info!(entries = output.meta.len(), pages = output.page_count, "Metadata read");
    Ok(output)
}
