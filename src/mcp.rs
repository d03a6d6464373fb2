use anyhow::Result;
use pdftask::tasks::{
    annotate, compress, decrypt, delete_pages, encrypt, extract_text, html_to_pdf, images_to_pdf,
    merge, metadata, ocr, pdf_to_images, rotate, split, watermark,
};
use pdftask::{Config, TaskContext, TaskKind};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PdfTaskServer {
    config: Arc<Config>,
    tool_router: ToolRouter<Self>,
}

impl PdfTaskServer {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            tool_router: Self::tool_router(),
        }
    }

    /// Run `task` on the blocking pool with a fresh context and render the
    /// result as JSON, or as `Error: <operation>: <reason>`.
    async fn execute<O, F>(&self, kind: TaskKind, task: F) -> String
    where
        O: Serialize + Send + 'static,
        F: FnOnce(&TaskContext) -> pdftask::Result<O> + Send + 'static,
    {
        let ctx = TaskContext::new(Arc::clone(&self.config))
            .with_progress(move |value| debug!(task = %kind, progress = value, "Progress"));
        let job_id = ctx.job_id.clone();
        info!(task = %kind, %job_id, "Tool call");

        match tokio::task::spawn_blocking(move || task(&ctx)).await {
            Ok(Ok(output)) => {
                serde_json::to_string_pretty(&output).unwrap_or_else(|e| format!("Error: {}", e))
            }
            Ok(Err(err)) => {
                warn!(task = %kind, %job_id, kind = ?err.kind(), error = %err, "Task failed");
                format!("Error: {}", kind.describe_failure(&err))
            }
            Err(join) => format!("Error: {}: {}", kind.failure_prefix(), join),
        }
    }
}

#[tool_router]
impl PdfTaskServer {
    #[tool(description = "Split a PDF into single pages, page ranges (e.g. '1-3,5-7'), bookmark sections, or parts of pages_per_part pages")]
    async fn split(&self, Parameters(params): Parameters<split::Params>) -> String {
        self.execute(TaskKind::Split, move |ctx| split::run(params, ctx)).await
    }

    #[tool(description = "Delete pages from a PDF, e.g. pages_to_delete '2,4-6'")]
    async fn delete_pages(&self, Parameters(params): Parameters<delete_pages::Params>) -> String {
        self.execute(TaskKind::DeletePages, move |ctx| delete_pages::run(params, ctx))
            .await
    }

    #[tool(description = "Rotate pages of a PDF clockwise by 90, 180 or 270 degrees")]
    async fn rotate(&self, Parameters(params): Parameters<rotate::Params>) -> String {
        self.execute(TaskKind::Rotate, move |ctx| rotate::run(params, ctx)).await
    }

    #[tool(description = "Merge PDFs in order, optionally keeping bookmarks and adding page numbers. Unreadable files are skipped and listed")]
    async fn merge(&self, Parameters(params): Parameters<merge::Params>) -> String {
        self.execute(TaskKind::Merge, move |ctx| merge::run(params, ctx)).await
    }

    #[tool(description = "Add a text or image watermark to every page of a PDF")]
    async fn watermark(&self, Parameters(params): Parameters<watermark::Params>) -> String {
        self.execute(TaskKind::Watermark, move |ctx| watermark::run(params, ctx))
            .await
    }

    #[tool(description = "Draw a text, highlight, note or stamp annotation on one page of a PDF")]
    async fn annotate(&self, Parameters(params): Parameters<annotate::Params>) -> String {
        self.execute(TaskKind::Annotate, move |ctx| annotate::run(params, ctx))
            .await
    }

    #[tool(description = "Password-protect a PDF and set printing, copying and modification permissions")]
    async fn encrypt(&self, Parameters(params): Parameters<encrypt::Params>) -> String {
        self.execute(TaskKind::Encrypt, move |ctx| encrypt::run(params, ctx)).await
    }

    #[tool(description = "Remove password protection from a PDF using its user or owner password")]
    async fn decrypt(&self, Parameters(params): Parameters<decrypt::Params>) -> String {
        self.execute(TaskKind::Decrypt, move |ctx| decrypt::run(params, ctx)).await
    }

    #[tool(description = "Extract the text of selected pages into a Markdown file with one section per page")]
    async fn extract_text(&self, Parameters(params): Parameters<extract_text::Params>) -> String {
        self.execute(TaskKind::ExtractText, move |ctx| extract_text::run(params, ctx))
            .await
    }

    #[tool(description = "Reduce PDF size by recompressing streams and dropping unused objects and metadata")]
    async fn compress(&self, Parameters(params): Parameters<compress::Params>) -> String {
        self.execute(TaskKind::Compress, move |ctx| compress::run(params, ctx))
            .await
    }

    #[tool(description = "Make a scanned PDF searchable by adding an invisible OCR text layer")]
    async fn ocr(&self, Parameters(params): Parameters<ocr::Params>) -> String {
        self.execute(TaskKind::Ocr, move |ctx| ocr::run(params, ctx)).await
    }

    #[tool(description = "Convert an HTML file, HTML string or URL to PDF with a page size, orientation and margins")]
    async fn html_to_pdf(&self, Parameters(params): Parameters<html_to_pdf::Params>) -> String {
        self.execute(TaskKind::HtmlToPdf, move |ctx| html_to_pdf::run(params, ctx))
            .await
    }

    #[tool(description = "Combine images (files or directories) into a PDF with one page per image")]
    async fn images_to_pdf(&self, Parameters(params): Parameters<images_to_pdf::Params>) -> String {
        self.execute(TaskKind::ImagesToPdf, move |ctx| images_to_pdf::run(params, ctx))
            .await
    }

    #[tool(description = "Render every page of a PDF to page_<n>.png files")]
    async fn pdf_to_images(&self, Parameters(params): Parameters<pdf_to_images::Params>) -> String {
        self.execute(TaskKind::PdfToImages, move |ctx| pdf_to_images::run(params, ctx))
            .await
    }

    #[tool(description = "Read a PDF's document information (title, author, producer, dates) and page count")]
    async fn metadata(&self, Parameters(params): Parameters<metadata::Params>) -> String {
        self.execute(TaskKind::Metadata, move |ctx| metadata::run(params, ctx))
            .await
    }
}

#[tool_handler]
impl ServerHandler for PdfTaskServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "PDF processing tools. Each tool takes file paths and options and returns a JSON \
                 result, or a message starting with 'Error:'. Page ranges use 1-indexed numbers \
                 like '1,3,5-7' or 'all'."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server(config: Arc<Config>) -> Result<()> {
    let server = PdfTaskServer::new(config);

    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}
