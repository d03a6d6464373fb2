use clap::{Parser, Subcommand};
use pdftask::tasks::{
    annotate, compress, decrypt, delete_pages, encrypt, extract_text, html_to_pdf, images_to_pdf,
    merge, metadata, ocr, pdf_to_images, rotate, split, watermark,
};
use pdftask::TaskKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdftask")]
#[command(about = "PDF processing tasks from the command line or as an MCP server")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file (default: $PDFTASK_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as MCP server over stdio
    #[command(alias = "mcp")]
    Serve,

    /// Run a task from a JSON parameter object
    Run {
        /// Task name, e.g. split or delete-pages
        task: TaskKind,

        /// JSON file with the parameters, or "-" for stdin
        #[arg(long, default_value = "-")]
        params: String,
    },

    /// Split a PDF into several files
    #[command(alias = "burst")]
    Split(split::Params),

    /// Remove pages from a PDF
    DeletePages(delete_pages::Params),

    /// Rotate pages of a PDF
    Rotate(rotate::Params),

    /// Combine several PDFs into one
    Merge(merge::Params),

    /// Stamp text or an image on every page
    Watermark(watermark::Params),

    /// Draw a text, highlight, note or stamp annotation on one page
    Annotate(annotate::Params),

    /// Password-protect a PDF
    Encrypt(encrypt::Params),

    /// Remove password protection
    Decrypt(decrypt::Params),

    /// Write the text of selected pages to a Markdown file
    ExtractText(extract_text::Params),

    /// Recompress streams and drop unused objects
    Compress(compress::Params),

    /// Make a scanned PDF searchable
    Ocr(ocr::Params),

    /// Render HTML from a file, a string or a URL to PDF
    HtmlToPdf(html_to_pdf::Params),

    /// Turn images into a PDF with one page per image
    ImagesToPdf(images_to_pdf::Params),

    /// Render every page to a PNG file
    PdfToImages(pdf_to_images::Params),

    /// Show the document information dictionary
    #[command(alias = "info")]
    Metadata(metadata::Params),
}
