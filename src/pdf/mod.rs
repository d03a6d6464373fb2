pub mod builder;
pub mod document;
pub mod images;
pub mod merge;
pub mod optimize;
pub mod overlay;
pub mod security;
pub mod text;
pub mod toc;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::PdfDocument;
