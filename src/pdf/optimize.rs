//! Lossless size reduction.

use crate::error::{Result, TaskError};
use crate::pdf::document::ensure_parent_dir;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Document, Object, SaveOptions};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct OptimizeOptions {
    /// zlib level 0-9. Level 0 writes streams as they are.
    pub level: u32,
    pub optimize_images: bool,
    pub remove_metadata: bool,
}

/// What [`optimize`] changed before writing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeReport {
    pub streams_compressed: usize,
    pub images_compressed: usize,
}

/// Compress `doc` in place and write it to `path`.
pub fn optimize(
    doc: &mut Document,
    path: &Path,
    options: OptimizeOptions,
) -> Result<OptimizeReport> {
    let mut report = OptimizeReport::default();

    if options.remove_metadata {
        remove_metadata(doc)?;
    }

    doc.prune_objects();

    if options.level > 0 {
        for object in doc.objects.values_mut() {
            let Object::Stream(stream) = object else { continue };
            if !stream.allows_compression || stream.dict.get(b"Filter").is_ok() {
                continue;
            }
            let is_image =
                matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image");
            if is_image && !options.optimize_images {
                continue;
            }
            // Failures leave the stream uncompressed, which is still valid.
            let Ok(compressed) = deflate(&stream.content, options.level) else {
                continue;
            };
            if compressed.len() >= stream.content.len() {
                continue;
            }
            stream.dict.set("Filter", "FlateDecode");
            stream.set_content(compressed);
            if is_image {
                report.images_compressed += 1;
            } else {
                report.streams_compressed += 1;
            }
        }
    }

    let save_options = SaveOptions::builder()
        .use_object_streams(options.level > 0)
        .use_xref_streams(options.level > 0)
        .compression_level(options.level)
        .build();

    ensure_parent_dir(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    doc.save_with_options(&mut writer, save_options)
        .map_err(|e| TaskError::library(format!("Failed to save PDF: {}", path.display()), e))?;

    debug!(?report, level = options.level, "Optimized PDF written");
    Ok(report)
}

/// zlib-compress `data` at `level` (clamped to 9).
fn deflate(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Drop the information dictionary and the catalog's XMP stream.
pub fn remove_metadata(doc: &mut Document) -> Result<()> {
    doc.trailer.remove(b"Info");
    doc.catalog_mut()?.remove(b"Metadata");
    Ok(())
}
