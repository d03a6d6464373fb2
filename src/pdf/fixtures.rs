//! In-memory documents for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Bookmark, Document, Object, Stream};
use std::path::{Path, PathBuf};

/// A Letter-sized document whose pages read "Page N". Fonts and the
/// MediaBox live on the Pages node so pages exercise inheritance.
pub fn document(pages: u32) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", n))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Like [`document`] with top-level bookmarks at the given 1-indexed pages.
pub fn document_with_outline(pages: u32, marks: &[(&str, u32)]) -> Document {
    let mut doc = document(pages);
    let page_ids = doc.get_pages();
    for (title, page) in marks {
        let bookmark = Bookmark::new(title.to_string(), [0.0, 0.0, 0.0], 0, page_ids[page]);
        doc.add_bookmark(bookmark, None);
    }
    if let Some(outline_id) = doc.build_outline() {
        doc.catalog_mut().unwrap().set("Outlines", outline_id);
    }
    doc
}

pub fn save(mut doc: Document, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

pub fn write_pdf(dir: &Path, name: &str, pages: u32) -> PathBuf {
    save(document(pages), dir, name)
}

/// A small RGBA PNG on disk.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 16) as u8, (y * 16) as u8, 128, 200])
    });
    img.save(&path).unwrap();
    path
}

/// The strings each page shows with `Tj`, in page order.
pub fn page_labels(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = Content::decode(&doc.get_page_content(id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| op.operands.first())
                .filter_map(|text| text.as_str().ok())
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
