//! Drawing on top of (or underneath) existing pages.
//!
//! An [`Overlay`] collects content-stream operations together with the
//! resources they use. Applying it adds a new content stream to the page
//! without decoding the page's existing content.

use crate::error::Result;
use crate::pdf::builder::PdfBuilder;
use crate::pdf::document::insert_page_resource;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Approximate advance of one character, as a fraction of the font size.
const HELVETICA_AVG_WIDTH: f32 = 0.5;
const HELVETICA_BOLD_AVG_WIDTH: f32 = 0.56;

/// Bezier handle length for approximating a quarter circle.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };
    pub const YELLOW: Rgb = Rgb { r: 1.0, g: 1.0, b: 0.0 };

    /// Parse `#RRGGBB` or `#RGB` (the `#` is optional).
    pub fn parse_hex(color: &str) -> Option<Rgb> {
        let hex = color.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| f32::from(v) / 255.0);
        let (r, g, b) = match hex.len() {
            6 => (channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?),
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                (expand(0)?, expand(1)?, expand(2)?)
            }
            _ => return None,
        };
        Some(Rgb { r, g, b })
    }
}

/// Whether an overlay is painted below or above the existing page content.
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
pub enum Layer {
    Background,
    #[default]
    Foreground,
}

/// Base-14 fonts every reader ships, so nothing needs embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
}

impl StandardFont {
    fn resource_name(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "PtkHelv",
            StandardFont::HelveticaBold => "PtkHelvB",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Estimated width of `text` in points.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let per_char = match self {
            StandardFont::Helvetica => HELVETICA_AVG_WIDTH,
            StandardFont::HelveticaBold => HELVETICA_BOLD_AVG_WIDTH,
        };
        text.chars().count() as f32 * size * per_char
    }
}

#[derive(Debug, Default)]
pub struct Overlay {
    operations: Vec<Operation>,
    fonts: BTreeMap<&'static str, StandardFont>,
    states: BTreeMap<String, f32>,
    images: BTreeMap<String, ObjectId>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) -> &mut Self {
        self.operations.push(Operation::new(operator, operands));
        self
    }

    pub fn save_state(&mut self) -> &mut Self {
        self.op("q", vec![])
    }

    pub fn restore_state(&mut self) -> &mut Self {
        self.op("Q", vec![])
    }

    pub fn fill_color(&mut self, color: Rgb) -> &mut Self {
        self.op("rg", vec![color.r.into(), color.g.into(), color.b.into()])
    }

    pub fn stroke_color(&mut self, color: Rgb) -> &mut Self {
        self.op("RG", vec![color.r.into(), color.g.into(), color.b.into()])
    }

    /// Set fill and stroke opacity through an ExtGState resource.
    pub fn opacity(&mut self, alpha: f32) -> &mut Self {
        let alpha = alpha.clamp(0.0, 1.0);
        let name = format!("PtkGS{}", (alpha * 1000.0).round() as u32);
        self.states.insert(name.clone(), alpha);
        self.op("gs", vec![Object::Name(name.into_bytes())])
    }

    /// Move the origin to (`x`, `y`) and rotate counter-clockwise by `degrees`.
    pub fn translate_rotate(&mut self, x: f32, y: f32, degrees: f32) -> &mut Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.op(
            "cm",
            vec![cos.into(), sin.into(), (-sin).into(), cos.into(), x.into(), y.into()],
        )
    }

    /// Draw `text` with its baseline starting at (`x`, `y`).
    pub fn text(&mut self, font: StandardFont, size: f32, x: f32, y: f32, text: &str) -> &mut Self {
        self.fonts.insert(font.resource_name(), font);
        self.op("BT", vec![])
            .op("Tf", vec![Object::Name(font.resource_name().into()), size.into()])
            .op("Td", vec![x.into(), y.into()])
            .op("Tj", vec![Object::string_literal(win_ansi(text))])
            .op("ET", vec![])
    }

    /// Draw `text` horizontally centered on `x`.
    pub fn centered_text(
        &mut self,
        font: StandardFont,
        size: f32,
        x: f32,
        y: f32,
        text: &str,
    ) -> &mut Self {
        let width = font.text_width(text, size);
        self.text(font, size, x - width / 2.0, y, text)
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.op("re", vec![x.into(), y.into(), width.into(), height.into()])
            .op("f", vec![])
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.op("re", vec![x.into(), y.into(), width.into(), height.into()])
            .op("S", vec![])
    }

    /// Fill and stroke a circle of `radius` around (`cx`, `cy`).
    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32) -> &mut Self {
        let k = radius * KAPPA;
        self.op("m", vec![(cx + radius).into(), cy.into()]);
        let quarters = [
            [cx + radius, cy + k, cx + k, cy + radius, cx, cy + radius],
            [cx - k, cy + radius, cx - radius, cy + k, cx - radius, cy],
            [cx - radius, cy - k, cx - k, cy - radius, cx, cy - radius],
            [cx + k, cy - radius, cx + radius, cy - k, cx + radius, cy],
        ];
        for q in quarters {
            self.op("c", q.iter().map(|&v| v.into()).collect());
        }
        self.op("B", vec![])
    }

    /// Paint an image XObject into the rectangle at (`x`, `y`).
    pub fn image(
        &mut self,
        image_id: ObjectId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> &mut Self {
        let name = format!("PtkIm{}", image_id.0);
        self.images.insert(name.clone(), image_id);
        self.save_state()
            .op(
                "cm",
                vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), y.into()],
            )
            .op("Do", vec![Object::Name(name.into_bytes())])
            .restore_state()
    }

    /// Text rendering mode; 3 makes text invisible but still selectable.
    pub fn render_mode(&mut self, mode: i64) -> &mut Self {
        self.op("Tr", vec![mode.into()])
    }

    /// Resource entries by category, in the form pages store them.
    fn resource_entries(&self) -> Vec<(&'static [u8], String, Object)> {
        let mut entries: Vec<(&'static [u8], String, Object)> = Vec::new();
        for (name, font) in &self.fonts {
            let font = dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            };
            entries.push((b"Font", name.to_string(), font.into()));
        }
        for (name, alpha) in &self.states {
            let state = dictionary! {
                "Type" => "ExtGState",
                "ca" => *alpha,
                "CA" => *alpha,
            };
            entries.push((b"ExtGState", name.clone(), state.into()));
        }
        for (name, id) in &self.images {
            entries.push((b"XObject", name.clone(), Object::Reference(*id)));
        }
        entries
    }

    /// Turn the overlay into a new `width` x `height` page of `builder`.
    pub fn into_page(self, builder: &mut PdfBuilder, width: f32, height: f32) -> Result<ObjectId> {
        let mut resources = Dictionary::new();
        for (category, name, value) in self.resource_entries() {
            match resources.get_mut(category).and_then(Object::as_dict_mut) {
                Ok(dict) => dict.set(name, value),
                Err(_) => resources.set(category, dictionary! { name => value }),
            }
        }
        let content = Content {
            operations: self.operations,
        };
        builder.add_page(width, height, content, resources)
    }

    /// Register resources and splice the overlay into the page's content.
    pub fn apply(self, doc: &mut Document, page_id: ObjectId, layer: Layer) -> Result<()> {
        for (category, name, value) in self.resource_entries() {
            insert_page_resource(doc, page_id, category, &name, value)?;
        }

        let existing = page_contents(doc, page_id);
        let body = Content {
            operations: self.operations,
        }
        .encode()?;

        let mut contents = Vec::with_capacity(existing.len() + 2);
        match layer {
            Layer::Background => {
                contents.push(add_stream(doc, wrap(b"q\n", &body, b"\nQ\n"))?);
                contents.extend(existing);
            }
            Layer::Foreground if existing.is_empty() => {
                contents.push(add_stream(doc, wrap(b"q\n", &body, b"\nQ\n"))?);
            }
            Layer::Foreground => {
                // Isolate the page's graphics state so the overlay starts from a clean one
                contents.push(add_stream(doc, b"q\n".to_vec())?);
                contents.extend(existing);
                contents.push(add_stream(doc, wrap(b"Q\nq\n", &body, b"\nQ\n"))?);
            }
        }

        doc.get_dictionary_mut(page_id)?.set("Contents", contents);
        Ok(())
    }
}

fn wrap(prefix: &[u8], body: &[u8], suffix: &[u8]) -> Vec<u8> {
    [prefix, body, suffix].concat()
}

fn add_stream(doc: &mut Document, content: Vec<u8>) -> Result<Object> {
    let mut stream = Stream::new(Dictionary::new(), content);
    stream.compress()?;
    Ok(Object::Reference(doc.add_object(stream)))
}

/// The page's content streams as references, in painting order.
fn page_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Characters outside Latin-1 have no glyph in WinAnsiEncoding.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(Rgb::parse_hex("#FF0000"), Some(Rgb { r: 1.0, g: 0.0, b: 0.0 }));
        assert_eq!(Rgb::parse_hex("00ff00"), Some(Rgb { r: 0.0, g: 1.0, b: 0.0 }));
        assert_eq!(Rgb::parse_hex("#fff"), Some(Rgb { r: 1.0, g: 1.0, b: 1.0 }));
        assert_eq!(Rgb::parse_hex("#12"), None);
        assert_eq!(Rgb::parse_hex("#GG0000"), None);
    }

    #[test]
    fn test_layer_deserializes_snake_case() {
        let layer: Layer = serde_json::from_str("\"background\"").unwrap();
        assert_eq!(layer, Layer::Background);
        assert_eq!(Layer::default(), Layer::Foreground);
    }

    #[test]
    fn test_text_width_estimate() {
        let width = StandardFont::Helvetica.text_width("1234", 10.0);
        assert_eq!(width, 20.0);
    }

    #[test]
    fn test_foreground_wraps_existing_content() {
        let mut doc = fixtures::document(1);
        let page = doc.get_pages()[&1];

        let mut overlay = Overlay::new();
        overlay.opacity(0.5).fill_color(Rgb::BLACK).text(
            StandardFont::Helvetica,
            12.0,
            10.0,
            10.0,
            "DRAFT",
        );
        overlay.apply(&mut doc, page, Layer::Foreground).unwrap();

        let dict = doc.get_dictionary(page).unwrap();
        let contents = dict.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 3);

        let resources = dict.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.get(b"F1").is_ok());
        assert!(fonts.get(b"PtkHelv").is_ok());
        assert!(resources.get(b"ExtGState").unwrap().as_dict().unwrap().get(b"PtkGS500").is_ok());
    }

    #[test]
    fn test_background_goes_first() {
        let mut doc = fixtures::document(1);
        let page = doc.get_pages()[&1];
        let original = page_contents(&doc, page);

        let mut overlay = Overlay::new();
        overlay.fill_rect(0.0, 0.0, 10.0, 10.0);
        overlay.apply(&mut doc, page, Layer::Background).unwrap();

        let contents = page_contents(&doc, page);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1], original[0]);
        assert!(doc.get_page_content(page).unwrap().starts_with(b"q"));
    }

    #[test]
    fn test_into_page_carries_resources() {
        let mut builder = PdfBuilder::new();
        let mut overlay = Overlay::new();
        overlay
            .render_mode(3)
            .text(StandardFont::Helvetica, 12.0, 5.0, 5.0, "hidden")
            .opacity(0.2)
            .fill_rect(0.0, 0.0, 1.0, 1.0);
        let page = overlay.into_page(&mut builder, 200.0, 100.0).unwrap();
        let doc = builder.finish();

        let resources = doc
            .get_dictionary(page)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap();
        assert!(resources.get(b"Font").unwrap().as_dict().unwrap().get(b"PtkHelv").is_ok());
        assert!(resources.get(b"ExtGState").unwrap().as_dict().unwrap().get(b"PtkGS200").is_ok());
        let content = doc.get_page_content(page).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("3 Tr"));
    }

    #[test]
    fn test_win_ansi_replaces_unmappable() {
        assert_eq!(win_ansi("Café ✓"), vec![b'C', b'a', b'f', 0xE9, b' ', b'?']);
    }
}
