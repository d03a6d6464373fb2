use crate::error::{Result, TaskError};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// US Letter, used when a page and its ancestors carry no MediaBox.
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against cyclic Parent chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

pub struct PdfDocument {
    pub doc: Document,
    pub path: PathBuf,
    /// The file was encrypted with an empty user password and decrypted on load.
    pub was_encrypted: bool,
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("path", &self.path)
            .field("pages", &self.page_count())
            .field("was_encrypted", &self.was_encrypted)
            .finish()
    }
}

impl PdfDocument {
    /// Open a PDF that can be read without a password.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let doc = load(path)?;
        if doc.is_encrypted() && doc.encryption_state.is_none() {
            return Err(TaskError::PasswordRequired(path.to_path_buf()));
        }
        Self::from_document(doc, path)
    }

    /// Wrap an already loaded document, rejecting documents without pages.
    pub fn from_document(mut doc: Document, path: &Path) -> Result<Self> {
        let was_encrypted = strip_encryption(&mut doc);
        let pdf = PdfDocument {
            doc,
            path: path.to_path_buf(),
            was_encrypted,
        };
        if pdf.page_count() == 0 {
            return Err(TaskError::EmptyDocument(pdf.path));
        }
        debug!(pages = pdf.page_count(), was_encrypted, "PDF loaded");
        Ok(pdf)
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Get 1-indexed page object IDs
    pub fn page_ids(&self) -> Vec<(u32, ObjectId)> {
        self.doc.get_pages().into_iter().collect()
    }

    /// Object id of the 1-indexed `page`.
    pub fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.doc
            .get_pages()
            .get(&page)
            .copied()
            .ok_or(TaskError::PageOutOfRange {
                page: i64::from(page),
                page_count: self.page_count(),
            })
    }

    /// Entries of the document information dictionary, keys without the leading `/`.
    pub fn info(&self) -> BTreeMap<String, String> {
        let dict = match self.doc.trailer.get(b"Info") {
            Ok(obj) => match self.doc.dereference(obj) {
                Ok((_, Object::Dictionary(dict))) => dict,
                _ => return BTreeMap::new(),
            },
            Err(_) => return BTreeMap::new(),
        };

        dict.iter()
            .filter_map(|(key, value)| {
                let value = info_value(&self.doc, value)?;
                Some((String::from_utf8_lossy(key).into_owned(), value))
            })
            .collect()
    }

    /// Width and height of a page in points.
    pub fn page_size(&self, page_id: ObjectId) -> (f32, f32) {
        let [x0, y0, x1, y1] = media_box(&self.doc, page_id);
        ((x1 - x0).abs(), (y1 - y0).abs())
    }

    /// A copy of the document holding only `pages` (1-indexed).
    pub fn extract_pages(&self, pages: &[u32]) -> Result<Document> {
        let total = self.page_count();

        for &page in pages {
            if page == 0 || page > total {
                return Err(TaskError::PageOutOfRange {
                    page: i64::from(page),
                    page_count: total,
                });
            }
        }

        let mut new_doc = self.doc.clone();
        let pages_to_delete: Vec<u32> = (1..=total).filter(|num| !pages.contains(num)).collect();
        if !pages_to_delete.is_empty() {
            new_doc.delete_pages(&pages_to_delete);
            new_doc.prune_objects();
        }

        Ok(new_doc)
    }

    /// Remove `pages` (1-indexed) and drop objects nothing references any more.
    pub fn delete_pages(&mut self, pages: &[u32]) {
        self.doc.delete_pages(pages);
        self.doc.prune_objects();
    }

    /// Add `degrees` to the page's effective rotation, returning the new value.
    pub fn rotate_page(&mut self, page_id: ObjectId, degrees: i64) -> Result<i64> {
        let existing = inherited_attribute(&self.doc, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        let rotation = (existing + degrees).rem_euclid(360);
        self.doc
            .get_dictionary_mut(page_id)?
            .set("Rotate", Object::Integer(rotation));
        Ok(rotation)
    }

    /// Save to a file, creating its parent directory when needed.
    #[instrument(skip(doc), fields(path = %path.as_ref().display()))]
    pub fn save<P: AsRef<Path>>(doc: &mut Document, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        doc.save(path)
            .map_err(|e| TaskError::library(format!("Failed to save PDF: {}", path.display()), e))?;
        debug!("PDF saved");
        Ok(())
    }
}

/// Load a PDF without interpreting its encryption state.
pub fn load(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(TaskError::SourceNotFound(path.to_path_buf()));
    }
    Document::load(path)
        .map_err(|e| TaskError::library(format!("Failed to open PDF: {}", path.display()), e))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(std::fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

/// Drop the security handler of a document the loader already decrypted.
///
/// Saving such a document as-is would write plain objects next to an
/// Encrypt dictionary, which readers then fail to open.
pub(crate) fn strip_encryption(doc: &mut Document) -> bool {
    if doc.encryption_state.is_none() {
        return false;
    }
    if let Some(Ok(id)) = doc.trailer.remove(b"Encrypt").map(|obj| obj.as_reference()) {
        doc.objects.remove(&id);
    }
    doc.encryption_state = None;
    true
}

/// Look up a page attribute, following Parent links for inheritable keys.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values: Vec<f32> = inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| arr.iter().filter_map(|v| v.as_float().ok()).collect())
        .unwrap_or_default();
    match values.as_slice() {
        [x0, y0, x1, y1] => [*x0, *y0, *x1, *y1],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Copy inherited attributes onto the page itself so it can be re-parented.
pub(crate) fn flatten_inherited(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut missing = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        for key in INHERITABLE {
            if page.get(key).is_err() {
                if let Some(value) = inherited_attribute(doc, page_id, key) {
                    missing.push((key, value.clone()));
                }
            }
        }
    }
    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in missing {
        page.set(key, value);
    }
    Ok(())
}

/// The page's own Resources dictionary, materializing inherited resources first.
pub(crate) fn page_resources_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    let existing = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(Some(*id)),
        Ok(Object::Dictionary(_)) => Some(None),
        _ => None,
    };

    let shared = match existing {
        Some(shared) => shared,
        None => {
            let inherited = inherited_attribute(doc, page_id, b"Resources")
                .and_then(|obj| obj.as_dict().ok())
                .cloned()
                .unwrap_or_default();
            doc.get_dictionary_mut(page_id)?
                .set("Resources", Object::Dictionary(inherited));
            None
        }
    };

    match shared {
        Some(id) => Ok(doc.get_dictionary_mut(id)?),
        None => Ok(doc
            .get_dictionary_mut(page_id)?
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)?),
    }
}

/// Register `value` under `name` in the page's resource `category` (Font, XObject, ExtGState).
pub(crate) fn insert_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    value: Object,
) -> Result<()> {
    let resources = page_resources_mut(doc, page_id)?;
    let existing = match resources.get(category) {
        Ok(Object::Reference(id)) => Some(Some(*id)),
        Ok(Object::Dictionary(_)) => Some(None),
        _ => None,
    };
    let shared = match existing {
        Some(shared) => shared,
        None => {
            resources.set(category, Dictionary::new());
            None
        }
    };

    let entries = match shared {
        Some(id) => doc.get_dictionary_mut(id)?,
        None => page_resources_mut(doc, page_id)?
            .get_mut(category)
            .and_then(Object::as_dict_mut)?,
    };
    entries.set(name, value);
    Ok(())
}

fn info_value(doc: &Document, value: &Object) -> Option<String> {
    let (_, value) = doc.dereference(value).ok()?;
    match value {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        // PDFDocEncoding agrees with Latin-1 for the printable range
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
