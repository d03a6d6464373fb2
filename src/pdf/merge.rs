//! Combining several documents into one.
//!
//! Objects of every later document are shifted past the current maximum
//! object id, then all pages are hung off the first document's page tree.

use crate::error::{Result, TaskError};
use crate::pdf::document::flatten_inherited;
use crate::pdf::toc::{outline_entries, OutlineEntry};
use lopdf::{Bookmark, Document, Object, ObjectId};
use tracing::debug;

/// Merge `documents` in order. With `keep_outlines`, every document's
/// bookmarks are rebuilt against the merged page list.
pub fn merge_documents(mut documents: Vec<Document>, keep_outlines: bool) -> Result<Document> {
    if documents.is_empty() {
        return Err(TaskError::invalid_parameter("No PDF files provided for merging"));
    }

    let outlines: Vec<Vec<OutlineEntry>> = if keep_outlines {
        documents.iter().map(outline_entries).collect()
    } else {
        Vec::new()
    };

    let mut dest = documents.remove(0);
    let mut page_refs = ordered_pages(&mut dest)?;
    let mut first_pages = vec![0usize];
    let mut max_id = dest.max_id;

    for mut source in documents {
        let source_pages = ordered_pages(&mut source)?;
        let offset = max_id;

        for (old_id, mut object) in std::mem::take(&mut source.objects) {
            remap_refs(&mut object, offset);
            dest.objects.insert((old_id.0 + offset, old_id.1), object);
        }

        first_pages.push(page_refs.len());
        page_refs.extend(source_pages.iter().map(|id| (id.0 + offset, id.1)));
        max_id = max_id.max(source.max_id + offset);
    }
    dest.max_id = max_id;

    update_page_tree(&mut dest, &page_refs)?;
    dest.catalog_mut()?.remove(b"Outlines");
    // Bookmarks added in memory before the merge are already in `outlines`
    dest.bookmarks.clear();
    dest.bookmark_table.clear();

    if keep_outlines {
        rebuild_outline(&mut dest, &outlines, &first_pages, &page_refs)?;
    }

    dest.prune_objects();
    debug!(pages = page_refs.len(), "Documents merged");
    Ok(dest)
}

/// Page ids in page order, with inherited attributes copied onto each page.
fn ordered_pages(doc: &mut Document) -> Result<Vec<ObjectId>> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for &page in &pages {
        flatten_inherited(doc, page)?;
    }
    Ok(pages)
}

fn remap_refs(obj: &mut Object, offset: u32) {
    match obj {
        Object::Reference(id) => id.0 += offset,
        Object::Array(items) => items.iter_mut().for_each(|o| remap_refs(o, offset)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, v)| remap_refs(v, offset)),
        Object::Stream(stream) => stream.dict.iter_mut().for_each(|(_, v)| remap_refs(v, offset)),
        _ => {}
    }
}

fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<()> {
    let pages_id = doc.catalog()?.get(b"Pages")?.as_reference()?;

    for &page in page_refs {
        doc.get_dictionary_mut(page)?.set("Parent", pages_id);
    }

    let pages = doc.get_dictionary_mut(pages_id)?;
    let kids: Vec<Object> = page_refs.iter().map(|&id| Object::Reference(id)).collect();
    pages.set("Kids", kids);
    pages.set("Count", page_refs.len() as i64);
    Ok(())
}

fn rebuild_outline(
    doc: &mut Document,
    outlines: &[Vec<OutlineEntry>],
    first_pages: &[usize],
    page_refs: &[ObjectId],
) -> Result<()> {
    for (entries, &first) in outlines.iter().zip(first_pages) {
        // (level, bookmark id) of the open ancestors
        let mut parents: Vec<(u32, u32)> = Vec::new();
        for entry in entries {
            let Some(page) = entry.page else { continue };
            let Some(&page_id) = page_refs.get(first + page as usize - 1) else {
                continue;
            };
            while parents.last().is_some_and(|(level, _)| *level >= entry.level) {
                parents.pop();
            }
            let bookmark = Bookmark::new(entry.title.clone(), [0.0, 0.0, 0.0], 0, page_id);
            let id = doc.add_bookmark(bookmark, parents.last().map(|(_, id)| *id));
            parents.push((entry.level, id));
        }
    }

    if let Some(outline_id) = doc.build_outline() {
        doc.catalog_mut()?.set("Outlines", outline_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;
    use crate::pdf::toc::bookmark_start_pages;

    fn round_trip(mut doc: Document) -> Document {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        Document::load_mem(&bytes).unwrap()
    }

    #[test]
    fn test_merge_empty_fails() {
        let err = merge_documents(vec![], false).unwrap_err();
        assert!(err.to_string().contains("No PDF files provided"));
    }

    #[test]
    fn test_merge_combines_pages_in_order() {
        let docs = vec![fixtures::document(2), fixtures::document(3), fixtures::document(1)];
        let merged = round_trip(merge_documents(docs, false).unwrap());
        assert_eq!(merged.get_pages().len(), 6);

        assert_eq!(
            fixtures::page_labels(&merged),
            ["Page 1", "Page 2", "Page 1", "Page 2", "Page 3", "Page 1"]
        );
    }

    #[test]
    fn test_merged_pages_keep_inherited_resources() {
        let docs = vec![fixtures::document(1), fixtures::document(1)];
        let merged = merge_documents(docs, false).unwrap();
        for (_, page) in merged.get_pages() {
            let dict = merged.get_dictionary(page).unwrap();
            assert!(dict.get(b"Resources").is_ok());
            assert!(dict.get(b"MediaBox").is_ok());
        }
    }

    #[test]
    fn test_merge_rebuilds_bookmarks_with_offsets() {
        let a = fixtures::document_with_outline(3, &[("A1", 1), ("A2", 3)]);
        let b = fixtures::document_with_outline(2, &[("B1", 2)]);
        let merged = round_trip(merge_documents(vec![a, b], true).unwrap());

        let titles: Vec<_> = outline_entries(&merged).into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["A1", "A2", "B1"]);
        assert_eq!(bookmark_start_pages(&merged), vec![1, 3, 5]);
    }

    #[test]
    fn test_merge_without_bookmarks_drops_outline() {
        let a = fixtures::document_with_outline(2, &[("A1", 1)]);
        let merged = merge_documents(vec![a, fixtures::document(1)], false).unwrap();
        assert!(outline_entries(&merged).is_empty());
    }
}
