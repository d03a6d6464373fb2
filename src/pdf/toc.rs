//! Reading the document outline (bookmarks).

use crate::pdf::document::decode_pdf_string;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    /// 1-indexed target page, if the destination resolves to a page of this document.
    pub page: Option<u32>,
    /// Nesting depth, 0 for top-level entries.
    pub level: u32,
}

/// All outline entries in document order, flattened depth-first.
pub fn outline_entries(doc: &Document) -> Vec<OutlineEntry> {
    let first = doc
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Outlines").ok())
        .and_then(|obj| obj.as_reference().ok())
        .and_then(|id| doc.get_dictionary(id).ok())
        .and_then(|outlines| outlines.get(b"First").ok())
        .and_then(|obj| obj.as_reference().ok());

    let Some(first) = first else {
        return Vec::new();
    };

    let page_map: BTreeMap<ObjectId, u32> = doc
        .get_pages()
        .into_iter()
        .map(|(num, id)| (id, num))
        .collect();

    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    walk_items(doc, first, &page_map, 0, &mut visited, &mut entries);
    entries
}

/// Sorted, distinct 1-indexed pages that at least one bookmark points to.
pub fn bookmark_start_pages(doc: &Document) -> Vec<u32> {
    outline_entries(doc)
        .into_iter()
        .filter_map(|entry| entry.page)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn walk_items(
    doc: &Document,
    first_id: ObjectId,
    page_map: &BTreeMap<ObjectId, u32>,
    level: u32,
    visited: &mut HashSet<ObjectId>,
    entries: &mut Vec<OutlineEntry>,
) {
    let mut current = Some(first_id);

    while let Some(id) = current {
        // Sibling and child links in damaged files can loop.
        if !visited.insert(id) {
            break;
        }
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };

        let title = match dict.get(b"Title").and_then(|t| doc.dereference(t)) {
            Ok((_, Object::String(bytes, _))) => decode_pdf_string(bytes),
            _ => "Untitled".to_string(),
        };
        entries.push(OutlineEntry {
            title,
            page: destination_page(doc, dict, page_map),
            level,
        });

        if let Ok(Object::Reference(child)) = dict.get(b"First") {
            walk_items(doc, *child, page_map, level + 1, visited, entries);
        }

        current = dict.get(b"Next").and_then(Object::as_reference).ok();
    }
}

fn destination_page(
    doc: &Document,
    item: &Dictionary,
    page_map: &BTreeMap<ObjectId, u32>,
) -> Option<u32> {
    if let Ok(dest) = item.get(b"Dest") {
        return resolve_destination(doc, dest, page_map, 0);
    }

    // GoTo action, either inline or by reference
    let action = item.get(b"A").and_then(|a| doc.dereference(a)).ok()?.1.as_dict().ok()?;
    match action.get(b"S") {
        Ok(Object::Name(kind)) if kind == b"GoTo" => {
            resolve_destination(doc, action.get(b"D").ok()?, page_map, 0)
        }
        _ => None,
    }
}

fn resolve_destination(
    doc: &Document,
    dest: &Object,
    page_map: &BTreeMap<ObjectId, u32>,
    depth: u32,
) -> Option<u32> {
    if depth > 8 {
        return None;
    }
    match dest {
        Object::Array(arr) => match arr.first() {
            Some(Object::Reference(page_ref)) => page_map.get(page_ref).copied(),
            _ => None,
        },
        Object::Reference(r) => {
            resolve_destination(doc, doc.get_object(*r).ok()?, page_map, depth + 1)
        }
        // Explicit destinations may be wrapped in a dictionary with a D entry
        Object::Dictionary(dict) => {
            resolve_destination(doc, dict.get(b"D").ok()?, page_map, depth + 1)
        }
        Object::String(name, _) | Object::Name(name) => {
            let target = named_destination(doc, name)?;
            resolve_destination(doc, &target, page_map, depth + 1)
        }
        _ => None,
    }
}

fn named_destination(doc: &Document, name: &[u8]) -> Option<Object> {
    let catalog = doc.catalog().ok()?;

    // PDF 1.2+: name tree under Names/Dests
    let tree_root = catalog
        .get(b"Names")
        .and_then(|n| doc.dereference(n))
        .ok()
        .and_then(|(_, names)| names.as_dict().ok())
        .and_then(|names| names.get(b"Dests").ok())
        .and_then(|d| d.as_reference().ok());
    if let Some(root) = tree_root {
        if let Some(found) = search_name_tree(doc, root, name, 0) {
            return Some(found);
        }
    }

    // PDF 1.1: a plain Dests dictionary in the catalog
    let dests = catalog
        .get(b"Dests")
        .and_then(|d| doc.dereference(d))
        .ok()?
        .1
        .as_dict()
        .ok()?;
    dests.get(name).ok().cloned()
}

fn search_name_tree(doc: &Document, node_id: ObjectId, name: &[u8], depth: u32) -> Option<Object> {
    if depth > 32 {
        return None;
    }
    let node = doc.get_dictionary(node_id).ok()?;

    if let Ok(Object::Array(names)) = node.get(b"Names") {
        for pair in names.chunks_exact(2) {
            if let Object::String(key, _) = &pair[0] {
                if key == name {
                    return Some(pair[1].clone());
                }
            }
        }
    }

    if let Ok(Object::Array(kids)) = node.get(b"Kids") {
        for kid in kids {
            if let Object::Reference(kid_ref) = kid {
                if let Some(found) = search_name_tree(doc, *kid_ref, name, depth + 1) {
                    return Some(found);
                }
            }
        }
    }

    None
}
