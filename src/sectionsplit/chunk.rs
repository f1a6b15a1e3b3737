//! Chunking: structural zones, block grouping and fragment assembly.

use crate::utils::ident::collapse_whitespace;
use crate::xml::{Document, NodeId};

/// Elements that never start a chunk.
const BLOCKS: &[&str] = &[
    "p",
    "table",
    "formula",
    "admonition",
    "ol",
    "ul",
    "dl",
    "figure",
    "quote",
    "sourcecode",
    "example",
    "pre",
    "note",
    "pagebreak",
    "hr",
    "bookmark",
    "requirement",
    "recommendation",
    "permission",
    "svgmap",
    "inputform",
    "toc",
    "passthrough",
    "review",
    "imagemap",
];

/// A structural zone of a document, walked in this order.
struct Zone {
    name: &'static str,
    /// Children of the zone element are chunked (`true`), or each zone
    /// element is one root-level chunk (`false`).
    parented: bool,
}

const ZONES: &[Zone] = &[
    Zone { name: "preface", parented: true },
    Zone { name: "sections", parented: true },
    Zone { name: "annex", parented: false },
    Zone { name: "bibliography", parented: true },
    Zone { name: "indexsect", parented: false },
    Zone { name: "colophon", parented: false },
];

#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zone element the nodes sit in (`preface`, `sections`,
    /// `bibliography`); `None` for root-level zones.
    pub parent: Option<&'static str>,
    /// Nodes of the source document, in order.
    pub nodes: Vec<NodeId>,
    pub order: u64,
    pub title: String,
}

impl Chunk {
    fn new(doc: &Document, parent: Option<&'static str>, nodes: Vec<NodeId>, index: usize) -> Self {
        let heading = nodes
            .iter()
            .copied()
            .find(|&n| !is_block(doc, n) && !is_floating(doc, n))
            .or_else(|| nodes.first().copied());

        let order = heading
            .and_then(|h| display_order(doc, h))
            .or_else(|| nodes.iter().find_map(|&n| display_order(doc, n)))
            .unwrap_or(index as u64);
        let title = heading
            .map(|h| heading_title(doc, h))
            .unwrap_or_default();

        Self {
            parent,
            nodes,
            order,
            title,
        }
    }
}

fn is_block(doc: &Document, node: NodeId) -> bool {
    doc.local_name(node).is_some_and(|n| BLOCKS.contains(&n))
}

fn is_floating(doc: &Document, node: NodeId) -> bool {
    doc.is(node, "floating-title")
        || (doc.is(node, "p") && doc.attr(node, "type") == Some("floating-title"))
}

fn display_order(doc: &Document, node: NodeId) -> Option<u64> {
    doc.attr(node, "displayorder")?.trim().parse().ok()
}

fn heading_title(doc: &Document, node: NodeId) -> String {
    doc.child(node, "fmt-title")
        .or_else(|| doc.child(node, "title"))
        .map(|t| collapse_whitespace(&doc.text_content(t)))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| doc.local_name(node).unwrap_or_default().to_owned())
}

// ============================================================================
// Chunking
// ============================================================================

/// Chunks of `doc` in emission order.
pub fn chunks(doc: &Document) -> Vec<Chunk> {
    let Some(root) = doc.root() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for zone in ZONES {
        let containers: Vec<NodeId> = doc.children_named(root, zone.name).collect();
        for container in containers {
            if zone.parented {
                group(doc, container, zone.name, &mut out);
            } else {
                let chunk = Chunk::new(doc, None, vec![container], out.len());
                out.push(chunk);
            }
        }
    }
    out
}

/// Group the children of one zone element: each heading-level child starts
/// a chunk; blocks follow the heading before them.
///
/// Blocks with no heading before them, and floating titles, are held and
/// open the next chunk instead. Held nodes left at the end of the zone join
/// the last chunk.
fn group(doc: &Document, container: NodeId, parent: &'static str, out: &mut Vec<Chunk>) {
    let mut current: Option<Vec<NodeId>> = None;
    let mut held: Vec<NodeId> = Vec::new();

    for child in doc.element_children(container) {
        if parent == "bibliography" && doc.attr(child, "hidden") == Some("true") {
            continue;
        }
        if is_floating(doc, child) {
            held.push(child);
        } else if is_block(doc, child) {
            match current.as_mut() {
                Some(nodes) if held.is_empty() => nodes.push(child),
                _ => held.push(child),
            }
        } else {
            if let Some(nodes) = current.take() {
                let index = out.len();
                out.push(Chunk::new(doc, Some(parent), nodes, index));
            }
            let mut nodes = std::mem::take(&mut held);
            nodes.push(child);
            current = Some(nodes);
        }
    }

    if !held.is_empty() {
        match current.as_mut() {
            Some(nodes) => nodes.append(&mut held),
            None => current = Some(held),
        }
    }
    if let Some(nodes) = current {
        let index = out.len();
        out.push(Chunk::new(doc, Some(parent), nodes, index));
    }
}

// ============================================================================
// Fragments
// ============================================================================

/// `doc` without any zone content: metadata, boilerplate and extension
/// blocks only.
pub fn shell(doc: &Document) -> Document {
    let mut shell = doc.clone();
    if let Some(root) = shell.root() {
        let zones: Vec<NodeId> = shell
            .element_children(root)
            .filter(|&c| ZONES.iter().any(|z| shell.is(c, z.name)))
            .collect();
        for zone in zones {
            shell.detach(zone);
        }
    }
    shell
}

/// Standalone document for chunk `index`: the shell with the chunk's nodes
/// inserted after `metanorma-extension` (or `bibdata`) under their zone
/// element. Only the first fragment keeps the attachments.
pub fn fragment(shell: &Document, source: &Document, chunk: &Chunk, index: usize) -> Document {
    let mut doc = shell.clone();
    let Some(root) = doc.root() else {
        return doc;
    };

    let mut cursor = doc
        .child(root, "metanorma-extension")
        .or_else(|| doc.child(root, "bibdata"));
    let mut place = |doc: &mut Document, node: NodeId| {
        match cursor {
            Some(c) => doc.insert_after(c, node),
            None => doc.prepend_child(root, node),
        }
        cursor = Some(node);
    };

    match chunk.parent {
        Some(parent) => {
            let name = doc.sibling_name(root, parent);
            let holder = doc.create_element(&name);
            place(&mut doc, holder);
            for &node in &chunk.nodes {
                let copy = doc.import(source, node);
                doc.append_child(holder, copy);
            }
        }
        None => {
            for &node in &chunk.nodes {
                let copy = doc.import(source, node);
                place(&mut doc, copy);
            }
        }
    }

    if index > 0 {
        let extensions: Vec<NodeId> = doc.children_named(root, "metanorma-extension").collect();
        for ext in extensions {
            for attachment in doc.find_all(ext, "attachment") {
                doc.detach(attachment);
            }
        }
    }
    doc
}
