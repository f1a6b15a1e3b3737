//! Cross-document reference resolution.
//!
//! Three passes run over one document tree, in order:
//!
//! | Pass     | Input                                         | Module     |
//! |----------|-----------------------------------------------|------------|
//! | direct   | bibitems with a repository identifier         | `direct`   |
//! | indirect | `type="internal"` bibitems (`schema/anchor`)  | `indirect` |
//! | split    | citations of a section-split document         | `split`    |
//!
//! Each pass is idempotent and skips what it does not apply to. Afterwards,
//! bibliography containers holding only hidden items are hidden too.
//!
//! A reference that cannot be resolved never fails the run: it degrades to
//! plain text or a `Missing:` placeholder and is recorded in [`Diagnostics`].

mod direct;
mod indirect;
pub mod split;

pub use indirect::{InternalRefs, Located};

use crate::collection::entry::FileEntry;
use crate::collection::registry::{REPOSITORY_PREFIX, Registry, repository_id};
use crate::diagnostics::Diagnostics;
use crate::xml::{self, Document, NodeId, XmlError};
use rustc_hash::FxHashMap;

pub struct Resolver<'a> {
    registry: &'a Registry,
    /// Outer collection of a nested (section-split) build.
    parent: Option<&'a Registry>,
    diagnostics: &'a Diagnostics,
    nested: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, diagnostics: &'a Diagnostics) -> Self {
        Self {
            registry,
            parent: None,
            diagnostics,
            nested: false,
        }
    }

    /// Resolver for a nested collection, falling back to `parent` for
    /// lookups.
    pub fn nested(mut self, parent: Option<&'a Registry>) -> Self {
        self.nested = true;
        self.parent = parent;
        self
    }

    pub fn is_nested(&self) -> bool {
        self.nested
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn parent(&self) -> Option<&'a Registry> {
        self.parent
    }

    /// Entry for `identifier` in this collection, else the parent one.
    pub fn lookup(&self, identifier: &str) -> Option<&'a FileEntry> {
        self.registry
            .get(identifier)
            .or_else(|| self.parent.and_then(|p| p.get(identifier)))
    }

    /// Fragment of split document `split_id` that holds `anchor`.
    fn fragment_of(&self, split_id: &str, anchor: &str) -> Option<&'a FileEntry> {
        std::iter::once(self.registry)
            .chain(self.parent)
            .flat_map(Registry::entries)
            .find(|e| e.parent_id.as_deref() == Some(split_id) && e.ids.contains(anchor))
    }

    /// Resolve a copy of `doc` and serialize it.
    pub fn resolve(
        &self,
        doc: &Document,
        identifier: &str,
        refs: &InternalRefs,
    ) -> Result<String, XmlError> {
        let mut doc = doc.clone();
        self.resolve_document(&mut doc, identifier, refs);
        xml::to_string(&doc)
    }

    /// Run every pass over `doc` in place.
    pub fn resolve_document(&self, doc: &mut Document, identifier: &str, refs: &InternalRefs) {
        direct::run(self, doc, identifier);
        indirect::run(self, doc, identifier, refs);
        split::run(self, doc, identifier);
        hide_refs(doc);
    }
}

// ============================================================================
// Tree helpers shared by the passes
// ============================================================================

/// Element citing a bibitem: `eref`, `origin`, `quote/source`.
fn is_citing(doc: &Document, node: NodeId) -> bool {
    let cites = match doc.local_name(node) {
        Some("eref" | "origin") => true,
        Some("source") => doc.parent(node).is_some_and(|p| doc.is(p, "quote")),
        _ => false,
    };
    cites && doc.has_attr(node, "bibitemid")
}

/// Citing elements in document order.
pub(crate) fn citing_nodes(doc: &Document) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|&n| is_citing(doc, n))
        .collect()
}

/// `bibitemid` → citing elements.
fn citations(doc: &Document) -> FxHashMap<String, Vec<NodeId>> {
    let mut map: FxHashMap<String, Vec<NodeId>> = FxHashMap::default();
    for node in citing_nodes(doc) {
        if let Some(id) = doc.attr(node, "bibitemid") {
            map.entry(id.to_owned()).or_default().push(node);
        }
    }
    map
}

/// Bibitems carrying an `id`, in document order.
fn bibitems(doc: &Document) -> Vec<(NodeId, String)> {
    doc.elements()
        .into_iter()
        .filter(|&n| doc.is(n, "bibitem"))
        .filter_map(|n| doc.attr(n, "id").map(|id| (n, id.to_owned())))
        .collect()
}

/// Identifier named by `current-metanorma-collection/<id>`.
fn repository_target(doc: &Document, bibitem: NodeId) -> Option<String> {
    repository_id(doc, bibitem)?
        .strip_prefix(REPOSITORY_PREFIX)
        .map(str::to_owned)
}

fn new_element(doc: &mut Document, like: NodeId, local: &str) -> NodeId {
    let name = doc.sibling_name(like, local);
    doc.create_element(&name)
}

fn set_citeas(doc: &mut Document, nodes: &[NodeId], text: &str) {
    for &node in nodes {
        doc.set_attr(node, "citeas", text);
    }
}

fn localities(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    for child in doc.element_children(node) {
        if doc.is(child, "locality") {
            out.push(child);
        } else if doc.is(child, "localityStack") {
            out.extend(doc.children_named(child, "locality"));
        }
    }
    out
}

/// The `locality[@type='anchor']` of a citing element.
fn anchor_locality(doc: &Document, node: NodeId) -> Option<NodeId> {
    localities(doc, node)
        .into_iter()
        .find(|&l| doc.attr(l, "type") == Some("anchor"))
}

fn reference_from(doc: &Document, locality: NodeId) -> Option<NodeId> {
    doc.child(locality, "referenceFrom")
}

/// Anchor text of a citing element, if it has an anchor locality.
fn anchor_of(doc: &Document, node: NodeId) -> Option<(NodeId, NodeId, String)> {
    let locality = anchor_locality(doc, node)?;
    let from = reference_from(doc, locality)?;
    let anchor = doc.text_content(from).trim().to_owned();
    Some((locality, from, anchor))
}

/// First non-anchor `(type, referenceFrom)` locality.
fn first_locality(doc: &Document, node: NodeId) -> Option<(String, String)> {
    localities(doc, node).into_iter().find_map(|l| {
        let kind = doc.attr(l, "type").filter(|&t| t != "anchor")?;
        let from = reference_from(doc, l)?;
        Some((kind.to_owned(), doc.text_content(from).trim().to_owned()))
    })
}

/// Add `locality[@type='anchor']/referenceFrom`, inside the existing
/// `localityStack` when there is one.
pub(crate) fn append_anchor(doc: &mut Document, node: NodeId, anchor: &str) {
    let locality = new_element(doc, node, "locality");
    doc.set_attr(locality, "type", "anchor");
    let from_name = doc.sibling_name(node, "referenceFrom");
    let from = doc.create_text_element(&from_name, anchor);
    doc.append_child(locality, from);

    match doc.child(node, "localityStack") {
        Some(stack) => doc.append_child(stack, locality),
        None => {
            let stack = new_element(doc, node, "localityStack");
            doc.append_child(stack, locality);
            doc.prepend_child(node, stack);
        }
    }
}

/// Point a citing element at `anchor`, replacing any existing anchor.
fn set_anchor(doc: &mut Document, node: NodeId, anchor: &str) {
    match anchor_of(doc, node) {
        Some((_, from, _)) => doc.set_text(from, anchor),
        None => append_anchor(doc, node, anchor),
    }
}

/// Drop a locality, and its `localityStack` when that ends up empty.
fn remove_locality(doc: &mut Document, locality: NodeId) {
    let parent = doc.parent(locality);
    doc.detach(locality);
    if let Some(stack) = parent.filter(|&p| doc.is(p, "localityStack"))
        && doc.element_children(stack).next().is_none()
    {
        doc.detach(stack);
    }
}

/// The document's hidden `references` container, created on demand under
/// `bibliography`.
pub(crate) fn hidden_references(doc: &mut Document) -> Option<NodeId> {
    let root = doc.root()?;
    let bibliography = match doc.child(root, "bibliography") {
        Some(b) => b,
        None => {
            let b = new_element(doc, root, "bibliography");
            doc.append_child(root, b);
            b
        }
    };
    if let Some(found) = doc
        .children_named(bibliography, "references")
        .find(|&r| doc.attr(r, "hidden") == Some("true"))
    {
        return Some(found);
    }
    let references = new_element(doc, bibliography, "references");
    doc.set_attr(references, "hidden", "true");
    doc.set_attr(references, "normative", "false");
    doc.append_child(bibliography, references);
    Some(references)
}

/// Hide `references` containers whose bibitems are all hidden.
pub fn hide_refs(doc: &mut Document) {
    let Some(root) = doc.root() else {
        return;
    };
    for references in doc.find_all(root, "references") {
        let items: Vec<NodeId> = doc.children_named(references, "bibitem").collect();
        if !items.is_empty() && items.iter().all(|&b| doc.attr(b, "hidden") == Some("true")) {
            doc.set_attr(references, "hidden", "true");
        }
    }
}
