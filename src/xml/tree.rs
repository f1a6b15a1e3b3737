//! Arena-backed mutable XML tree.
//!
//! Every node lives in one `Vec` and is addressed by a [`NodeId`]. Nodes are
//! linked to their parent and siblings, so structural edits (append, insert,
//! detach, replace, unwrap) never shift other nodes and handles stay valid.
//! Detached nodes stay in the arena until the document is dropped.
//!
//! # Layout
//!
//! ```text
//! Document
//! ├── nodes[0]  document node (never serialized itself)
//! │   └── root element
//! │       ├── element ─┬─ text
//! │       │            └─ element ...
//! │       └── comment
//! └── nodes[n]  detached or live nodes
//! ```

use std::fmt;

/// Stable handle to a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An element: qualified name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, value: String },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Strip a namespace prefix: `mn:clause` → `clause`.
#[inline]
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Owned, mutable XML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document (document node only).
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Document)],
        }
    }

    /// Create a document whose root element is `name`.
    pub fn with_root(name: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.create_element(name);
        doc.append_child(doc.document_node(), root);
        doc
    }

    /// The invisible document node that owns the root element.
    #[inline]
    pub const fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    /// The first element child of the document node.
    pub fn root(&self) -> Option<NodeId> {
        self.element_children(self.document_node()).next()
    }

    // ========================================================================
    // Node creation
    // ========================================================================

    fn push(&mut self, kind: NodeKind) -> NodeId {
        #[allow(clippy::cast_possible_truncation)] // documents never hold 2^32 nodes
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            name: name.to_owned(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_owned()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_owned()))
    }

    pub fn create_pi(&mut self, target: &str, value: &str) -> NodeId {
        self.push(NodeKind::ProcessingInstruction {
            target: target.to_owned(),
            value: value.to_owned(),
        })
    }

    /// Create `<name>text</name>` (detached).
    pub fn create_text_element(&mut self, name: &str, text: &str) -> NodeId {
        let elem = self.create_element(name);
        let text = self.create_text(text);
        self.append_child(elem, text);
        elem
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    #[inline]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].first_child
    }

    #[inline]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].last_child
    }

    #[inline]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].next_sibling
    }

    #[inline]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].prev_sibling
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.index()].kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    #[inline]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    /// Qualified element name, `None` for non-elements.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Local element name, `None` for non-elements.
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    /// Whether `id` is an element with the given local name.
    #[inline]
    pub fn is(&self, id: NodeId, name: &str) -> bool {
        self.local_name(id) == Some(name)
    }

    /// Rename an element, keeping any namespace prefix.
    pub fn rename(&mut self, id: NodeId, local: &str) {
        if let Some(elem) = self.element_mut(id) {
            elem.name = match elem.name.rsplit_once(':') {
                Some((prefix, _)) => format!("{prefix}:{local}"),
                None => local.to_owned(),
            };
        }
    }

    /// Build an element name sharing the namespace prefix of `like`.
    pub fn sibling_name(&self, like: NodeId, local: &str) -> String {
        match self.name(like).and_then(|n| n.rsplit_once(':')) {
            Some((prefix, _)) => format!("{prefix}:{local}"),
            None => local.to_owned(),
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Set (or add) an attribute, keeping its original position when it exists.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let Some(elem) = self.element_mut(id) else {
            return;
        };
        let value = value.into();
        match elem.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => elem.attrs.push((name.to_owned(), value)),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let elem = self.element_mut(id)?;
        let pos = elem.attrs.iter().position(|(k, _)| k == name)?;
        Some(elem.attrs.remove(pos).1)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|&c| self.is_element(c))
    }

    /// First element child with the given local name.
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.element_children(id).find(|&c| self.is(c, name))
    }

    /// All element children with the given local name.
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.element_children(id).filter(move |&c| self.is(c, name))
    }

    /// Pre-order walk of `id` and everything below it.
    ///
    /// Returns a snapshot, so callers may edit the tree while iterating.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut child = self.last_child(node);
            while let Some(c) = child {
                stack.push(c);
                child = self.prev_sibling(c);
            }
        }
        out
    }

    /// Pre-order elements of the whole document.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.document_node())
            .into_iter()
            .filter(|&n| self.is_element(n))
            .collect()
    }

    /// Descendant elements (including `id`) with the given local name.
    pub fn find_all(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.is(n, name))
            .collect()
    }

    /// First descendant element (including `id`) with the given local name.
    pub fn find(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(id).into_iter().find(|&n| self.is(n, name))
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&n| self.parent(n))
    }

    /// Whether `id` is still reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.document_node() || self.ancestors(id).any(|a| a == self.document_node())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeKind::Text(text) = self.kind(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        while let Some(child) = self.first_child(id) {
            self.detach(child);
        }
        let text = self.create_text(text);
        self.append_child(id, text);
    }

    // ========================================================================
    // Structural edits
    // ========================================================================

    /// Unlink `id` from its parent and siblings. Its subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.index()];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = next,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.index()].first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.nodes[n.index()].prev_sibling = prev,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.index()].last_child = prev;
                }
            }
        }
        let node = &mut self.nodes[id.index()];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let last = self.nodes[parent.index()].last_child;
        {
            let node = &mut self.nodes[child.index()];
            node.parent = Some(parent);
            node.prev_sibling = last;
        }
        match last {
            Some(l) => self.nodes[l.index()].next_sibling = Some(child),
            None => self.nodes[parent.index()].first_child = Some(child),
        }
        self.nodes[parent.index()].last_child = Some(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        match self.first_child(parent) {
            Some(first) => self.insert_before(first, child),
            None => self.append_child(parent, child),
        }
    }

    /// Insert `new` immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) {
        self.detach(new);
        let (parent, prev) = {
            let node = &self.nodes[reference.index()];
            (node.parent, node.prev_sibling)
        };
        {
            let node = &mut self.nodes[new.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = Some(reference);
        }
        self.nodes[reference.index()].prev_sibling = Some(new);
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = Some(new),
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.index()].first_child = Some(new);
                }
            }
        }
    }

    /// Insert `new` immediately after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) {
        if let Some(next) = self.next_sibling(reference) {
            self.insert_before(next, new);
        } else if let Some(parent) = self.parent(reference) {
            self.append_child(parent, new);
        }
    }

    /// Put `new` where `old` was; `old` ends up detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        self.insert_before(old, new);
        self.detach(old);
    }

    /// Replace an element by its own children (`<a>x<b/></a>` → `x<b/>`).
    pub fn unwrap(&mut self, id: NodeId) {
        while let Some(child) = self.first_child(id) {
            self.insert_before(id, child);
        }
        self.detach(id);
    }

    // ========================================================================
    // Copying
    // ========================================================================

    /// Deep-copy a subtree of `source` into this document (detached).
    pub fn import(&mut self, source: &Document, id: NodeId) -> NodeId {
        let copy = self.push(source.kind(id).clone());
        let mut child = source.first_child(id);
        while let Some(c) = child {
            let imported = self.import(source, c);
            self.append_child(copy, imported);
            child = source.next_sibling(c);
        }
        copy
    }

    /// Deep-copy a subtree within this document (detached).
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = self.kind(id).clone();
        let copy = self.push(kind);
        let children: Vec<_> = self.children(id).collect();
        for child in children {
            let cloned = self.deep_clone(child);
            self.append_child(copy, cloned);
        }
        copy
    }

    /// A new standalone document whose root is a copy of `id`.
    pub fn extract(&self, id: NodeId) -> Document {
        let mut doc = Document::new();
        let copy = doc.import(self, id);
        doc.append_child(doc.document_node(), copy);
        doc
    }
}

/// Iterator over the direct children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::with_root("root");
        let root = doc.root().unwrap();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(root, a);
        doc.append_child(root, b);
        (doc, root, a, b)
    }

    #[test]
    fn test_append_and_children_order() {
        let (doc, root, a, b) = sample();
        let children: Vec<_> = doc.children(root).collect();
        assert_eq!(children, vec![a, b]);
        assert_eq!(doc.parent(a), Some(root));
    }

    #[test]
    fn test_insert_before_and_after() {
        let (mut doc, root, a, b) = sample();
        let c = doc.create_element("c");
        doc.insert_after(a, c);
        let d = doc.create_element("d");
        doc.insert_before(a, d);
        let names: Vec<_> = doc
            .children(root)
            .map(|n| doc.name(n).unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["d", "a", "c", "b"]);
        assert_eq!(doc.first_child(root), Some(d));
        assert_eq!(doc.last_child(root), Some(b));
    }

    #[test]
    fn test_replace_detaches_old() {
        let (mut doc, root, a, b) = sample();
        let c = doc.create_element("c");
        doc.replace(a, c);
        let children: Vec<_> = doc.children(root).collect();
        assert_eq!(children, vec![c, b]);
        assert!(!doc.is_attached(a));
    }

    #[test]
    fn test_unwrap_keeps_children_in_place() {
        let (mut doc, root, a, b) = sample();
        let t = doc.create_text("x");
        let inner = doc.create_element("i");
        doc.append_child(a, t);
        doc.append_child(a, inner);
        doc.unwrap(a);
        let children: Vec<_> = doc.children(root).collect();
        assert_eq!(children, vec![t, inner, b]);
    }

    #[test]
    fn test_attributes() {
        let (mut doc, _, a, _) = sample();
        doc.set_attr(a, "id", "x");
        doc.set_attr(a, "type", "y");
        doc.set_attr(a, "id", "z");
        assert_eq!(doc.element(a).unwrap().attrs[0], ("id".into(), "z".into()));
        assert_eq!(doc.remove_attr(a, "type").as_deref(), Some("y"));
        assert!(!doc.has_attr(a, "type"));
    }

    #[test]
    fn test_local_name_and_rename() {
        let mut doc = Document::with_root("mn:standard");
        let root = doc.root().unwrap();
        assert!(doc.is(root, "standard"));
        doc.rename(root, "other");
        assert_eq!(doc.name(root), Some("mn:other"));
        assert_eq!(doc.sibling_name(root, "bibitem"), "mn:bibitem");
    }

    #[test]
    fn test_import_between_documents() {
        let (mut src, _, a, _) = sample();
        let t = src.create_text("hello");
        src.append_child(a, t);
        let mut dst = Document::with_root("other");
        let copy = dst.import(&src, a);
        let root = dst.root().unwrap();
        dst.append_child(root, copy);
        assert_eq!(dst.text_content(root), "hello");
        assert_eq!(src.text_content(a), "hello");
    }

    #[test]
    fn test_descendants_preorder() {
        let (mut doc, root, a, b) = sample();
        let c = doc.create_element("c");
        doc.append_child(a, c);
        assert_eq!(doc.descendants(root), vec![root, a, c, b]);
    }
}
