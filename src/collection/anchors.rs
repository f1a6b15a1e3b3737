//! Anchor extraction: locality type → label → anchor id, plus the id set.
//!
//! Labels come from a [`XrefNumbering`] pass supplied by the flavor. Nodes
//! without a stable label (notes, examples, unnumbered blocks) are keyed by an
//! opaque token so their existence is still registered.

use crate::utils::ident::collapse_whitespace;
use crate::xml::{Document, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};

/// `locality type → (label or value → anchor id)`
pub type AnchorTable = FxHashMap<String, FxHashMap<String, String>>;

/// One addressable node as seen by the numbering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefLabel {
    /// The node's `id`.
    pub id: String,
    /// Locality type (`clause`, `annex`, `table`, ...).
    pub kind: String,
    /// Human-readable label (`1`, `A.2`); `None` for unlabelled containers.
    pub label: Option<String>,
    /// Extra alias, e.g. a term's preferred designation.
    pub value: Option<String>,
}

/// Cross-reference numbering pass of a flavor.
pub trait XrefNumbering: Send + Sync {
    fn number(&self, doc: &Document, language: &str) -> Vec<XrefLabel>;
}

// ============================================================================
// Extraction
// ============================================================================

/// Build the anchor table of a document.
///
/// Later aliases for the same key overwrite earlier ones.
pub fn extract_anchors(doc: &Document, numbering: &dyn XrefNumbering, language: &str) -> AnchorTable {
    let mut table = AnchorTable::default();
    for xref in numbering.number(doc, language) {
        let bucket = table.entry(xref.kind).or_default();
        let key = xref.label.unwrap_or_else(|| opaque_token(&xref.id));
        bucket.insert(key, xref.id.clone());
        if let Some(value) = xref.value {
            bucket.insert(value, xref.id);
        }
    }
    table
}

/// Every element `id` in the document.
pub fn extract_ids(doc: &Document) -> FxHashSet<String> {
    doc.elements()
        .into_iter()
        .filter_map(|n| doc.attr(n, "id"))
        .map(str::to_owned)
        .collect()
}

/// Stable key for a node that has no label.
pub fn opaque_token(id: &str) -> String {
    let hash = blake3::hash(id.as_bytes());
    format!("_{}", &hash.to_hex().as_str()[..16])
}

// ============================================================================
// Default numbering
// ============================================================================

const CLAUSE_LIKE: &[&str] = &[
    "clause",
    "terms",
    "definitions",
    "references",
    "abstract",
    "foreword",
    "introduction",
    "acknowledgements",
    "executivesummary",
];

/// Numbering for documents without a flavor-specific scheme.
///
/// - `sections` children: `1`, `2`, ...; nested clauses `1.1`
/// - annexes: `A`, `B`, ...; nested clauses `A.1`
/// - preface children: labelled by title
/// - `table`, `figure`, `formula`: sequential per type unless `unnumbered`
/// - `note`, `example`: unlabelled
/// - `term`: numbered within its clause, preferred designation as value
/// - `bibitem`: first non-repository `docidentifier`
///
/// An explicit `number` attribute overrides the computed label.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNumbering;

impl XrefNumbering for DefaultNumbering {
    fn number(&self, doc: &Document, _language: &str) -> Vec<XrefLabel> {
        let mut numberer = Numberer {
            doc,
            labels: Vec::new(),
        };
        if let Some(root) = doc.root() {
            numberer.document(root);
        }
        numberer.labels
    }
}

struct Numberer<'a> {
    doc: &'a Document,
    labels: Vec<XrefLabel>,
}

impl Numberer<'_> {
    fn document(&mut self, root: NodeId) {
        let doc = self.doc;

        if let Some(preface) = doc.child(root, "preface") {
            for child in doc.element_children(preface) {
                let title = heading_text(doc, child);
                self.push(child, "clause", title, None);
            }
        }

        if let Some(sections) = doc.child(root, "sections") {
            let clauses = doc.element_children(sections).filter(|&c| is_clause_like(doc, c));
            for (i, clause) in clauses.enumerate() {
                self.clause(clause, (i + 1).to_string(), "clause");
            }
        }

        for (i, annex) in doc.children_named(root, "annex").enumerate() {
            self.clause(annex, annex_letter(i), "annex");
        }

        let mut counters: FxHashMap<&str, usize> = FxHashMap::default();
        for node in doc.elements() {
            match doc.local_name(node) {
                Some(kind @ ("table" | "figure" | "formula")) => {
                    if doc.attr(node, "unnumbered") == Some("true") {
                        self.push(node, kind, None, None);
                    } else {
                        let n = counters.entry(kind).or_default();
                        *n += 1;
                        let label = n.to_string();
                        self.push(node, kind, Some(label), None);
                    }
                }
                Some(kind @ ("note" | "example")) => self.push(node, kind, None, None),
                Some("bibitem") => {
                    let label = bibitem_label(doc, node);
                    self.push(node, "bibitem", label, None);
                }
                _ => {}
            }
        }
    }

    fn clause(&mut self, node: NodeId, label: String, kind: &str) {
        let doc = self.doc;
        let label = doc.attr(node, "number").map_or(label, str::to_owned);
        self.push(node, kind, Some(label.clone()), None);

        let mut sub = 0;
        let mut terms = 0;
        for child in doc.element_children(node).collect::<Vec<_>>() {
            if doc.is(child, "term") {
                terms += 1;
                let value = doc
                    .child(child, "preferred")
                    .map(|p| collapse_whitespace(&doc.text_content(p)))
                    .filter(|v| !v.is_empty());
                self.push(child, "term", Some(format!("{label}.{terms}")), value);
            } else if is_clause_like(doc, child) {
                sub += 1;
                self.clause(child, format!("{label}.{sub}"), "clause");
            }
        }
    }

    fn push(&mut self, node: NodeId, kind: &str, label: Option<String>, value: Option<String>) {
        let Some(id) = self.doc.attr(node, "id") else {
            return;
        };
        let label = match self.doc.attr(node, "number") {
            Some(number) if label.is_some() => Some(number.to_owned()),
            _ => label,
        };
        self.labels.push(XrefLabel {
            id: id.to_owned(),
            kind: kind.to_owned(),
            label,
            value,
        });
    }
}

fn is_clause_like(doc: &Document, node: NodeId) -> bool {
    doc.local_name(node).is_some_and(|n| CLAUSE_LIKE.contains(&n))
}

fn heading_text(doc: &Document, node: NodeId) -> Option<String> {
    let title = doc.child(node, "title")?;
    Some(collapse_whitespace(&doc.text_content(title))).filter(|t| !t.is_empty())
}

fn bibitem_label(doc: &Document, node: NodeId) -> Option<String> {
    doc.children_named(node, "docidentifier")
        .find(|&d| {
            !matches!(
                doc.attr(d, "type"),
                Some("repository" | "metanorma-collection" | "metanorma")
            )
        })
        .map(|d| collapse_whitespace(&doc.text_content(d)))
        .filter(|t| !t.is_empty())
}

/// `0 → A`, `25 → Z`, `26 → AA`
fn annex_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
