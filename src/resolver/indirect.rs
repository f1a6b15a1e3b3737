//! Indirect pass: `type="internal"` bibitems naming an anchor inside a
//! container schema rather than a document.
//!
//! ```text
//! <bibitem id="x" type="internal">
//!   <docidentifier type="repository">schema/anchor</docidentifier>
//! </bibitem>
//! ```
//!
//! [`InternalRefs`] maps every such `(schema, anchor)` pair of a collection
//! to the document that holds it, computed once from the registry's id
//! tables before any document is resolved.

use super::direct::cite;
use super::{Resolver, bibitems, citations, set_anchor, set_citeas};
use crate::collection::entry::FileEntry;
use crate::collection::registry::{Registry, repository_id};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::xml::Document;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Identifier of the document holding the anchor.
    Document(String),
    /// `Missing:<schema>:<anchor>`
    Missing(String),
}

/// `schema → anchor → location`
#[derive(Debug, Default, Clone)]
pub struct InternalRefs {
    table: FxHashMap<String, FxHashMap<String, Located>>,
}

impl InternalRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate every internal reference made by the documents of `registry`.
    pub fn build(registry: &Registry, parent: Option<&Registry>, diagnostics: &Diagnostics) -> Self {
        let mut refs = Self::new();
        refs.gather(registry, parent, diagnostics);
        refs
    }

    /// Add the pairs not located yet. Fragments adopted from a split are
    /// skipped: their nested collection resolved them. Each unresolved pair
    /// is recorded once.
    pub fn gather(&mut self, registry: &Registry, parent: Option<&Registry>, diagnostics: &Diagnostics) {
        let sources = registry
            .entries()
            .filter(|e| !e.is_attachment() && !e.sectionsplit_output);
        for entry in sources {
            for (schema, anchor) in &entry.internal_refs {
                if self.get(schema, anchor).is_some() {
                    continue;
                }
                let located = locate(registry, parent, schema, anchor);
                if let Located::Missing(placeholder) = &located {
                    diagnostics.record(
                        DiagnosticCode::MissingInternalReference,
                        Some(&entry.identifier),
                        placeholder.clone(),
                    );
                }
                self.insert(schema, anchor, located);
            }
        }
    }

    pub fn get(&self, schema: &str, anchor: &str) -> Option<&Located> {
        self.table.get(schema)?.get(anchor)
    }

    pub fn insert(&mut self, schema: &str, anchor: &str, located: Located) {
        self.table
            .entry(schema.to_owned())
            .or_default()
            .insert(anchor.to_owned(), located);
    }

    pub fn len(&self) -> usize {
        self.table.values().map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Find the document holding `anchor` of container `schema`, first in
/// `registry`, then in `parent`.
pub fn locate(registry: &Registry, parent: Option<&Registry>, schema: &str, anchor: &str) -> Located {
    std::iter::once(registry)
        .chain(parent)
        .find_map(|reg| locate_in(reg, schema, anchor))
        .map_or_else(
            || Located::Missing(format!("Missing:{schema}:{anchor}")),
            |entry| Located::Document(entry.identifier.clone()),
        )
}

fn locate_in<'a>(registry: &'a Registry, schema: &str, anchor: &str) -> Option<&'a FileEntry> {
    // Split sources stay candidates: the split pass moves their citations
    // on to the fragment.
    let candidates = || registry.entries().filter(|e| !e.is_attachment());

    // Split key: the anchor lives in one of that split's fragments.
    if candidates().any(|e| e.indirect_key.as_deref() == Some(schema)) {
        return candidates()
            .filter(|e| e.indirect_key.as_deref() == Some(schema))
            .find(|e| e.find_id(anchor).is_some());
    }

    let qualified = format!("{schema}_{anchor}");
    candidates().find(|e| {
        e.ids.contains(&qualified) || (e.doctype.as_deref() == Some(schema) && e.ids.contains(anchor))
    })
}

pub(super) fn run(res: &Resolver, doc: &mut Document, identifier: &str, refs: &InternalRefs) {
    let current = res.lookup(identifier);
    let citations = citations(doc);

    for (bibitem, bib_id) in bibitems(doc) {
        if doc.attr(bibitem, "type") != Some("internal") {
            continue;
        }
        let Some(text) = repository_id(doc, bibitem) else {
            continue;
        };
        let Some((schema, anchor)) = text.split_once('/') else {
            continue;
        };
        let nodes = citations.get(&bib_id).map(Vec::as_slice).unwrap_or_default();

        let located = match refs.get(schema, anchor) {
            Some(located) => located.clone(),
            None => {
                let located = locate(res.registry(), res.parent(), schema, anchor);
                if let Located::Missing(placeholder) = &located {
                    res.diagnostics.record(
                        DiagnosticCode::MissingInternalReference,
                        Some(identifier),
                        placeholder.clone(),
                    );
                }
                located
            }
        };

        match located {
            Located::Document(target_id) => {
                let Some(target) = res.lookup(&target_id) else {
                    continue;
                };
                cite(doc, bibitem, &bib_id, target, current);
                let qualified = [anchor.to_owned(), format!("{schema}_{anchor}")]
                    .iter()
                    .find_map(|a| target.find_id(a).map(|id| target.qualify(id)))
                    .unwrap_or_else(|| anchor.to_owned());
                for &node in nodes {
                    set_anchor(doc, node, &qualified);
                }
                set_citeas(doc, nodes, &target.identifier);
            }
            Located::Missing(placeholder) => set_citeas(doc, nodes, &placeholder),
        }
    }
}
