//! Section-split references.
//!
//! Two halves:
//!
//! - [`run`]: citations of a split document are moved to the fragment that
//!   now holds the cited anchor, with a hidden bibitem for that fragment.
//! - [`localize`]: inside one fragment, cross-references to content that
//!   ended up in a sibling fragment become internal references keyed by the
//!   split key, for the indirect pass of the nested collection to resolve.

use super::direct::cite;
use super::{
    Resolver, anchor_of, append_anchor, bibitems, citations, citing_nodes, hidden_references,
    new_element, repository_target, set_citeas,
};
use crate::collection::anchors::extract_ids;
use crate::collection::suffix;
use crate::diagnostics::DiagnosticCode;
use crate::utils::ident::to_ncname;
use crate::xml::{Document, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};

pub(super) fn run(res: &Resolver, doc: &mut Document, identifier: &str) {
    let current = res.lookup(identifier);
    let own_suffix = current
        .and_then(|c| c.document_suffix.clone())
        .or_else(|| suffix::existing(doc).map(str::to_owned))
        .unwrap_or_else(|| to_ncname(identifier));
    let citations = citations(doc);
    let mut ids = extract_ids(doc);

    for (bibitem, bib_id) in bibitems(doc) {
        let Some(split) = repository_target(doc, bibitem)
            .and_then(|target| res.lookup(&target))
            .filter(|e| e.sectionsplit)
        else {
            continue;
        };
        let nodes = citations.get(&bib_id).map(Vec::as_slice).unwrap_or_default();

        for &node in nodes {
            let Some((_, _, anchor)) = anchor_of(doc, node) else {
                continue;
            };
            let original = match &split.document_suffix {
                Some(s) => suffix::strip(&anchor, s),
                None => anchor.as_str(),
            };

            match res.fragment_of(&split.identifier, original) {
                Some(fragment) => {
                    let fragment_bib = to_ncname(&format!("{}_{own_suffix}", fragment.identifier));
                    doc.set_attr(node, "bibitemid", fragment_bib.as_str());
                    if ids.insert(fragment_bib.clone())
                        && let Some(container) = hidden_references(doc)
                    {
                        let placeholder = new_element(doc, container, "bibitem");
                        doc.append_child(container, placeholder);
                        cite(doc, placeholder, &fragment_bib, fragment, current);
                    }
                }
                None => {
                    let key = split.indirect_key.as_deref().unwrap_or(&split.identifier);
                    set_citeas(doc, &[node], &format!("Missing:{key}:{original}"));
                    res.diagnostics.record_in(
                        "Section Split",
                        DiagnosticCode::UnresolvedReference,
                        Some(identifier),
                        format!("anchor `{original}` not found in any fragment of {}", split.identifier),
                    );
                }
            }
        }
    }
}

/// Turn references that leave `fragment` into internal references under
/// split `key`, importing cited bibitems from `source`.
///
/// Returns the localized targets in document order.
pub fn localize(fragment: &mut Document, source: &Document, key: &str) -> Vec<String> {
    let Some(root) = fragment.root() else {
        return Vec::new();
    };
    let ids = extract_ids(fragment);

    let mut targets = Vec::new();
    let mut seen = FxHashSet::default();
    for xref in fragment.find_all(root, "xref") {
        let Some(target) = fragment.attr(xref, "target").map(str::to_owned) else {
            continue;
        };
        if ids.contains(&target) {
            continue;
        }
        fragment.rename(xref, "eref");
        fragment.remove_attr(xref, "target");
        fragment.set_attr(xref, "bibitemid", format!("{key}_{target}"));
        fragment.set_attr(xref, "type", key);
        append_anchor(fragment, xref, &target);
        if seen.insert(target.clone()) {
            targets.push(target);
        }
    }

    let source_bibitems: FxHashMap<&str, NodeId> = source
        .root()
        .map(|r| source.find_all(r, "bibitem"))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|b| source.attr(b, "id").map(|id| (id, b)))
        .collect();
    let mut imported = Vec::new();
    let mut cited = FxHashSet::default();
    for node in citing_nodes(fragment) {
        let Some(id) = fragment.attr(node, "bibitemid") else {
            continue;
        };
        if ids.contains(id) || !cited.insert(id.to_owned()) {
            continue;
        }
        if let Some(&bibitem) = source_bibitems.get(id) {
            imported.push(bibitem);
        }
    }

    if targets.is_empty() && imported.is_empty() {
        return targets;
    }
    let Some(container) = hidden_references(fragment) else {
        return targets;
    };
    for bibitem in imported {
        let copy = fragment.import(source, bibitem);
        fragment.set_attr(copy, "hidden", "true");
        fragment.append_child(container, copy);
    }
    for target in &targets {
        let bibitem = new_element(fragment, container, "bibitem");
        fragment.set_attr(bibitem, "id", format!("{key}_{target}"));
        fragment.set_attr(bibitem, "type", "internal");
        fragment.set_attr(bibitem, "hidden", "true");
        let name = fragment.sibling_name(container, "docidentifier");
        let docid = fragment.create_text_element(&name, &format!("{key}/{target}"));
        fragment.set_attr(docid, "type", "repository");
        fragment.append_child(bibitem, docid);
        fragment.append_child(container, bibitem);
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::super::tests::registry;
    use super::super::{InternalRefs, repository_target};
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::xml::parse;

    const SOURCE: &str = r#"<doc document_suffix="S">
      <sections>
        <clause id="c1_S"><p>See <xref target="c2_S"/> and <xref target="c1_S"/>, <eref bibitemid="ref1_S"/>.</p></clause>
        <clause id="c2_S"/>
      </sections>
      <bibliography><references id="refs_S"><bibitem id="ref1_S"><docidentifier>ISO 5</docidentifier></bibitem></references></bibliography>
    </doc>"#;

    fn fragment(source: &Document) -> Document {
        let root = source.root().unwrap();
        let clause = source.find(root, "clause").unwrap();
        let mut out = Document::with_root("doc");
        let out_root = out.root().unwrap();
        out.set_attr(out_root, "document_suffix", "S");
        let sections = out.create_element("sections");
        out.append_child(out_root, sections);
        let copy = out.import(source, clause);
        out.append_child(sections, copy);
        out
    }

    #[test]
    fn test_localize_foreign_xrefs() {
        let source = parse(SOURCE).unwrap();
        let mut frag = fragment(&source);
        let targets = localize(&mut frag, &source, "KEYABCDE");
        assert_eq!(targets, vec!["c2_S"]);

        let root = frag.root().unwrap();
        // the xref to its own clause stays
        assert_eq!(frag.find_all(root, "xref").len(), 1);
        let localized = frag
            .find_all(root, "eref")
            .into_iter()
            .find(|&e| frag.attr(e, "type") == Some("KEYABCDE"))
            .unwrap();
        assert_eq!(frag.attr(localized, "bibitemid"), Some("KEYABCDE_c2_S"));
        assert_eq!(frag.attr(localized, "target"), None);
        assert_eq!(anchor_of(&frag, localized).unwrap().2, "c2_S");

        let internal = frag
            .find_all(root, "bibitem")
            .into_iter()
            .find(|&b| frag.attr(b, "id") == Some("KEYABCDE_c2_S"))
            .unwrap();
        assert_eq!(frag.attr(internal, "type"), Some("internal"));
        assert_eq!(
            crate::collection::registry::repository_id(&frag, internal).as_deref(),
            Some("KEYABCDE/c2_S")
        );
    }

    #[test]
    fn test_localize_imports_cited_bibitems_hidden() {
        let source = parse(SOURCE).unwrap();
        let mut frag = fragment(&source);
        localize(&mut frag, &source, "K");

        let root = frag.root().unwrap();
        let imported = frag
            .find_all(root, "bibitem")
            .into_iter()
            .find(|&b| frag.attr(b, "id") == Some("ref1_S"))
            .unwrap();
        assert_eq!(frag.attr(imported, "hidden"), Some("true"));
        let references = frag.parent(imported).unwrap();
        assert_eq!(frag.attr(references, "hidden"), Some("true"));
    }

    #[test]
    fn test_citation_moves_to_fragment() {
        let split_doc = r#"<doc><sections><clause id="c1"/><clause id="c2"/></sections></doc>"#;
        let frag1 = r#"<doc document_suffix="BIG"><sections><clause id="c1_BIG"/></sections></doc>"#;
        let frag2 = r#"<doc document_suffix="BIG"><sections><clause id="c2_BIG"/></sections></doc>"#;
        let citing = r#"<doc><p><eref bibitemid="r"><localityStack><locality type="anchor"><referenceFrom>c2</referenceFrom></locality></localityStack></eref>
            <eref bibitemid="r"><localityStack><locality type="anchor"><referenceFrom>c1</referenceFrom></locality></localityStack></eref></p>
          <bibliography><references><bibitem id="r"><docidentifier type="repository">current-metanorma-collection/BIG</docidentifier></bibitem></references></bibliography></doc>"#;
        let mut reg = registry(&[
            ("BIG", "big.xml", split_doc),
            ("BIG Scope", "big.0.xml", frag1),
            ("BIG Terms", "big.1.xml", frag2),
            ("C", "c.xml", citing),
        ]);
        reg.update("BIG", |e| {
            e.sectionsplit = true;
            e.indirect_key = Some("KEY".into());
            e.split_index = Some("big.html".into());
        })
        .unwrap();
        for id in ["BIG Scope", "BIG Terms"] {
            reg.update(id, |e| {
                e.parent_id = Some("BIG".into());
                e.sectionsplit_output = true;
            })
            .unwrap();
        }

        let mut doc = reg.take_document("C").unwrap();
        let diagnostics = Diagnostics::new();
        Resolver::new(&reg, &diagnostics).resolve_document(&mut doc, "C", &InternalRefs::new());

        let nodes = citing_nodes(&doc);
        assert_eq!(doc.attr(nodes[0], "bibitemid"), Some("BIG_Terms_C"));
        assert_eq!(doc.attr(nodes[1], "bibitemid"), Some("BIG_Scope_C"));
        assert_eq!(anchor_of(&doc, nodes[0]).unwrap().2, "c2_BIG");

        let root = doc.root().unwrap();
        let added = doc
            .find_all(root, "bibitem")
            .into_iter()
            .find(|&b| doc.attr(b, "id") == Some("BIG_Terms_C"))
            .unwrap();
        assert_eq!(repository_target(&doc, added).as_deref(), Some("BIG Terms"));
        assert_eq!(doc.text_content(doc.child(added, "uri").unwrap()), "big.1.html");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_anchor_outside_fragments_is_missing() {
        let split_doc = r#"<doc><sections><clause id="c1"/><clause id="c9"/></sections></doc>"#;
        let citing = r#"<doc><p><eref bibitemid="r"><localityStack><locality type="anchor"><referenceFrom>c9</referenceFrom></locality></localityStack></eref></p>
          <bibitem id="r"><docidentifier type="repository">current-metanorma-collection/BIG</docidentifier></bibitem></doc>"#;
        let mut reg = registry(&[("BIG", "big.xml", split_doc), ("C", "c.xml", citing)]);
        reg.update("BIG", |e| {
            e.sectionsplit = true;
            e.indirect_key = Some("KEY".into());
        })
        .unwrap();

        let mut doc = reg.take_document("C").unwrap();
        let diagnostics = Diagnostics::new();
        Resolver::new(&reg, &diagnostics).resolve_document(&mut doc, "C", &InternalRefs::new());

        let eref = citing_nodes(&doc)[0];
        assert_eq!(doc.attr(eref, "citeas"), Some("Missing:KEY:c9"));
        assert_eq!(diagnostics.count(DiagnosticCode::UnresolvedReference), 1);
    }
}
