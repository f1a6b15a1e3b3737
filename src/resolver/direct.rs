//! Direct pass: bibitems naming a collection member by repository
//! identifier.

use super::{
    Resolver, anchor_of, append_anchor, bibitems, citations, first_locality, new_element,
    remove_locality, repository_target, set_citeas,
};
use crate::collection::entry::FileEntry;
use crate::collection::registry::{REPOSITORY_PREFIX, repository_id};
use crate::collection::suffix;
use crate::diagnostics::DiagnosticCode;
use crate::log;
use crate::xml::{Document, NodeId};

pub(super) fn run(res: &Resolver, doc: &mut Document, identifier: &str) {
    if !res.is_nested() {
        add_repository_ids(res, doc);
    }

    let current = res.lookup(identifier);
    let citations = citations(doc);
    for (bibitem, bib_id) in bibitems(doc) {
        let Some(target_id) = repository_target(doc, bibitem) else {
            continue;
        };
        let nodes = citations.get(&bib_id).map(Vec::as_slice).unwrap_or_default();
        let target = res
            .lookup(&target_id)
            .filter(|_| !target_id.starts_with("Missing:"));

        match target {
            Some(target) => {
                cite(doc, bibitem, &bib_id, target, current);
                qualify_anchors(res, doc, nodes, target, identifier);
            }
            None if res.is_nested() => {
                set_citeas(doc, nodes, &format!("Missing:repository:{target_id}"));
                res.diagnostics
                    .record(DiagnosticCode::MissingDocument, Some(identifier), target_id);
            }
            None => {
                for &node in nodes {
                    strip_citation(doc, node);
                }
                res.diagnostics
                    .record(DiagnosticCode::MissingDocument, Some(identifier), target_id);
            }
        }
    }
}

/// Replace `bibitem` by the target's stand-in, keeping the citing id, and
/// add the citation URL. Returns the new bibitem.
pub(super) fn cite(
    doc: &mut Document,
    bibitem: NodeId,
    bib_id: &str,
    target: &FileEntry,
    current: Option<&FileEntry>,
) -> NodeId {
    let Some(standin) = target.bibitem.root() else {
        return bibitem;
    };
    let new = doc.import(&target.bibitem, standin);
    doc.set_attr(new, "id", bib_id);

    let docids: Vec<NodeId> = doc.children_named(new, "docidentifier").collect();
    if repository_id(doc, new).is_none() {
        let name = doc.sibling_name(new, "docidentifier");
        let repo = doc.create_text_element(
            &name,
            &format!("{REPOSITORY_PREFIX}{}", target.identifier),
        );
        doc.set_attr(repo, "type", "repository");
        match docids.last() {
            Some(&last) => doc.insert_after(last, repo),
            None => doc.append_child(new, repo),
        }
    }

    let uri = new_element(doc, new, "uri");
    let kind = if target.is_attachment() {
        "attachment"
    } else {
        "citation"
    };
    doc.set_attr(uri, "type", kind);
    doc.set_text(uri, &target.citation_url(current));
    match docids.first() {
        Some(&first) => doc.insert_before(first, uri),
        None => doc.append_child(new, uri),
    }

    doc.replace(bibitem, new);
    new
}

/// Rewrite each citation's anchor into the target's anchor space, or
/// synthesize one from its locality.
fn qualify_anchors(
    res: &Resolver,
    doc: &mut Document,
    nodes: &[NodeId],
    target: &FileEntry,
    identifier: &str,
) {
    if target.is_attachment() {
        return;
    }
    let suffix = target.document_suffix.as_deref().unwrap_or_default();

    for &node in nodes {
        match anchor_of(doc, node) {
            Some((_, _, anchor))
                if target.url.is_none()
                    && !suffix.is_empty()
                    && suffix::is_qualified(&anchor, suffix) => {}
            Some((locality, from, anchor)) => match target.find_id(&anchor) {
                Some(original) => {
                    let qualified = target.qualify(original);
                    doc.set_text(from, &qualified);
                }
                None => {
                    remove_locality(doc, locality);
                    res.diagnostics.record(
                        DiagnosticCode::UnresolvedReference,
                        Some(identifier),
                        format!("anchor `{anchor}` not found in {}", target.identifier),
                    );
                }
            },
            None => {
                if let Some((kind, label)) = first_locality(doc, node)
                    && let Some(anchor) = target.locate(&kind, &label)
                {
                    let qualified = target.qualify(anchor);
                    append_anchor(doc, node, &qualified);
                }
            }
        }
    }
}

/// Reduce a citation to its text.
fn strip_citation(doc: &mut Document, node: NodeId) {
    let fallback = doc
        .attr(node, "citeas")
        .or_else(|| doc.attr(node, "bibitemid"))
        .map(str::to_owned);

    let localities: Vec<NodeId> = doc
        .element_children(node)
        .filter(|&c| doc.is(c, "locality") || doc.is(c, "localityStack"))
        .collect();
    for locality in localities {
        doc.detach(locality);
    }
    if doc.text_content(node).trim().is_empty()
        && let Some(text) = fallback
    {
        let text = doc.create_text(&text);
        doc.append_child(node, text);
    }
    doc.unwrap(node);
}

/// Give a repository identifier to bibitems whose plain identifier names a
/// collection member.
fn add_repository_ids(res: &Resolver, doc: &mut Document) {
    for (bibitem, _) in bibitems(doc) {
        if repository_id(doc, bibitem).is_some() {
            continue;
        }
        let docids: Vec<NodeId> = doc.children_named(bibitem, "docidentifier").collect();
        let Some(key) = docids.iter().find_map(|&d| {
            let text = doc.text_content(d);
            res.registry().get(text.trim()).map(|e| e.identifier.clone())
        }) else {
            continue;
        };

        let name = doc.sibling_name(bibitem, "docidentifier");
        let repo = doc.create_text_element(&name, &format!("{REPOSITORY_PREFIX}{key}"));
        doc.set_attr(repo, "type", "repository");
        match docids.last() {
            Some(&last) => doc.insert_after(last, repo),
            None => doc.append_child(bibitem, repo),
        }
        log!("xref"; "{key} cited by plain identifier");
    }
}
