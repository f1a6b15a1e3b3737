//! Load XML text into a [`Document`] arena.
//!
//! `roxmltree` does the parsing (entities, CDATA, well-formedness); this module
//! copies its read-only tree into the editable arena, keeping qualified names
//! and namespace declarations so serialization reproduces the source shape.

use super::XmlError;
use super::tree::{Document, NodeId};
use roxmltree::{NodeType, ParsingOptions};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Parse XML text into a new document.
pub fn parse(text: &str) -> Result<Document, XmlError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let source = roxmltree::Document::parse_with_options(text, options)?;

    let mut doc = Document::new();
    let parent = doc.document_node();
    for child in source.root().children() {
        if let Some(id) = convert(&mut doc, text, child) {
            doc.append_child(parent, id);
        }
    }

    if doc.root().is_none() {
        return Err(XmlError::NoRoot);
    }
    Ok(doc)
}

fn convert(doc: &mut Document, text: &str, node: roxmltree::Node<'_, '_>) -> Option<NodeId> {
    let id = match node.node_type() {
        NodeType::Element => convert_element(doc, text, node),
        NodeType::Text => doc.create_text(node.text().unwrap_or_default()),
        NodeType::Comment => doc.create_comment(node.text().unwrap_or_default()),
        NodeType::PI => {
            let pi = node.pi()?;
            doc.create_pi(pi.target, pi.value.unwrap_or_default())
        }
        NodeType::Root => return None,
    };

    if node.is_element() {
        for child in node.children() {
            if let Some(c) = convert(doc, text, child) {
                doc.append_child(id, c);
            }
        }
    }
    Some(id)
}

fn convert_element(doc: &mut Document, text: &str, node: roxmltree::Node<'_, '_>) -> NodeId {
    let id = doc.create_element(&qualified_name(text, node));

    // Namespace declarations first, in the order roxmltree reports them.
    for ns in declared_namespaces(node) {
        match ns.0 {
            Some(prefix) => doc.set_attr(id, &format!("xmlns:{prefix}"), ns.1),
            None => doc.set_attr(id, "xmlns", ns.1),
        }
    }

    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(XML_NS) => format!("xml:{}", attr.name()),
            Some(uri) => match attribute_prefix(node, uri) {
                Some(prefix) => format!("{prefix}:{}", attr.name()),
                None => attr.name().to_owned(),
            },
            None => attr.name().to_owned(),
        };
        doc.set_attr(id, &name, attr.value());
    }
    id
}

/// Element name exactly as written in the source (`mn:clause`, `clause`).
fn qualified_name(text: &str, node: roxmltree::Node<'_, '_>) -> String {
    let start = node.range().start + 1;
    text.get(start..)
        .and_then(|rest| {
            let end = rest.find(|c: char| c.is_whitespace() || c == '/' || c == '>')?;
            Some(rest[..end].to_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| node.tag_name().name().to_owned())
}

/// Namespaces in scope on `node` but not on its parent element.
fn declared_namespaces<'a>(node: roxmltree::Node<'a, '_>) -> Vec<(Option<&'a str>, &'a str)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .map(|ns| (ns.name(), ns.uri()))
        .filter(|(prefix, _)| *prefix != Some("xml"))
        .filter(|ns| !inherited.contains(ns))
        .collect()
}

fn attribute_prefix<'a>(node: roxmltree::Node<'a, '_>, uri: &str) -> Option<&'a str> {
    node.namespaces()
        .find(|ns| ns.name().is_some() && ns.uri() == uri)
        .and_then(|ns| ns.name())
}
