//! Serialize a [`Document`] with the `quick-xml` writer.

use super::XmlError;
use super::tree::{Document, NodeId, NodeKind};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event},
};
use std::io::{Cursor, Write};

pub type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Serialize a whole document, XML declaration included.
pub fn to_string(doc: &Document) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    writer.get_mut().write_all(b"\n").map_err(write_error)?;

    for child in doc.children(doc.document_node()) {
        write_node(&mut writer, doc, child)?;
    }
    into_string(writer)
}

/// Serialize one subtree without declaration.
pub fn node_to_string(doc: &Document, id: NodeId) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_node(&mut writer, doc, id)?;
    into_string(writer)
}

/// Write one subtree into an existing writer.
pub fn write_node(writer: &mut XmlWriter, doc: &Document, id: NodeId) -> Result<(), XmlError> {
    match doc.kind(id) {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(writer, doc, child)?;
            }
        }
        NodeKind::Element(elem) => {
            let mut start = BytesStart::new(elem.name.as_str());
            for (key, value) in &elem.attrs {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if doc.first_child(id).is_none() {
                writer.write_event(Event::Empty(start)).map_err(write_error)?;
            } else {
                writer.write_event(Event::Start(start)).map_err(write_error)?;
                for child in doc.children(id) {
                    write_node(writer, doc, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(elem.name.as_str())))
                    .map_err(write_error)?;
            }
        }
        NodeKind::Text(text) => {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?;
        }
        NodeKind::Comment(text) => {
            writer
                .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(write_error)?;
        }
        NodeKind::ProcessingInstruction { target, value } => {
            let content = if value.is_empty() {
                target.clone()
            } else {
                format!("{target} {value}")
            };
            writer
                .write_event(Event::PI(BytesPI::new(content)))
                .map_err(write_error)?;
        }
    }
    Ok(())
}

fn into_string(writer: XmlWriter) -> Result<String, XmlError> {
    String::from_utf8(writer.into_inner().into_inner()).map_err(write_error)
}

fn write_error(err: impl std::fmt::Display) -> XmlError {
    XmlError::Write(err.to_string())
}
