//! Collection-level outputs: the navigation page and the concatenated
//! collection XML.

use super::entry::FileEntry;
use super::registry::Registry;
use crate::config::CollectionConfig;
use crate::diagnostics::text_element;
use crate::utils::path::relative_url;
use crate::xml::{Document, XmlWriter, write_node};
use anyhow::{Context, Result};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

fn collection_title(config: &CollectionConfig) -> &str {
    match config.collection.title.trim() {
        "" => config.collection.name.as_str(),
        title => title,
    }
}

fn write_file(path: &Path, writer: XmlWriter) -> Result<PathBuf> {
    let text = String::from_utf8(writer.into_inner().into_inner())?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

// ============================================================================
// Navigation page
// ============================================================================

/// Write `[build].index`: one link per document, then one per attachment.
/// Links point at outputs actually written.
///
/// Fragments of split documents are reached through their split's own
/// page, so the outer page lists the split document only. On that page the
/// heading links to the lead fragment, the one that is not bare.
pub(super) fn write_index(config: &CollectionConfig, registry: &Registry, nested: bool) -> Result<PathBuf> {
    let title = collection_title(config);
    let output = &config.build.output;
    let href = |entry: &FileEntry| relative_url(Path::new(""), &entry.page(output));
    let mut w = Writer::new(Cursor::new(Vec::new()));

    w.write_event(Event::Start(BytesStart::new("html")))?;
    w.write_event(Event::Start(BytesStart::new("head")))?;
    let mut meta = BytesStart::new("meta");
    meta.push_attribute(("charset", "utf-8"));
    w.write_event(Event::Empty(meta))?;
    text_element(&mut w, "title", title)?;
    w.write_event(Event::End(BytesEnd::new("head")))?;
    w.write_event(Event::Start(BytesStart::new("body")))?;
    let lead = nested
        .then(|| registry.entries().find(|e| !e.is_attachment() && !e.bare))
        .flatten();
    match lead {
        Some(entry) => {
            w.write_event(Event::Start(BytesStart::new("h1")))?;
            let mut link = BytesStart::new("a");
            link.push_attribute(("href", href(entry).as_str()));
            w.write_event(Event::Start(link))?;
            w.write_event(Event::Text(BytesText::new(title)))?;
            w.write_event(Event::End(BytesEnd::new("a")))?;
            w.write_event(Event::End(BytesEnd::new("h1")))?;
        }
        None => text_element(&mut w, "h1", title)?,
    }

    let listed = || registry.entries().filter(|e| nested || !e.sectionsplit_output);
    for (class, attachments) in [("documents", false), ("attachments", true)] {
        let mut entries = listed().filter(|e| e.is_attachment() == attachments).peekable();
        if entries.peek().is_none() {
            continue;
        }
        let mut list = BytesStart::new("ul");
        list.push_attribute(("class", class));
        w.write_event(Event::Start(list))?;
        for entry in entries {
            w.write_event(Event::Start(BytesStart::new("li")))?;
            let mut link = BytesStart::new("a");
            link.push_attribute(("href", href(entry).as_str()));
            w.write_event(Event::Start(link))?;
            w.write_event(Event::Text(BytesText::new(&entry.title)))?;
            w.write_event(Event::End(BytesEnd::new("a")))?;
            if entry.title != entry.identifier {
                let mut id = BytesStart::new("span");
                id.push_attribute(("class", "identifier"));
                w.write_event(Event::Start(id))?;
                w.write_event(Event::Text(BytesText::new(&entry.identifier)))?;
                w.write_event(Event::End(BytesEnd::new("span")))?;
            }
            w.write_event(Event::End(BytesEnd::new("li")))?;
        }
        w.write_event(Event::End(BytesEnd::new("ul")))?;
    }

    w.write_event(Event::End(BytesEnd::new("body")))?;
    w.write_event(Event::End(BytesEnd::new("html")))?;

    write_file(&config.build.output.join(&config.build.index), w)
}

// ============================================================================
// Concatenated XML
// ============================================================================

/// Write `<name>.xml`: collection metadata, then every resolved document in
/// its own `doc-container`.
pub(super) fn write_concatenated(
    config: &CollectionConfig,
    registry: &Registry,
    resolved: &[(String, Document)],
) -> Result<PathBuf> {
    let mut w = Writer::new(Cursor::new(Vec::new()));
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("metanorma-collection");
    root.push_attribute(("xmlns", "http://metanorma.org"));
    w.write_event(Event::Start(root))?;
    w.write_event(Event::Start(BytesStart::new("bibdata")))?;
    text_element(&mut w, "title", collection_title(config))?;
    if !config.collection.identifier.is_empty() {
        text_element(&mut w, "docidentifier", &config.collection.identifier)?;
    }
    w.write_event(Event::End(BytesEnd::new("bibdata")))?;

    for (i, (id, doc)) in resolved.iter().enumerate() {
        let Some(doc_root) = doc.root() else {
            continue;
        };
        let mut container = BytesStart::new("doc-container");
        let container_id = format!("doc{i:09}");
        container.push_attribute(("id", container_id.as_str()));
        if let Some(entry) = registry.get(id) {
            container.push_attribute(("identifier", entry.identifier.as_str()));
        }
        w.write_event(Event::Start(container))?;
        write_node(&mut w, doc, doc_root)?;
        w.write_event(Event::End(BytesEnd::new("doc-container")))?;
    }

    w.write_event(Event::End(BytesEnd::new("metanorma-collection")))?;

    let path = config
        .build
        .output
        .join(format!("{}.xml", config.collection.name));
    write_file(&path, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::anchors::DefaultNumbering;
    use crate::collection::registry::FileRefSpec;
    use crate::xml::parse;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> Registry {
        let mut registry = Registry::new(None, Arc::new(DefaultNumbering), "en");
        let docs = [
            ("ISO 1", "iso1.xml", "<doc><bibdata><title>First</title></bibdata></doc>"),
            ("ISO 2", "sub/iso2.xml", "<doc/>"),
        ];
        for (id, path, xml) in docs {
            registry
                .register(FileRefSpec {
                    identifier: id.into(),
                    path: path.into(),
                    root: dir.path().to_path_buf(),
                    document: Some(parse(xml).unwrap()),
                    ..FileRefSpec::default()
                })
                .unwrap();
        }
        registry
    }

    fn config(dir: &TempDir) -> CollectionConfig {
        let mut config = CollectionConfig::default();
        config.collection.name = "coll".into();
        config.collection.title = "My Collection".into();
        config.build.output = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_index_links_documents() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        registry
            .update("ISO 2", |e| e.sectionsplit_output = true)
            .unwrap();

        let path = write_index(&config(&dir), &registry, false).unwrap();
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("<title>My Collection</title>"));
        assert!(html.contains(r#"<a href="iso1.html">First</a>"#));
        assert!(!html.contains("sub/iso2.html"));

        let nested = write_index(&config(&dir), &registry, true).unwrap();
        assert!(fs::read_to_string(nested).unwrap().contains("sub/iso2.html"));
    }

    #[test]
    fn test_index_links_written_outputs() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        registry
            .update("ISO 1", |e| {
                e.outputs.insert("xml".into(), dir.path().join("iso1.xml"));
            })
            .unwrap();

        let html = fs::read_to_string(write_index(&config(&dir), &registry, false).unwrap()).unwrap();
        assert!(html.contains(r#"<a href="iso1.xml">First</a>"#));
        assert!(html.contains("<h1>My Collection</h1>"));
    }

    #[test]
    fn test_split_page_heading_links_lead_fragment() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        registry.update("ISO 1", |e| e.bare = true).unwrap();

        let html = fs::read_to_string(write_index(&config(&dir), &registry, true).unwrap()).unwrap();
        assert!(html.contains(r#"<h1><a href="sub/iso2.html">My Collection</a></h1>"#));
    }

    #[test]
    fn test_concatenated_containers() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        let resolved: Vec<_> = ["ISO 1", "ISO 2"]
            .into_iter()
            .map(|id| (id.to_owned(), registry.take_document(id).unwrap()))
            .collect();

        let path = write_concatenated(&config(&dir), &registry, &resolved).unwrap();
        assert_eq!(path, dir.path().join("coll.xml"));
        let xml = fs::read_to_string(path).unwrap();
        let doc = parse(&xml).unwrap();
        let root = doc.root().unwrap();
        let containers = doc.find_all(root, "doc-container");
        assert_eq!(containers.len(), 2);
        assert_eq!(doc.attr(containers[0], "id"), Some("doc000000000"));
        assert_eq!(doc.attr(containers[1], "id"), Some("doc000000001"));
        assert_eq!(doc.attr(containers[1], "identifier"), Some("ISO 2"));
    }
}
