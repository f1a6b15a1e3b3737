//! File registry: identifier → document metadata, anchors, ids and output
//! location.
//!
//! Built single-threaded once per collection (or nested split collection)
//! and then shared read-only with the resolver and the worker tasks.
//!
//! Registering a document:
//!
//! 1. parse it (unless the caller already did), cutting out the container
//!    element for `idref` entries
//! 2. extract anchors and ids (original, unsuffixed)
//! 3. record its bibliographic stand-in, root type and internal references
//! 4. assign the document suffix and apply it to the tree, exactly once

use super::anchors::{XrefNumbering, extract_anchors, extract_ids};
use super::disambig::Disambiguator;
use super::entry::FileEntry;
use super::suffix;
use crate::config::{CollectionConfig, EntryConfig, EntryKind};
use crate::utils::ident::{collapse_whitespace, normalize_identifier};
use crate::utils::path::to_slash;
use crate::xml::{self, Document, NodeId, XmlError};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub const REPOSITORY_PREFIX: &str = "current-metanorma-collection/";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to load `{0}`")]
    Xml(PathBuf, #[source] XmlError),

    #[error("missing file `{0}`")]
    MissingFile(PathBuf),

    #[error("container `{container}` not found in `{path}`")]
    MissingContainer { path: PathBuf, container: String },

    #[error("duplicate identifier `{0}`")]
    Duplicate(String),

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("output `{path}` of `{identifier}` is already taken")]
    OutputTaken { identifier: String, path: PathBuf },
}

/// Everything needed to register one entry.
#[derive(Debug, Clone, Default)]
pub struct FileRefSpec {
    pub identifier: String,
    pub kind: EntryKind,
    /// Source path as authored, relative to `root`.
    pub path: PathBuf,
    pub root: PathBuf,
    pub url: Option<String>,
    pub title: Option<String>,
    pub formats: Vec<String>,
    pub sectionsplit: bool,
    pub bare: bool,
    pub container: Option<String>,
    /// Pre-parsed file contents (the whole file for `idref` entries).
    pub document: Option<Document>,
}

impl FileRefSpec {
    pub fn from_config(config: &CollectionConfig, entry: &EntryConfig) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            kind: entry.kind,
            path: entry.file.clone().unwrap_or_default(),
            root: config.root.clone(),
            url: entry.url.clone(),
            title: entry.title.clone(),
            formats: config.entry_formats(entry).to_vec(),
            sectionsplit: entry.sectionsplit,
            bare: entry.bare,
            container: entry.container.clone(),
            document: None,
        }
    }
}

pub struct Registry {
    /// Collection name stripped from identifiers.
    collection: Option<String>,
    numbering: Arc<dyn XrefNumbering>,
    language: String,
    /// Split key stamped on every entry of a nested split collection.
    indirect_key: Option<String>,
    entries: Vec<FileEntry>,
    index: FxHashMap<String, usize>,
    disambig: Disambiguator,
}

impl Registry {
    pub fn new(collection: Option<&str>, numbering: Arc<dyn XrefNumbering>, language: &str) -> Self {
        Self {
            collection: collection.map(str::to_owned),
            numbering,
            language: language.to_owned(),
            indirect_key: None,
            entries: Vec::new(),
            index: FxHashMap::default(),
            disambig: Disambiguator::new(),
        }
    }

    pub fn with_indirect_key(mut self, key: Option<String>) -> Self {
        self.indirect_key = key;
        self
    }

    /// Start from the output names `parent` has already emitted, so entries
    /// later adopted back into `parent` never share its output files.
    pub fn reserving(mut self, parent: Option<&Registry>) -> Self {
        if let Some(parent) = parent {
            self.disambig = parent.disambig.clone();
        }
        self
    }

    /// Registry key for authored identifier text.
    pub fn normalize(&self, identifier: &str) -> String {
        normalize_identifier(identifier, self.collection.as_deref())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, identifier: &str) -> Option<&FileEntry> {
        self.index
            .get(identifier)
            .or_else(|| self.index.get(&self.normalize(identifier)))
            .map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut FileEntry> {
        let key = self.normalize(identifier);
        let i = self
            .index
            .get(identifier)
            .or_else(|| self.index.get(&key))
            .copied()?;
        Some(&mut self.entries[i])
    }

    pub fn try_get(&self, identifier: &str) -> Result<&FileEntry, RegistryError> {
        self.get(identifier)
            .ok_or_else(|| RegistryError::UnknownIdentifier(identifier.to_owned()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    /// Change fields of a registered entry.
    pub fn update(
        &mut self,
        identifier: &str,
        f: impl FnOnce(&mut FileEntry),
    ) -> Result<(), RegistryError> {
        let entry = self
            .get_mut(identifier)
            .ok_or_else(|| RegistryError::UnknownIdentifier(identifier.to_owned()))?;
        f(entry);
        Ok(())
    }

    /// Keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identifier.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries
    }

    /// Take the parsed tree out of an entry, leaving `None` behind.
    pub fn take_document(&mut self, identifier: &str) -> Option<Document> {
        self.get_mut(identifier)?.document.take()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Register one entry. Documents are read (if not pre-parsed), indexed
    /// and suffixed here.
    pub fn register(&mut self, spec: FileRefSpec) -> Result<&FileEntry, RegistryError> {
        let identifier = self.normalize(&spec.identifier);
        if self.index.contains_key(&identifier) {
            return Err(RegistryError::Duplicate(identifier));
        }

        let source_path = spec.root.join(&spec.path);
        let out_path = PathBuf::from(self.disambig.destination(&to_slash(&spec.path)));

        let mut entry = FileEntry {
            identifier,
            kind: spec.kind,
            source_path,
            rel_path: spec.path,
            out_path,
            url: spec.url,
            title: spec.title.unwrap_or_default(),
            formats: spec.formats,
            sectionsplit: spec.sectionsplit,
            bare: spec.bare,
            indirect_key: self.indirect_key.clone(),
            ..FileEntry::default()
        };

        if spec.kind.is_document() {
            let doc = match spec.document {
                Some(doc) => doc,
                None => xml::read_file(&entry.source_path)
                    .map_err(|err| RegistryError::Xml(entry.source_path.clone(), err))?,
            };
            let doc = match (spec.kind, spec.container.as_deref()) {
                (EntryKind::IdRef, Some(container)) => extract_container(&doc, container)
                    .ok_or_else(|| RegistryError::MissingContainer {
                        path: entry.source_path.clone(),
                        container: container.to_owned(),
                    })?,
                _ => doc,
            };
            self.populate(&mut entry, doc);
        } else {
            if !entry.source_path.exists() {
                return Err(RegistryError::MissingFile(entry.source_path));
            }
            entry.bibitem = minimal_bibitem(&entry.identifier);
        }

        if entry.title.is_empty() {
            entry.title = entry
                .bibdata
                .as_ref()
                .and_then(document_title)
                .unwrap_or_else(|| entry.identifier.clone());
        }

        Ok(self.insert(entry))
    }

    /// Add an entry built elsewhere (fragments adopted from a nested split
    /// collection).
    pub fn adopt(&mut self, entry: FileEntry) -> Result<&FileEntry, RegistryError> {
        if self.index.contains_key(&entry.identifier) {
            return Err(RegistryError::Duplicate(entry.identifier));
        }
        if !self.disambig.reserve(&to_slash(&entry.out_path)) {
            return Err(RegistryError::OutputTaken {
                identifier: entry.identifier,
                path: entry.out_path,
            });
        }
        Ok(self.insert(entry))
    }

    pub fn remove(&mut self, identifier: &str) -> Option<FileEntry> {
        let key = self.get(identifier)?.identifier.clone();
        let i = self.index.remove(&key)?;
        let entry = self.entries.remove(i);
        for idx in self.index.values_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }
        Some(entry)
    }

    fn insert(&mut self, entry: FileEntry) -> &FileEntry {
        let i = self.entries.len();
        self.index.insert(entry.identifier.clone(), i);
        self.entries.push(entry);
        &self.entries[i]
    }

    fn populate(&self, entry: &mut FileEntry, doc: Document) {
        let mut anchors = extract_anchors(&doc, self.numbering.as_ref(), &self.language);
        let mut ids = extract_ids(&doc);

        // Fragments of a split document arrive already suffixed; keep the
        // tables in original-id space like every other entry.
        if let Some(existing) = suffix::existing(&doc) {
            ids = ids
                .iter()
                .map(|id| suffix::strip(id, existing).to_owned())
                .collect();
            for bucket in anchors.values_mut() {
                for anchor in bucket.values_mut() {
                    *anchor = suffix::strip(anchor, existing).to_owned();
                }
            }
        }

        let root = doc.root();
        entry.doctype = root.and_then(|r| doc.attr(r, "type")).map(str::to_owned);
        entry.internal_refs = internal_refs(&doc);
        entry.bibdata = root
            .and_then(|r| doc.child(r, "bibdata"))
            .map(|b| doc.extract(b));
        entry.bibitem = match &entry.bibdata {
            Some(bibdata) => bibitem_standin(bibdata),
            None => minimal_bibitem(&entry.identifier),
        };
        entry.anchors = anchors;
        entry.ids = ids;
        entry.document = Some(doc);
        entry.assign_suffix();
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// First element child of the element whose `id` is `container`, as a
/// standalone document keeping the namespace declarations in scope.
fn extract_container(doc: &Document, container: &str) -> Option<Document> {
    let holder = doc
        .elements()
        .into_iter()
        .find(|&n| doc.attr(n, "id") == Some(container))?;
    let inner = doc.element_children(holder).next()?;
    let mut out = doc.extract(inner);
    let root = out.root()?;

    let scopes: Vec<NodeId> = std::iter::once(holder).chain(doc.ancestors(holder)).collect();
    for scope in scopes {
        let Some(elem) = doc.element(scope) else {
            continue;
        };
        for (name, value) in &elem.attrs {
            if (name == "xmlns" || name.starts_with("xmlns:")) && !out.has_attr(root, name) {
                out.set_attr(root, name, value.as_str());
            }
        }
    }
    Some(out)
}

/// `(schema, anchor)` pairs from `bibitem[@type='internal']` repository ids.
fn internal_refs(doc: &Document) -> Vec<(String, String)> {
    let Some(root) = doc.root() else {
        return Vec::new();
    };
    doc.find_all(root, "bibitem")
        .into_iter()
        .filter(|&b| doc.attr(b, "type") == Some("internal"))
        .filter_map(|b| repository_id(doc, b))
        .filter_map(|text| {
            let (schema, anchor) = text.split_once('/')?;
            Some((schema.to_owned(), anchor.to_owned()))
        })
        .collect()
}

/// Text of a bibitem's `docidentifier[@type='repository']`.
pub fn repository_id(doc: &Document, bibitem: NodeId) -> Option<String> {
    doc.children_named(bibitem, "docidentifier")
        .find(|&d| doc.attr(d, "type") == Some("repository"))
        .map(|d| doc.text_content(d).trim().to_owned())
}

/// `bibdata` renamed to `bibitem`, hidden, without its `ext` block.
fn bibitem_standin(bibdata: &Document) -> Document {
    let mut doc = bibdata.clone();
    if let Some(root) = doc.root() {
        doc.rename(root, "bibitem");
        doc.set_attr(root, "hidden", "true");
        let ext: Vec<_> = doc.children_named(root, "ext").collect();
        for node in ext {
            doc.detach(node);
        }
    }
    doc
}

/// `<bibitem hidden="true"><docidentifier>ID</docidentifier></bibitem>`
fn minimal_bibitem(identifier: &str) -> Document {
    let mut doc = Document::with_root("bibitem");
    if let Some(root) = doc.root() {
        doc.set_attr(root, "hidden", "true");
        let docid = doc.create_text_element("docidentifier", identifier);
        doc.append_child(root, docid);
    }
    doc
}

fn document_title(bibdata: &Document) -> Option<String> {
    let root = bibdata.root()?;
    let title = bibdata.child(root, "title")?;
    Some(collapse_whitespace(&bibdata.text_content(title))).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::anchors::DefaultNumbering;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const ISO1: &str = r#"<iso-standard xmlns="https://www.metanorma.org/ns/iso" type="iso">
      <bibdata type="standard"><title>Widgets</title><docidentifier>ISO 1:2000</docidentifier><ext><doctype>standard</doctype></ext></bibdata>
      <sections><clause id="sec1"><title>Scope</title></clause></sections>
      <bibliography><references id="refs">
        <bibitem id="int1" type="internal"><docidentifier type="repository">schema/X</docidentifier></bibitem>
      </references></bibliography>
    </iso-standard>"#;

    fn registry() -> Registry {
        Registry::new(Some("coll"), Arc::new(DefaultNumbering), "en")
    }

    fn spec(identifier: &str, path: &str, document: Option<Document>) -> FileRefSpec {
        FileRefSpec {
            identifier: identifier.into(),
            path: path.into(),
            document,
            ..FileRefSpec::default()
        }
    }

    #[test]
    fn test_register_document() {
        let mut reg = registry();
        let doc = xml::parse(ISO1).unwrap();
        let entry = reg.register(spec("ISO&nbsp;1:2000", "./iso1.xml", Some(doc))).unwrap();

        assert_eq!(entry.identifier, "ISO 1:2000");
        assert_eq!(entry.title, "Widgets");
        assert_eq!(entry.anchors["clause"]["1"], "sec1");
        assert!(entry.ids.contains("sec1"));
        assert_eq!(entry.document_suffix.as_deref(), Some("ISO_1_2000"));
        assert_eq!(entry.doctype.as_deref(), Some("iso"));
        assert_eq!(entry.internal_refs, vec![("schema".to_owned(), "X".to_owned())]);
        assert_eq!(entry.out_path, PathBuf::from("iso1.xml"));

        let standin = &entry.bibitem;
        let root = standin.root().unwrap();
        assert_eq!(standin.name(root), Some("bibitem"));
        assert_eq!(standin.attr(root, "hidden"), Some("true"));
        assert!(standin.child(root, "ext").is_none());

        let doc = entry.document.as_ref().unwrap();
        let clause = doc.find(doc.root().unwrap(), "clause").unwrap();
        assert_eq!(doc.attr(clause, "id"), Some("sec1_ISO_1_2000"));
    }

    #[test]
    fn test_lookup_normalizes() {
        let mut reg = registry();
        reg.register(spec("ISO 1:2000", "iso1.xml", Some(xml::parse(ISO1).unwrap())))
            .unwrap();
        assert!(reg.contains("ISO 1:2000"));
        assert!(reg.get("coll ISO  1:2000").is_some());
        assert!(reg.get("ISO&#160;1:2000").is_some());
        assert!(!reg.contains("ISO 2"));
        assert!(matches!(
            reg.try_get("ISO 2"),
            Err(RegistryError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_duplicate_identifier() {
        let mut reg = registry();
        reg.register(spec("A", "a.xml", Some(Document::with_root("doc"))))
            .unwrap();
        let err = reg
            .register(spec("A", "b.xml", Some(Document::with_root("doc"))))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn test_attachments_disambiguate() {
        let dir = TempDir::new().unwrap();
        for sub in ["a", "b"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
            fs::write(dir.path().join(sub).join("img.svg"), "<svg/>").unwrap();
        }
        let mut reg = registry();
        for (id, path) in [("img a", "a/img.svg"), ("img b", "b/img.svg")] {
            reg.register(FileRefSpec {
                identifier: id.into(),
                kind: EntryKind::Attachment,
                path: path.into(),
                root: dir.path().to_path_buf(),
                ..FileRefSpec::default()
            })
            .unwrap();
        }

        let a = reg.get("img a").unwrap();
        let b = reg.get("img b").unwrap();
        assert_eq!(a.out_path.file_name().unwrap(), "img.svg");
        assert_eq!(b.out_path.file_name().unwrap(), "img.1.svg");
        assert!(a.anchors.is_empty());
        let root = b.bibitem.root().unwrap();
        assert_eq!(b.bibitem.text_content(root), "img b");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry();
        let err = reg
            .register(FileRefSpec {
                identifier: "x".into(),
                path: "missing.xml".into(),
                root: dir.path().to_path_buf(),
                ..FileRefSpec::default()
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::Xml(..)));
    }

    #[test]
    fn test_idref_extracts_container() {
        let bundle = r#"<bundle xmlns="urn:x"><doc-container id="d2"><standard-document><sections><clause id="c"/></sections></standard-document></doc-container></bundle>"#;
        let mut reg = registry();
        let entry = reg
            .register(FileRefSpec {
                identifier: "D2".into(),
                kind: EntryKind::IdRef,
                path: "bundle.xml".into(),
                container: Some("d2".into()),
                document: Some(xml::parse(bundle).unwrap()),
                ..FileRefSpec::default()
            })
            .unwrap();

        let doc = entry.document.as_ref().unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.name(root), Some("standard-document"));
        assert_eq!(doc.attr(root, "xmlns"), Some("urn:x"));
        assert!(entry.ids.contains("c"));
    }

    #[test]
    fn test_update_and_remove() {
        let mut reg = registry();
        for id in ["A", "B", "C"] {
            reg.register(spec(id, &format!("{id}.xml"), Some(Document::with_root("doc"))))
                .unwrap();
        }
        reg.update("B", |e| e.bare = true).unwrap();
        assert!(reg.get("B").unwrap().bare);
        assert!(reg.update("Z", |_| {}).is_err());

        let removed = reg.remove("A").unwrap();
        assert_eq!(removed.identifier, "A");
        assert_eq!(reg.keys().collect::<Vec<_>>(), ["B", "C"]);
        assert_eq!(reg.get("C").unwrap().identifier, "C");
    }

    #[test]
    fn test_nested_registry_avoids_parent_outputs() {
        let mut outer = registry();
        for (id, path) in [("ISO 9", "big.xml"), ("ISO 1", "big.1.xml")] {
            outer
                .register(spec(id, path, Some(Document::with_root("doc"))))
                .unwrap();
        }

        let mut nested = Registry::new(Some("big"), Arc::new(DefaultNumbering), "en").reserving(Some(&outer));
        for (id, path) in [("Foreword", "big.0.xml"), ("Scope", "big.1.xml"), ("Terms", "big.2.xml")] {
            nested
                .register(spec(id, path, Some(Document::with_root("doc"))))
                .unwrap();
        }
        let outs: Vec<_> = nested.entries().map(|e| e.out_path.clone()).collect();
        assert_eq!(outs, [PathBuf::from("big.0.xml"), "big.2.xml".into(), "big.3.xml".into()]);

        for mut entry in nested.into_entries() {
            entry.document = None;
            outer.adopt(entry).unwrap();
        }
        assert_eq!(outer.len(), 5);
    }

    #[test]
    fn test_adopt_rejects_taken_output() {
        let mut outer = registry();
        outer
            .register(spec("ISO 1", "big.1.xml", Some(Document::with_root("doc"))))
            .unwrap();

        let mut unseeded = Registry::new(None, Arc::new(DefaultNumbering), "en");
        unseeded
            .register(spec("Scope", "big.1.xml", Some(Document::with_root("doc"))))
            .unwrap();
        let entry = unseeded.into_entries().remove(0);
        let err = outer.adopt(entry).unwrap_err();
        assert!(matches!(err, RegistryError::OutputTaken { .. }));
        assert!(outer.get("Scope").is_none());
    }
}
