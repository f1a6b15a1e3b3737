//! One registered document or attachment.

use super::anchors::AnchorTable;
use super::suffix;
use crate::config::EntryKind;
use crate::utils::ident::to_ncname;
use crate::utils::path::{relative_url, with_output_extension};
use crate::xml::Document;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    /// Normalized identifier (the registry key).
    pub identifier: String,
    pub kind: EntryKind,
    /// Absolute source path.
    pub source_path: PathBuf,
    /// Source path as authored, relative to the collection root.
    pub rel_path: PathBuf,
    /// Destination relative to the output directory, after disambiguation.
    pub out_path: PathBuf,
    /// External citation URL overriding `out_path`.
    pub url: Option<String>,
    pub title: String,
    pub formats: Vec<String>,

    /// The document's `bibdata`, as compiled.
    pub bibdata: Option<Document>,
    /// Hidden-bibliography stand-in cited in place of this document.
    pub bibitem: Document,

    pub anchors: AnchorTable,
    /// Every element id (original, unsuffixed).
    pub ids: FxHashSet<String>,
    pub document_suffix: Option<String>,
    /// Root `type` attribute: the container schema of the document.
    pub doctype: Option<String>,
    /// `(schema, anchor)` pairs of the internal references the document makes.
    pub internal_refs: Vec<(String, String)>,

    pub sectionsplit: bool,
    pub indirect_key: Option<String>,
    pub parent_id: Option<String>,
    pub bare: bool,
    /// Fragment produced (and already rendered) by a section split.
    pub sectionsplit_output: bool,
    /// Navigation page of a split document, relative to the output directory.
    pub split_index: Option<PathBuf>,

    /// Parsed document tree; taken out for resolution.
    pub document: Option<Document>,
    /// Format → written output file.
    pub outputs: FxHashMap<String, PathBuf>,
}

impl FileEntry {
    pub fn is_attachment(&self) -> bool {
        self.kind == EntryKind::Attachment
    }

    /// Rendered by this collection (not split, not a fragment adopted from
    /// a nested build).
    pub fn is_renderable(&self) -> bool {
        !self.is_attachment() && !self.sectionsplit && !self.sectionsplit_output
    }

    /// Assign the document suffix and apply it to the tree. Runs once: later
    /// calls change nothing.
    ///
    /// A tree that already carries a suffix (a section-split fragment cloned
    /// from a suffixed document) keeps it.
    pub fn assign_suffix(&mut self) -> &str {
        if self.document_suffix.is_none() {
            let existing = self
                .document
                .as_ref()
                .and_then(suffix::existing)
                .map(str::to_owned);
            let value = existing.unwrap_or_else(|| to_ncname(&self.identifier));
            if let Some(doc) = self.document.as_mut() {
                suffix::apply(doc, &value);
            }
            self.document_suffix = Some(value);
        }
        self.document_suffix.as_deref().unwrap_or_default()
    }

    /// Anchor as it appears in this document's output.
    ///
    /// Documents addressed by external `url` keep their anchors unqualified.
    pub fn qualify(&self, anchor: &str) -> String {
        match (&self.document_suffix, &self.url) {
            (Some(s), None) => suffix::qualify(anchor, s),
            _ => anchor.to_owned(),
        }
    }

    /// Original id for a (possibly qualified) anchor, if the document has it.
    pub fn find_id<'a>(&self, anchor: &'a str) -> Option<&'a str> {
        let original = match &self.document_suffix {
            Some(s) => suffix::strip(anchor, s),
            None => anchor,
        };
        self.ids.contains(original).then_some(original)
    }

    /// Anchor for `(locality type, label)`; `annex` and `clause` stand in for
    /// each other.
    pub fn locate(&self, kind: &str, label: &str) -> Option<&str> {
        let lookup = |k: &str| self.anchors.get(k).and_then(|b| b.get(label));
        lookup(kind)
            .or_else(|| match kind {
                "annex" => lookup("clause"),
                "clause" => lookup("annex"),
                _ => None,
            })
            .map(String::as_str)
    }

    /// Output file other documents link to, relative to the output directory.
    pub fn link_target(&self) -> PathBuf {
        if let Some(index) = &self.split_index {
            return index.clone();
        }
        if self.is_attachment() {
            self.out_path.clone()
        } else {
            with_output_extension(&self.out_path, "html")
        }
    }

    /// File a reader opens, relative to `output`: the split navigation page,
    /// else the written `html`, else the first written format in request
    /// order. Falls back to the link target when nothing was written.
    pub fn page(&self, output: &Path) -> PathBuf {
        if let Some(index) = &self.split_index {
            return index.clone();
        }
        let written = self
            .outputs
            .get("html")
            .or_else(|| self.formats.iter().find_map(|f| self.outputs.get(f)))
            .or_else(|| self.outputs.get("attachment"));
        match written {
            Some(path) => path.strip_prefix(output).unwrap_or(path).to_path_buf(),
            None => self.link_target(),
        }
    }

    /// Citation URL of this entry as seen from `from` (the citing entry).
    pub fn citation_url(&self, from: Option<&FileEntry>) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let from_dir = from
            .and_then(|f| f.out_path.parent())
            .unwrap_or(Path::new(""));
        relative_url(from_dir, &self.link_target())
    }
}
