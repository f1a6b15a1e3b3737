//! `[[entry]]` tables: the documents and attachments of a collection.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a collection entry is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A compiled document in its own file (default).
    #[default]
    FileRef,
    /// A document embedded in a container element of another file.
    IdRef,
    /// A file copied verbatim; cited but never parsed.
    Attachment,
}

impl EntryKind {
    pub const fn is_document(self) -> bool {
        !matches!(self, Self::Attachment)
    }
}

/// One `[[entry]]` table.
///
/// # Example
/// ```toml
/// [[entry]]
/// identifier = "ISO 1:2000"
/// file = "docs/iso1.xml"
/// sectionsplit = true
///
/// [[entry]]
/// identifier = "logo"
/// file = "img/logo.svg"
/// kind = "attachment"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    /// Document identifier, normalized before registration.
    pub identifier: String,

    /// Source file, relative to the configuration file.
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default = "defaults::entry::kind")]
    #[educe(Default = defaults::entry::kind())]
    pub kind: EntryKind,

    /// Container element id, for `idref` entries.
    #[serde(default)]
    pub container: Option<String>,

    /// External citation URL overriding the computed output location.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Split the document into section fragments.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub sectionsplit: bool,

    /// Section-split fragment stripped of the document's attachments; set on
    /// every fragment but the first one emitted.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub bare: bool,

    /// Output formats for this entry, overriding `[build].formats`.
    #[serde(default)]
    pub formats: Option<Vec<String>>,
}
