//! Document suffixing: make every id of a document unique across a
//! multi-document output by appending `_<suffix>`.

use crate::xml::Document;

/// Root attribute recording the suffix already applied to a document.
pub const SUFFIX_ATTR: &str = "document_suffix";

/// `(element local name, attribute)` pairs that hold an id reference.
/// `None` matches any element.
const SUFFIXED: &[(Option<&str>, &str)] = &[
    (None, "id"),
    (None, "bibitemid"),
    (Some("review"), "from"),
    (Some("review"), "to"),
    (Some("index"), "to"),
    (Some("xref"), "target"),
    (Some("callout"), "target"),
    (Some("location"), "target"),
];

/// Suffix already recorded on the document root.
pub fn existing(doc: &Document) -> Option<&str> {
    doc.root().and_then(|root| doc.attr(root, SUFFIX_ATTR))
}

/// Append `_<suffix>` to every id-bearing attribute and record the suffix on
/// the root.
///
/// Returns `false` (and changes nothing) when the document already carries a
/// suffix.
pub fn apply(doc: &mut Document, suffix: &str) -> bool {
    let Some(root) = doc.root() else {
        return false;
    };
    if doc.has_attr(root, SUFFIX_ATTR) {
        return false;
    }

    for node in doc.elements() {
        for (element, attr) in SUFFIXED {
            if element.is_some_and(|name| !doc.is(node, name)) {
                continue;
            }
            if let Some(value) = doc.attr(node, attr) {
                let suffixed = format!("{value}_{suffix}");
                doc.set_attr(node, attr, suffixed);
            }
        }
    }
    doc.set_attr(root, SUFFIX_ATTR, suffix);
    true
}

/// `<anchor>_<suffix>`, unless the anchor already ends with that suffix.
pub fn qualify(anchor: &str, suffix: &str) -> String {
    if is_qualified(anchor, suffix) {
        anchor.to_owned()
    } else {
        format!("{anchor}_{suffix}")
    }
}

pub fn is_qualified(anchor: &str, suffix: &str) -> bool {
    anchor
        .strip_suffix(suffix)
        .is_some_and(|rest| rest.ends_with('_') && rest.len() > 1)
}

/// Inverse of [`qualify`]: the original anchor.
pub fn strip<'a>(anchor: &'a str, suffix: &str) -> &'a str {
    if is_qualified(anchor, suffix) {
        &anchor[..anchor.len() - suffix.len() - 1]
    } else {
        anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{parse, to_string};

    const DOC: &str = r#"<doc>
        <clause id="c1"><xref target="c2"/><eref bibitemid="ref1"/></clause>
        <clause id="c2"><review from="c1" to="c2" reviewer="x"/><index to="c1"/></clause>
        <bibitem id="ref1"/>
      </doc>"#;

    #[test]
    fn test_apply_suffixes_all_id_attributes() {
        let mut doc = parse(DOC).unwrap();
        assert!(apply(&mut doc, "ISO_1"));

        let root = doc.root().unwrap();
        assert_eq!(doc.attr(root, SUFFIX_ATTR), Some("ISO_1"));
        let xref = doc.find(root, "xref").unwrap();
        assert_eq!(doc.attr(xref, "target"), Some("c2_ISO_1"));
        let eref = doc.find(root, "eref").unwrap();
        assert_eq!(doc.attr(eref, "bibitemid"), Some("ref1_ISO_1"));
        let review = doc.find(root, "review").unwrap();
        assert_eq!(doc.attr(review, "from"), Some("c1_ISO_1"));
        assert_eq!(doc.attr(review, "reviewer"), Some("x"));
        let index = doc.find(root, "index").unwrap();
        assert_eq!(doc.attr(index, "to"), Some("c1_ISO_1"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut doc = parse(DOC).unwrap();
        assert!(apply(&mut doc, "ISO_1"));
        let once = to_string(&doc).unwrap();
        assert!(!apply(&mut doc, "ISO_1"));
        assert!(!apply(&mut doc, "OTHER"));
        assert_eq!(to_string(&doc).unwrap(), once);
        assert_eq!(existing(&doc), Some("ISO_1"));
    }

    #[test]
    fn test_qualify_and_strip() {
        assert_eq!(qualify("sec1", "ISO_1"), "sec1_ISO_1");
        assert_eq!(qualify("sec1_ISO_1", "ISO_1"), "sec1_ISO_1");
        assert_eq!(strip("sec1_ISO_1", "ISO_1"), "sec1");
        assert_eq!(strip("sec1", "ISO_1"), "sec1");
        // The suffix alone is not a qualified anchor
        assert!(!is_qualified("_ISO_1", "ISO_1"));
    }
}
