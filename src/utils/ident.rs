//! Document identifier utilities.
//!
//! Converts authored identifier text into registry keys and NCName-safe
//! suffixes.

use quick_xml::escape::{resolve_predefined_entity, unescape_with};

/// HTML named entities that show up in authored identifiers.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", "\u{a0}"),
    ("ensp", "\u{2002}"),
    ("emsp", "\u{2003}"),
    ("thinsp", "\u{2009}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201c}"),
    ("rdquo", "\u{201d}"),
    ("hellip", "\u{2026}"),
    ("copy", "\u{a9}"),
    ("reg", "\u{ae}"),
    ("trade", "\u{2122}"),
];

// ============================================================================
// Normalization
// ============================================================================

/// Decode predefined XML, numeric and common HTML entities.
///
/// Text that is not valid entity syntax (a stray `&`) is returned unchanged.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    unescape_with(text, |entity| {
        resolve_predefined_entity(entity).or_else(|| {
            HTML_ENTITIES
                .iter()
                .find(|(name, _)| *name == entity)
                .map(|(_, value)| *value)
        })
    })
    .map_or_else(|_| text.to_owned(), |decoded| decoded.into_owned())
}

/// Collapse every whitespace run into one space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split(char::is_whitespace)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Registry key for an authored identifier.
///
/// Entities are decoded, whitespace collapsed, and a leading
/// `"<collection name> "` token stripped.
///
/// # Examples
/// ```ignore
/// normalize_identifier("ISO&nbsp;1:2000", None)          // "ISO 1:2000"
/// normalize_identifier("Coll  ISO 1", Some("Coll"))      // "ISO 1"
/// ```
pub fn normalize_identifier(text: &str, collection: Option<&str>) -> String {
    let normalized = collapse_whitespace(&decode_entities(text));
    match collection.filter(|name| !name.is_empty()) {
        Some(name) => match normalized.strip_prefix(name) {
            Some(rest) if rest.starts_with(' ') => rest.trim_start().to_owned(),
            _ => normalized,
        },
        None => normalized,
    }
}

// ============================================================================
// NCName
// ============================================================================

/// Convert text to an XML NCName usable as an id or id suffix.
///
/// Every character that is not a letter, digit, `-`, `.` or `_` becomes `_`;
/// a name starting with a digit, `-` or `.` gets a leading `_`.
pub fn to_ncname(text: &str) -> String {
    let mut out: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out
        .chars()
        .next()
        .is_none_or(|c| c.is_ascii_digit() || c == '-' || c == '.')
    {
        out.insert(0, '_');
    }
    out
}
