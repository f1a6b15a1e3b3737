//! `[collection]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[collection]` section in collection.toml - collection metadata.
///
/// # Example
/// ```toml
/// [collection]
/// name = "iso-2024"
/// title = "ISO Collection 2024"
/// identifier = "ISO COLL 1"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct CollectionInfo {
    /// Name used for output files; also stripped from the front of
    /// identifiers before registry lookup.
    #[serde(default = "defaults::collection::name")]
    #[educe(Default = defaults::collection::name())]
    pub name: String,

    /// Title shown on the navigation page.
    #[serde(default)]
    pub title: String,

    /// Identifier of the collection itself.
    #[serde(default)]
    pub identifier: String,

    /// Key namespacing the internal references of a section split.
    /// Only set on manifests written by the splitter.
    #[serde(default = "defaults::collection::indirect_key")]
    #[educe(Default = defaults::collection::indirect_key())]
    pub indirect_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::super::CollectionConfig;

    #[test]
    fn test_collection_info_full() {
        let config: CollectionConfig = toml::from_str(
            r#"
            [collection]
            name = "iso"
            title = "ISO Collection"
            identifier = "ISO COLL"
            indirect_key = "ABCDEFGH"
        "#,
        )
        .unwrap();

        assert_eq!(config.collection.name, "iso");
        assert_eq!(config.collection.title, "ISO Collection");
        assert_eq!(config.collection.identifier, "ISO COLL");
        assert_eq!(config.collection.indirect_key.as_deref(), Some("ABCDEFGH"));
    }

    #[test]
    fn test_collection_info_defaults() {
        let config: CollectionConfig = toml::from_str("[collection]\n").unwrap();

        assert_eq!(config.collection.name, "collection");
        assert_eq!(config.collection.title, "");
        assert_eq!(config.collection.indirect_key, None);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let result: Result<CollectionConfig, _> = toml::from_str(
            r#"
            [collection]
            name = "x"
            unknown_field = "should_fail"
        "#,
        );

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }
}
