//! Synthetic collection manifest for the fragments of one split document.

use crate::config::{BuildConfig, CollectionConfig, CollectionInfo, EntryConfig};
use crate::utils::ident::normalize_identifier;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::path::PathBuf;

/// One written fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitChunk {
    /// `displayorder` of the fragment's heading.
    pub order: u64,
    /// Emission index: the `<n>` of `<base>.<n>.xml`.
    pub index: usize,
    /// Fragment file name.
    pub url: String,
    pub title: String,
}

/// Collection-level data of a split manifest.
#[derive(Debug, Clone)]
pub struct ManifestInfo {
    /// Base name of the split document (collection name).
    pub name: String,
    pub title: String,
    pub identifier: String,
    pub indirect_key: String,
    pub output: PathBuf,
    pub flavor: String,
    pub formats: Vec<String>,
}

/// Sort chunks by `displayorder`, ties by emission index.
pub fn sort_chunks(chunks: &mut [SplitChunk]) {
    chunks.sort_by_key(|c| (c.order, c.index));
}

/// Manifest listing the fragments in display order.
pub fn build_manifest(chunks: &[SplitChunk], info: &ManifestInfo) -> CollectionConfig {
    let mut sorted = chunks.to_vec();
    sort_chunks(&mut sorted);

    let mut seen = FxHashSet::default();
    let entries = sorted
        .into_iter()
        .map(|chunk| {
            let base = normalize_identifier(&format!("{} {}", info.identifier, chunk.title), None);
            let mut identifier = base.clone();
            let mut n = 1;
            while !seen.insert(identifier.clone()) {
                identifier = format!("{base} ({n})");
                n += 1;
            }
            EntryConfig {
                identifier,
                file: Some(PathBuf::from(chunk.url)),
                title: Some(chunk.title),
                bare: chunk.index != 0,
                ..EntryConfig::default()
            }
        })
        .collect();

    CollectionConfig {
        collection: CollectionInfo {
            name: info.name.clone(),
            title: info.title.clone(),
            identifier: info.identifier.clone(),
            indirect_key: Some(info.indirect_key.clone()),
        },
        build: BuildConfig {
            output: info.output.clone(),
            flavor: info.flavor.clone(),
            formats: info.formats.clone(),
            index: format!("{}.html", info.name),
            concatenate: false,
            ..BuildConfig::default()
        },
        entries,
        ..CollectionConfig::default()
    }
}
