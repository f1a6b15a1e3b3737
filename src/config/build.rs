//! `[build]` section configuration.
//!
//! Output location, flavor, requested formats and worker pool size.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in collection.toml - output pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// output = "_site"          # Output directory
/// flavor = "generic"        # Flavor processor
/// formats = ["xml", "presentation"]
/// parallel = 4              # Worker threads
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Build output directory (`~` is expanded).
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Flavor tag selecting the processor for every document.
    #[serde(default = "defaults::build::flavor")]
    #[educe(Default = defaults::build::flavor())]
    pub flavor: String,

    /// Output formats generated for each document.
    #[serde(default = "defaults::build::formats")]
    #[educe(Default = defaults::build::formats())]
    pub formats: Vec<String>,

    /// Worker pool size. Defaults to `METANORMA_PARALLEL`, else 3.
    #[serde(default = "defaults::build::parallel")]
    #[educe(Default = defaults::build::parallel())]
    pub parallel: usize,

    /// File name of the navigation page.
    #[serde(default = "defaults::build::index")]
    #[educe(Default = defaults::build::index())]
    pub index: String,

    /// Write the concatenated collection XML (`<name>.xml`).
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub concatenate: bool,

    /// Locale handed to the cross-reference numbering pass.
    #[serde(default = "defaults::build::language")]
    #[educe(Default = defaults::build::language())]
    pub language: String,
}
