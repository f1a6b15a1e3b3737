//! Collection configuration management for `collection.toml`.
//!
//! # Sections
//!
//! | Section        | Purpose                                          |
//! |----------------|--------------------------------------------------|
//! | `[collection]` | Collection metadata (name, title, identifier)    |
//! | `[build]`      | Output directory, flavor, formats, parallelism   |
//! | `[[entry]]`    | Member documents and attachments                 |
//!
//! # Example
//!
//! ```toml
//! [collection]
//! name = "iso-2024"
//! title = "ISO Collection"
//!
//! [build]
//! output = "_site"
//! formats = ["xml", "presentation"]
//!
//! [[entry]]
//! identifier = "ISO 1:2000"
//! file = "iso1.xml"
//! ```
//!
//! The section splitter writes manifests in the same format, so a split
//! document's fragments are built as an ordinary (nested) collection.

mod build;
mod collection;
pub mod defaults;
mod entry;
mod error;

pub use build::BuildConfig;
pub use collection::CollectionInfo;
pub use entry::{EntryConfig, EntryKind};
pub use error::ConfigError;

use crate::cli::Cli;
use anyhow::{Result, bail};
use educe::Educe;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing collection.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory entry files are resolved against
    #[serde(skip)]
    pub root: PathBuf,

    /// Collection metadata
    #[serde(default)]
    pub collection: CollectionInfo,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Member documents and attachments, in collection order
    #[serde(default, rename = "entry")]
    pub entries: Vec<EntryConfig>,
}

impl CollectionConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: CollectionConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path; entries resolve against its directory
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.config_path = normalize_path(path);
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.build.output = config.resolve_output(&config.build.output);
        Ok(config)
    }

    /// Serialize back to TOML (used for synthetic split manifests)
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::from)?)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Some(output) = &cli.output {
            self.build.output = normalize_path(output);
        }
        if let Some(parallel) = cli.parallel {
            self.build.parallel = parallel;
        }
    }

    /// Formats requested for an entry
    pub fn entry_formats<'a>(&'a self, entry: &'a EntryConfig) -> &'a [String] {
        entry.formats.as_deref().unwrap_or(&self.build.formats)
    }

    /// Output directory with `~` expanded, relative to the config root
    fn resolve_output(&self, output: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&output.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        if path.is_relative() {
            normalize_path(&self.root.join(path))
        } else {
            path
        }
    }

    /// Validate entries before any document is read
    pub fn validate(&self) -> Result<()> {
        if self.build.parallel == 0 {
            bail!(ConfigError::NoWorkers);
        }
        if self.build.formats.is_empty() {
            bail!(ConfigError::NoFormats);
        }

        let mut seen = FxHashSet::default();
        for (i, entry) in self.entries.iter().enumerate() {
            let identifier = entry.identifier.trim();
            if identifier.is_empty() {
                bail!(ConfigError::EmptyIdentifier(i + 1));
            }
            if !seen.insert(identifier) {
                bail!(ConfigError::DuplicateIdentifier(entry.identifier.clone()));
            }
            if entry.file.is_none() {
                bail!(ConfigError::MissingFile(entry.identifier.clone()));
            }
            if entry.kind == EntryKind::IdRef && entry.container.is_none() {
                bail!(ConfigError::MissingContainer(entry.identifier.clone()));
            }
        }
        Ok(())
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
