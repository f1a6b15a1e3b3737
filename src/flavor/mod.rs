//! Document flavors: output formats, numbering and conversion per document
//! type.
//!
//! A flavor is picked once per run by its type tag (`[build].flavor`) and
//! shared by every worker through `Arc`.

mod generic;

pub use generic::Generic;

use crate::collection::anchors::XrefNumbering;
use rustc_hash::FxHashMap;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlavorError {
    #[error("unknown flavor `{0}`")]
    UnknownFlavor(String),

    #[error("flavor `{flavor}` does not produce `{format}`")]
    UnsupportedFormat { flavor: String, format: String },

    #[error("failed to write `{0}`")]
    Io(PathBuf, #[source] io::Error),
}

/// Capabilities of one document flavor.
pub trait Flavor: Send + Sync {
    fn name(&self) -> &str;

    /// `(format tag, output file extension)` pairs.
    fn output_formats(&self) -> &'static [(&'static str, &'static str)];

    fn extension(&self, format: &str) -> Option<&'static str> {
        self.output_formats()
            .iter()
            .find(|(tag, _)| *tag == format)
            .map(|(_, ext)| *ext)
    }

    /// Whether `format` is generated from presentation XML rather than the
    /// resolved semantic XML.
    fn uses_presentation_xml(&self, format: &str) -> bool;

    /// Semantic → presentation XML.
    fn presentation(&self, xml: &str) -> Result<String, FlavorError> {
        Ok(xml.to_owned())
    }

    /// Cross-reference numbering used for anchor extraction.
    fn numbering(&self) -> Arc<dyn XrefNumbering>;

    /// Write `xml` converted to `format` at `out`.
    fn convert(&self, xml: &str, format: &str, out: &Path) -> Result<(), FlavorError>;
}

/// Type tag → flavor.
#[derive(Clone, Default)]
pub struct FlavorRegistry {
    flavors: FxHashMap<String, Arc<dyn Flavor>>,
}

impl FlavorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the flavors shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Generic));
        registry
    }

    pub fn register(&mut self, flavor: Arc<dyn Flavor>) {
        self.flavors.insert(flavor.name().to_owned(), flavor);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Flavor>, FlavorError> {
        self.flavors
            .get(name)
            .cloned()
            .ok_or_else(|| FlavorError::UnknownFlavor(name.to_owned()))
    }
}

/// Write `content` to `out`, creating parent directories.
pub(crate) fn write_output(out: &Path, content: &str) -> Result<(), FlavorError> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).map_err(|err| FlavorError::Io(parent.to_path_buf(), err))?;
    }
    std::fs::write(out, content).map_err(|err| FlavorError::Io(out.to_path_buf(), err))
}
