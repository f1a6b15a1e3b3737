//! Errors raised while loading or checking a collection manifest.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read manifest `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed collection manifest")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize split manifest")]
    Serialize(#[from] toml::ser::Error),

    #[error("[build.parallel] must be at least 1")]
    NoWorkers,

    #[error("[build.formats] must name at least one format")]
    NoFormats,

    #[error("[[entry]] #{0} has an empty identifier")]
    EmptyIdentifier(usize),

    #[error("[[entry]] duplicate identifier `{0}`")]
    DuplicateIdentifier(String),

    #[error("[[entry]] `{0}` requires `file`")]
    MissingFile(String),

    #[error("[[entry]] `{0}` has kind = \"idref\" and requires `container`")]
    MissingContainer(String),
}
