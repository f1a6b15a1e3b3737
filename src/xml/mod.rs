//! XML document model: an editable arena tree with parse and serialize.

mod parse;
mod tree;
mod write;

pub use parse::parse;
pub use tree::{Children, Document, Element, NodeId, NodeKind, local_name};
pub use write::{XmlWriter, node_to_string, to_string, write_node};

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("XML write error: {0}")]
    Write(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("IO error when reading `{0}`")]
    Io(std::path::PathBuf, #[source] std::io::Error),
}

/// Read and parse an XML file.
pub fn read_file(path: &Path) -> Result<Document, XmlError> {
    let text =
        std::fs::read_to_string(path).map_err(|err| XmlError::Io(path.to_path_buf(), err))?;
    parse(&text)
}
