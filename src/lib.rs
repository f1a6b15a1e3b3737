//! Metanorma collection assembler.
//!
//! Resolves cross-references between the documents of a collection, splits
//! large documents into section fragments, and writes every output format
//! through a bounded worker pool.

pub mod logger;

pub mod cli;
pub mod collection;
pub mod config;
pub mod diagnostics;
pub mod flavor;
pub mod pool;
pub mod resolver;
pub mod sectionsplit;
pub mod utils;
pub mod xml;
