//! Utility modules shared by the collection engine.

pub mod ident;
pub mod path;
