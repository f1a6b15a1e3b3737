//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [collection] Section Defaults
// ============================================================================

pub mod collection {
    pub fn name() -> String {
        "collection".into()
    }

    pub fn indirect_key() -> Option<String> {
        None
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    /// Environment variable overriding the worker pool size.
    pub const PARALLEL_ENV: &str = "METANORMA_PARALLEL";

    /// Pool size when the environment does not say otherwise.
    pub const PARALLEL_FALLBACK: usize = 3;

    pub fn output() -> PathBuf {
        "_site".into()
    }

    pub fn flavor() -> String {
        "generic".into()
    }

    pub fn formats() -> Vec<String> {
        vec!["xml".into()]
    }

    pub fn parallel() -> usize {
        std::env::var(PARALLEL_ENV)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(PARALLEL_FALLBACK)
    }

    pub fn index() -> String {
        "index.html".into()
    }

    pub fn language() -> String {
        "en".into()
    }
}

// ============================================================================
// [[entry]] Defaults
// ============================================================================

pub mod entry {
    use super::super::EntryKind;

    pub fn kind() -> EntryKind {
        EntryKind::FileRef
    }
}
