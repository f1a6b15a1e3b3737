//! Collision-free destination file names.
//!
//! Disambiguation works on the basename only; directory components are kept
//! as authored (minus leading `./` and `../`).
//!
//! | Seen before              | Input       | Output        |
//! |--------------------------|-------------|---------------|
//! | -                        | `a/img.svg` | `a/img.svg`   |
//! | `img.svg`                | `b/img.svg` | `b/img.1.svg` |
//! | `img.svg`, `img.1.svg`   | `img.1.svg` | `img.2.svg`   |

use crate::utils::path::strip_relative_prefix;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::LazyLock;

/// `name.<n>.ext` with a numeric tail (no leading zero).
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<start>.+\.)(?P<num>[1-9][0-9]*)\.(?P<suff>[^.]*)$").unwrap());

/// `name.ext`
static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<start>.+\.)(?P<suff>[^.]*)$").unwrap());

#[derive(Debug, Default, Clone)]
pub struct Disambiguator {
    seen: FxHashSet<String>,
}

impl Disambiguator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination path for `source`; never returns the same basename twice.
    pub fn destination(&mut self, source: &str) -> String {
        let path = strip_relative_prefix(source);
        let (dir, base) = match path.rsplit_once('/') {
            Some((dir, base)) => (Some(dir), base),
            None => (None, path),
        };

        let base = if self.seen.contains(base) {
            self.next_free(base)
        } else {
            base.to_owned()
        };
        self.seen.insert(base.clone());

        match dir {
            Some(dir) => format!("{dir}/{base}"),
            None => base,
        }
    }

    /// Claim the basename of an already-chosen `path`. Returns `false` when
    /// that basename was emitted before.
    pub fn reserve(&mut self, path: &str) -> bool {
        let path = strip_relative_prefix(path);
        let base = path.rsplit_once('/').map_or(path, |(_, base)| base);
        self.seen.insert(base.to_owned())
    }

    /// Increment past any existing numeric tail until the name is unseen.
    fn next_free(&self, base: &str) -> String {
        let numbered = NUMBERED.captures(base).and_then(|caps| {
            let next = caps["num"].parse::<u64>().ok()?.checked_add(1)?;
            Some((caps["start"].to_owned(), caps["suff"].to_owned(), next))
        });
        let (start, suffix, mut i) = if let Some(numbered) = numbered {
            numbered
        } else if let Some(caps) = EXTENSION.captures(base) {
            (caps["start"].to_owned(), caps["suff"].to_owned(), 1)
        } else {
            (format!("{base}."), String::new(), 1)
        };

        loop {
            let candidate = if suffix.is_empty() {
                format!("{start}{i}")
            } else {
                format!("{start}{i}.{suffix}")
            };
            if !self.seen.contains(&candidate) {
                return candidate;
            }
            i = i.saturating_add(1);
        }
    }
}
