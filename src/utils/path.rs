//! Path helpers for output locations and citation URLs.

use std::path::{Component, Path, PathBuf};

/// Strip leading `./` and `../` sequences from an authored path.
///
/// ```ignore
/// strip_relative_prefix("../../img/a.svg") // "img/a.svg"
/// strip_relative_prefix("./a.xml")         // "a.xml"
/// ```
pub fn strip_relative_prefix(path: &str) -> &str {
    let mut rest = path;
    loop {
        if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("../") {
            rest = r;
        } else {
            return rest;
        }
    }
}

/// Path as a `/`-separated string, independent of the host separator.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative URL from directory `from` to file `to`.
///
/// Both paths are relative to the same output root. Each path segment is
/// percent-encoded.
pub fn relative_url(from: &Path, to: &Path) -> String {
    let from: Vec<_> = normal_components(from);
    let to: Vec<_> = normal_components(to);
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut segments: Vec<String> = Vec::new();
    segments.extend(std::iter::repeat_n("..".to_owned(), from.len() - common));
    segments.extend(
        to[common..]
            .iter()
            .map(|part| urlencoding::encode(part).into_owned()),
    );
    segments.join("/")
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Replace a trailing `.xml` with `ext`, or append `.ext` when absent.
pub fn with_output_extension(path: &Path, ext: &str) -> PathBuf {
    match path.extension() {
        Some(current) if current == "xml" => path.with_extension(ext),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_relative_prefix() {
        assert_eq!(strip_relative_prefix("./a.xml"), "a.xml");
        assert_eq!(strip_relative_prefix("../../img/a.svg"), "img/a.svg");
        assert_eq!(strip_relative_prefix("./../x/y"), "x/y");
        assert_eq!(strip_relative_prefix("a/./b"), "a/./b");
    }

    #[test]
    fn test_relative_url_same_dir() {
        assert_eq!(relative_url(Path::new(""), Path::new("doc 2.html")), "doc%202.html");
    }

    #[test]
    fn test_relative_url_across_dirs() {
        assert_eq!(
            relative_url(Path::new("a/b"), Path::new("a/c/d.html")),
            "../c/d.html"
        );
        assert_eq!(relative_url(Path::new("a"), Path::new("x.html")), "../x.html");
    }

    #[test]
    fn test_with_output_extension() {
        assert_eq!(
            with_output_extension(Path::new("d/a.xml"), "html"),
            PathBuf::from("d/a.html")
        );
        assert_eq!(
            with_output_extension(Path::new("a.xml"), "presentation.xml"),
            PathBuf::from("a.presentation.xml")
        );
        assert_eq!(
            with_output_extension(Path::new("a.adoc"), "html"),
            PathBuf::from("a.adoc.html")
        );
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("./a/b.xml")), "a/b.xml");
    }
}
