//! Resource location resolution
//!
//! Schema documents are addressed by file path or URL. `import` and `include`
//! locations are resolved relative to the document that names them.

use crate::error::Result;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Resource location - a file path or a URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, or any other non-file scheme)
    Url(Url),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn parse(s: &str) -> Result<Self> {
        match absolute_url(s) {
            Some(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Ok(Location::Path(normalize_path(&path))),
                Err(()) => Ok(Location::Url(url)),
            },
            Some(url) => Ok(Location::Url(url)),
            None => Ok(Location::Path(normalize_path(Path::new(s)))),
        }
    }

    /// Resolve `href` relative to the document at this location
    pub fn resolve(&self, href: &str) -> Result<Self> {
        if absolute_url(href).is_some() || Path::new(href).is_absolute() {
            return Self::parse(href);
        }

        match self {
            Location::Path(path) => {
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(normalize_path(&base.join(href))))
            }
            Location::Url(url) => Ok(Location::Url(url.join(href)?)),
        }
    }

    /// Resolve `href` relative to this location taken as a directory
    pub fn resolve_in_directory(&self, href: &str) -> Result<Self> {
        if absolute_url(href).is_some() || Path::new(href).is_absolute() {
            return Self::parse(href);
        }

        match self {
            Location::Path(dir) => Ok(Location::Path(normalize_path(&dir.join(href)))),
            Location::Url(url) => {
                let mut dir = url.clone();
                if !dir.path().ends_with('/') {
                    let path = format!("{}/", dir.path());
                    dir.set_path(&path);
                }
                Ok(Location::Url(dir.join(href)?))
            }
        }
    }

    /// Stable identity of the location, used to detect repeated loads
    ///
    /// Existing files are canonicalized so that different relative spellings
    /// of one file compare equal.
    pub fn key(&self) -> String {
        match self {
            Location::Path(p) => p
                .canonicalize()
                .unwrap_or_else(|_| p.clone())
                .to_string_lossy()
                .to_string(),
            Location::Url(u) => u.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => write!(f, "{}", p.display()),
            Location::Url(u) => write!(f, "{}", u),
        }
    }
}

/// Parse `s` as an absolute URL, ignoring single-letter schemes (drive letters)
fn absolute_url(s: &str) -> Option<Url> {
    Url::parse(s).ok().filter(|u| u.scheme().len() > 1)
}

/// Lexically remove `.` and `..` components
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc = Location::parse("http://example.com/schema.xsd").unwrap();
        assert!(matches!(loc, Location::Url(_)));
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::parse("/tmp/schema.xsd").unwrap();
        assert!(matches!(loc, Location::Path(_)));
    }

    #[test]
    fn test_file_url_becomes_path() {
        let loc = Location::parse("file:///tmp/schemas/a.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/tmp/schemas/a.xsd")));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = Location::parse("/schemas/mods/mods.xsd").unwrap();
        let resolved = base.resolve("../xlink/xlink.xsd").unwrap();
        assert_eq!(resolved, Location::Path(PathBuf::from("/schemas/xlink/xlink.xsd")));

        let sibling = base.resolve("./types.xsd").unwrap();
        assert_eq!(sibling, Location::Path(PathBuf::from("/schemas/mods/types.xsd")));
    }

    #[test]
    fn test_resolve_relative_url() {
        let base = Location::parse("http://example.com/schemas/mods.xsd").unwrap();
        let resolved = base.resolve("xlink.xsd").unwrap();
        assert_eq!(resolved.to_string(), "http://example.com/schemas/xlink.xsd");
    }

    #[test]
    fn test_resolve_absolute_href_ignores_base() {
        let base = Location::parse("/schemas/mods.xsd").unwrap();
        let resolved = base.resolve("http://www.w3.org/2001/xml.xsd").unwrap();
        assert!(matches!(resolved, Location::Url(_)));
    }

    #[test]
    fn test_resolve_in_directory() {
        let dir = Location::parse("http://example.com/schemas").unwrap();
        let resolved = dir.resolve_in_directory("mods.xsd").unwrap();
        assert_eq!(resolved.to_string(), "http://example.com/schemas/mods.xsd");

        let dir = Location::parse("/srv/schemas").unwrap();
        let resolved = dir.resolve_in_directory("mods.xsd").unwrap();
        assert_eq!(resolved, Location::Path(PathBuf::from("/srv/schemas/mods.xsd")));
    }
}
