//! Resource loading utilities
//!
//! This module retrieves schema documents from the file system or from a map
//! of preloaded sources keyed by location.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::collections::HashMap;
use std::fs;
use tracing::trace;

/// Resource loader for schema documents
#[derive(Debug, Clone)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
    /// Whether to allow remote resources
    allow_remote: bool,
    /// Documents served without touching the file system or network
    sources: HashMap<String, String>,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            allow_remote: true,
            sources: HashMap::new(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set whether to allow remote resources
    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    /// Serve `text` whenever `location` is requested
    pub fn with_source(mut self, location: &Location, text: impl Into<String>) -> Self {
        self.sources.insert(location.to_string(), text.into());
        self
    }

    /// Register a preloaded document
    pub fn add_source(&mut self, location: &Location, text: impl Into<String>) {
        self.sources.insert(location.to_string(), text.into());
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        if let Some(text) = self.sources.get(&location.to_string()) {
            trace!(%location, "serving preloaded schema source");
            self.limits.check_xml_size(text.len())?;
            return Ok(text.clone());
        }

        match location {
            Location::Path(path) => {
                let content = fs::read_to_string(path)
                    .map_err(|e| Error::retrieval(path.display().to_string(), e))?;

                // Check size limits
                self.limits.check_xml_size(content.len())?;

                Ok(content)
            }
            Location::Url(url) => {
                if !self.allow_remote {
                    return Err(Error::retrieval(
                        url.as_str(),
                        "remote resources are not allowed",
                    ));
                }

                Err(Error::retrieval(
                    url.as_str(),
                    format!("no retriever for scheme '{}'", url.scheme()),
                ))
            }
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<xs:schema/>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new();
        let content = loader.load(&location).unwrap();

        assert!(content.contains("<xs:schema/>"));
    }

    #[test]
    fn test_load_preloaded_source() {
        let location = Location::parse("http://example.com/a.xsd").unwrap();
        let loader = Loader::new().with_source(&location, "<xs:schema/>");
        assert_eq!(loader.load(&location).unwrap(), "<xs:schema/>");
    }

    #[test]
    fn test_missing_file_is_retrieval_error() {
        let location = Location::parse("/definitely/not/here.xsd").unwrap();
        let err = Loader::new().load(&location).unwrap_err();
        match err {
            Error::Retrieval { location, .. } => assert!(location.contains("here.xsd")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_remote_disallowed() {
        let location = Location::parse("http://example.com/a.xsd").unwrap();
        let loader = Loader::new().with_allow_remote(false);
        assert!(matches!(loader.load(&location), Err(Error::Retrieval { .. })));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(11 * 1024 * 1024); // 11 MB
        write!(file, "{}", large_content).unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new().with_limits(Limits::strict());
        let result = loader.load(&location);

        // Strict limits (10 MB max) should reject 11MB file
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }
}
