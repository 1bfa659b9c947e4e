//! Resource limits for a resolution run
//!
//! Schema sets are fetched from arbitrary locations, so every run carries
//! bounds on how much it will read and allocate.

use crate::error::{Error, Result};

/// Limits applied while loading and resolving a schema set
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum element nesting depth inside one schema document
    pub max_xml_depth: usize,

    /// Maximum size of one schema document in bytes
    pub max_xml_size: usize,

    /// Maximum number of schema documents loaded in one run
    pub max_documents: usize,

    /// Maximum number of registered namespaces
    pub max_namespaces: usize,

    /// Maximum number of definitions in the graph
    pub max_definitions: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 1000,
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_documents: 1000,
            max_namespaces: 1000,
            max_definitions: 1_000_000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_depth: 100,
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_documents: 50,
            max_namespaces: 100,
            max_definitions: 50_000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_depth: 10000,
            max_xml_size: 1024 * 1024 * 1024, // 1 GB
            max_documents: 100_000,
            max_namespaces: 10000,
            max_definitions: 100_000_000,
        }
    }

    /// Check if XML depth is within limits
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_xml_depth {
            Err(Error::LimitExceeded(format!(
                "XML depth {} exceeds maximum {}",
                depth, self.max_xml_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if XML size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of loaded documents is within limits
    pub fn check_documents(&self, count: usize) -> Result<()> {
        if count > self.max_documents {
            Err(Error::LimitExceeded(format!(
                "Document count {} exceeds maximum {}",
                count, self.max_documents
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of namespaces is within limits
    pub fn check_namespaces(&self, count: usize) -> Result<()> {
        if count > self.max_namespaces {
            Err(Error::LimitExceeded(format!(
                "Namespace count {} exceeds maximum {}",
                count, self.max_namespaces
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of definitions is within limits
    pub fn check_definitions(&self, count: usize) -> Result<()> {
        if count > self.max_definitions {
            Err(Error::LimitExceeded(format!(
                "Definition count {} exceeds maximum {}",
                count, self.max_definitions
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_xml_depth, 1000);
        assert!(limits.check_xml_depth(500).is_ok());
        assert!(limits.check_xml_depth(1500).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_documents < Limits::default().max_documents);
        assert!(limits.check_documents(51).is_err());
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_xml_depth > Limits::default().max_xml_depth);
        assert!(limits.check_definitions(5_000_000).is_ok());
    }

    #[test]
    fn test_check_xml_size() {
        let limits = Limits::default();
        assert!(limits.check_xml_size(1024).is_ok());
        assert!(limits.check_xml_size(200 * 1024 * 1024).is_err());
    }
}
