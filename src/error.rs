//! Error types for xsd-model
//!
//! Only two conditions abort a resolution run: a schema document that cannot be
//! retrieved and a reference that names no loaded declaration. Everything else
//! the builder does not understand is skipped, and instance lookups that find
//! no declaration degrade instead of failing.

use std::fmt;
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for schema resolution
#[derive(Error, Debug)]
pub enum Error {
    /// A schema document could not be fetched
    #[error("cannot retrieve schema '{location}': {reason}")]
    Retrieval {
        /// Location that failed
        location: String,
        /// Underlying cause
        reason: String,
    },

    /// A `ref`, `type`, `base`, `substitutionGroup` or group reference names
    /// a declaration absent from every loaded document
    #[error("unresolved reference '{name}' in '{location}'")]
    Unresolved {
        /// The reference as written, qualified by its namespace
        name: String,
        /// Location of the referencing document
        location: String,
    },

    /// Schema document structure error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Encoded graph is structurally invalid
    #[error("decode error: {0}")]
    Decode(String),

    /// Worker thread failed before producing a graph
    #[error("worker error: {0}")]
    Worker(String),
}

impl Error {
    /// Build a retrieval error for `location`
    pub fn retrieval(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Retrieval {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is one of the fatal resolution conditions
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Error::Retrieval { .. } | Error::Unresolved { .. })
    }
}

/// Schema document parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location of the schema document
    pub location: Option<String>,
    /// Schema source that caused the error
    pub source: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        if let Some(ref src) = self.source {
            write!(f, "\n\nSource:\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Expected xs:schema root element, got html")
            .with_location("schemas/book.xsd")
            .with_source("<html/>");

        let msg = format!("{}", err);
        assert!(msg.contains("Expected xs:schema root element"));
        assert!(msg.contains("Location: schemas/book.xsd"));
        assert!(msg.contains("Source:"));
    }

    #[test]
    fn test_retrieval_error_names_location() {
        let err = Error::retrieval("/tmp/missing.xsd", "No such file or directory");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.xsd"));
        assert!(err.is_resolution_failure());
    }

    #[test]
    fn test_unresolved_error_display() {
        let err = Error::Unresolved {
            name: "{urn:books}chapterType".to_string(),
            location: "book.xsd".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unresolved reference '{urn:books}chapterType' in 'book.xsd'"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ParseError::new("test").into();
        assert!(matches!(err, Error::Parse(_)));
        assert!(!err.is_resolution_failure());
    }
}
