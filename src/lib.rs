//! # xsd-model
//!
//! Resolves a set of XML Schema documents into a descriptive definition graph:
//! which elements may appear where, which attributes they carry and how often
//! each child may occur.
//!
//! Documents are loaded starting from one location, following `import`,
//! `include` and `redefine`. Element and type references are resolved across
//! the whole set; a declaration used from several places is a single shared
//! definition, and recursive content models become cycles in the graph.
//!
//! ## Features
//!
//! - Multi-document loading with chameleon includes
//! - Stable namespace indices and preferred prefixes for the whole run
//! - Cycle-tolerant resolution of `ref`, `type`, `base`, `substitutionGroup`
//!   and group references
//! - Occurrence and choice bookkeeping for editors
//! - Definition lookup for elements of an instance document
//! - JSON encoding that preserves shared definitions and cycles
//! - Protection against oversized or deeply nested inputs
//!
//! ## Example
//!
//! ```rust,ignore
//! use xsd_model::{ResolveOptions, SchemaManager};
//!
//! let manager = SchemaManager::new(ResolveOptions::new().with_root_element("book"));
//! let schema = manager.resolve("schemas/books.xsd")?;
//!
//! let json = schema.to_json()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading
pub mod loaders;
pub mod documents;

// Definition graph
pub mod model;

// Re-exports for convenience
pub use error::{Error, Result};
pub use model::{
    DefId, Definition, DefinitionKind, InstanceDefinition, InstanceName, Occurs, ResolveOptions,
    ResolvedSchema, SchemaManager,
};
pub use namespaces::{IndexedName, NamespaceBinding};

/// Version of the xsd-model library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_namespaces() {
        assert_eq!(XSD_NAMESPACE, "http://www.w3.org/2001/XMLSchema");
        assert_eq!(XML_NAMESPACE, "http://www.w3.org/XML/1998/namespace");
    }
}
