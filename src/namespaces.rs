//! XML namespace handling
//!
//! This module provides qualified names, per-document prefix mappings and the
//! run-wide namespace registry that gives every namespace URI a stable index.

use crate::error::{Error, Result};
use crate::XML_NAMESPACE;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI, in declaration order
    prefixes: IndexMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self {
            prefixes: IndexMap::new(),
            default_namespace: None,
        }
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Iterate over prefixed declarations in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, n)| (p.as_str(), n.as_str()))
    }

    /// Whether no prefix and no default namespace is declared
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Layer `inner` declarations over this context
    pub fn extended(&self, inner: &NamespaceContext) -> NamespaceContext {
        let mut merged = self.clone();
        for (prefix, namespace) in inner.iter() {
            merged.add_prefix(prefix, namespace);
        }
        if let Some(ns) = inner.get_default_namespace() {
            merged.set_default_namespace(ns);
        }
        merged
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespace-index-qualified identity key of a declaration
///
/// Displayed and serialized as `"{namespace}:{local_name}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexedName {
    /// Index into the run's [`NamespaceRegistry`]
    pub namespace: usize,
    /// Local name
    pub local_name: String,
}

impl IndexedName {
    /// Create a new indexed name
    pub fn new(namespace: usize, local_name: impl Into<String>) -> Self {
        Self {
            namespace,
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for IndexedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.local_name)
    }
}

impl FromStr for IndexedName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (index, local) = s
            .split_once(':')
            .ok_or_else(|| Error::Name(format!("Invalid indexed name: '{}'", s)))?;
        let namespace = index
            .parse::<usize>()
            .map_err(|_| Error::Name(format!("Invalid namespace index in '{}'", s)))?;
        Ok(IndexedName::new(namespace, local))
    }
}

impl Serialize for IndexedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IndexedName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One row of the exported namespace table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceBinding {
    /// Preferred prefix ("" only for no namespace)
    pub prefix: Prefix,
    /// Namespace URI ("" for no namespace)
    pub uri: NamespaceUri,
}

/// Ordered list of the namespace URIs seen during one resolution run
///
/// The same URI always maps to the same index, regardless of which document
/// introduced it or which prefix that document bound it to.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    entries: Vec<NamespaceBinding>,
    by_uri: HashMap<NamespaceUri, usize>,
}

impl NamespaceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `uri`, returning its stable index
    ///
    /// The first prefix offered for a URI becomes its preferred prefix; a
    /// prefix already held by another URI is replaced by `ns{index}`. The
    /// empty prefix belongs to the no-namespace entry alone, so a default
    /// namespace declaration also falls back to `ns{index}`.
    pub fn register(&mut self, uri: &str, prefix: Option<&str>) -> usize {
        if let Some(&index) = self.by_uri.get(uri) {
            return index;
        }

        let index = self.entries.len();
        let prefix = if uri.is_empty() {
            String::new()
        } else if uri == XML_NAMESPACE {
            "xml".to_string()
        } else {
            match prefix {
                Some(p) if !p.is_empty() && !self.prefix_taken(p) => p.to_string(),
                _ => format!("ns{}", index),
            }
        };

        self.entries.push(NamespaceBinding {
            prefix,
            uri: uri.to_string(),
        });
        self.by_uri.insert(uri.to_string(), index);
        index
    }

    fn prefix_taken(&self, prefix: &str) -> bool {
        self.entries
            .iter()
            .any(|b| !b.uri.is_empty() && b.prefix == prefix)
    }

    /// Index of a registered URI
    pub fn index_of(&self, uri: &str) -> Option<usize> {
        self.by_uri.get(uri).copied()
    }

    /// Index of the namespace whose preferred prefix is `prefix`
    pub fn index_of_prefix(&self, prefix: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|b| !b.uri.is_empty() && b.prefix == prefix)
    }

    /// URI at `index`
    pub fn uri(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|b| b.uri.as_str())
    }

    /// Preferred prefix at `index`
    pub fn prefix(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|b| b.prefix.as_str())
    }

    /// Number of registered namespaces
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export the table; position in the table is the namespace index
    pub fn table(&self) -> Vec<NamespaceBinding> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_qname_to_string() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", "http://www.w3.org/2001/XMLSchema");

        let qname = ctx.resolve("xs:element").unwrap();
        assert_eq!(
            qname.namespace,
            Some("http://www.w3.org/2001/XMLSchema".to_string())
        );
        assert_eq!(qname.local_name, "element");
        assert!(ctx.resolve("nope:element").is_err());
    }

    #[test]
    fn test_resolve_uses_default_namespace() {
        let mut ctx = NamespaceContext::new();
        assert_eq!(ctx.resolve("title").unwrap().namespace, None);

        ctx.set_default_namespace("urn:books");
        assert_eq!(
            ctx.resolve("title").unwrap().namespace.as_deref(),
            Some("urn:books")
        );
    }

    #[test]
    fn test_xml_prefix_is_predeclared() {
        let ctx = NamespaceContext::new();
        assert_eq!(ctx.resolve("xml:lang").unwrap().namespace.as_deref(), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_extended_context_shadows_outer() {
        let mut outer = NamespaceContext::new();
        outer.add_prefix("b", "urn:outer");
        let mut inner = NamespaceContext::new();
        inner.add_prefix("b", "urn:inner");

        let merged = outer.extended(&inner);
        assert_eq!(merged.get_namespace("b"), Some("urn:inner"));
    }

    #[test]
    fn test_indexed_name_display_and_parse() {
        let name = IndexedName::new(3, "title");
        assert_eq!(name.to_string(), "3:title");
        assert_eq!("3:title".parse::<IndexedName>().unwrap(), name);
        assert!("title".parse::<IndexedName>().is_err());
        assert!("x:title".parse::<IndexedName>().is_err());
    }

    #[test]
    fn test_registry_prefix_collision() {
        let mut registry = NamespaceRegistry::new();
        let a = registry.register("urn:a", Some("p"));
        let b = registry.register("urn:b", Some("p"));
        assert_eq!(registry.prefix(a), Some("p"));
        assert_eq!(registry.prefix(b), Some("ns1"));
    }

    #[test]
    fn test_registry_empty_uri_and_xml() {
        let mut registry = NamespaceRegistry::new();
        let none = registry.register("", None);
        let xml = registry.register(XML_NAMESPACE, Some("whatever"));
        assert_eq!(registry.prefix(none), Some(""));
        assert_eq!(registry.prefix(xml), Some("xml"));
    }

    #[test]
    fn test_default_namespace_never_takes_empty_prefix() {
        let mut registry = NamespaceRegistry::new();
        let default = registry.register("urn:a", Some(""));
        let none = registry.register("", Some(""));
        assert_eq!(registry.prefix(default), Some("ns0"));
        assert_eq!(registry.prefix(none), Some(""));

        let empty: Vec<_> = registry.table().into_iter().filter(|b| b.prefix.is_empty()).collect();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].uri, "");
        assert_eq!(registry.index_of_prefix("ns0"), Some(default));
    }

    proptest! {
        #[test]
        fn registry_index_is_stable(uris in proptest::collection::vec("[a-d]", 1..40)) {
            let mut registry = NamespaceRegistry::new();
            let mut first_seen: HashMap<String, usize> = HashMap::new();
            for (i, uri) in uris.iter().enumerate() {
                let prefix = format!("p{}", i % 3);
                let index = registry.register(uri, Some(&prefix));
                let expected = *first_seen.entry(uri.clone()).or_insert(index);
                prop_assert_eq!(index, expected);
                prop_assert_eq!(registry.uri(index), Some(uri.as_str()));
            }
            prop_assert_eq!(registry.len(), first_seen.len());
        }
    }
}
