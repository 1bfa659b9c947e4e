//! Definition lookup for instance elements
//!
//! The same indexed name can belong to several definitions (a local element
//! declared under different parents). An instance element is matched by
//! walking its ancestry against the declared parents of each candidate.

use super::definition::{DefId, DefinitionKind};
use super::schema::ResolvedSchema;

/// Expanded name of one instance element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceName {
    /// Namespace URI (None = no namespace)
    pub namespace_uri: Option<String>,
    /// Local name
    pub local_name: String,
}

impl InstanceName {
    /// Create an instance name
    pub fn new(namespace_uri: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: namespace_uri.map(Into::into),
            local_name: local_name.into(),
        }
    }

    /// Element in no namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: None,
            local_name: local_name.into(),
        }
    }

    /// Ancestry of `node`: the node itself, its parent, and so on up to the
    /// document element
    pub fn ancestry(node: roxmltree::Node<'_, '_>) -> Vec<InstanceName> {
        node.ancestors()
            .filter(|n| n.is_element())
            .map(|n| {
                let tag = n.tag_name();
                InstanceName::new(tag.namespace(), tag.name())
            })
            .collect()
    }
}

/// Outcome of an instance lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceDefinition {
    /// The declaration the element is an instance of
    Declared(DefId),
    /// No declaration matches; the element is unknown to the schema
    Unspecified,
}

impl InstanceDefinition {
    /// The matched definition, if any
    pub fn id(self) -> Option<DefId> {
        match self {
            InstanceDefinition::Declared(id) => Some(id),
            InstanceDefinition::Unspecified => None,
        }
    }
}

impl ResolvedSchema {
    /// Definition of the element whose ancestry is
    /// `[self, parent, ..., document element]`
    pub fn definition_for_instance(&self, ancestry: &[InstanceName]) -> InstanceDefinition {
        let Some(first) = ancestry.first() else {
            return InstanceDefinition::Unspecified;
        };

        self.candidates(first)
            .into_iter()
            .find(|&candidate| self.matches_ancestry(candidate, ancestry))
            .map_or(InstanceDefinition::Unspecified, InstanceDefinition::Declared)
    }

    /// Definition of a `roxmltree` element
    pub fn definition_for_node(&self, node: roxmltree::Node<'_, '_>) -> InstanceDefinition {
        self.definition_for_instance(&InstanceName::ancestry(node))
    }

    fn candidates(&self, name: &InstanceName) -> Vec<DefId> {
        let uri = name.namespace_uri.as_deref().unwrap_or("");
        let Some(indexed) = self.indexed_name(uri, &name.local_name) else {
            return Vec::new();
        };
        self.definitions_named(&indexed)
            .iter()
            .copied()
            .filter(|&id| self[id].kind == DefinitionKind::Element)
            .collect()
    }

    fn names_match(&self, id: DefId, name: &InstanceName) -> bool {
        let def = &self[id];
        let uri = def
            .namespace
            .and_then(|ns| self.namespaces().get(ns))
            .map(|b| b.uri.as_str())
            .unwrap_or("");
        def.name.as_deref() == Some(name.local_name.as_str())
            && uri == name.namespace_uri.as_deref().unwrap_or("")
    }

    /// `ancestry[0]` is known to match `id`; check the rest against parents
    fn matches_ancestry(&self, id: DefId, ancestry: &[InstanceName]) -> bool {
        let rest = &ancestry[1..];
        self.parents(id).iter().any(|parent| match (parent, rest.first()) {
            (None, None) => true,
            (Some(parent), Some(name)) => {
                self.names_match(*parent, name) && self.matches_ancestry(*parent, rest)
            }
            _ => false,
        })
    }
}
