//! Definition nodes and the arena that owns them
//!
//! Every definition lives in a [`DefinitionArena`] and is addressed by a
//! [`DefId`]. Children and attributes are handles, so a type that contains
//! itself is simply a handle cycle.

use crate::namespaces::IndexedName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Handle of a definition inside a [`DefinitionArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub(crate) u32);

impl DefId {
    /// Position of the definition in its arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a definition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// An element declaration
    Element,
    /// An attribute declaration
    Attribute,
    /// Top of the graph
    SchemaRoot,
    /// Named type, model group or attribute group; merged away during resolution
    Type,
}

/// XSD symbol spaces; a name may be declared once in each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolSpace {
    /// Global elements
    Element,
    /// Global attributes
    Attribute,
    /// Simple and complex types
    Type,
    /// Named model groups
    Group,
    /// Named attribute groups
    AttributeGroup,
}

impl fmt::Display for SymbolSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolSpace::Element => "element",
            SymbolSpace::Attribute => "attribute",
            SymbolSpace::Type => "type",
            SymbolSpace::Group => "group",
            SymbolSpace::AttributeGroup => "attributeGroup",
        };
        f.write_str(s)
    }
}

/// How a resolved reference is folded into the referencing definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOrder {
    /// Type derivation: the base's entries come first
    BaseFirst,
    /// Group inlining: the referencing definition's entries come first
    InPlace,
}

/// A deferred reference to a named declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Symbol space the name lives in
    pub space: SymbolSpace,
    /// Referenced name
    pub name: IndexedName,
    /// How the referenced content is merged
    pub order: MergeOrder,
    /// Content-model position of a model group reference
    pub scope: Option<ModelScope>,
}

/// Position inside a content model
///
/// Elements declared under a scope get their bounds multiplied by `occurs`
/// and join every open choice as members of the given alternative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelScope {
    /// Product of the bounds of the enclosing particles
    pub occurs: Occurs,
    /// Open choice groups as (index into `choices`, alternative)
    pub choices: Vec<(usize, usize)>,
}

impl ModelScope {
    /// Scope of a particle with bounds `occurs` nested in this one
    pub fn nested(&self, occurs: Occurs) -> Self {
        Self {
            occurs: occurs.within(self.occurs),
            choices: self.choices.clone(),
        }
    }
}

/// Occurrence bounds of a child within its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurs {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences (None = unbounded)
    #[serde(with = "max_occurs")]
    pub max: Option<u32>,
}

impl Occurs {
    /// Create occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// The XSD default, exactly once
    pub fn once() -> Self {
        Self::new(1, Some(1))
    }

    /// Scale by the bounds of an enclosing group
    pub fn within(self, outer: Occurs) -> Occurs {
        Occurs {
            min: self.min.saturating_mul(outer.min),
            max: match (self.max, outer.max) {
                (Some(a), Some(b)) => Some(a.saturating_mul(b)),
                _ => None,
            },
        }
    }

    /// Combine the bounds of two declarations of the same name in one model
    pub fn plus(self, other: Occurs) -> Occurs {
        Occurs {
            min: self.min.saturating_add(other.min),
            max: match (self.max, other.max) {
                (Some(a), Some(b)) => Some(a.saturating_add(b)),
                _ => None,
            },
        }
    }

    /// Whether `count` occurrences reach the maximum
    pub fn is_full(&self, count: usize) -> bool {
        self.max.is_some_and(|max| count >= max as usize)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// `maxOccurs` is written as a number or `"unbounded"`
mod max_occurs {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(max: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match max {
            Some(n) => serializer.serialize_u32(*n),
            None => serializer.serialize_str("unbounded"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        struct MaxVisitor;

        impl<'de> Visitor<'de> for MaxVisitor {
            type Value = Option<u32>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or \"unbounded\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                u32::try_from(v).map(Some).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u32::try_from(v).map(Some).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v == "unbounded" {
                    Ok(None)
                } else {
                    v.parse::<u32>().map(Some).map_err(E::custom)
                }
            }
        }

        deserializer.deserialize_any(MaxVisitor)
    }
}

/// Collective cardinality of a set of mutually exclusive children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceGroup {
    /// Indexed names of the member elements
    #[serde(rename = "elements")]
    pub members: Vec<IndexedName>,
    /// Alternative each member belongs to, parallel to `members`
    ///
    /// Members of one `sequence` alternative share a number. When absent
    /// every member is an alternative of its own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<usize>,
    /// Minimum selections
    pub min: u32,
    /// Maximum selections (None = unbounded)
    #[serde(with = "max_occurs")]
    pub max: Option<u32>,
}

impl ChoiceGroup {
    /// Create an empty choice with the given bounds
    pub fn new(occurs: Occurs) -> Self {
        Self {
            members: Vec::new(),
            branches: Vec::new(),
            min: occurs.min,
            max: occurs.max,
        }
    }

    /// The same choice nested in a particle with bounds `outer`
    pub fn scaled(&self, outer: Occurs) -> Self {
        let occurs = Occurs::new(self.min, self.max).within(outer);
        Self {
            min: occurs.min,
            max: occurs.max,
            ..self.clone()
        }
    }

    /// Whether `name` is a member
    pub fn contains(&self, name: &IndexedName) -> bool {
        self.members.contains(name)
    }

    /// Add `name` as a member of alternative `branch`
    pub fn add_member(&mut self, name: IndexedName, branch: usize) {
        if !self.contains(&name) {
            self.members.push(name);
            self.branches.push(branch);
        }
    }

    /// Alternative `name` belongs to
    pub fn branch_of(&self, name: &IndexedName) -> Option<usize> {
        let position = self.members.iter().position(|m| m == name)?;
        Some(self.branch_at(position))
    }

    /// Distinct alternatives with at least one member present
    pub fn selected_branches<F>(&self, counts: F) -> Vec<usize>
    where
        F: Fn(&IndexedName) -> usize,
    {
        let mut selected = Vec::new();
        for (position, member) in self.members.iter().enumerate() {
            let branch = self.branch_at(position);
            if counts(member) > 0 && !selected.contains(&branch) {
                selected.push(branch);
            }
        }
        selected
    }

    fn branch_at(&self, position: usize) -> usize {
        self.branches.get(position).copied().unwrap_or(position)
    }
}

/// One node of the definition graph
#[derive(Debug, Clone)]
pub struct Definition {
    /// Variant tag
    pub kind: DefinitionKind,
    /// Local name (absent on the schema root and anonymous types)
    pub name: Option<String>,
    /// Namespace index
    pub namespace: Option<usize>,
    /// Legal child elements
    pub children: Vec<DefId>,
    /// Legal attributes
    pub attributes: Vec<DefId>,
    /// Enumerated values
    pub values: Vec<String>,
    /// Built-in XSD type of the text content
    pub primitive_type: Option<String>,
    /// Attribute default or fixed value
    pub default_value: Option<String>,
    /// Content model contains a wildcard
    pub any: bool,
    /// Value is a whitespace-separated list
    pub multivalued: bool,
    /// Text may appear between children
    pub mixed: bool,
    /// Child occurrence bounds, keyed by the child's indexed name
    pub occurs: IndexMap<IndexedName, Occurs>,
    /// Choice groups among the children
    pub choices: Vec<ChoiceGroup>,

    // Transitional state, empty once resolution completes
    pub(crate) pending_ref: Option<TypeRef>,
    pub(crate) pending_type_refs: Vec<TypeRef>,
    pub(crate) unprocessed: bool,
    pub(crate) alias: Option<DefId>,
    pub(crate) origin: Option<usize>,
}

impl Definition {
    /// Create an empty definition of `kind`
    pub fn new(kind: DefinitionKind) -> Self {
        Self {
            kind,
            name: None,
            namespace: None,
            children: Vec::new(),
            attributes: Vec::new(),
            values: Vec::new(),
            primitive_type: None,
            default_value: None,
            any: false,
            multivalued: false,
            mixed: false,
            occurs: IndexMap::new(),
            choices: Vec::new(),
            pending_ref: None,
            pending_type_refs: Vec::new(),
            unprocessed: true,
            alias: None,
            origin: None,
        }
    }

    /// Create a named definition
    pub fn named(kind: DefinitionKind, name: &IndexedName) -> Self {
        let mut def = Self::new(kind);
        def.name = Some(name.local_name.clone());
        def.namespace = Some(name.namespace);
        def
    }

    /// Identity key, if the definition is named
    pub fn indexed_name(&self) -> Option<IndexedName> {
        match (&self.name, self.namespace) {
            (Some(name), Some(ns)) => Some(IndexedName::new(ns, name.clone())),
            _ => None,
        }
    }

    /// Whether the definition carries content beyond its name
    pub fn has_content(&self) -> bool {
        !self.children.is_empty()
            || !self.attributes.is_empty()
            || !self.values.is_empty()
            || self.primitive_type.is_some()
            || self.default_value.is_some()
            || self.any
            || self.multivalued
            || self.mixed
            || !self.occurs.is_empty()
            || !self.choices.is_empty()
            || !self.pending_type_refs.is_empty()
    }

    /// Whether any deferred reference remains
    pub fn is_pending(&self) -> bool {
        self.pending_ref.is_some() || !self.pending_type_refs.is_empty()
    }

    /// Record the bounds of a child under this definition
    pub(crate) fn add_occurs(&mut self, child: IndexedName, occurs: Occurs) {
        self.occurs
            .entry(child)
            .and_modify(|existing| *existing = existing.plus(occurs))
            .or_insert(occurs);
    }
}

/// Owner of every definition created during one resolution run
#[derive(Debug, Clone, Default)]
pub struct DefinitionArena {
    nodes: Vec<Definition>,
}

impl DefinitionArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition and return its handle
    pub fn alloc(&mut self, def: Definition) -> DefId {
        let id = DefId(self.nodes.len() as u32);
        self.nodes.push(def);
        id
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a definition
    pub fn get(&self, id: DefId) -> Option<&Definition> {
        self.nodes.get(id.index())
    }

    /// Follow alias forwarding to the definition that stands for `id`
    pub fn canonical(&self, mut id: DefId) -> DefId {
        // Alias chains are acyclic: an alias always points at a declaration
        // that was looked up by name, never back at a reference stub.
        let mut hops = 0;
        while let Some(target) = self[id].alias {
            id = target;
            hops += 1;
            if hops > self.nodes.len() {
                break;
            }
        }
        id
    }

    /// Iterate over all handles
    pub fn ids(&self) -> impl Iterator<Item = DefId> {
        (0..self.nodes.len() as u32).map(DefId)
    }
}

impl Index<DefId> for DefinitionArena {
    type Output = Definition;

    fn index(&self, id: DefId) -> &Definition {
        &self.nodes[id.index()]
    }
}

impl IndexMut<DefId> for DefinitionArena {
    fn index_mut(&mut self, id: DefId) -> &mut Definition {
        &mut self.nodes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_within_group() {
        let child = Occurs::new(1, Some(2));
        let optional_seq = Occurs::new(0, Some(3));
        assert_eq!(child.within(optional_seq), Occurs::new(0, Some(6)));
        assert_eq!(child.within(Occurs::new(1, None)), Occurs::new(1, None));
    }

    #[test]
    fn test_add_occurs_sums_repeated_names() {
        let mut def = Definition::new(DefinitionKind::Type);
        let name = IndexedName::new(0, "p");
        def.add_occurs(name.clone(), Occurs::once());
        def.add_occurs(name.clone(), Occurs::new(0, None));
        assert_eq!(def.occurs[&name], Occurs::new(1, None));
    }

    #[test]
    fn test_occurs_serde() {
        let json = serde_json::to_string(&Occurs::new(0, None)).unwrap();
        assert_eq!(json, r#"{"min":0,"max":"unbounded"}"#);
        let back: Occurs = serde_json::from_str(r#"{"min":1,"max":4}"#).unwrap();
        assert_eq!(back, Occurs::new(1, Some(4)));
    }

    #[test]
    fn test_is_full() {
        assert!(Occurs::once().is_full(1));
        assert!(!Occurs::new(0, None).is_full(1000));
    }

    #[test]
    fn test_choice_counts_selections_per_alternative() {
        let name = |local: &str| IndexedName::new(1, local);
        let mut choice = ChoiceGroup::new(Occurs::once());
        choice.add_member(name("a"), 0);
        choice.add_member(name("b"), 0);
        choice.add_member(name("c"), 1);
        choice.add_member(name("a"), 1);

        assert_eq!(choice.members.len(), 3);
        assert_eq!(choice.branch_of(&name("a")), Some(0));
        assert_eq!(choice.branch_of(&name("c")), Some(1));

        let both_of_first = |n: &IndexedName| usize::from(n.local_name != "c");
        assert_eq!(choice.selected_branches(both_of_first), vec![0]);
    }

    #[test]
    fn test_canonical_follows_aliases() {
        let mut arena = DefinitionArena::new();
        let target = arena.alloc(Definition::new(DefinitionKind::Element));
        let stub = arena.alloc(Definition::new(DefinitionKind::Element));
        arena[stub].alias = Some(target);
        assert_eq!(arena.canonical(stub), target);
        assert_eq!(arena.canonical(target), target);
    }
}
