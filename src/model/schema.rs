//! The finished definition graph
//!
//! A [`ResolvedSchema`] holds only the definitions reachable from its root,
//! numbered in preorder, together with the namespace table of the run. It
//! is immutable; every query takes `&self`.

use std::collections::HashMap;
use std::ops::Index;

use super::definition::{DefId, Definition, DefinitionArena, DefinitionKind};
use crate::namespaces::{IndexedName, NamespaceBinding};

/// Result of a resolution run
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    graph: DefinitionArena,
    root: DefId,
    namespaces: Vec<NamespaceBinding>,
    /// Declared parents of every definition; `None` stands for the document root
    parents: Vec<Vec<Option<DefId>>>,
    by_name: HashMap<IndexedName, Vec<DefId>>,
    documents: Vec<String>,
}

impl ResolvedSchema {
    /// Copy the definitions listed in `order` into a compact graph
    ///
    /// `order[0]` becomes the root. Handles to definitions outside `order`
    /// are dropped.
    pub(crate) fn from_graph(
        source: &DefinitionArena,
        order: &[DefId],
        namespaces: Vec<NamespaceBinding>,
    ) -> Self {
        let remap: HashMap<DefId, DefId> = order
            .iter()
            .enumerate()
            .map(|(position, &old)| (old, DefId(position as u32)))
            .collect();
        let translate = |handles: &[DefId]| -> Vec<DefId> {
            handles.iter().filter_map(|id| remap.get(id).copied()).collect()
        };

        let mut graph = DefinitionArena::new();
        for &old in order {
            let def = &source[old];
            let mut copy = Definition::new(def.kind);
            copy.name = def.name.clone();
            copy.namespace = def.namespace;
            copy.children = translate(&def.children);
            copy.attributes = translate(&def.attributes);
            copy.values = def.values.clone();
            copy.primitive_type = def.primitive_type.clone();
            copy.default_value = def.default_value.clone();
            copy.any = def.any;
            copy.multivalued = def.multivalued;
            copy.mixed = def.mixed;
            copy.occurs = def.occurs.clone();
            copy.choices = def.choices.clone();
            copy.unprocessed = false;
            graph.alloc(copy);
        }

        let root = DefId(0);
        let mut parents = vec![Vec::new(); graph.len()];
        let mut by_name: HashMap<IndexedName, Vec<DefId>> = HashMap::new();

        if graph[root].kind != DefinitionKind::SchemaRoot {
            parents[root.index()].push(None);
        }
        for id in graph.ids() {
            let def = &graph[id];
            let parent = match def.kind {
                DefinitionKind::SchemaRoot => None,
                _ => Some(id),
            };
            for child in &def.children {
                let declared = &mut parents[child.index()];
                if !declared.contains(&parent) {
                    declared.push(parent);
                }
            }
            if let Some(name) = def.indexed_name() {
                by_name.entry(name).or_default().push(id);
            }
        }

        Self {
            graph,
            root,
            namespaces,
            parents,
            by_name,
            documents: Vec::new(),
        }
    }

    pub(crate) fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.documents = documents;
        self
    }

    /// Root definition
    pub fn root(&self) -> DefId {
        self.root
    }

    /// Namespace table; position is the namespace index
    pub fn namespaces(&self) -> &[NamespaceBinding] {
        &self.namespaces
    }

    /// Index of a namespace URI in this run
    pub fn namespace_index(&self, uri: &str) -> Option<usize> {
        self.namespaces.iter().position(|b| b.uri == uri)
    }

    /// Indexed name for `local_name` in namespace `uri`
    pub fn indexed_name(&self, uri: &str, local_name: &str) -> Option<IndexedName> {
        self.namespace_index(uri)
            .map(|ns| IndexedName::new(ns, local_name))
    }

    /// Locations of the documents loaded for this schema, in load order
    ///
    /// Empty for a schema decoded from JSON.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Look up a definition
    pub fn get(&self, id: DefId) -> Option<&Definition> {
        self.graph.get(id)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Always false; a resolved schema has at least its root
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// All handles, root first
    pub fn ids(&self) -> impl Iterator<Item = DefId> {
        self.graph.ids()
    }

    /// Every element and attribute definition with the given indexed name
    ///
    /// A local element declared under several parents yields several
    /// definitions; a global one shared by reference yields one.
    pub fn definitions_named(&self, name: &IndexedName) -> &[DefId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First definition with the given indexed name
    pub fn lookup(&self, name: &IndexedName) -> Option<DefId> {
        self.definitions_named(name).first().copied()
    }

    /// Parents declaring `id` as a child; `None` is the document root
    pub fn parents(&self, id: DefId) -> &[Option<DefId>] {
        self.parents.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Child of `parent` with the given indexed name
    pub fn child_named(&self, parent: DefId, name: &IndexedName) -> Option<DefId> {
        self.graph[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.graph[c].indexed_name().as_ref() == Some(name))
    }

    /// Attribute of `parent` with the given indexed name
    pub fn attribute_named(&self, parent: DefId, name: &IndexedName) -> Option<DefId> {
        self.graph[parent]
            .attributes
            .iter()
            .copied()
            .find(|&a| self.graph[a].indexed_name().as_ref() == Some(name))
    }

    /// Whether one more `child` may be inserted under `parent`
    ///
    /// `counts` reports how many children of each indexed name `parent`
    /// currently holds.
    pub fn child_can_be_added<F>(&self, parent: DefId, child: DefId, counts: F) -> bool
    where
        F: Fn(&IndexedName) -> usize,
    {
        let def = &self.graph[parent];
        let Some(name) = self.graph[child].indexed_name() else {
            return false;
        };
        if !def.children.contains(&child) {
            return false;
        }

        let count = counts(&name);
        if def.occurs.get(&name).is_some_and(|occurs| occurs.is_full(count)) {
            return false;
        }

        if count == 0 {
            for choice in def.choices.iter().filter(|c| c.contains(&name)) {
                let selected = choice.selected_branches(&counts);
                // Joining an alternative already in use selects nothing new
                let opens = choice.branch_of(&name).is_some_and(|b| !selected.contains(&b));
                if opens && choice.max.is_some_and(|max| selected.len() >= max as usize) {
                    return false;
                }
            }
        }
        true
    }

    /// Whether one `child` may be removed from `parent`
    pub fn child_can_be_removed<F>(&self, parent: DefId, child: DefId, counts: F) -> bool
    where
        F: Fn(&IndexedName) -> usize,
    {
        let def = &self.graph[parent];
        let Some(name) = self.graph[child].indexed_name() else {
            return false;
        };
        let count = counts(&name);
        if count == 0 {
            return false;
        }

        if count == 1 {
            for choice in def.choices.iter().filter(|c| c.contains(&name)) {
                let branch = choice.branch_of(&name);
                let keeps_branch = choice
                    .members
                    .iter()
                    .any(|m| m != &name && counts(m) > 0 && choice.branch_of(m) == branch);
                if keeps_branch {
                    continue;
                }
                if choice.selected_branches(&counts).len() <= choice.min as usize {
                    return false;
                }
            }
        }

        match def.occurs.get(&name) {
            Some(occurs) => count - 1 >= occurs.min as usize,
            None => true,
        }
    }
}

impl Index<DefId> for ResolvedSchema {
    type Output = Definition;

    fn index(&self, id: DefId) -> &Definition {
        &self.graph[id]
    }
}
