//! Reference resolution
//!
//! Replaces every deferred reference recorded by the builder with the
//! definition it names. Element and attribute references without local
//! content become aliases of their target, so a self-containing element ends
//! up as a handle cycle. Type, group and substitution-group references are
//! merged into the referencing definition.
//!
//! A merge copies the source's content, which is only final once the source
//! has left the traversal stack. Merges from a source that is still being
//! resolved are queued and completed after the traversal, sources first.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::builder::BuildState;
use super::definition::{
    DefId, Definition, DefinitionArena, DefinitionKind, MergeOrder, ModelScope, Occurs,
    SymbolSpace, TypeRef,
};
use super::document::SchemaDocument;
use crate::error::{Error, Result};
use crate::names::{split_qname, validate_qname};
use crate::namespaces::IndexedName;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
struct DeferredMerge {
    dest: DefId,
    source: DefId,
    order: MergeOrder,
    scope: Option<ModelScope>,
}

/// Resolves one definition graph against the loaded documents
pub(crate) struct Resolver<'a> {
    documents: &'a mut [SchemaDocument],
    state: &'a mut BuildState,
    in_progress: HashSet<DefId>,
    incomplete: HashSet<DefId>,
    deferred: Vec<DeferredMerge>,
}

impl<'a> Resolver<'a> {
    pub fn new(documents: &'a mut [SchemaDocument], state: &'a mut BuildState) -> Self {
        Self {
            documents,
            state,
            in_progress: HashSet::new(),
            incomplete: HashSet::new(),
            deferred: Vec::new(),
        }
    }

    /// Resolve everything reachable from `root`
    ///
    /// Returns the reachable definitions in preorder. On return no reachable
    /// definition holds a deferred reference and every child or attribute
    /// handle points at a canonical definition.
    pub fn run(&mut self, root: DefId) -> Result<Vec<DefId>> {
        self.resolve(root)?;
        self.complete_deferred();

        let mut reachable = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let id = self.state.graph.canonical(id);
            if !seen.insert(id) {
                continue;
            }
            if self.state.graph[id].unprocessed {
                self.resolve(id)?;
                self.complete_deferred();
            }

            let graph = &mut self.state.graph;
            let children = canonical_handles(&*graph, &graph[id].children);
            let attributes = canonical_handles(&*graph, &graph[id].attributes);
            stack.extend(attributes.iter().rev());
            stack.extend(children.iter().rev());
            graph[id].children = children;
            graph[id].attributes = attributes;
            reachable.push(id);
        }

        debug!(
            reachable = reachable.len(),
            total = self.state.graph.len(),
            "resolution complete"
        );
        Ok(reachable)
    }

    /// Top-level declaration `name` in `space`, built on first use
    pub fn lookup(&mut self, space: SymbolSpace, name: &IndexedName) -> Result<Option<DefId>> {
        for index in 0..self.documents.len() {
            if self.documents[index].declares(space, name) {
                return self.documents[index].build_global(index, space, name, self.state);
            }
        }
        Ok(None)
    }

    /// Top-level element named `name` (`prefix:local` or `local`)
    ///
    /// A prefix is matched against the registry's preferred prefixes; a bare
    /// local name picks the first loaded document declaring it.
    pub fn named_root(&mut self, name: &str) -> Result<DefId> {
        validate_qname(name)?;
        let (prefix, local) = split_qname(name);

        let candidates: Vec<IndexedName> = match prefix {
            Some(prefix) => self
                .state
                .registry
                .index_of_prefix(prefix)
                .map(|ns| IndexedName::new(ns, local))
                .into_iter()
                .collect(),
            None => self
                .documents
                .iter()
                .flat_map(|doc| doc.top_level_elements())
                .filter(|candidate| candidate.local_name == local)
                .cloned()
                .collect(),
        };

        for candidate in &candidates {
            if let Some(id) = self.lookup(SymbolSpace::Element, candidate)? {
                debug!(root = %candidate, "using configured root element");
                return Ok(id);
            }
        }
        Err(Error::Unresolved {
            name: name.to_string(),
            location: self
                .documents
                .first()
                .map(|doc| doc.location.to_string())
                .unwrap_or_default(),
        })
    }

    /// Synthetic root listing every loaded document's top-level elements
    pub fn synthetic_root(&mut self) -> Result<DefId> {
        let root = self.state.alloc(Definition::new(DefinitionKind::SchemaRoot))?;
        let names: Vec<IndexedName> = self
            .documents
            .iter()
            .flat_map(|doc| doc.top_level_elements())
            .cloned()
            .collect();

        for name in &names {
            if let Some(element) = self.lookup(SymbolSpace::Element, name)? {
                let children = &mut self.state.graph[root].children;
                if !children.contains(&element) {
                    children.push(element);
                }
            }
        }
        Ok(root)
    }

    fn require(&mut self, from: DefId, reference: &TypeRef) -> Result<DefId> {
        match self.lookup(reference.space, &reference.name)? {
            Some(id) => Ok(id),
            None => Err(self.unresolved(from, reference)),
        }
    }

    fn resolve(&mut self, id: DefId) -> Result<()> {
        if !self.state.graph[id].unprocessed {
            return Ok(());
        }
        self.state.graph[id].unprocessed = false;
        self.in_progress.insert(id);

        if let Some(reference) = self.state.graph[id].pending_ref.take() {
            let target = self.require(id, &reference)?;
            if self.state.graph[id].has_content() {
                self.resolve(target)?;
                self.merge_or_defer(id, target, MergeOrder::InPlace, None);
            } else {
                // Alias first so a reference back to `id` sees the target
                trace!(stub = %id, %target, "reference becomes alias");
                self.state.graph[id].alias = Some(target);
                self.resolve(target)?;
            }
        }

        let references = std::mem::take(&mut self.state.graph[id].pending_type_refs);
        for reference in &references {
            let target = self.require(id, reference)?;
            self.resolve(target)?;
            self.merge_or_defer(id, target, reference.order, reference.scope.clone());
        }

        let children = self.state.graph[id].children.clone();
        for child in children {
            self.resolve(child)?;
        }
        let attributes = self.state.graph[id].attributes.clone();
        for attribute in attributes {
            self.resolve(attribute)?;
        }

        self.in_progress.remove(&id);
        Ok(())
    }

    fn merge_or_defer(
        &mut self,
        dest: DefId,
        source: DefId,
        order: MergeOrder,
        scope: Option<ModelScope>,
    ) {
        if self.in_progress.contains(&source) || self.incomplete.contains(&source) {
            debug!(%dest, %source, "merge deferred until source is complete");
            self.deferred.push(DeferredMerge {
                dest,
                source,
                order,
                scope,
            });
            self.incomplete.insert(dest);
        } else {
            merge(&mut self.state.graph, dest, source, order, scope.as_ref());
        }
    }

    fn complete_deferred(&mut self) {
        let mut guard = HashSet::new();
        while let Some(dest) = self.incomplete.iter().next().copied() {
            self.complete(dest, &mut guard);
        }
    }

    fn complete(&mut self, dest: DefId, guard: &mut HashSet<DefId>) {
        if !self.incomplete.contains(&dest) || !guard.insert(dest) {
            return;
        }

        let (pending, rest): (Vec<_>, Vec<_>) =
            self.deferred.drain(..).partition(|merge| merge.dest == dest);
        self.deferred = rest;

        for deferred in &pending {
            self.complete(deferred.source, guard);
        }
        for deferred in pending {
            merge(
                &mut self.state.graph,
                dest,
                deferred.source,
                deferred.order,
                deferred.scope.as_ref(),
            );
        }
        self.incomplete.remove(&dest);
    }

    fn unresolved(&self, from: DefId, reference: &TypeRef) -> Error {
        let local = &reference.name.local_name;
        let name = match self.state.registry.prefix(reference.name.namespace) {
            Some(prefix) if !prefix.is_empty() => format!("{} {}:{}", reference.space, prefix, local),
            _ => format!("{} {}", reference.space, local),
        };
        let location = self.state.graph[from]
            .origin
            .and_then(|index| self.documents.get(index))
            .map(|doc| doc.location.to_string())
            .unwrap_or_else(|| "<schema root>".to_string());
        Error::Unresolved { name, location }
    }
}

fn canonical_handles(graph: &DefinitionArena, handles: &[DefId]) -> Vec<DefId> {
    let mut seen = HashSet::new();
    handles
        .iter()
        .map(|&id| graph.canonical(id))
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Handles of `first` then `second`, one per name
///
/// A name present in both lists keeps its position from `first`; the entry
/// itself comes from `second` when `second_wins` is set.
fn union_by_name(
    graph: &DefinitionArena,
    first: &[DefId],
    second: &[DefId],
    second_wins: bool,
) -> Vec<DefId> {
    let mut positions: HashMap<IndexedName, usize> = HashMap::new();
    let mut out: Vec<DefId> = Vec::new();
    for (from_second, &id) in first
        .iter()
        .map(|id| (false, id))
        .chain(second.iter().map(|id| (true, id)))
    {
        if out.contains(&id) {
            continue;
        }
        match graph[id].indexed_name() {
            Some(name) => match positions.get(&name) {
                Some(&position) => {
                    if from_second && second_wins {
                        out[position] = id;
                    }
                }
                None => {
                    positions.insert(name, out.len());
                    out.push(id);
                }
            },
            None => out.push(id),
        }
    }
    out
}

/// Fold the content of `source` into `dest`
///
/// Lists are unioned without duplicates and entries of `dest` win over
/// entries of the same name. Scalars already set on `dest` are kept and
/// flags are or-ed. Choice groups of `dest` keep their indices.
///
/// A model group merged under `scope` has its bounds scaled by the scope and
/// added to any bounds `dest` already records for the same name. Its element
/// names join the scope's open choices.
pub(crate) fn merge(
    graph: &mut DefinitionArena,
    dest: DefId,
    source: DefId,
    order: MergeOrder,
    scope: Option<&ModelScope>,
) {
    if dest == source {
        return;
    }
    let src = graph[source].clone();
    let dst = &graph[dest];

    let (children, attributes, values, occurs, mut choices) = match order {
        MergeOrder::BaseFirst => {
            let mut occurs = src.occurs.clone();
            for (name, bounds) in &dst.occurs {
                occurs.insert(name.clone(), *bounds);
            }
            (
                union_by_name(graph, &src.children, &dst.children, true),
                union_by_name(graph, &src.attributes, &dst.attributes, true),
                union_values(&src.values, &dst.values),
                occurs,
                union_choices(&dst.choices, &src.choices),
            )
        }
        MergeOrder::InPlace => {
            let mut occurs: IndexMap<_, _> = dst.occurs.clone();
            for (name, &bounds) in &src.occurs {
                match scope {
                    Some(scope) => {
                        let bounds = bounds.within(scope.occurs);
                        occurs
                            .entry(name.clone())
                            .and_modify(|existing: &mut Occurs| *existing = existing.plus(bounds))
                            .or_insert(bounds);
                    }
                    None => {
                        occurs.entry(name.clone()).or_insert(bounds);
                    }
                }
            }
            let inherited = src.choices.iter().map(|choice| match scope {
                Some(scope) => choice.scaled(scope.occurs),
                None => choice.clone(),
            });
            (
                union_by_name(graph, &dst.children, &src.children, false),
                union_by_name(graph, &dst.attributes, &src.attributes, false),
                union_values(&dst.values, &src.values),
                occurs,
                union_choices(&dst.choices, &inherited.collect::<Vec<_>>()),
            )
        }
    };

    if let Some(scope) = scope {
        for &(index, branch) in &scope.choices {
            if let Some(choice) = choices.get_mut(index) {
                for name in src.occurs.keys() {
                    choice.add_member(name.clone(), branch);
                }
            }
        }
    }

    let dst = &mut graph[dest];
    dst.children = children;
    dst.attributes = attributes;
    dst.values = values;
    dst.occurs = occurs;
    dst.choices = choices;
    if dst.primitive_type.is_none() {
        dst.primitive_type = src.primitive_type;
    }
    if dst.default_value.is_none() {
        dst.default_value = src.default_value;
    }
    dst.any |= src.any;
    dst.multivalued |= src.multivalued;
    dst.mixed |= src.mixed;
}

fn union_values(first: &[String], second: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for value in first.iter().chain(second) {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}

fn union_choices<T: Clone + PartialEq>(first: &[T], second: &[T]) -> Vec<T> {
    let mut out: Vec<T> = first.to_vec();
    for choice in second {
        if !out.contains(choice) {
            out.push(choice.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::definition::ChoiceGroup;

    fn named(graph: &mut DefinitionArena, kind: DefinitionKind, local: &str) -> DefId {
        graph.alloc(Definition::named(kind, &IndexedName::new(1, local)))
    }

    #[test]
    fn test_base_first_merge_puts_base_entries_first() {
        let mut graph = DefinitionArena::new();
        let base = named(&mut graph, DefinitionKind::Type, "base");
        let derived = named(&mut graph, DefinitionKind::Element, "derived");
        let a = named(&mut graph, DefinitionKind::Element, "a");
        let b = named(&mut graph, DefinitionKind::Element, "b");
        let c = named(&mut graph, DefinitionKind::Element, "c");

        graph[base].children = vec![a, b];
        graph[base].primitive_type = Some("string".into());
        graph[base].occurs.insert(IndexedName::new(1, "b"), Occurs::new(0, None));
        graph[derived].children = vec![c];
        graph[derived].occurs.insert(IndexedName::new(1, "b"), Occurs::once());

        merge(&mut graph, derived, base, MergeOrder::BaseFirst, None);

        let def = &graph[derived];
        assert_eq!(def.children, vec![a, b, c]);
        assert_eq!(def.primitive_type.as_deref(), Some("string"));
        assert_eq!(def.occurs[&IndexedName::new(1, "b")], Occurs::once());
        assert_eq!(def.occurs.get_index(0).map(|(k, _)| k.local_name.as_str()), Some("b"));
    }

    #[test]
    fn test_subtype_redeclaration_wins_in_base_position() {
        let mut graph = DefinitionArena::new();
        let base = named(&mut graph, DefinitionKind::Type, "base");
        let derived = named(&mut graph, DefinitionKind::Type, "derived");
        let base_status = named(&mut graph, DefinitionKind::Attribute, "status");
        let lang = named(&mut graph, DefinitionKind::Attribute, "lang");
        let own_status = named(&mut graph, DefinitionKind::Attribute, "status");

        graph[base].attributes = vec![base_status, lang];
        graph[derived].attributes = vec![own_status];

        merge(&mut graph, derived, base, MergeOrder::BaseFirst, None);

        assert_eq!(graph[derived].attributes, vec![own_status, lang]);
    }

    #[test]
    fn test_in_place_merge_keeps_destination_first() {
        let mut graph = DefinitionArena::new();
        let group = named(&mut graph, DefinitionKind::Type, "group");
        let dest = named(&mut graph, DefinitionKind::Element, "dest");
        let own = named(&mut graph, DefinitionKind::Element, "x");
        let same_name = named(&mut graph, DefinitionKind::Element, "x");
        let extra = named(&mut graph, DefinitionKind::Element, "y");

        graph[dest].children = vec![own];
        graph[dest].default_value = Some("mine".into());
        graph[group].children = vec![same_name, extra];
        graph[group].default_value = Some("theirs".into());
        graph[group].mixed = true;

        merge(&mut graph, dest, group, MergeOrder::InPlace, None);

        assert_eq!(graph[dest].children, vec![own, extra]);
        assert_eq!(graph[dest].default_value.as_deref(), Some("mine"));
        assert!(graph[dest].mixed);
    }

    #[test]
    fn test_scoped_group_merge_joins_open_choice() {
        let mut graph = DefinitionArena::new();
        let group = named(&mut graph, DefinitionKind::Type, "group");
        let dest = named(&mut graph, DefinitionKind::Type, "dest");
        let a = named(&mut graph, DefinitionKind::Element, "a");
        let b = named(&mut graph, DefinitionKind::Element, "b");
        let a_name = IndexedName::new(1, "a");
        let b_name = IndexedName::new(1, "b");

        graph[group].children = vec![a];
        graph[group].occurs.insert(a_name.clone(), Occurs::new(1, Some(2)));
        let mut choice = ChoiceGroup::new(Occurs::once());
        choice.add_member(b_name.clone(), 1);
        graph[dest].children = vec![b];
        graph[dest].occurs.insert(b_name.clone(), Occurs::new(0, Some(1)));
        graph[dest].choices = vec![choice];

        let scope = ModelScope {
            occurs: Occurs::new(0, None),
            choices: vec![(0, 0)],
        };
        merge(&mut graph, dest, group, MergeOrder::InPlace, Some(&scope));

        let def = &graph[dest];
        assert_eq!(def.children, vec![b, a]);
        assert_eq!(def.occurs[&a_name], Occurs::new(0, None));
        assert_eq!(def.choices.len(), 1);
        assert_eq!(def.choices[0].members, vec![b_name, a_name.clone()]);
        assert_eq!(def.choices[0].branch_of(&a_name), Some(0));
    }

    #[test]
    fn test_scoped_merge_adds_to_existing_bounds() {
        let mut graph = DefinitionArena::new();
        let group = named(&mut graph, DefinitionKind::Type, "group");
        let dest = named(&mut graph, DefinitionKind::Type, "dest");
        let a = named(&mut graph, DefinitionKind::Element, "a");
        let a_name = IndexedName::new(1, "a");

        graph[group].children = vec![a];
        graph[group].occurs.insert(a_name.clone(), Occurs::once());
        graph[dest].children = vec![a];
        graph[dest].occurs.insert(a_name.clone(), Occurs::once());

        let scope = ModelScope::default().nested(Occurs::new(0, Some(3)));
        merge(&mut graph, dest, group, MergeOrder::InPlace, Some(&scope));

        assert_eq!(graph[dest].occurs[&a_name], Occurs::new(1, Some(4)));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut graph = DefinitionArena::new();
        let base = named(&mut graph, DefinitionKind::Type, "base");
        let dest = named(&mut graph, DefinitionKind::Element, "dest");
        let a = named(&mut graph, DefinitionKind::Element, "a");
        graph[base].children = vec![a];
        graph[base].values = vec!["x".into()];

        merge(&mut graph, dest, base, MergeOrder::BaseFirst, None);
        merge(&mut graph, dest, base, MergeOrder::BaseFirst, None);

        assert_eq!(graph[dest].children, vec![a]);
        assert_eq!(graph[dest].values, vec!["x".to_string()]);
    }

    #[test]
    fn test_canonical_handles_dedupes_aliases() {
        let mut graph = DefinitionArena::new();
        let target = named(&mut graph, DefinitionKind::Element, "note");
        let stub = named(&mut graph, DefinitionKind::Element, "note");
        graph[stub].alias = Some(target);

        assert_eq!(canonical_handles(&graph, &[stub, target]), vec![target]);
    }
}
