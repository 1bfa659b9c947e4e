//! Declaration builder
//!
//! Walks one document's declaration tree and produces definitions. Anything
//! that names another declaration (`ref`, `type`, `base`, `substitutionGroup`,
//! group references) is recorded as a deferred reference for the resolver;
//! the builder never reaches into another top-level declaration itself.

use tracing::{debug, trace, warn};

use super::builtins::{builtin_type, is_list_type};
use super::definition::{
    ChoiceGroup, DefId, Definition, DefinitionArena, DefinitionKind, MergeOrder, ModelScope,
    Occurs, SymbolSpace, TypeRef,
};
use super::document::{FormDefault, SchemaDocument};
use super::kinds::DeclarationKind;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{IndexedName, NamespaceRegistry, QName};

/// Mutable state shared by every builder and the resolver of one run
#[derive(Debug, Default)]
pub(crate) struct BuildState {
    pub graph: DefinitionArena,
    pub registry: NamespaceRegistry,
    pub limits: Limits,
}

impl BuildState {
    pub fn new(limits: Limits) -> Self {
        Self {
            graph: DefinitionArena::new(),
            registry: NamespaceRegistry::new(),
            limits,
        }
    }

    /// Allocate a definition, enforcing the definition limit
    pub fn alloc(&mut self, def: Definition) -> Result<DefId> {
        self.limits.check_definitions(self.graph.len() + 1)?;
        Ok(self.graph.alloc(def))
    }
}

impl SchemaDocument {
    /// Definition for the top-level declaration `name` in `space`
    ///
    /// Built on first request and cached; the cache entry is created before
    /// the declaration's content is filled in. Returns `None` when this
    /// document does not declare the name.
    pub(crate) fn build_global(
        &mut self,
        doc_index: usize,
        space: SymbolSpace,
        name: &IndexedName,
        state: &mut BuildState,
    ) -> Result<Option<DefId>> {
        if let Some(id) = self.cached(space, name) {
            return Ok(Some(id));
        }
        let Some(position) = self.declaration(space, name) else {
            return Ok(None);
        };

        let kind = match space {
            SymbolSpace::Element => DefinitionKind::Element,
            SymbolSpace::Attribute => DefinitionKind::Attribute,
            SymbolSpace::Type | SymbolSpace::Group | SymbolSpace::AttributeGroup => {
                DefinitionKind::Type
            }
        };
        let mut def = Definition::named(kind, name);
        def.origin = Some(doc_index);
        let id = state.alloc(def)?;
        self.globals.insert((space, name.clone()), id);

        trace!(%space, %name, %id, location = %self.location, "building top-level declaration");
        let node = &self.root.children[position];
        DeclarationBuilder::new(self, doc_index, state).fill_global(id, space, node)?;
        Ok(Some(id))
    }
}

/// Per-document recursive-descent builder
pub(crate) struct DeclarationBuilder<'a> {
    doc: &'a SchemaDocument,
    doc_index: usize,
    state: &'a mut BuildState,
}

impl<'a> DeclarationBuilder<'a> {
    pub fn new(doc: &'a SchemaDocument, doc_index: usize, state: &'a mut BuildState) -> Self {
        Self {
            doc,
            doc_index,
            state,
        }
    }

    /// Fill a reserved top-level definition from its declaration node
    pub fn fill_global(&mut self, id: DefId, space: SymbolSpace, node: &Element) -> Result<()> {
        match space {
            SymbolSpace::Element => self.fill_element(id, node, true),
            SymbolSpace::Attribute => self.fill_attribute(id, node),
            SymbolSpace::Type | SymbolSpace::Group | SymbolSpace::AttributeGroup => {
                self.build(id, node, &ModelScope::default())
            }
        }
    }

    /// Dispatch one declaration node into `target`
    fn build(&mut self, target: DefId, node: &Element, ctx: &ModelScope) -> Result<()> {
        let Some(kind) = DeclarationKind::of(&node.qname) else {
            debug!(node = %node.qname, location = %self.doc.location, "skipping unknown declaration");
            return Ok(());
        };

        match kind {
            DeclarationKind::Element => self.add_child_element(target, node, ctx),
            DeclarationKind::Attribute => self.add_attribute(target, node),
            DeclarationKind::ComplexType => {
                self.apply_mixed(target, node);
                self.build_children(target, node, &ModelScope::default())
            }
            DeclarationKind::ComplexContent => {
                self.apply_mixed(target, node);
                self.build_children(target, node, ctx)
            }
            DeclarationKind::SimpleType | DeclarationKind::SimpleContent => {
                self.build_children(target, node, ctx)
            }
            DeclarationKind::Sequence | DeclarationKind::All => {
                let inner = ctx.nested(parse_occurs(node));
                self.build_children(target, node, &inner)
            }
            DeclarationKind::Choice => self.build_choice(target, node, ctx),
            DeclarationKind::Group => self.group_reference(target, node, ctx, SymbolSpace::Group),
            DeclarationKind::AttributeGroup => {
                self.group_reference(target, node, ctx, SymbolSpace::AttributeGroup)
            }
            DeclarationKind::Extension | DeclarationKind::Restriction => {
                if let Some(base) = self.qname_attr(node, "base")? {
                    self.add_base(target, &base, SymbolSpace::Type);
                }
                self.build_children(target, node, ctx)
            }
            DeclarationKind::List => {
                self.state.graph[target].multivalued = true;
                if let Some(item) = self.qname_attr(node, "itemType")? {
                    self.add_base(target, &item, SymbolSpace::Type);
                }
                self.build_children(target, node, ctx)
            }
            DeclarationKind::Union => {
                if let Some(members) = node.get_attribute("memberTypes") {
                    for token in members.split_whitespace() {
                        let member = self.resolve_qname(node, token)?;
                        self.add_base(target, &member, SymbolSpace::Type);
                    }
                }
                self.build_children(target, node, ctx)
            }
            DeclarationKind::Enumeration => {
                if let Some(value) = node.get_attribute("value") {
                    let values = &mut self.state.graph[target].values;
                    if !values.iter().any(|v| v == value) {
                        values.push(value.to_string());
                    }
                }
                Ok(())
            }
            DeclarationKind::Any => {
                self.state.graph[target].any = true;
                Ok(())
            }
            DeclarationKind::AnyAttribute | DeclarationKind::Annotation => Ok(()),
            DeclarationKind::Schema
            | DeclarationKind::Import
            | DeclarationKind::Include
            | DeclarationKind::Redefine
            | DeclarationKind::Notation => {
                debug!(?kind, location = %self.doc.location, "document-level declaration inside content ignored");
                Ok(())
            }
        }
    }

    fn build_children(&mut self, target: DefId, node: &Element, ctx: &ModelScope) -> Result<()> {
        for child in &node.children {
            self.build(target, child, ctx)?;
        }
        Ok(())
    }

    fn apply_mixed(&mut self, target: DefId, node: &Element) {
        if matches!(node.get_attribute("mixed"), Some("true" | "1")) {
            self.state.graph[target].mixed = true;
        }
    }

    fn fill_element(&mut self, id: DefId, node: &Element, global: bool) -> Result<()> {
        let has_inline_type = node.children.iter().any(|child| {
            matches!(
                DeclarationKind::of(&child.qname),
                Some(DeclarationKind::ComplexType | DeclarationKind::SimpleType)
            )
        });

        if let Some(type_name) = self.qname_attr(node, "type")? {
            self.add_base(id, &type_name, SymbolSpace::Type);
        } else if !has_inline_type {
            // Members of a substitution group take the head's type
            match node.get_attribute("substitutionGroup").filter(|_| global) {
                Some(heads) => {
                    for token in heads.split_whitespace() {
                        let head = self.resolve_qname(node, token)?;
                        let name = self.indexed(&head);
                        self.state.graph[id].pending_type_refs.push(TypeRef {
                            space: SymbolSpace::Element,
                            name,
                            order: MergeOrder::BaseFirst,
                            scope: None,
                        });
                    }
                }
                None => self.state.graph[id].any = true,
            }
        }

        self.build_children(id, node, &ModelScope::default())
    }

    fn fill_attribute(&mut self, id: DefId, node: &Element) -> Result<()> {
        if let Some(value) = node.get_attribute("default").or_else(|| node.get_attribute("fixed")) {
            self.state.graph[id].default_value = Some(value.to_string());
        }
        if let Some(type_name) = self.qname_attr(node, "type")? {
            self.add_base(id, &type_name, SymbolSpace::Type);
        }
        self.build_children(id, node, &ModelScope::default())
    }

    fn add_child_element(&mut self, target: DefId, node: &Element, ctx: &ModelScope) -> Result<()> {
        let occurs = parse_occurs(node).within(ctx.occurs);
        let Some((child, name)) = self.build_local_element(node)? else {
            return Ok(());
        };

        let already_listed = self.state.graph[target]
            .children
            .iter()
            .any(|&c| self.state.graph[c].indexed_name().as_ref() == Some(&name));

        let def = &mut self.state.graph[target];
        if !already_listed {
            def.children.push(child);
        }
        def.add_occurs(name.clone(), occurs);
        for &(index, branch) in &ctx.choices {
            def.choices[index].add_member(name.clone(), branch);
        }
        Ok(())
    }

    fn build_local_element(&mut self, node: &Element) -> Result<Option<(DefId, IndexedName)>> {
        if let Some(target) = self.qname_attr(node, "ref")? {
            let name = self.indexed(&target);
            let stub = self.reference_stub(DefinitionKind::Element, SymbolSpace::Element, &name);
            let id = self.state.alloc(stub)?;
            return Ok(Some((id, name)));
        }

        let Some(local) = node.get_attribute("name") else {
            warn!(location = %self.doc.location, "element declaration without name or ref skipped");
            return Ok(None);
        };
        let form = node
            .get_attribute("form")
            .and_then(FormDefault::from_str)
            .unwrap_or(self.doc.element_form_default);
        let name = IndexedName::new(self.local_namespace(form), local);

        let mut def = Definition::named(DefinitionKind::Element, &name);
        def.origin = Some(self.doc_index);
        let id = self.state.alloc(def)?;
        self.fill_element(id, node, false)?;
        Ok(Some((id, name)))
    }

    fn add_attribute(&mut self, target: DefId, node: &Element) -> Result<()> {
        if node.get_attribute("use") == Some("prohibited") {
            return Ok(());
        }

        let (id, name) = if let Some(referenced) = self.qname_attr(node, "ref")? {
            let name = self.indexed(&referenced);
            let mut stub =
                self.reference_stub(DefinitionKind::Attribute, SymbolSpace::Attribute, &name);
            // A local default turns the stub into a definition of its own
            stub.default_value = node
                .get_attribute("default")
                .or_else(|| node.get_attribute("fixed"))
                .map(str::to_string);
            (self.state.alloc(stub)?, name)
        } else {
            let Some(local) = node.get_attribute("name") else {
                warn!(location = %self.doc.location, "attribute declaration without name or ref skipped");
                return Ok(());
            };
            let form = node
                .get_attribute("form")
                .and_then(FormDefault::from_str)
                .unwrap_or(self.doc.attribute_form_default);
            let name = IndexedName::new(self.local_namespace(form), local);
            let mut def = Definition::named(DefinitionKind::Attribute, &name);
            def.origin = Some(self.doc_index);
            let id = self.state.alloc(def)?;
            self.fill_attribute(id, node)?;
            (id, name)
        };

        let already_listed = self.state.graph[target]
            .attributes
            .iter()
            .any(|&a| self.state.graph[a].indexed_name().as_ref() == Some(&name));
        if !already_listed {
            self.state.graph[target].attributes.push(id);
        }
        Ok(())
    }

    fn build_choice(&mut self, target: DefId, node: &Element, ctx: &ModelScope) -> Result<()> {
        let group_occurs = parse_occurs(node).within(ctx.occurs);
        let def = &mut self.state.graph[target];
        def.choices.push(ChoiceGroup::new(group_occurs));
        let index = def.choices.len() - 1;

        let alternatives = node
            .children
            .iter()
            .filter(|child| {
                matches!(
                    DeclarationKind::of(&child.qname),
                    Some(
                        DeclarationKind::Element
                            | DeclarationKind::Group
                            | DeclarationKind::Choice
                            | DeclarationKind::Sequence
                            | DeclarationKind::Any
                    )
                )
            })
            .count();

        // With several alternatives no single member is required on its own
        let member_min = if alternatives > 1 { 0 } else { group_occurs.min };
        let members = ModelScope {
            occurs: Occurs::new(member_min, group_occurs.max),
            choices: ctx.choices.clone(),
        };
        for (branch, child) in node.children.iter().enumerate() {
            let mut inner = members.clone();
            inner.choices.push((index, branch));
            self.build(target, child, &inner)?;
        }
        Ok(())
    }

    fn group_reference(
        &mut self,
        target: DefId,
        node: &Element,
        ctx: &ModelScope,
        space: SymbolSpace,
    ) -> Result<()> {
        match self.qname_attr(node, "ref")? {
            Some(referenced) => {
                let name = self.indexed(&referenced);
                // Attribute groups carry no particles
                let scope = (space == SymbolSpace::Group).then(|| ctx.nested(parse_occurs(node)));
                self.state.graph[target].pending_type_refs.push(TypeRef {
                    space,
                    name,
                    order: MergeOrder::InPlace,
                    scope,
                });
                Ok(())
            }
            None => self.build_children(target, node, ctx),
        }
    }

    /// Record a `type`/`base`/`itemType`/`memberTypes` name on `target`
    fn add_base(&mut self, target: DefId, qname: &QName, space: SymbolSpace) {
        if let Some(builtin) = builtin_type(qname) {
            let def = &mut self.state.graph[target];
            if builtin == "anyType" {
                def.any = true;
                return;
            }
            if def.primitive_type.is_none() {
                def.primitive_type = Some(builtin.to_string());
            }
            if is_list_type(builtin) {
                def.multivalued = true;
            }
            return;
        }

        let name = self.indexed(qname);
        self.state.graph[target].pending_type_refs.push(TypeRef {
            space,
            name,
            order: MergeOrder::BaseFirst,
            scope: None,
        });
    }

    fn reference_stub(&self, kind: DefinitionKind, space: SymbolSpace, name: &IndexedName) -> Definition {
        let mut stub = Definition::named(kind, name);
        stub.origin = Some(self.doc_index);
        stub.pending_ref = Some(TypeRef {
            space,
            name: name.clone(),
            order: MergeOrder::InPlace,
            scope: None,
        });
        stub
    }

    /// Namespace index of a local declaration with the given form
    fn local_namespace(&mut self, form: FormDefault) -> usize {
        if form.is_qualified() {
            self.doc.target_namespace
        } else {
            self.state.registry.register("", None)
        }
    }

    fn indexed(&mut self, qname: &QName) -> IndexedName {
        let uri = self.doc.namespace_of(qname);
        let namespace = self.state.registry.register(uri, None);
        IndexedName::new(namespace, qname.local_name.clone())
    }

    fn qname_attr(&self, node: &Element, attr: &str) -> Result<Option<QName>> {
        match node.get_attribute(attr) {
            Some(value) => self.resolve_qname(node, value).map(Some),
            None => Ok(None),
        }
    }

    fn resolve_qname(&self, node: &Element, value: &str) -> Result<QName> {
        node.namespaces
            .resolve(value.trim())
            .map_err(|_| Error::Unresolved {
                name: value.to_string(),
                location: self.doc.location.to_string(),
            })
    }
}

/// Parse minOccurs and maxOccurs attributes into an Occurs
fn parse_occurs(elem: &Element) -> Occurs {
    let min = elem
        .get_attribute("minOccurs")
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(1);

    let max = match elem.get_attribute("maxOccurs").map(str::trim) {
        Some("unbounded") => None,
        Some(s) => s.parse::<u32>().ok().or(Some(1)),
        None => Some(1),
    };

    Occurs::new(min, max)
}
