//! One loaded schema document
//!
//! A document owns its parsed declaration tree, the prefix table declared on
//! its `xs:schema` element, an index of its top-level declarations and the
//! cache of definitions already built from them.

use std::collections::HashMap;
use std::fmt;

use super::definition::{DefId, SymbolSpace};
use super::kinds::DeclarationKind;
use crate::documents::Element;
use crate::error::{Error, ParseError, Result};
use crate::locations::Location;
use crate::namespaces::{IndexedName, NamespaceContext, NamespaceRegistry, QName};

/// Form default for local elements and attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormDefault {
    /// Unqualified (default)
    #[default]
    Unqualified,
    /// Qualified
    Qualified,
}

impl FormDefault {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }

    /// Check if qualified
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified)
    }
}

impl fmt::Display for FormDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualified => write!(f, "qualified"),
            Self::Unqualified => write!(f, "unqualified"),
        }
    }
}

/// An `xs:import` as written in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Imported namespace ("" when the attribute is absent)
    pub namespace: String,
    /// Location hint
    pub location: Option<String>,
}

/// A parsed schema document
#[derive(Debug)]
pub struct SchemaDocument {
    /// Where the document was loaded from
    pub location: Location,
    /// The `xs:schema` element
    pub(crate) root: Element,
    /// Prefixes declared on the `xs:schema` element
    pub prefixes: NamespaceContext,
    /// Target namespace URI ("" for none)
    pub target_uri: String,
    /// Registry index of the target namespace
    pub target_namespace: usize,
    /// Document had no targetNamespace and adopted its includer's
    pub chameleon: bool,
    /// Schema's elementFormDefault
    pub element_form_default: FormDefault,
    /// Schema's attributeFormDefault
    pub attribute_form_default: FormDefault,
    /// Top-level declarations: position of the node among `root.children`
    declarations: HashMap<(SymbolSpace, IndexedName), usize>,
    /// Top-level element names in document order
    element_order: Vec<IndexedName>,
    /// Definitions already built from top-level declarations
    pub(crate) globals: HashMap<(SymbolSpace, IndexedName), DefId>,
}

impl SchemaDocument {
    /// Wrap a parsed `xs:schema` element, registering its namespaces
    ///
    /// `includer_namespace` is the target namespace of the including document,
    /// adopted when this document declares none.
    pub fn new(
        location: Location,
        root: Element,
        includer_namespace: Option<&str>,
        registry: &mut NamespaceRegistry,
    ) -> Result<Self> {
        if DeclarationKind::of(&root.qname) != Some(DeclarationKind::Schema) {
            return Err(Error::Parse(
                ParseError::new(format!(
                    "Expected xs:schema root element, got {}",
                    root.qname
                ))
                .with_location(location.to_string()),
            ));
        }

        let prefixes = root.declared.clone();
        for (prefix, uri) in prefixes.iter() {
            registry.register(uri, Some(prefix));
        }
        if let Some(uri) = prefixes.get_default_namespace() {
            registry.register(uri, None);
        }

        let declared_target = root.get_attribute("targetNamespace").map(str::to_string);
        let chameleon = declared_target.is_none() && includer_namespace.is_some();
        let target_uri = declared_target
            .or_else(|| includer_namespace.map(str::to_string))
            .unwrap_or_default();
        let target_namespace = registry.register(&target_uri, None);

        let element_form_default = root
            .get_attribute("elementFormDefault")
            .and_then(FormDefault::from_str)
            .unwrap_or_default();
        let attribute_form_default = root
            .get_attribute("attributeFormDefault")
            .and_then(FormDefault::from_str)
            .unwrap_or_default();

        let mut doc = Self {
            location,
            root,
            prefixes,
            target_uri,
            target_namespace,
            chameleon,
            element_form_default,
            attribute_form_default,
            declarations: HashMap::new(),
            element_order: Vec::new(),
            globals: HashMap::new(),
        };
        doc.index_declarations();
        Ok(doc)
    }

    fn index_declarations(&mut self) {
        for (position, child) in self.root.children.iter().enumerate() {
            let space = match DeclarationKind::of(&child.qname) {
                Some(DeclarationKind::Element) => SymbolSpace::Element,
                Some(DeclarationKind::Attribute) => SymbolSpace::Attribute,
                Some(DeclarationKind::ComplexType | DeclarationKind::SimpleType) => {
                    SymbolSpace::Type
                }
                Some(DeclarationKind::Group) => SymbolSpace::Group,
                Some(DeclarationKind::AttributeGroup) => SymbolSpace::AttributeGroup,
                _ => continue,
            };
            let Some(local) = child.get_attribute("name") else {
                continue;
            };

            let name = IndexedName::new(self.target_namespace, local);
            if space == SymbolSpace::Element {
                self.element_order.push(name.clone());
            }
            // First declaration of a name wins
            self.declarations.entry((space, name)).or_insert(position);
        }
    }

    /// `xs:import` declarations, in document order
    pub fn imports(&self) -> Vec<ImportDecl> {
        self.children_of_kind(DeclarationKind::Import)
            .map(|node| ImportDecl {
                namespace: node.get_attribute("namespace").unwrap_or("").to_string(),
                location: node.get_attribute("schemaLocation").map(str::to_string),
            })
            .collect()
    }

    /// `xs:include` and `xs:redefine` locations, in document order
    pub fn includes(&self) -> Vec<String> {
        self.root
            .children
            .iter()
            .filter(|node| {
                matches!(
                    DeclarationKind::of(&node.qname),
                    Some(DeclarationKind::Include | DeclarationKind::Redefine)
                )
            })
            .filter_map(|node| node.get_attribute("schemaLocation").map(str::to_string))
            .collect()
    }

    fn children_of_kind(&self, kind: DeclarationKind) -> impl Iterator<Item = &Element> {
        self.root
            .children
            .iter()
            .filter(move |node| DeclarationKind::of(&node.qname) == Some(kind))
    }

    /// Names of the top-level element declarations
    pub fn top_level_elements(&self) -> &[IndexedName] {
        &self.element_order
    }

    /// Whether the document declares `name` in `space`
    pub fn declares(&self, space: SymbolSpace, name: &IndexedName) -> bool {
        self.declarations.contains_key(&(space, name.clone()))
    }

    /// Top-level declaration node for `name` in `space`
    pub(crate) fn declaration(&self, space: SymbolSpace, name: &IndexedName) -> Option<usize> {
        self.declarations.get(&(space, name.clone())).copied()
    }

    /// Definition already built for `name` in `space`
    pub fn cached(&self, space: SymbolSpace, name: &IndexedName) -> Option<DefId> {
        self.globals.get(&(space, name.clone())).copied()
    }

    /// Resolve a QName written in this document to its namespace URI
    ///
    /// Unqualified names in a chameleon document belong to the adopted
    /// namespace.
    pub fn namespace_of<'q>(&'q self, qname: &'q QName) -> &'q str {
        match qname.namespace.as_deref() {
            Some(ns) => ns,
            None if self.chameleon => &self.target_uri,
            None => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;

    fn load(xml: &str, includer: Option<&str>, registry: &mut NamespaceRegistry) -> Result<SchemaDocument> {
        let doc = Document::from_string(xml)?;
        let root = doc.root.expect("document has a root");
        SchemaDocument::new(Location::parse("/schemas/test.xsd")?, root, includer, registry)
    }

    const BOOKS: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:b="urn:books" targetNamespace="urn:books"
            elementFormDefault="qualified">
        <xs:import namespace="urn:xlink" schemaLocation="xlink.xsd"/>
        <xs:include schemaLocation="common.xsd"/>
        <xs:element name="book" type="b:book"/>
        <xs:complexType name="book"/>
        <xs:element name="shelf"/>
    </xs:schema>"#;

    #[test]
    fn test_document_indexes_declarations_per_space() {
        let mut registry = NamespaceRegistry::new();
        let doc = load(BOOKS, None, &mut registry).unwrap();

        let ns = registry.index_of("urn:books").unwrap();
        assert_eq!(doc.target_namespace, ns);
        let book = IndexedName::new(ns, "book");
        assert!(doc.declares(SymbolSpace::Element, &book));
        assert!(doc.declares(SymbolSpace::Type, &book));
        assert!(!doc.declares(SymbolSpace::Group, &book));
        assert_eq!(
            doc.top_level_elements(),
            &[book.clone(), IndexedName::new(ns, "shelf")]
        );
        assert!(doc.element_form_default.is_qualified());
        assert_eq!(registry.prefix(ns), Some("b"));
    }

    #[test]
    fn test_imports_and_includes() {
        let mut registry = NamespaceRegistry::new();
        let doc = load(BOOKS, None, &mut registry).unwrap();
        assert_eq!(
            doc.imports(),
            vec![ImportDecl {
                namespace: "urn:xlink".to_string(),
                location: Some("xlink.xsd".to_string()),
            }]
        );
        assert_eq!(doc.includes(), vec!["common.xsd".to_string()]);
    }

    #[test]
    fn test_chameleon_document_adopts_includer_namespace() {
        let mut registry = NamespaceRegistry::new();
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="note"/>
        </xs:schema>"#;
        let doc = load(xml, Some("urn:notes"), &mut registry).unwrap();
        assert!(doc.chameleon);
        assert_eq!(doc.target_uri, "urn:notes");
        assert_eq!(doc.namespace_of(&QName::local("note")), "urn:notes");
    }

    #[test]
    fn test_non_schema_root_is_rejected() {
        let mut registry = NamespaceRegistry::new();
        let result = load("<html/>", None, &mut registry);
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
