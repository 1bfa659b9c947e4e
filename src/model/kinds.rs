//! Declaration kinds understood by the builder

use crate::namespaces::QName;
use crate::XSD_NAMESPACE;

/// Closed set of XSD declaration elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// `xs:schema`
    Schema,
    /// `xs:element`
    Element,
    /// `xs:attribute`
    Attribute,
    /// `xs:complexType`
    ComplexType,
    /// `xs:simpleType`
    SimpleType,
    /// `xs:group`
    Group,
    /// `xs:attributeGroup`
    AttributeGroup,
    /// `xs:sequence`
    Sequence,
    /// `xs:choice`
    Choice,
    /// `xs:all`
    All,
    /// `xs:complexContent`
    ComplexContent,
    /// `xs:simpleContent`
    SimpleContent,
    /// `xs:extension`
    Extension,
    /// `xs:restriction`
    Restriction,
    /// `xs:union`
    Union,
    /// `xs:list`
    List,
    /// `xs:enumeration`
    Enumeration,
    /// `xs:any`
    Any,
    /// `xs:anyAttribute`
    AnyAttribute,
    /// `xs:annotation`
    Annotation,
    /// `xs:import`
    Import,
    /// `xs:include`
    Include,
    /// `xs:redefine`
    Redefine,
    /// `xs:notation`
    Notation,
}

impl DeclarationKind {
    /// Classify an element of a schema document
    ///
    /// Returns `None` for anything outside the XSD namespace and for XSD
    /// elements the builder has no handler for (facets other than
    /// enumeration, identity constraints, ...).
    pub fn of(qname: &QName) -> Option<Self> {
        if qname.namespace.as_deref() != Some(XSD_NAMESPACE) {
            return None;
        }

        let kind = match qname.local_name.as_str() {
            "schema" => Self::Schema,
            "element" => Self::Element,
            "attribute" => Self::Attribute,
            "complexType" => Self::ComplexType,
            "simpleType" => Self::SimpleType,
            "group" => Self::Group,
            "attributeGroup" => Self::AttributeGroup,
            "sequence" => Self::Sequence,
            "choice" => Self::Choice,
            "all" => Self::All,
            "complexContent" => Self::ComplexContent,
            "simpleContent" => Self::SimpleContent,
            "extension" => Self::Extension,
            "restriction" => Self::Restriction,
            "union" => Self::Union,
            "list" => Self::List,
            "enumeration" => Self::Enumeration,
            "any" => Self::Any,
            "anyAttribute" => Self::AnyAttribute,
            "annotation" => Self::Annotation,
            "import" => Self::Import,
            "include" => Self::Include,
            "redefine" => Self::Redefine,
            "notation" => Self::Notation,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether the kind is a model group compositor
    pub fn is_compositor(self) -> bool {
        matches!(self, Self::Sequence | Self::Choice | Self::All)
    }
}
