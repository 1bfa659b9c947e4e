//! Built-in XSD datatypes
//!
//! A `type` or `base` naming one of these does not create a deferred
//! reference; the local name is recorded as the primitive type instead.

use crate::namespaces::QName;
use crate::XSD_NAMESPACE;

/// Local names of the built-in datatypes
const BUILTIN_TYPES: &[&str] = &[
    "string",
    "normalizedString",
    "token",
    "language",
    "Name",
    "NCName",
    "ID",
    "IDREF",
    "IDREFS",
    "ENTITY",
    "ENTITIES",
    "NMTOKEN",
    "NMTOKENS",
    "boolean",
    "decimal",
    "integer",
    "long",
    "int",
    "short",
    "byte",
    "nonNegativeInteger",
    "positiveInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
    "nonPositiveInteger",
    "negativeInteger",
    "float",
    "double",
    "duration",
    "dateTime",
    "time",
    "date",
    "gYearMonth",
    "gYear",
    "gMonthDay",
    "gDay",
    "gMonth",
    "hexBinary",
    "base64Binary",
    "anyURI",
    "QName",
    "NOTATION",
    "anyType",
    "anySimpleType",
];

/// Built-in list types
const LIST_TYPES: &[&str] = &["IDREFS", "ENTITIES", "NMTOKENS"];

/// If `qname` names a built-in datatype, return its local name
pub fn builtin_type(qname: &QName) -> Option<&'static str> {
    if qname.namespace.as_deref() != Some(XSD_NAMESPACE) {
        return None;
    }
    BUILTIN_TYPES
        .iter()
        .copied()
        .find(|name| *name == qname.local_name)
}

/// Whether a built-in datatype is a whitespace-separated list
pub fn is_list_type(local_name: &str) -> bool {
    LIST_TYPES.contains(&local_name)
}
