//! JSON encoding of a resolved schema
//!
//! The graph is written as a tree rooted at the schema root. A definition
//! met for the second time is written as `{"$ref": "<path>"}`, where the path
//! (`$`, `$.children[0]`, `$.children[0].attributes[1]`, ...) locates its
//! first occurrence. Decoding turns each reference back into the same
//! handle, so shared definitions and cycles survive a round trip.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::definition::{ChoiceGroup, DefId, Definition, DefinitionArena, DefinitionKind, Occurs};
use super::schema::ResolvedSchema;
use crate::error::{Error, Result};
use crate::namespaces::{IndexedName, NamespaceBinding};

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum EncodedNode {
    Ref(EncodedRef),
    Def(Box<EncodedDefinition>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EncodedRef {
    #[serde(rename = "$ref")]
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedDefinition {
    kind: DefinitionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<EncodedNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<EncodedNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primitive_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    any: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    multivalued: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    mixed: bool,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    occurs: IndexMap<IndexedName, Occurs>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    choices: Vec<ChoiceGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespaces: Option<Vec<NamespaceBinding>>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

struct Encoder<'a> {
    schema: &'a ResolvedSchema,
    paths: HashMap<DefId, String>,
}

impl<'a> Encoder<'a> {
    fn definition(&mut self, id: DefId, path: String) -> EncodedDefinition {
        let schema = self.schema;
        let def = &schema[id];
        self.paths.insert(id, path.clone());

        let children = def
            .children
            .iter()
            .enumerate()
            .map(|(i, &child)| self.node(child, format!("{}.children[{}]", path, i)))
            .collect();
        let attributes = def
            .attributes
            .iter()
            .enumerate()
            .map(|(i, &attr)| self.node(attr, format!("{}.attributes[{}]", path, i)))
            .collect();

        EncodedDefinition {
            kind: def.kind,
            name: def.name.clone(),
            namespace: def.namespace,
            children,
            attributes,
            values: def.values.clone(),
            primitive_type: def.primitive_type.clone(),
            default_value: def.default_value.clone(),
            any: def.any,
            multivalued: def.multivalued,
            mixed: def.mixed,
            occurs: def.occurs.clone(),
            choices: def.choices.clone(),
            namespaces: None,
        }
    }

    fn node(&mut self, id: DefId, path: String) -> EncodedNode {
        match self.paths.get(&id) {
            Some(first) => EncodedNode::Ref(EncodedRef {
                path: first.clone(),
            }),
            None => EncodedNode::Def(Box::new(self.definition(id, path))),
        }
    }
}

#[derive(Default)]
struct Decoder {
    graph: DefinitionArena,
    paths: HashMap<String, DefId>,
}

impl Decoder {
    fn definition(&mut self, encoded: &EncodedDefinition, path: String) -> Result<DefId> {
        let mut def = Definition::new(encoded.kind);
        def.name = encoded.name.clone();
        def.namespace = encoded.namespace;
        def.values = encoded.values.clone();
        def.primitive_type = encoded.primitive_type.clone();
        def.default_value = encoded.default_value.clone();
        def.any = encoded.any;
        def.multivalued = encoded.multivalued;
        def.mixed = encoded.mixed;
        def.occurs = encoded.occurs.clone();
        def.choices = encoded.choices.clone();
        def.unprocessed = false;

        // Registered before descending so back-references to it resolve
        let id = self.graph.alloc(def);
        self.paths.insert(path.clone(), id);

        let mut children = Vec::with_capacity(encoded.children.len());
        for (i, child) in encoded.children.iter().enumerate() {
            children.push(self.node(child, format!("{}.children[{}]", path, i))?);
        }
        let mut attributes = Vec::with_capacity(encoded.attributes.len());
        for (i, attr) in encoded.attributes.iter().enumerate() {
            attributes.push(self.node(attr, format!("{}.attributes[{}]", path, i))?);
        }

        self.graph[id].children = children;
        self.graph[id].attributes = attributes;
        Ok(id)
    }

    fn node(&mut self, node: &EncodedNode, path: String) -> Result<DefId> {
        match node {
            EncodedNode::Ref(reference) => self.paths.get(&reference.path).copied().ok_or_else(|| {
                Error::Decode(format!(
                    "reference '{}' at {} does not name an earlier definition",
                    reference.path, path
                ))
            }),
            EncodedNode::Def(def) => self.definition(def, path),
        }
    }
}

impl ResolvedSchema {
    fn encode(&self) -> EncodedDefinition {
        let mut encoder = Encoder {
            schema: self,
            paths: HashMap::new(),
        };
        let mut root = encoder.definition(self.root(), "$".to_string());
        root.namespaces = Some(self.namespaces().to_vec());
        root
    }

    /// Encode as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.encode())?)
    }

    /// Encode as indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.encode())?)
    }

    /// Rebuild a schema from its JSON encoding
    pub fn from_json(json: &str) -> Result<Self> {
        let encoded: EncodedDefinition = serde_json::from_str(json)?;
        let mut decoder = Decoder::default();
        decoder.definition(&encoded, "$".to_string())?;

        let order: Vec<DefId> = decoder.graph.ids().collect();
        debug!(definitions = order.len(), "decoded schema graph");
        Ok(ResolvedSchema::from_graph(
            &decoder.graph,
            &order,
            encoded.namespaces.unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// note contains itself; `title` is shared by `book` and `chapter`
    fn sample() -> ResolvedSchema {
        let ns = |local: &str| IndexedName::new(1, local);
        let mut graph = DefinitionArena::new();
        let root = graph.alloc(Definition::new(DefinitionKind::SchemaRoot));
        let note = graph.alloc(Definition::named(DefinitionKind::Element, &ns("note")));
        let book = graph.alloc(Definition::named(DefinitionKind::Element, &ns("book")));
        let title = graph.alloc(Definition::named(DefinitionKind::Element, &ns("title")));
        let chapter = graph.alloc(Definition::named(DefinitionKind::Element, &ns("chapter")));
        let lang = graph.alloc(Definition::named(DefinitionKind::Attribute, &IndexedName::new(0, "lang")));

        graph[root].children = vec![note, book];
        graph[note].children = vec![note];
        graph[book].children = vec![title, chapter];
        graph[book].occurs.insert(ns("title"), Occurs::once());
        graph[chapter].children = vec![title];
        graph[chapter].attributes = vec![lang];
        graph[chapter].occurs.insert(ns("title"), Occurs::new(0, None));
        graph[title].primitive_type = Some("string".into());
        graph[lang].default_value = Some("en".into());

        let namespaces = vec![
            NamespaceBinding { prefix: String::new(), uri: String::new() },
            NamespaceBinding { prefix: "b".into(), uri: "urn:books".into() },
        ];
        let order: Vec<DefId> = graph.ids().collect();
        ResolvedSchema::from_graph(&graph, &order, namespaces)
    }

    #[test]
    fn test_repeated_identity_becomes_path_reference() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();

        assert_eq!(json["children"][0]["children"][0], serde_json::json!({"$ref": "$.children[0]"}));
        assert_eq!(
            json["children"][1]["children"][1]["children"][0],
            serde_json::json!({"$ref": "$.children[1].children[0]"})
        );
        assert_eq!(json["namespaces"][1]["uri"], "urn:books");
        assert_eq!(json["children"][1]["occurs"]["1:title"]["max"], 1);
    }

    #[test]
    fn test_round_trip_preserves_identity() {
        let schema = sample();
        let decoded = ResolvedSchema::from_json(&schema.to_json_pretty().unwrap()).unwrap();

        assert_eq!(decoded.len(), schema.len());
        assert_eq!(decoded.namespaces(), schema.namespaces());

        let root = &decoded[decoded.root()];
        let note = root.children[0];
        let book = root.children[1];
        assert_eq!(decoded[note].children, vec![note]);

        let title_under_book = decoded[book].children[0];
        let chapter = decoded[book].children[1];
        assert_eq!(decoded[chapter].children[0], title_under_book);
        assert_eq!(decoded[chapter].occurs[&IndexedName::new(1, "title")], Occurs::new(0, None));
        assert_eq!(decoded[title_under_book].primitive_type.as_deref(), Some("string"));

        for id in schema.ids() {
            assert_eq!(decoded[id].children, schema[id].children);
            assert_eq!(decoded[id].attributes, schema[id].attributes);
        }
    }

    #[test]
    fn test_dangling_reference_is_rejected() {
        let json = r#"{"kind":"schema_root","children":[{"$ref":"$.children[7]"}]}"#;
        assert!(matches!(ResolvedSchema::from_json(json), Err(Error::Decode(_))));
    }

    #[test]
    fn test_reference_with_extra_fields_is_not_a_reference() {
        let json = r#"{"kind":"schema_root","children":[{"$ref":"$","kind":"element"}]}"#;
        let schema = ResolvedSchema::from_json(json).unwrap();
        assert_eq!(schema.len(), 2);
    }
}
