//! Schema-shaped IR.
//!
//! One struct covers every node of the workbook → sheet → block → field
//! hierarchy. Only the keywords the engine reads or writes get a typed slot;
//! anything else is kept verbatim in `extra` so documents survive a
//! load/save cycle untouched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// `type` is either a single name or an ordered union of names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Union(Vec<String>),
}

impl SchemaType {
    /// Collapse a list of kind names: one name stays scalar.
    pub fn from_names(mut names: Vec<String>) -> Self {
        if names.len() == 1 {
            Self::Single(names.remove(0))
        } else {
            Self::Union(names)
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Union(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<SchemaType>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaNode>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    /// Positional tuple form; element *i* constrains array slot *i*.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_items: Option<Vec<SchemaNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<SchemaNode>>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub definitions: IndexMap<String, SchemaNode>,

    #[serde(rename = "$defs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub defs: IndexMap<String, SchemaNode>,

    /// Keywords the engine does not interpret.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl SchemaNode {
    pub fn of_type(name: &str) -> Self {
        Self {
            type_: Some(SchemaType::Single(name.to_string())),
            ..Self::default()
        }
    }

    /// `{ "type": "string", "enum": [value] }`
    pub fn literal(value: &str) -> Self {
        Self {
            enum_: Some(vec![Value::from(value)]),
            ..Self::of_type("string")
        }
    }

    /// `{ "$ref": pointer }`
    pub fn reference(pointer: impl Into<String>) -> Self {
        Self {
            reference: Some(pointer.into()),
            ..Self::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn property(&self, key: &str) -> Option<&SchemaNode> {
        self.properties.get(key)
    }

    /// The first string of `enum`, if any.
    pub fn first_literal(&self) -> Option<&str> {
        self.enum_.as_ref()?.first()?.as_str()
    }

    /// Literal discriminator of an object node: `properties.name.enum[0]`.
    pub fn literal_name(&self) -> Option<&str> {
        self.property("name")?.first_literal()
    }

    /// Literal `@entity` tag of a block node.
    pub fn entity_tag(&self) -> Option<&str> {
        self.property("@entity")?.first_literal()
    }

    /// `properties[key].items.oneOf`, the alternation containers use for
    /// their children.
    pub fn alternation(&self, key: &str) -> Option<&Vec<SchemaNode>> {
        self.property(key)?.items.as_ref()?.one_of.as_ref()
    }

    pub fn alternation_mut(&mut self, key: &str) -> Option<&mut Vec<SchemaNode>> {
        self.properties.get_mut(key)?.items.as_mut()?.one_of.as_mut()
    }
}
