//! Front-end model shared by the tabular extractor and the instance
//! inferrer: workbook → sheet → block → field, all in declaration order.

use std::fmt;
use std::str::FromStr;

use ordered_float::OrderedFloat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookModel {
    pub name: String,
    pub sheets: Vec<SheetModel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetModel {
    pub name: String,
    pub blocks: Vec<BlockModel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockModel {
    pub name: String,
    pub kind: BlockKind,
    pub fields: Vec<FieldModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    List,
    Table,
}

impl BlockKind {
    /// Reserved header suffix that opens a block of this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            BlockKind::List => "_list",
            BlockKind::Table => "_table",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::List => "list",
            BlockKind::Table => "table",
        }
    }

    /// Kind announced by a block label, if it ends in a reserved suffix.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        [BlockKind::List, BlockKind::Table]
            .into_iter()
            .find(|kind| label.ends_with(kind.suffix()))
    }

    pub fn from_entity(tag: &str) -> Option<Self> {
        match tag {
            "list" => Some(BlockKind::List),
            "table" => Some(BlockKind::Table),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value kinds a field may hold. Declaration order is emission order, which
/// keeps `null` last in unions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
    /// A type token the engine does not know; passed through verbatim.
    Other(String),
    Null,
}

impl Kind {
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
            Kind::Other(name) => name,
            Kind::Null => "null",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Kind::Other(_))
    }
}

impl FromStr for Kind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Kind::Boolean,
            "integer" | "int" => Kind::Integer,
            "number" => Kind::Number,
            "string" => Kind::String,
            "array" => Kind::Array,
            "object" => Kind::Object,
            "null" => Kind::Null,
            _ => Kind::Other(s.trim().to_string()),
        })
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldModel {
    pub name: String,
    pub nullable: bool,
    /// Sorted, distinct. Empty means "only null was ever seen".
    pub kinds: Vec<Kind>,
    pub minimum: Option<OrderedFloat<f64>>,
    pub maximum: Option<OrderedFloat<f64>>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub enum_values: Vec<String>,
    pub description: Option<String>,
    pub examples: Vec<String>,
}

impl FieldModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Type names as they should appear in the schema: the declared kinds
    /// with `null` appended for nullable fields, or `["null"]` when nothing
    /// else is known.
    pub fn type_names(&self) -> Vec<String> {
        let mut kinds = self.kinds.clone();
        if self.nullable || kinds.is_empty() {
            kinds.push(Kind::Null);
        }
        kinds.sort();
        kinds.dedup();
        kinds.iter().map(|k| k.as_str().to_string()).collect()
    }
}
