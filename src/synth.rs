//! Model → IR.
//!
//! Containers (workbook, sheet) are objects with a literal `name` and an
//! array whose `items.oneOf` lists the child variants. Tables carry a
//! positional `header` tuple and `rows` tuples whose column *i* is field *i*;
//! lists carry `items` objects closed over the declared field names.

use serde_json::{Number, Value};

use crate::model::{BlockKind, BlockModel, FieldModel, SheetModel, WorkbookModel};
use crate::schema::{SchemaNode, SchemaType};

pub const NAME_KEY: &str = "name";
pub const ENTITY_KEY: &str = "@entity";
pub const SHEETS_KEY: &str = "sheets";
pub const BLOCKS_KEY: &str = "blocks";
pub const HEADER_KEY: &str = "header";
pub const ROWS_KEY: &str = "rows";
pub const ITEMS_KEY: &str = "items";

pub fn synthesize_workbook(workbook: &WorkbookModel) -> SchemaNode {
    let sheets = workbook.sheets.iter().map(synthesize_sheet).collect();
    container(&workbook.name, SHEETS_KEY, sheets)
}

pub fn synthesize_sheet(sheet: &SheetModel) -> SchemaNode {
    let blocks = sheet.blocks.iter().map(synthesize_block).collect();
    container(&sheet.name, BLOCKS_KEY, blocks)
}

pub fn synthesize_block(block: &BlockModel) -> SchemaNode {
    match block.kind {
        BlockKind::Table => table_block(block),
        BlockKind::List => list_block(block),
    }
}

/// Constraint for one field value.
pub fn field_constraint(field: &FieldModel) -> SchemaNode {
    let mut node = SchemaNode {
        type_: Some(SchemaType::from_names(field.type_names())),
        ..SchemaNode::default()
    };
    node.minimum = field.minimum.and_then(|m| Number::from_f64(m.0)).map(compact_number);
    node.maximum = field.maximum.and_then(|m| Number::from_f64(m.0)).map(compact_number);
    node.min_length = field.min_length;
    node.max_length = field.max_length;
    node.pattern = field.pattern.clone();
    if !field.enum_values.is_empty() {
        node.enum_ = Some(field.enum_values.iter().map(|v| Value::from(v.as_str())).collect());
    }
    node.description = field.description.clone();
    if !field.examples.is_empty() {
        node.examples = Some(field.examples.iter().map(|v| Value::from(v.as_str())).collect());
    }
    node
}

fn container(name: &str, children_key: &str, children: Vec<SchemaNode>) -> SchemaNode {
    let mut node = SchemaNode::of_type("object");
    node.properties.insert(NAME_KEY.into(), SchemaNode::literal(name));
    node.properties.insert(
        children_key.into(),
        SchemaNode {
            items: Some(Box::new(SchemaNode {
                one_of: Some(children),
                ..SchemaNode::default()
            })),
            ..SchemaNode::of_type("array")
        },
    );
    node.required = vec![NAME_KEY.into(), children_key.into()];
    node
}

fn block_shell(block: &BlockModel) -> SchemaNode {
    let mut node = SchemaNode::of_type("object");
    node.properties.insert(NAME_KEY.into(), SchemaNode::literal(&block.name));
    node.properties.insert(ENTITY_KEY.into(), SchemaNode::literal(block.kind.as_str()));
    node
}

fn tuple(elems: Vec<SchemaNode>) -> SchemaNode {
    let len = elems.len() as u64;
    SchemaNode {
        prefix_items: Some(elems),
        min_items: Some(len),
        max_items: Some(len),
        ..SchemaNode::of_type("array")
    }
}

fn table_block(block: &BlockModel) -> SchemaNode {
    let header = tuple(block.fields.iter().map(|f| SchemaNode::literal(&f.name)).collect());
    let row = tuple(block.fields.iter().map(field_constraint).collect());
    let rows = SchemaNode {
        items: Some(Box::new(row)),
        ..SchemaNode::of_type("array")
    };

    let mut node = block_shell(block);
    node.properties.insert(HEADER_KEY.into(), header);
    node.properties.insert(ROWS_KEY.into(), rows);
    node.required = vec![NAME_KEY.into(), ENTITY_KEY.into(), HEADER_KEY.into(), ROWS_KEY.into()];
    node
}

fn list_block(block: &BlockModel) -> SchemaNode {
    let mut entry = SchemaNode::of_type("object");
    for field in &block.fields {
        entry.properties.insert(field.name.clone(), field_constraint(field));
    }
    entry.additional_properties = Some(false);

    let items = SchemaNode {
        items: Some(Box::new(entry)),
        ..SchemaNode::of_type("array")
    };

    let mut node = block_shell(block);
    node.properties.insert(ITEMS_KEY.into(), items);
    node.required = vec![NAME_KEY.into(), ENTITY_KEY.into(), ITEMS_KEY.into()];
    node
}

/// Whole-valued bounds serialize as integers (`3`, not `3.0`).
fn compact_number(n: Number) -> Number {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Number::from(f as i64),
        _ => n,
    }
}
