//! Instance inference: example workbook data → field model.
//!
//! Stream example documents in, keep one small piece of evidence per column
//! (the set of value kinds seen there), and read the model off at the end.
//!
//! - Tables (`header` + `rows`): column *i* collects the kinds of every
//!   row's cell *i*.
//! - Lists (`items`): each item is one name/value pair; pairs fold into one
//!   field map, a later pair for the same name replaces the earlier one.
//!
//! Across documents evidence joins (set union), so the result does not
//! depend on the order documents are observed in.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{BlockKind, BlockModel, FieldModel, Kind, SheetModel, WorkbookModel};

// ------------------------------- Policy ---------------------------------- //

const WORKBOOK_FALLBACK: &str = "workbook";
const SHEET_FALLBACK: &str = "sheet";
const BLOCK_FALLBACK: &str = "block";

// ------------------------------- State ----------------------------------- //

/// Distinct kinds observed at one position. Join is set union.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindSet(BTreeSet<Kind>);

impl KindSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn observe(v: &Value) -> Self {
        Self(BTreeSet::from([kind_of(v)]))
    }

    pub fn join(a: &Self, b: &Self) -> Self {
        Self(&a.0 | &b.0)
    }

    fn to_field(&self, name: &str) -> FieldModel {
        let mut field = FieldModel::new(name);
        field.kinds = self.0.iter().cloned().collect();
        field
    }
}

#[derive(Clone, Debug)]
enum BlockEvidence {
    Table { header: Vec<String>, cols: Vec<KindSet> },
    List { fields: IndexMap<String, KindSet> },
}


#[derive(Clone, Debug, Default)]
struct SheetState {
    blocks: IndexMap<String, BlockEvidence>,
}

// ------------------------------ Observe ---------------------------------- //

/// Kind of a single value: `null`, `boolean`, `number`, `array`, `object`,
/// anything else is a `string`.
pub fn kind_of(v: &Value) -> Kind {
    match v {
        Value::Null => Kind::Null,
        Value::Bool(_) => Kind::Boolean,
        Value::Number(_) => Kind::Number,
        Value::Array(_) => Kind::Array,
        Value::Object(_) => Kind::Object,
        Value::String(_) => Kind::String,
    }
}

fn observe_table(block: &Map<String, Value>, path: &str) -> Result<BlockEvidence> {
    let header = match block.get("header") {
        Some(Value::Array(cells)) => cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                cell.as_str().map(str::to_string).ok_or_else(|| {
                    Error::malformed(format!("{path}/header/{i}"), "header cells must be strings")
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(Error::malformed(format!("{path}/header"), "expected an array")),
        None => return Err(Error::malformed(format!("{path}/header"), "table block without a header")),
    };

    let mut cols = vec![KindSet::empty(); header.len()];
    let rows: &[Value] = match block.get("rows") {
        Some(Value::Array(rows)) => rows.as_slice(),
        Some(_) => return Err(Error::malformed(format!("{path}/rows"), "expected an array")),
        None => &[],
    };
    for (r, row) in rows.iter().enumerate() {
        let cells = row.as_array().ok_or_else(|| {
            Error::malformed(format!("{path}/rows/{r}"), "table rows must be arrays")
        })?;
        for (col, cell) in cols.iter_mut().zip(cells) {
            *col = KindSet::join(col, &KindSet::observe(cell));
        }
    }
    Ok(BlockEvidence::Table { header, cols })
}

fn observe_list(block: &Map<String, Value>, path: &str) -> Result<BlockEvidence> {
    let items: &[Value] = match block.get("items") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return Err(Error::malformed(format!("{path}/items"), "expected an array")),
        None => &[],
    };
    let mut fields = IndexMap::<String, KindSet>::new();
    for (i, item) in items.iter().enumerate() {
        // One name/value pair per item; anything past the first is ignored.
        match item.as_object().and_then(|entry| entry.iter().next()) {
            Some((name, value)) => {
                fields.insert(name.clone(), KindSet::observe(value));
            }
            None => debug!(path = %format!("{path}/items/{i}"), "list item without a name/value pair"),
        }
    }
    Ok(BlockEvidence::List { fields })
}

fn observe_block(block: &Value, path: &str) -> Result<(Option<String>, BlockEvidence)> {
    let map = block
        .as_object()
        .ok_or_else(|| Error::malformed(path, "block must be an object"))?;
    let name = map.get("name").and_then(Value::as_str).map(str::to_string);
    let kind = match map.get("@entity").and_then(Value::as_str) {
        Some(tag) => BlockKind::from_entity(tag).ok_or_else(|| {
            Error::malformed(format!("{path}/@entity"), format!("unknown entity `{tag}`"))
        })?,
        None if map.contains_key("header") || map.contains_key("rows") => BlockKind::Table,
        None if map.contains_key("items") => BlockKind::List,
        None => {
            return Err(Error::malformed(
                path,
                "block is neither a table (header/rows) nor a list (items)",
            ));
        }
    };
    let evidence = match kind {
        BlockKind::Table => observe_table(map, path)?,
        BlockKind::List => observe_list(map, path)?,
    };
    Ok((name, evidence))
}

// -------------------------------- Join (⊔) -------------------------------- //

fn join_block(a: &BlockEvidence, b: &BlockEvidence, path: &str) -> Result<BlockEvidence> {
    match (a, b) {
        (
            BlockEvidence::Table { header: ha, cols: ca },
            BlockEvidence::Table { header: hb, cols: cb },
        ) => {
            if ha != hb {
                return Err(Error::malformed(
                    format!("{path}/header"),
                    format!("conflicting headers {ha:?} and {hb:?}"),
                ));
            }
            let cols = ca.iter().zip(cb).map(|(x, y)| KindSet::join(x, y)).collect();
            Ok(BlockEvidence::Table { header: ha.clone(), cols })
        }
        (BlockEvidence::List { fields: fa }, BlockEvidence::List { fields: fb }) => {
            let mut fields = fa.clone();
            for (name, kinds) in fb {
                let joined = match fields.get(name) {
                    Some(existing) => KindSet::join(existing, kinds),
                    None => kinds.clone(),
                };
                fields.insert(name.clone(), joined);
            }
            Ok(BlockEvidence::List { fields })
        }
        _ => Err(Error::malformed(path, "block is a list in one example and a table in another")),
    }
}

// ------------------------------- Front API -------------------------------- //

/// Accumulates example documents into one workbook model.
#[derive(Debug, Default)]
pub struct Inference {
    name: Option<String>,
    sheets: IndexMap<String, SheetState>,
}

impl Inference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one document: a workbook (`sheets`), a sheet (`blocks`) or a
    /// single block.
    pub fn observe_value(&mut self, v: &Value) -> Result<()> {
        let map = v
            .as_object()
            .ok_or_else(|| Error::malformed("/", "example document must be an object"))?;
        if let Some(sheets) = map.get("sheets") {
            if self.name.is_none() {
                self.name = map.get("name").and_then(Value::as_str).map(str::to_string);
            }
            let sheets = sheets
                .as_array()
                .ok_or_else(|| Error::malformed("/sheets", "expected an array"))?;
            for (i, sheet) in sheets.iter().enumerate() {
                self.observe_sheet(sheet, i, &format!("/sheets/{i}"))?;
            }
        } else if map.contains_key("blocks") {
            self.observe_sheet(v, 0, "")?;
        } else {
            let sheet = serde_json::json!({ "blocks": [v] });
            self.observe_sheet(&sheet, 0, "")?;
        }
        Ok(())
    }

    fn observe_sheet(&mut self, sheet: &Value, index: usize, path: &str) -> Result<()> {
        let name = sheet
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{SHEET_FALLBACK}_{}", index + 1));
        let blocks = sheet
            .get("blocks")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed(format!("{path}/blocks"), "sheet without a blocks array"))?;

        let state = self.sheets.entry(name).or_default();
        for (i, block) in blocks.iter().enumerate() {
            let block_path = format!("{path}/blocks/{i}");
            let (name, evidence) = observe_block(block, &block_path)?;
            let name = name.unwrap_or_else(|| format!("{BLOCK_FALLBACK}_{}", i + 1));
            let merged = match state.blocks.get(&name) {
                Some(existing) => join_block(existing, &evidence, &block_path)?,
                None => evidence,
            };
            state.blocks.insert(name, merged);
        }
        Ok(())
    }

    pub fn solve(&self) -> WorkbookModel {
        WorkbookModel {
            name: self.name.clone().unwrap_or_else(|| WORKBOOK_FALLBACK.to_string()),
            sheets: self
                .sheets
                .iter()
                .map(|(name, sheet)| SheetModel {
                    name: name.clone(),
                    blocks: sheet
                        .blocks
                        .iter()
                        .map(|(name, block)| block_model(name, block))
                        .collect(),
                })
                .collect(),
        }
    }
}

fn block_model(name: &str, evidence: &BlockEvidence) -> BlockModel {
    let (kind, fields) = match evidence {
        BlockEvidence::Table { header, cols } => (
            BlockKind::Table,
            header.iter().zip(cols).map(|(h, c)| c.to_field(h)).collect(),
        ),
        BlockEvidence::List { fields } => (
            BlockKind::List,
            fields.iter().map(|(n, c)| c.to_field(n)).collect(),
        ),
    };
    BlockModel {
        name: name.to_string(),
        kind,
        fields,
    }
}

/// Infer a workbook model from one or more example documents.
pub fn infer_workbook<'a, I>(values: I) -> Result<WorkbookModel>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut inference = Inference::new();
    for v in values {
        inference.observe_value(v)?;
    }
    Ok(inference.solve())
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn only_block(model: &WorkbookModel) -> &BlockModel {
        &model.sheets[0].blocks[0]
    }

    #[test]
    fn kind_precedence() {
        assert_eq!(kind_of(&json!(null)), Kind::Null);
        assert_eq!(kind_of(&json!(true)), Kind::Boolean);
        assert_eq!(kind_of(&json!(1.5)), Kind::Number);
        assert_eq!(kind_of(&json!([1])), Kind::Array);
        assert_eq!(kind_of(&json!({"a": 1})), Kind::Object);
        assert_eq!(kind_of(&json!("x")), Kind::String);
    }

    #[test]
    fn table_columns_collect_kind_sets() {
        let doc = json!({
            "name": "book",
            "sheets": [{"name": "people", "blocks": [{
                "name": "employee_table",
                "@entity": "table",
                "header": ["id", "label", "never"],
                "rows": [[1, "a"], [2, null], [3, 4]]
            }]}]
        });
        let model = infer_workbook([&doc]).unwrap();
        assert_eq!(model.name, "book");
        let block = only_block(&model);
        assert_eq!(block.kind, BlockKind::Table);
        assert_eq!(block.fields[0].type_names(), vec!["number"]);
        assert_eq!(block.fields[1].type_names(), vec!["number", "string", "null"]);
        assert_eq!(block.fields[2].type_names(), vec!["null"], "no observations → null only");
    }

    #[test]
    fn list_items_fold_last_write_wins() {
        let doc = json!({"blocks": [{
            "name": "settings_list",
            "items": [{"mode": "fast"}, {"retries": 3, "ignored": true}, {"mode": false}]
        }]});
        let model = infer_workbook([&doc]).unwrap();
        let block = only_block(&model);
        assert_eq!(block.kind, BlockKind::List);
        let names: Vec<_> = block.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["mode", "retries"]);
        assert_eq!(block.fields[0].kinds, vec![Kind::Boolean]);
    }

    #[test]
    fn unnamed_blocks_get_fallback_names() {
        let doc = json!({"header": ["a"], "rows": [[1]]});
        let model = infer_workbook([&doc]).unwrap();
        let block = only_block(&model);
        assert_eq!(block.name, "block_1");
        assert_eq!(model.sheets[0].name, "sheet_1");
        assert_eq!(model.name, "workbook");
    }

    #[test]
    fn documents_join_independently_of_order() {
        let a = json!({"blocks": [{"name": "t_table", "header": ["x"], "rows": [[1]]}]});
        let b = json!({"blocks": [{"name": "t_table", "header": ["x"], "rows": [["s"]]}]});
        let ab = infer_workbook([&a, &b]).unwrap();
        let ba = infer_workbook([&b, &a]).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(only_block(&ab).fields[0].type_names(), vec!["number", "string"]);
    }

    #[test]
    fn malformed_blocks_name_their_path() {
        let doc = json!({"sheets": [{"name": "s", "blocks": [{"name": "x"}]}]});
        let err = infer_workbook([&doc]).unwrap_err();
        assert!(err.to_string().contains("/sheets/0/blocks/0"), "{err}");

        let doc = json!({"blocks": [{"@entity": "grid", "items": []}]});
        assert!(matches!(
            infer_workbook([&doc]),
            Err(Error::MalformedSchema { .. })
        ));
    }
}
