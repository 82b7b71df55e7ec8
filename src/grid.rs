//! Raw sheet grids, the input of the tabular extractor.
//!
//! A workbook arrives either as a CSV file (one sheet) or as a JSON grid
//! document `{ "name": ..., "sheets": [{ "name": ..., "rows": [[cell, ...]] }] }`
//! as spreadsheet exporters write it. Cells are normalized to text.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookGrid {
    pub name: String,
    pub sheets: Vec<SheetGrid>,
}

#[derive(Deserialize)]
struct RawWorkbook {
    name: Option<String>,
    sheets: Vec<RawSheet>,
}

#[derive(Deserialize)]
struct RawSheet {
    name: String,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// Read a headerless, ragged CSV as a single sheet.
///
/// The csv reader skips empty lines, but a blank row ends a block, so the
/// source is cut at every empty line outside a quoted cell and each cut
/// comes back as an empty row.
pub fn read_csv_sheet(name: &str, mut reader: impl Read) -> Result<SheetGrid> {
    let mut source = String::new();
    reader.read_to_string(&mut source)?;

    let mut rows = Vec::new();
    let mut chunk_start = 0;
    let mut offset = 0;
    let mut in_quotes = false;
    for line in source.split_inclusive('\n') {
        if !in_quotes && line.trim_end_matches(['\r', '\n']).is_empty() {
            read_records(&source[chunk_start..offset], &mut rows)?;
            rows.push(Vec::new());
            chunk_start = offset + line.len();
        } else if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        offset += line.len();
    }
    read_records(&source[chunk_start..], &mut rows)?;

    Ok(SheetGrid {
        name: name.to_string(),
        rows,
    })
}

fn read_records(chunk: &str, rows: &mut Vec<Vec<String>>) -> Result<()> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(chunk.as_bytes());
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(())
}

/// Parse a JSON grid document. `fallback_name` names the workbook when the
/// document does not.
pub fn parse_json_workbook(source: &str, fallback_name: &str) -> Result<WorkbookGrid> {
    let raw: RawWorkbook = crate::path_de::from_str_with_path(source)?;
    Ok(WorkbookGrid {
        name: raw.name.unwrap_or_else(|| fallback_name.to_string()),
        sheets: raw
            .sheets
            .into_iter()
            .map(|sheet| SheetGrid {
                name: sheet.name,
                rows: sheet
                    .rows
                    .into_iter()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect(),
            })
            .collect(),
    })
}

/// Load a workbook grid from a `.csv` or `.json` file.
pub fn load_workbook(path: &Path) -> Result<WorkbookGrid> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook".to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)?;
            let sheet = read_csv_sheet(&stem, file)?;
            Ok(WorkbookGrid {
                name: stem,
                sheets: vec![sheet],
            })
        }
        "json" => {
            let source = std::fs::read_to_string(path)?;
            parse_json_workbook(&source, &stem)
        }
        other => Err(Error::TabularParse {
            sheet: path.display().to_string(),
            message: format!("unsupported grid format `{other}` (expected csv or json)"),
        }),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_may_be_ragged() {
        let source = "employee_table\nname,null_allowed,type\nid,No,number\n\nlabel\n";
        let sheet = read_csv_sheet("people", source.as_bytes()).unwrap();
        assert_eq!(sheet.name, "people");
        assert_eq!(sheet.rows[0], vec!["employee_table"]);
        assert_eq!(sheet.rows[2], vec!["id", "No", "number"]);
        assert_eq!(sheet.rows.last().unwrap(), &vec!["label".to_string()]);
    }

    #[test]
    fn empty_lines_become_blank_rows() {
        let source = "a_list\nname,type\nx,number\n\n\nnotes,\"free\n\ntext\"\nb_list\n";
        let sheet = read_csv_sheet("s", source.as_bytes()).unwrap();
        let empty: Vec<String> = Vec::new();
        assert_eq!(sheet.rows.len(), 7);
        assert_eq!(sheet.rows[3], empty);
        assert_eq!(sheet.rows[4], empty);
        assert_eq!(sheet.rows[5], vec!["notes", "free\n\ntext"]);
        assert_eq!(sheet.rows[6], vec!["b_list"]);
    }

    #[test]
    fn json_cells_are_normalized_to_text() {
        let source = r#"{"sheets": [{"name": "s", "rows": [["a_table"], ["", "minimum"], ["x", 3, null, true]]}]}"#;
        let workbook = parse_json_workbook(source, "book").unwrap();
        assert_eq!(workbook.name, "book");
        assert_eq!(workbook.sheets[0].rows[2], vec!["x", "3", "", "true"]);
    }

    #[test]
    fn json_errors_carry_the_path() {
        let source = r#"{"sheets": [{"name": 7}]}"#;
        let err = parse_json_workbook(source, "book").unwrap_err();
        assert!(err.to_string().contains("sheets[0].name"), "{err}");
    }
}
