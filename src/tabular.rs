//! Spreadsheet grid → block/field model.
//!
//! Each sheet is scanned row by row:
//!
//! - `Scanning`: look for a first cell ending in `_list` or `_table`;
//! - `Meta`: the row right after a header maps meta tokens to columns;
//! - `Fields`: one field per row until a blank row or the next header.
//!
//! Rows outside a block are ignored.

use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use crate::grid::SheetGrid;
use crate::model::{BlockKind, BlockModel, FieldModel, Kind, SheetModel, WorkbookModel};

/// Meta-row vocabulary, matched case-insensitively and exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaColumn {
    NullAllowed,
    Type,
    Minimum,
    Maximum,
    MinLength,
    MaxLength,
    Pattern,
    Enum,
    Description,
    Examples,
}

impl MetaColumn {
    pub const ALL: [MetaColumn; 10] = [
        MetaColumn::NullAllowed,
        MetaColumn::Type,
        MetaColumn::Minimum,
        MetaColumn::Maximum,
        MetaColumn::MinLength,
        MetaColumn::MaxLength,
        MetaColumn::Pattern,
        MetaColumn::Enum,
        MetaColumn::Description,
        MetaColumn::Examples,
    ];

    pub fn token(self) -> &'static str {
        match self {
            MetaColumn::NullAllowed => "null_allowed",
            MetaColumn::Type => "type",
            MetaColumn::Minimum => "minimum",
            MetaColumn::Maximum => "maximum",
            MetaColumn::MinLength => "minLength",
            MetaColumn::MaxLength => "maxLength",
            MetaColumn::Pattern => "pattern",
            MetaColumn::Enum => "enum",
            MetaColumn::Description => "description",
            MetaColumn::Examples => "examples",
        }
    }

    pub fn from_token(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        Self::ALL
            .into_iter()
            .find(|column| column.token().eq_ignore_ascii_case(cell))
    }
}

/// Column positions found in a meta row.
#[derive(Debug, Clone, Default)]
struct MetaLayout {
    columns: Vec<(MetaColumn, usize)>,
}

impl MetaLayout {
    fn from_row(row: &[String]) -> Self {
        let mut columns = Vec::new();
        for (index, cell) in row.iter().enumerate().skip(1) {
            if let Some(column) = MetaColumn::from_token(cell) {
                if !columns.iter().any(|(c, _)| *c == column) {
                    columns.push((column, index));
                }
            }
        }
        Self { columns }
    }

    fn read_field(&self, row: &[String]) -> FieldModel {
        let mut field = FieldModel::new(row[0].trim());
        field.nullable = true;
        field.kinds = vec![Kind::String];
        for &(column, index) in &self.columns {
            let cell = row.get(index).map(|c| c.trim()).unwrap_or_default();
            match column {
                MetaColumn::NullAllowed => {
                    field.nullable = !cell.eq_ignore_ascii_case("no");
                }
                MetaColumn::Type => {
                    if !cell.is_empty() {
                        let kind: Kind = cell.parse().unwrap_or(Kind::String);
                        if !kind.is_known() {
                            warn!(field = %field.name, declared = %cell, "unrecognized field type, passing it through");
                        }
                        field.kinds = vec![kind];
                    }
                }
                MetaColumn::Minimum => field.minimum = parse_decimal(cell),
                MetaColumn::Maximum => field.maximum = parse_decimal(cell),
                MetaColumn::MinLength => field.min_length = parse_length(cell),
                MetaColumn::MaxLength => field.max_length = parse_length(cell),
                MetaColumn::Pattern => field.pattern = non_empty(cell),
                MetaColumn::Enum => field.enum_values = split_list(cell),
                MetaColumn::Description => field.description = non_empty(cell),
                MetaColumn::Examples => field.examples = split_list(cell),
            }
        }
        field
    }
}

enum State {
    Scanning,
    Meta(BlockModel),
    Fields(BlockModel, MetaLayout),
}

/// Extract every block of one sheet.
pub fn extract_sheet(grid: &SheetGrid) -> SheetModel {
    let mut blocks = Vec::new();
    let mut state = State::Scanning;

    for row in &grid.rows {
        state = match state {
            State::Scanning => match open_block(row) {
                Some(block) => State::Meta(block),
                None => State::Scanning,
            },
            State::Meta(block) => {
                if let Some(next) = open_block(row) {
                    blocks.push(block);
                    State::Meta(next)
                } else if is_blank(row) {
                    blocks.push(block);
                    State::Scanning
                } else {
                    State::Fields(block, MetaLayout::from_row(row))
                }
            }
            State::Fields(mut block, layout) => {
                if let Some(next) = open_block(row) {
                    blocks.push(block);
                    State::Meta(next)
                } else if is_blank(row) {
                    blocks.push(block);
                    State::Scanning
                } else {
                    if row[0].trim().is_empty() {
                        debug!(block = %block.name, "skipping field row without a name");
                    } else {
                        block.fields.push(layout.read_field(row));
                    }
                    State::Fields(block, layout)
                }
            }
        };
    }

    match state {
        State::Scanning => {}
        State::Meta(block) | State::Fields(block, _) => blocks.push(block),
    }

    debug!(sheet = %grid.name, blocks = blocks.len(), "sheet extracted");
    SheetModel {
        name: grid.name.clone(),
        blocks,
    }
}

/// Extract a workbook, one sheet model per grid, in grid order.
pub fn extract_workbook(name: &str, grids: &[SheetGrid]) -> WorkbookModel {
    WorkbookModel {
        name: name.to_string(),
        sheets: grids.iter().map(extract_sheet).collect(),
    }
}

fn open_block(row: &[String]) -> Option<BlockModel> {
    let first = row.first()?.trim();
    let kind = BlockKind::from_label(first)?;
    debug!(block = %first, kind = %kind, "block header");
    Some(BlockModel {
        name: first.to_string(),
        kind,
        fields: Vec::new(),
    })
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}

/// Locale-independent decimal; anything else (including NaN/inf) is unset.
fn parse_decimal(cell: &str) -> Option<OrderedFloat<f64>> {
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(OrderedFloat)
}

fn parse_length(cell: &str) -> Option<u64> {
    parse_decimal(cell)
        .map(|v| v.0)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as u64)
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
