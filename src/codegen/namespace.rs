//! Where each emitted class lives: module path plus file path.
//!
//! ```text
//! mod.rs
//! runtime.rs                      runtime
//! workbook.rs                     workbook
//! shared/<block>.rs               shared::<block>
//! sheets/<sheet>/sheet.rs         sheets::<sheet>::sheet
//! sheets/<sheet>/<block>.rs       sheets::<sheet>::<block>
//! registry/<category>.rs          registry::<category>
//! ```
//!
//! Module names are snake case, file and directory names kebab case; the
//! generated `mod.rs` files bridge the two with `#[path]`.

use std::fmt;
use std::path::PathBuf;

use crate::naming::{kebab_case, module_identifier, Category, RESERVED_MODULE_NAMES};

pub const RUNTIME_MODULE: &str = "runtime";
pub const WORKBOOK_MODULE: &str = "workbook";
pub const SHARED_MODULE: &str = "shared";
pub const SHEETS_MODULE: &str = "sheets";
pub const SHEET_MODULE: &str = "sheet";
pub const REGISTRY_MODULE: &str = "registry";

/// Module segments below the generated root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModulePath(pub Vec<String>);

impl ModulePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Path to `item` (defined in `self`) as written from inside `from`.
    pub fn item_path_from(&self, from: &ModulePath, item: &str) -> String {
        let common = self
            .0
            .iter()
            .zip(&from.0)
            .take_while(|(a, b)| a == b)
            .count();
        let mut parts: Vec<&str> = vec!["super"; from.0.len() - common];
        parts.extend(self.0[common..].iter().map(String::as_str));
        parts.push(item);
        parts.join("::")
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("::"))
    }
}

/// Module/file pair for one emitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub module: ModulePath,
    pub path: PathBuf,
}

/// Where a block class goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Namespace {
    /// Reached through a `$ref`; one copy for every sheet.
    Shared,
    /// Inlined in the sheet with this literal name.
    Sheet(String),
}

impl Namespace {
    pub fn block(&self, label: &str) -> Location {
        let (module, stem) = block_module(label);
        match self {
            Namespace::Shared => Location {
                module: ModulePath::new([SHARED_MODULE.to_string(), module]),
                path: PathBuf::from(SHARED_MODULE).join(format!("{stem}.rs")),
            },
            Namespace::Sheet(sheet) => {
                let dir = sheet_dir(sheet);
                Location {
                    module: ModulePath::new([SHEETS_MODULE.to_string(), module_identifier(sheet), module]),
                    path: dir.join(format!("{stem}.rs")),
                }
            }
        }
    }
}

pub fn runtime() -> Location {
    Location {
        module: ModulePath::new([RUNTIME_MODULE]),
        path: PathBuf::from(format!("{RUNTIME_MODULE}.rs")),
    }
}

pub fn workbook() -> Location {
    Location {
        module: ModulePath::new([WORKBOOK_MODULE]),
        path: PathBuf::from(format!("{WORKBOOK_MODULE}.rs")),
    }
}

pub fn sheet(name: &str) -> Location {
    Location {
        module: ModulePath::new([SHEETS_MODULE.to_string(), module_identifier(name), SHEET_MODULE.to_string()]),
        path: sheet_dir(name).join(format!("{SHEET_MODULE}.rs")),
    }
}

pub fn registry(category: Category) -> Location {
    Location {
        module: ModulePath::new([REGISTRY_MODULE, category.as_str()]),
        path: PathBuf::from(REGISTRY_MODULE).join(format!("{}.rs", category.as_str())),
    }
}

fn sheet_dir(name: &str) -> PathBuf {
    PathBuf::from(SHEETS_MODULE).join(kebab_case(&module_identifier(name)))
}

/// Module name and file stem of a block; steers clear of `mod.rs` and the
/// sheet's own `sheet.rs`.
fn block_module(label: &str) -> (String, String) {
    let mut module = module_identifier(label);
    if RESERVED_MODULE_NAMES.contains(&module.trim_end_matches('_')) {
        module = format!("{}_block", module.trim_end_matches('_'));
    }
    let stem = kebab_case(&module);
    (module, stem)
}
