//! Run-scoped bookkeeping and the per-category registries.
//!
//! [`RunContext`] is created for one generation run and threaded through the
//! code synthesizer; nothing here outlives the run.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::naming::Category;
use crate::pointer::parse_pointer;

use super::namespace::{self, Location, Namespace};
use super::writer::{lit, SourceWriter};
use super::Artifact;

const LOCAL_KEY_PREFIX: &str = "local:";
const ROW_SUFFIX: &str = "Row";

/// One emitted class as the registry sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredClass {
    pub type_name: String,
    /// Literal discriminator the class is tagged with.
    pub literal: String,
    /// Literal name of the sheet the class was reached from.
    pub sheet: Option<String>,
    /// Block identity: the `$ref` pointer for shared blocks, a sheet-local key
    /// otherwise. Rows carry their table's key. Unset for workbooks and sheets.
    pub block_key: Option<String>,
}

/// Append-only category → classes map.
#[derive(Debug, Clone, Default)]
pub struct ClassNameRegistry {
    classes: BTreeMap<Category, Vec<RegisteredClass>>,
}

impl ClassNameRegistry {
    pub fn register(&mut self, category: Category, class: RegisteredClass) {
        debug!(category = %category, class = %class.type_name, "class registered");
        self.classes.entry(category).or_default().push(class);
    }

    pub fn get(&self, category: Category) -> &[RegisteredClass] {
        self.classes.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn type_names(&self, category: Category) -> Vec<&str> {
        self.get(category).iter().map(|c| c.type_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Block keys reached through a `$ref` during the traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonBlockSet(BTreeSet<String>);

impl CommonBlockSet {
    /// Returns `true` the first time `key` is seen.
    pub fn insert(&mut self, key: &str) -> bool {
        self.0.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Everything one generation run accumulates.
#[derive(Debug, Default)]
pub struct RunContext {
    pub classes: ClassNameRegistry,
    pub common: CommonBlockSet,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Key of a block inlined in a sheet.
pub fn local_block_key(sheet: &str, block: &str) -> String {
    format!("{LOCAL_KEY_PREFIX}{sheet}/{block}")
}

/// Row type name of a table type.
pub fn row_type_name(table_type: &str) -> String {
    format!("{table_type}{ROW_SUFFIX}")
}

/// Label a shared block's module and type are derived from: the last
/// segment of its pointer.
pub fn shared_label(pointer: &str) -> Result<String> {
    parse_pointer(pointer)?
        .pop()
        .ok_or_else(|| Error::malformed(pointer, "reference to the document root is not a block"))
}

/// Re-derive where a registered class lives.
fn locate(ctx: &RunContext, category: Category, class: &RegisteredClass) -> Result<Location> {
    let unregistered = || {
        Error::malformed(
            format!("registry/{category}/{}", class.type_name),
            "class was registered without its owning sheet or block",
        )
    };
    match category {
        Category::Workbook => Ok(namespace::workbook()),
        Category::Sheet => Ok(namespace::sheet(&class.literal)),
        Category::Table | Category::List => {
            let key = class.block_key.as_deref().ok_or_else(unregistered)?;
            if ctx.common.contains(key) {
                Ok(Namespace::Shared.block(&shared_label(key)?))
            } else {
                let sheet = class.sheet.as_deref().ok_or_else(unregistered)?;
                Ok(Namespace::Sheet(sheet.to_string()).block(&class.literal))
            }
        }
        Category::Row => {
            let table_type = class
                .type_name
                .strip_suffix(ROW_SUFFIX)
                .ok_or_else(unregistered)?;
            let owner = ctx
                .classes
                .get(Category::Table)
                .iter()
                .find(|t| t.type_name == table_type && t.block_key == class.block_key)
                .ok_or_else(unregistered)?;
            locate(ctx, Category::Table, owner)
        }
    }
}

/// One registry artifact per category, listing every class of the run.
pub fn synthesize_registries(ctx: &RunContext) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for category in Category::ALL {
        let location = namespace::registry(category);
        let mut entries = Vec::new();
        for class in ctx.classes.get(category) {
            let module = locate(ctx, category, class)?.module;
            entries.push((class.literal.clone(), class.type_name.clone(), module.to_string()));
        }

        let mut w = SourceWriter::with_banner(&format!("Registry of every `{category}` class."));
        w.line(format!("pub const CATEGORY: &str = {};", lit(category.as_str())));
        w.blank();
        w.line("/// `(literal name, type name, module path)` of every class in this category.");
        if entries.is_empty() {
            w.line("pub const CLASSES: &[(&str, &str, &str)] = &[];");
        } else {
            w.line("pub const CLASSES: &[(&str, &str, &str)] = &[");
            for (literal, type_name, module) in &entries {
                w.line(format!("    ({}, {}, {}),", lit(literal), lit(type_name), lit(module)));
            }
            w.line("];");
        }

        debug!(category = %category, classes = entries.len(), "registry synthesized");
        artifacts.push(Artifact {
            path: location.path,
            module: location.module,
            classes: Vec::new(),
            source: w.into_string(),
        });
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(type_name: &str, literal: &str, sheet: &str, key: Option<String>) -> RegisteredClass {
        RegisteredClass {
            type_name: type_name.into(),
            literal: literal.into(),
            sheet: Some(sheet.into()),
            block_key: key,
        }
    }

    #[test]
    fn registries_are_run_scoped_and_append_only() {
        let mut a = RunContext::new();
        let b = RunContext::new();
        a.classes.register(Category::Sheet, class("S", "s", "s", None));
        a.classes.register(Category::Sheet, class("T", "t", "t", None));
        assert_eq!(a.classes.type_names(Category::Sheet), vec!["S", "T"]);
        assert!(b.classes.is_empty());
    }

    #[test]
    fn namespaces_follow_the_common_block_set() {
        let mut ctx = RunContext::new();
        let shared = "#/definitions/address_list".to_string();
        ctx.common.insert(&shared);
        ctx.classes.register(Category::List, class("AddressList", "address_list", "one", Some(shared)));
        ctx.classes.register(
            Category::List,
            class("AddressList", "address_list", "three", Some(local_block_key("three", "address_list"))),
        );
        let table_key = local_block_key("one", "employee_table");
        ctx.classes.register(
            Category::Table,
            class("EmployeeTable", "employee_table", "one", Some(table_key.clone())),
        );
        ctx.classes.register(Category::Row, class("EmployeeTableRow", "employee_table", "one", Some(table_key)));

        let registries = synthesize_registries(&ctx).unwrap();
        assert_eq!(registries.len(), Category::ALL.len());
        let list = registries.iter().find(|a| a.module.to_string() == "registry::list").unwrap();
        assert!(list.source.contains(r#"pub const CATEGORY: &str = "list";"#));
        assert!(list.source.contains(r#"("address_list", "AddressList", "shared::address_list"),"#));
        assert!(list.source.contains(r#"("address_list", "AddressList", "sheets::three::address_list"),"#));
        let row = registries.iter().find(|a| a.module.to_string() == "registry::row").unwrap();
        assert!(row.source.contains(r#"("employee_table", "EmployeeTableRow", "sheets::one::employee_table"),"#));
        let workbook = registries.iter().find(|a| a.module.to_string() == "registry::workbook").unwrap();
        assert!(workbook.source.contains("pub const CLASSES: &[(&str, &str, &str)] = &[];"));
    }

    #[test]
    fn orphan_rows_are_reported() {
        let mut ctx = RunContext::new();
        ctx.classes.register(Category::Row, class("GhostRow", "ghost", "s", Some(local_block_key("s", "ghost"))));
        assert!(matches!(
            synthesize_registries(&ctx),
            Err(Error::MalformedSchema { .. })
        ));
    }
}
