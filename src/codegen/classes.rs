//! Source renderers, one per class shape.
//!
//! Renderers only format; every name they print was derived by the walker in
//! [`super`] through [`crate::naming`]. Items from other generated modules are
//! written as full relative paths so no `use` list can collide with a
//! generated type name.

use std::collections::BTreeSet;

use crate::naming::{accessor_name, field_identifier, Category};

use super::namespace::{self, ModulePath};
use super::writer::{lit, SourceWriter};
use super::ClassInfo;

const DERIVE: &str = "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]";
const DERIVE_DEFAULT: &str = "#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]";

/// Child variant of a container.
#[derive(Debug, Clone)]
pub struct Child {
    pub literal: String,
    pub type_name: String,
    pub module: ModulePath,
}

/// Workbook or sheet.
#[derive(Debug, Clone)]
pub struct Container {
    pub category: Category,
    pub literal: String,
    pub type_name: String,
    pub module: ModulePath,
    /// `sheets` or `blocks`.
    pub children_key: String,
    pub children: Vec<Child>,
}

/// Table or list.
#[derive(Debug, Clone)]
pub struct Block {
    pub category: Category,
    pub literal: String,
    pub type_name: String,
    pub module: ModulePath,
    /// Header names for tables, entry names for lists; declaration order.
    pub fields: Vec<String>,
}

/// Appends `_2`, `_3`, … until `base` is unused.
fn unique(base: String, used: &mut BTreeSet<String>) -> String {
    let mut name = base.clone();
    let mut n = 2;
    while used.contains(&name) {
        name = format!("{base}_{n}");
        n += 1;
    }
    used.insert(name.clone());
    name
}

fn runtime_item(from: &ModulePath, item: &str) -> String {
    namespace::runtime().module.item_path_from(from, item)
}

pub fn runtime() -> String {
    let mut w = SourceWriter::with_banner("Types every generated class builds on.");
    w.line("use serde::{Deserialize, Serialize};");
    w.line("use serde_json::{Map, Value};");
    w.blank();
    w.line("/// Tag carried by every block under `@entity`.");
    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]");
    w.block("pub enum Entity", |w| {
        w.line("#[serde(rename = \"list\")]");
        w.line("List,");
        w.line("#[serde(rename = \"table\")]");
        w.line("Table,");
    });
    w.blank();
    w.line("/// One name/value entry of a list block.");
    w.line("pub type Entry = Map<String, Value>;");
    w.blank();
    w.block("pub fn entry(name: &str, value: Value) -> Entry", |w| {
        w.line("let mut entry = Entry::new();");
        w.line("entry.insert(name.to_string(), value);");
        w.line("entry");
    });
    w.blank();
    w.line("/// Latest value recorded under `name`.");
    w.block("pub fn find_entry<'a>(items: &'a [Entry], name: &str) -> Option<&'a Value>", |w| {
        w.line("items.iter().rev().find_map(|entry| entry.get(name))");
    });
    w.blank();
    w.line("/// Store `value` at column `index`, padding missing columns with null.");
    w.block("pub fn put(row: &mut Vec<Value>, index: usize, value: Value)", |w| {
        w.block("if row.len() <= index", |w| {
            w.line("row.resize(index + 1, Value::Null);");
        });
        w.line("row[index] = value;");
    });
    w.into_string()
}

pub fn container(shape: &Container) -> (String, ClassInfo) {
    let is_workbook = shape.category == Category::Workbook;
    let variant_enum = format!("{}{}", shape.type_name, if is_workbook { "Sheet" } else { "Block" });
    let children_key = field_identifier(&shape.children_key);

    let mut variants = BTreeSet::new();
    let mut methods = BTreeSet::from([children_key.clone()]);
    let children: Vec<(String, String, String, String, &Child)> = shape
        .children
        .iter()
        .map(|child| {
            let variant = unique(child.type_name.clone(), &mut variants);
            let path = child.module.item_path_from(&shape.module, &child.type_name);
            let add = unique(accessor_name("add", &child.literal), &mut methods);
            let get = unique(accessor_name("get", &child.literal), &mut methods);
            (variant, path, add, get, child)
        })
        .collect();

    let summary = format!("`{}` {}.", shape.literal, shape.category);
    let mut w = SourceWriter::with_banner(&summary);
    w.line("use serde::{Deserialize, Serialize};");
    w.blank();

    w.line(format!("/// Children of [`{}`], discriminated by their literal `name`.", shape.type_name));
    w.line(DERIVE);
    w.line("#[serde(tag = \"name\")]");
    w.block(format!("pub enum {variant_enum}"), |w| {
        for (variant, path, _, _, child) in &children {
            w.line(format!("#[serde(rename = {})]", lit(&child.literal)));
            w.line(format!("{variant}({path}),"));
        }
    });
    w.blank();

    w.line(if is_workbook { DERIVE } else { DERIVE_DEFAULT });
    w.block(format!("pub struct {}", shape.type_name), |w| {
        if is_workbook {
            w.line("pub name: String,");
        }
        if children_key != shape.children_key {
            w.line(format!("#[serde(rename = {})]", lit(&shape.children_key)));
        }
        w.line("#[serde(default)]");
        w.line(format!("pub {children_key}: Vec<{variant_enum}>,"));
    });
    w.blank();

    w.block(format!("impl {}", shape.type_name), |w| {
        w.line(format!("pub const NAME: &'static str = {};", lit(&shape.literal)));
        w.blank();
        w.line("/// Literal name → concrete type of every child variant.");
        if children.is_empty() {
            w.line("pub const SUBTYPES: &'static [(&'static str, &'static str)] = &[];");
        } else {
            w.line("pub const SUBTYPES: &'static [(&'static str, &'static str)] = &[");
            for (_, _, _, _, child) in &children {
                w.line(format!("    ({}, {}),", lit(&child.literal), lit(&child.type_name)));
            }
            w.line("];");
        }
        for (variant, path, add, get, _) in &children {
            w.blank();
            w.block(format!("pub fn {add}(&mut self, value: {path})"), |w| {
                w.line(format!("self.{children_key}.push({variant_enum}::{variant}(value));"));
            });
            w.blank();
            w.line("#[allow(unreachable_patterns)]");
            w.block(format!("pub fn {get}(&self) -> Option<&{path}>"), |w| {
                w.line(format!("self.{children_key}.iter().find_map(|child| match child {{"));
                w.line(format!("    {variant_enum}::{variant}(value) => Some(value),"));
                w.line("    _ => None,");
                w.line("})");
            });
        }
    });

    if is_workbook {
        w.blank();
        w.block(format!("impl Default for {}", shape.type_name), |w| {
            w.block("fn default() -> Self", |w| {
                w.block("Self", |w| {
                    w.line("name: Self::NAME.to_string(),");
                    w.line(format!("{children_key}: Vec::new(),"));
                });
            });
        });
    }

    let info = ClassInfo {
        category: shape.category,
        type_name: shape.type_name.clone(),
        literal: shape.literal.clone(),
        accessors: children.iter().flat_map(|(_, _, add, get, _)| [add.clone(), get.clone()]).collect(),
    };
    (w.into_string(), info)
}

/// Table class plus its positional row class.
pub fn table(shape: &Block, row_type: &str) -> (String, Vec<ClassInfo>) {
    let entity = runtime_item(&shape.module, "Entity");
    let put = runtime_item(&shape.module, "put");
    let width = shape.fields.len();

    let mut used = BTreeSet::new();
    let columns: Vec<(usize, String, String, &String)> = shape
        .fields
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let getter = unique(field_identifier(name), &mut used);
            let setter = unique(accessor_name("set", name), &mut used);
            (i, getter, setter, name)
        })
        .collect();

    let mut w = SourceWriter::with_banner(&format!("`{}` table.", shape.literal));
    w.line("use serde::{Deserialize, Serialize};");
    w.line("use serde_json::Value;");
    w.blank();
    w.line("/// Column names; position *i* is column *i* of every row.");
    let header: Vec<String> = shape.fields.iter().map(|f| lit(f)).collect();
    w.line(format!("pub const HEADER: [&str; {width}] = [{}];", header.join(", ")));
    w.blank();

    w.line(DERIVE);
    w.block(format!("pub struct {}", shape.type_name), |w| {
        w.line("#[serde(rename = \"@entity\")]");
        w.line(format!("pub entity: {entity},"));
        w.line("pub header: Vec<String>,");
        w.line("#[serde(default)]");
        w.line(format!("pub rows: Vec<{row_type}>,"));
    });
    w.blank();
    w.block(format!("impl {}", shape.type_name), |w| {
        w.line(format!("pub const NAME: &'static str = {};", lit(&shape.literal)));
        w.line(format!("pub const ENTITY: {entity} = {entity}::Table;"));
        w.blank();
        w.block(format!("pub fn add_row(&mut self, row: {row_type})"), |w| {
            w.line("self.rows.push(row);");
        });
    });
    w.blank();
    w.block(format!("impl Default for {}", shape.type_name), |w| {
        w.block("fn default() -> Self", |w| {
            w.block("Self", |w| {
                w.line("entity: Self::ENTITY,");
                w.line("header: HEADER.iter().map(|name| name.to_string()).collect(),");
                w.line("rows: Vec::new(),");
            });
        });
    });
    w.blank();

    w.line(format!("/// One row of [`{}`], indexed by header position.", shape.type_name));
    w.line(DERIVE_DEFAULT);
    w.line("#[serde(transparent)]");
    w.line(format!("pub struct {row_type}(pub Vec<Value>);"));
    w.blank();
    w.block(format!("impl {row_type}"), |w| {
        w.line(format!("pub const NAME: &'static str = {};", lit(&shape.literal)));
        for (i, getter, setter, name) in &columns {
            w.blank();
            w.line(format!("/// Column {i}, `{name}`."));
            w.block(format!("pub fn {getter}(&self) -> Option<&Value>"), |w| {
                w.line(format!("self.0.get({i})"));
            });
            w.blank();
            w.block(format!("pub fn {setter}(&mut self, value: Value)"), |w| {
                w.line(format!("{put}(&mut self.0, {i}, value);"));
            });
        }
    });

    let table = ClassInfo {
        category: Category::Table,
        type_name: shape.type_name.clone(),
        literal: shape.literal.clone(),
        accessors: vec!["add_row".to_string()],
    };
    let row = ClassInfo {
        category: Category::Row,
        type_name: row_type.to_string(),
        literal: shape.literal.clone(),
        accessors: columns
            .iter()
            .flat_map(|(_, getter, setter, _)| [getter.clone(), setter.clone()])
            .collect(),
    };
    (w.into_string(), vec![table, row])
}

pub fn list(shape: &Block) -> (String, ClassInfo) {
    let entity = runtime_item(&shape.module, "Entity");
    let entry_type = runtime_item(&shape.module, "Entry");
    let entry = runtime_item(&shape.module, "entry");
    let find_entry = runtime_item(&shape.module, "find_entry");

    let mut used = BTreeSet::new();
    let fields: Vec<(String, String, &String)> = shape
        .fields
        .iter()
        .map(|name| {
            let add = unique(accessor_name("add", name), &mut used);
            let get = unique(accessor_name("get", name), &mut used);
            (add, get, name)
        })
        .collect();

    let mut w = SourceWriter::with_banner(&format!("`{}` list.", shape.literal));
    w.line("use serde::{Deserialize, Serialize};");
    w.line("use serde_json::Value;");
    w.blank();

    w.line(DERIVE);
    w.block(format!("pub struct {}", shape.type_name), |w| {
        w.line("#[serde(rename = \"@entity\")]");
        w.line(format!("pub entity: {entity},"));
        w.line("#[serde(default)]");
        w.line(format!("pub items: Vec<{entry_type}>,"));
    });
    w.blank();
    w.block(format!("impl {}", shape.type_name), |w| {
        w.line(format!("pub const NAME: &'static str = {};", lit(&shape.literal)));
        w.line(format!("pub const ENTITY: {entity} = {entity}::List;"));
        w.line(format!(
            "pub const FIELDS: &'static [&'static str] = &[{}];",
            shape.fields.iter().map(|f| lit(f)).collect::<Vec<_>>().join(", ")
        ));
        for (add, get, name) in &fields {
            w.blank();
            w.block(format!("pub fn {add}(&mut self, value: Value)"), |w| {
                w.line(format!("self.items.push({entry}({}, value));", lit(name)));
            });
            w.blank();
            w.block(format!("pub fn {get}(&self) -> Option<&Value>"), |w| {
                w.line(format!("{find_entry}(&self.items, {})", lit(name)));
            });
        }
    });
    w.blank();
    w.block(format!("impl Default for {}", shape.type_name), |w| {
        w.block("fn default() -> Self", |w| {
            w.block("Self", |w| {
                w.line("entity: Self::ENTITY,");
                w.line("items: Vec::new(),");
            });
        });
    });

    let info = ClassInfo {
        category: Category::List,
        type_name: shape.type_name.clone(),
        literal: shape.literal.clone(),
        accessors: fields.iter().flat_map(|(add, get, _)| [add.clone(), get.clone()]).collect(),
    };
    (w.into_string(), info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::namespace::Namespace;

    fn block(category: Category, fields: &[&str]) -> Block {
        Block {
            category,
            literal: "employee_table".into(),
            type_name: "EmployeeTable".into(),
            module: Namespace::Sheet("employees".into()).block("employee_table").module,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn row_accessors_are_positional() {
        let (source, classes) = table(&block(Category::Table, &["id", "type", "id"]), "EmployeeTableRow");
        assert!(source.contains(r#"pub const HEADER: [&str; 3] = ["id", "type", "id"];"#));
        assert!(source.contains("pub entity: super::super::super::runtime::Entity,"));
        assert!(source.contains("pub fn type_(&self) -> Option<&Value> {\n        self.0.get(1)\n    }"));
        assert!(source.contains("super::super::super::runtime::put(&mut self.0, 2, value);"));
        assert_eq!(
            classes[1].accessors,
            vec!["id", "set_id", "type_", "set_type", "id_2", "set_id_2"]
        );
    }

    #[test]
    fn list_accessors_work_over_entries() {
        let mut shape = block(Category::List, &["street name", "zip"]);
        shape.type_name = "AddressList".into();
        let (source, info) = list(&shape);
        assert!(source.contains("pub items: Vec<super::super::super::runtime::Entry>,"));
        assert!(source.contains(r#"self.items.push(super::super::super::runtime::entry("street name", value));"#));
        assert_eq!(info.accessors, vec!["add_street_name", "get_street_name", "add_zip", "get_zip"]);
    }

    #[test]
    fn containers_list_their_subtypes() {
        let sheet = namespace::sheet("employees");
        let shape = Container {
            category: Category::Sheet,
            literal: "employees".into(),
            type_name: "Employees".into(),
            module: sheet.module,
            children_key: "blocks".into(),
            children: vec![Child {
                literal: "employee_table".into(),
                type_name: "EmployeeTable".into(),
                module: Namespace::Sheet("employees".into()).block("employee_table").module,
            }],
        };
        let (source, info) = container(&shape);
        assert!(source.contains("#[serde(tag = \"name\")]\npub enum EmployeesBlock {"));
        assert!(source.contains("EmployeeTable(super::employee_table::EmployeeTable),"));
        assert!(source.contains(r#"    ("employee_table", "EmployeeTable"),"#));
        assert!(source.contains("pub const NAME: &'static str = \"employees\";"));
        assert_eq!(info.accessors, vec!["add_employee_table", "get_employee_table"]);
    }
}
