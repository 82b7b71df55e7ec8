//! IR → Rust source for the serde-based consuming runtime.
//!
//! The walker goes workbook → sheets → blocks, resolving every slot through
//! [`crate::pointer::resolve`]. Blocks reached through a `$ref` are recorded
//! in the run's [`CommonBlockSet`](registry::CommonBlockSet) and emitted once
//! into the shared namespace; every other block is emitted next to its sheet.
//! Every class is registered so [`registry::synthesize_registries`] can list
//! it afterwards.

pub mod classes;
pub mod modules;
pub mod namespace;
pub mod registry;
pub mod writer;

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::BlockKind;
use crate::naming::{sanitize_identifier, Category};
use crate::pointer::resolve;
use crate::schema::SchemaNode;
use crate::synth::{BLOCKS_KEY, ENTITY_KEY, HEADER_KEY, ITEMS_KEY, NAME_KEY, ROWS_KEY, SHEETS_KEY};

use self::classes::{Block, Child, Container};
use self::namespace::{Location, ModulePath, Namespace};
use self::registry::{local_block_key, row_type_name, shared_label, RegisteredClass, RunContext};

/// One emitted file.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Relative to the output root.
    pub path: PathBuf,
    pub module: ModulePath,
    /// Classes defined in the file; empty for support files.
    pub classes: Vec<ClassInfo>,
    pub source: String,
}

/// What one emitted class looks like from the outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub category: Category,
    pub type_name: String,
    pub literal: String,
    /// Accessor methods in emission order.
    pub accessors: Vec<String>,
}

/// Emit the runtime support file plus one artifact per class reachable from
/// `root`, registering each class in `ctx`.
pub fn synthesize(root: &SchemaNode, ctx: &mut RunContext) -> Result<Vec<Artifact>> {
    let mut walker = Walker {
        root,
        ctx,
        artifacts: Vec::new(),
        paths: BTreeSet::new(),
    };
    let location = namespace::runtime();
    walker.push(location, Vec::new(), classes::runtime())?;
    walker.workbook()?;
    Ok(walker.artifacts)
}

struct Walker<'a> {
    root: &'a SchemaNode,
    ctx: &'a mut RunContext,
    artifacts: Vec<Artifact>,
    paths: BTreeSet<PathBuf>,
}

impl Walker<'_> {
    fn push(&mut self, location: Location, classes: Vec<ClassInfo>, source: String) -> Result<()> {
        if !self.paths.insert(location.path.clone()) {
            return Err(Error::malformed(
                location.module.to_string(),
                format!("two classes map to the same file {}", location.path.display()),
            ));
        }
        debug!(path = %location.path.display(), "artifact synthesized");
        self.artifacts.push(Artifact {
            path: location.path,
            module: location.module,
            classes,
            source,
        });
        Ok(())
    }

    fn register(&mut self, info: &ClassInfo, sheet: Option<&str>, block_key: Option<&str>) {
        self.ctx.classes.register(
            info.category,
            RegisteredClass {
                type_name: info.type_name.clone(),
                literal: info.literal.clone(),
                sheet: sheet.map(str::to_string),
                block_key: block_key.map(str::to_string),
            },
        );
    }

    fn workbook(&mut self) -> Result<()> {
        let root = self.root;
        let resolved = resolve(root, root)?;
        let node: &SchemaNode = &resolved;
        let at = root.reference.clone().unwrap_or_else(|| "#".to_string());
        expect_object(node, &at)?;
        let literal = literal_name(node, &at)?;
        let sheets = alternation(node, &at, SHEETS_KEY)?;

        let mut children = Vec::with_capacity(sheets.len());
        for (i, slot) in sheets.iter().enumerate() {
            let at = format!("{at}/properties/{SHEETS_KEY}/items/oneOf/{i}");
            children.push(self.sheet(slot, at)?);
        }

        let location = namespace::workbook();
        let shape = Container {
            category: Category::Workbook,
            type_name: sanitize_identifier(&literal, Category::Workbook),
            literal,
            module: location.module.clone(),
            children_key: SHEETS_KEY.to_string(),
            children,
        };
        let (source, info) = classes::container(&shape);
        self.register(&info, None, None);
        self.push(location, vec![info], source)
    }

    fn sheet(&mut self, slot: &SchemaNode, at: String) -> Result<Child> {
        let resolved = resolve(slot, self.root)?;
        let node: &SchemaNode = &resolved;
        let at = slot.reference.clone().unwrap_or(at);
        expect_object(node, &at)?;
        let literal = literal_name(node, &at)?;
        let blocks = alternation(node, &at, BLOCKS_KEY)?;

        let mut children = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            let at = format!("{at}/properties/{BLOCKS_KEY}/items/oneOf/{i}");
            children.push(self.block(block, at, &literal)?);
        }

        let location = namespace::sheet(&literal);
        let shape = Container {
            category: Category::Sheet,
            type_name: sanitize_identifier(&literal, Category::Sheet),
            literal,
            module: location.module.clone(),
            children_key: BLOCKS_KEY.to_string(),
            children,
        };
        let (source, info) = classes::container(&shape);
        self.register(&info, Some(&shape.literal), None);
        self.push(location, vec![info], source)?;
        Ok(Child {
            literal: shape.literal,
            type_name: shape.type_name,
            module: shape.module,
        })
    }

    fn block(&mut self, slot: &SchemaNode, at: String, sheet: &str) -> Result<Child> {
        let resolved = resolve(slot, self.root)?;
        let node: &SchemaNode = &resolved;
        let (location, key, first_visit) = match &slot.reference {
            Some(pointer) => {
                let first = self.ctx.common.insert(pointer);
                (Namespace::Shared.block(&shared_label(pointer)?), pointer.clone(), first)
            }
            None => {
                let literal = literal_name(node, &at)?;
                let location = Namespace::Sheet(sheet.to_string()).block(&literal);
                (location, local_block_key(sheet, &literal), true)
            }
        };
        let at = slot.reference.clone().unwrap_or(at);
        expect_object(node, &at)?;

        let literal = literal_name(node, &at)?;
        let kind = node
            .entity_tag()
            .and_then(BlockKind::from_entity)
            .ok_or_else(|| Error::malformed(format!("{at}/properties/{ENTITY_KEY}/enum/0"), "missing `list` or `table` entity tag"))?;
        let category = match kind {
            BlockKind::Table => Category::Table,
            BlockKind::List => Category::List,
        };
        let type_name = sanitize_identifier(&literal, category);

        if first_visit {
            let fields = match kind {
                BlockKind::Table => table_header(node, &at)?,
                BlockKind::List => list_fields(node, &at)?,
            };
            let shape = Block {
                category,
                literal: literal.clone(),
                type_name: type_name.clone(),
                module: location.module.clone(),
                fields,
            };
            let (source, infos) = match kind {
                BlockKind::Table => classes::table(&shape, &row_type_name(&type_name)),
                BlockKind::List => {
                    let (source, info) = classes::list(&shape);
                    (source, vec![info])
                }
            };
            for info in &infos {
                self.register(info, Some(sheet), Some(&key));
            }
            self.push(location.clone(), infos, source)?;
        } else {
            debug!(block = %key, sheet, "shared block already emitted");
        }

        Ok(Child {
            literal,
            type_name,
            module: location.module,
        })
    }
}

fn expect_object(node: &SchemaNode, at: &str) -> Result<()> {
    match &node.type_ {
        Some(ty) if !ty.is("object") => Err(Error::malformed(format!("{at}/type"), "expected an object schema")),
        _ => Ok(()),
    }
}

fn literal_name(node: &SchemaNode, at: &str) -> Result<String> {
    node.literal_name()
        .map(str::to_string)
        .ok_or_else(|| Error::malformed(format!("{at}/properties/{NAME_KEY}/enum/0"), "missing literal name"))
}

fn alternation<'n>(node: &'n SchemaNode, at: &str, key: &str) -> Result<&'n Vec<SchemaNode>> {
    node.alternation(key)
        .ok_or_else(|| Error::malformed(format!("{at}/properties/{key}/items/oneOf"), "missing alternation"))
}

/// Header names in position order; the row tuple must be just as wide.
fn table_header(node: &SchemaNode, at: &str) -> Result<Vec<String>> {
    let header_at = format!("{at}/properties/{HEADER_KEY}/prefixItems");
    let header = node
        .property(HEADER_KEY)
        .and_then(|h| h.prefix_items.as_ref())
        .ok_or_else(|| Error::malformed(&header_at, "missing header tuple"))?;
    let names = header
        .iter()
        .enumerate()
        .map(|(i, column)| {
            column
                .first_literal()
                .map(str::to_string)
                .ok_or_else(|| Error::malformed(format!("{header_at}/{i}/enum/0"), "missing column name"))
        })
        .collect::<Result<Vec<_>>>()?;

    let row_at = format!("{at}/properties/{ROWS_KEY}/items/prefixItems");
    let row = node
        .property(ROWS_KEY)
        .and_then(|r| r.items.as_ref())
        .and_then(|item| item.prefix_items.as_ref())
        .ok_or_else(|| Error::malformed(&row_at, "missing row tuple"))?;
    if row.len() != names.len() {
        return Err(Error::malformed(
            row_at,
            format!("row tuple has {} columns but the header has {}", row.len(), names.len()),
        ));
    }
    Ok(names)
}

fn list_fields(node: &SchemaNode, at: &str) -> Result<Vec<String>> {
    let entry = node
        .property(ITEMS_KEY)
        .and_then(|items| items.items.as_ref())
        .ok_or_else(|| Error::malformed(format!("{at}/properties/{ITEMS_KEY}/items"), "missing entry schema"))?;
    Ok(entry.properties.keys().cloned().collect())
}
