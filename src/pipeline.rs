//! One generation run, end to end.
//!
//! Front-ends produce an IR ([`from_tabular`], [`from_instances`], or a
//! document loaded with [`load_schema`]); [`generate`] turns it into
//! artifacts. Inferred IR comes wrapped in an [`InferredSource`], which
//! always hash-suffixes shared definition names. Every run builds its own [`RunContext`], so runs never share
//! registries.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::codegen::modules::synthesize_indexes;
use crate::codegen::registry::{synthesize_registries, RunContext};
use crate::codegen::{self, Artifact};
use crate::dedup::{deduplicate, inline_definitions, DedupOptions, DedupReport};
use crate::error::Result;
use crate::grid::WorkbookGrid;
use crate::inference::infer_workbook;
use crate::schema::SchemaNode;
use crate::synth::synthesize_workbook;
use crate::tabular::extract_workbook;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Hoist repeated blocks into `definitions` before emitting.
    pub dedup: bool,
    /// Substitute existing `definitions` back in first, so every block is
    /// emitted sheet-local unless `dedup` hoists it again.
    pub inline: bool,
    /// Always suffix shared definition names with the fingerprint hash.
    pub hash_suffix: bool,
}

#[derive(Debug, Clone)]
pub struct Generation {
    /// The IR the artifacts were generated from, after inlining and dedup.
    pub ir: SchemaNode,
    pub dedup: DedupReport,
    /// Classes, runtime, registries and module indexes.
    pub artifacts: Vec<Artifact>,
}

pub fn generate(root: &SchemaNode, options: &GenerateOptions) -> Result<Generation> {
    let mut ir = if options.inline {
        inline_definitions(root)?
    } else {
        root.clone()
    };
    let dedup = if options.dedup {
        let dedup_options = DedupOptions {
            hash_suffix: options.hash_suffix,
        };
        deduplicate(&mut ir, &dedup_options)?
    } else {
        DedupReport::default()
    };

    let mut ctx = RunContext::new();
    let mut artifacts = codegen::synthesize(&ir, &mut ctx)?;
    artifacts.extend(synthesize_registries(&ctx)?);
    let indexes = synthesize_indexes(&artifacts)?;
    artifacts.extend(indexes);

    info!(
        event = "generation_finished",
        workbook = ir.literal_name().unwrap_or_default(),
        classes = ctx.classes.len(),
        shared_blocks = ctx.common.iter().count(),
        artifacts = artifacts.len(),
    );
    Ok(Generation { ir, dedup, artifacts })
}

/// IR of a tabular workbook.
pub fn from_tabular(grid: &WorkbookGrid) -> SchemaNode {
    let model = extract_workbook(&grid.name, &grid.sheets);
    debug!(workbook = %model.name, sheets = model.sheets.len(), "tabular model extracted");
    synthesize_workbook(&model)
}

/// IR inferred from example documents.
///
/// Block names in example data are labels, not shape declarations: two
/// `address_list` blocks may disagree. Shared definitions of inferred IR
/// therefore always carry the fingerprint hash.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredSource {
    pub ir: SchemaNode,
}

impl InferredSource {
    pub fn generate(&self, options: &GenerateOptions) -> Result<Generation> {
        let options = GenerateOptions {
            hash_suffix: true,
            ..options.clone()
        };
        generate(&self.ir, &options)
    }
}

pub fn from_instances<'a, I>(values: I) -> Result<InferredSource>
where
    I: IntoIterator<Item = &'a Value>,
{
    let model = infer_workbook(values)?;
    debug!(workbook = %model.name, sheets = model.sheets.len(), "instance model inferred");
    Ok(InferredSource {
        ir: synthesize_workbook(&model),
    })
}

/// Read an IR document.
pub fn load_schema(path: &Path) -> Result<SchemaNode> {
    let bytes = std::fs::read(path)?;
    crate::path_de::from_slice_with_path(&bytes)
}

/// Write every artifact below `out`, creating directories as needed.
/// Existing files are overwritten.
pub fn write_artifacts(out: &Path, artifacts: &[Artifact]) -> Result<()> {
    for artifact in artifacts {
        let path = out.join(&artifact.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &artifact.source)?;
    }
    Ok(())
}
