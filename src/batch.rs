//! Batch front-ends: one input format per run, a file or a whole directory
//! tree in, a mirrored tree of generated modules out.
//!
//! Each input file gets its own output directory (`<relative dir>/<stem>/`)
//! and its own generation run. A failing file is logged and recorded; the
//! run itself only fails when the input or output root is unusable.

use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::grid::load_workbook;
use crate::jq_exec::run_jaq;
use crate::pipeline::{self, GenerateOptions};

/// IR written next to the generated modules with `emit_ir`.
pub const IR_FILE: &str = "schema.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// IR documents.
    Schema,
    /// Spreadsheet grids (CSV or JSON grid documents).
    Tabular,
    /// Example data (JSON or NDJSON).
    Infer,
}

impl Format {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Schema => &["json"],
            Format::Tabular => &["csv", "json"],
            Format::Infer => &["json", "ndjson"],
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Schema => "schema",
            Format::Tabular => "tabular",
            Format::Infer => "infer",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub generate: GenerateOptions,
    /// Also write the (deduplicated) IR as `schema.json`.
    pub emit_ir: bool,
    /// Infer only: jq filter applied to every example document.
    pub jq_expr: Option<String>,
    /// Infer only: JSON pointer selecting the example inside each document.
    pub json_pointer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub artifacts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub input: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub generated: Vec<FileOutcome>,
    pub failed: Vec<FileFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub fn run(format: Format, input: &Path, output: &Path, options: &BatchOptions) -> Result<BatchReport> {
    let files = collect_inputs(format, input)?;
    if output.exists() && !output.is_dir() {
        return Err(root_error(output, "exists and is not a directory"));
    }
    std::fs::create_dir_all(output).map_err(|e| root_error(output, e.to_string()))?;

    info!(
        event = "batch_started",
        format = %format,
        input = %input.display(),
        output = %output.display(),
        files = files.len(),
    );

    let results: Vec<(PathBuf, PathBuf, Result<usize>)> = files
        .par_iter()
        .map(|(file, relative)| {
            let out_dir = output.join(relative);
            let result = process_file(format, file, &out_dir, options);
            (file.clone(), out_dir, result)
        })
        .collect();

    let mut report = BatchReport::default();
    for (input, output, result) in results {
        match result {
            Ok(artifacts) => {
                info!(event = "file_generated", input = %input.display(), output = %output.display(), artifacts);
                report.generated.push(FileOutcome { input, output, artifacts });
            }
            Err(err) => {
                error!(event = "file_failed", input = %input.display(), error = %err);
                report.failed.push(FileFailure {
                    input,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        event = "batch_finished",
        generated = report.generated.len(),
        failed = report.failed.len(),
    );
    Ok(report)
}

/// Input files with the output directory each one maps to, relative to the
/// output root. Sorted, so runs are reproducible.
pub fn collect_inputs(format: Format, input: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    if input.is_file() {
        return Ok(vec![(input.to_path_buf(), stem_of(input))]);
    }
    if !input.is_dir() {
        return Err(root_error(input, "no such file or directory"));
    }

    let base = glob::Pattern::escape(&input.to_string_lossy());
    let mut files = Vec::new();
    for ext in format.extensions() {
        let pattern = format!("{base}/**/*.{ext}");
        let entries = glob::glob(&pattern).map_err(|e| root_error(input, e.to_string()))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(err) => warn!(event = "input_skipped", path = %err.path().display(), error = %err),
            }
        }
    }
    files.sort();
    files.dedup();

    Ok(files
        .into_iter()
        .map(|file| {
            let parent = file
                .parent()
                .and_then(|p| p.strip_prefix(input).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let relative = parent.join(stem_of(&file));
            (file, relative)
        })
        .collect())
}

fn stem_of(path: &Path) -> PathBuf {
    PathBuf::from(path.file_stem().unwrap_or(path.as_os_str()))
}

fn root_error(path: &Path, message: impl Into<String>) -> Error {
    Error::BatchRoot {
        path: path.display().to_string(),
        message: message.into(),
    }
}

fn process_file(format: Format, path: &Path, out_dir: &Path, options: &BatchOptions) -> Result<usize> {
    let generation = match format {
        Format::Schema => pipeline::generate(&pipeline::load_schema(path)?, &options.generate)?,
        Format::Tabular => pipeline::generate(&pipeline::from_tabular(&load_workbook(path)?), &options.generate)?,
        Format::Infer => pipeline::from_instances(&load_examples(path, options)?)?.generate(&options.generate)?,
    };
    pipeline::write_artifacts(out_dir, &generation.artifacts)?;
    if options.emit_ir {
        std::fs::write(out_dir.join(IR_FILE), serde_json::to_string_pretty(&generation.ir)?)?;
    }
    Ok(generation.artifacts.len())
}

/// Example documents of one file after the pointer and jq filters.
pub fn load_examples(path: &Path, options: &BatchOptions) -> Result<Vec<Value>> {
    let source = std::fs::read_to_string(path)?;
    let is_ndjson = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("ndjson"));
    let documents: Vec<Value> = if is_ndjson {
        source
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(crate::path_de::from_str_with_path)
            .collect::<Result<_>>()?
    } else {
        vec![crate::path_de::from_str_with_path(&source)?]
    };

    let mut examples = Vec::new();
    for document in documents {
        let selected = match options.json_pointer.as_deref() {
            Some(pointer) => document.pointer(pointer).cloned().ok_or_else(|| Error::Document {
                path: pointer.to_string(),
                message: "json pointer selects nothing".to_string(),
            })?,
            None => document,
        };
        match options.jq_expr.as_deref() {
            Some(expr) => examples.extend(run_jaq(expr, &selected)?),
            None => examples.push(selected),
        }
    }
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directory_inputs_are_mirrored() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("top.json"), "{}").unwrap();
        std::fs::write(nested.join("deep.ndjson"), "{}").unwrap();
        std::fs::write(nested.join("skip.txt"), "").unwrap();

        let files = collect_inputs(Format::Infer, dir.path()).unwrap();
        let relative: Vec<_> = files.iter().map(|(_, r)| r.clone()).collect();
        assert_eq!(relative, vec![PathBuf::from("a/b/deep"), PathBuf::from("top")]);
    }

    #[test]
    fn missing_roots_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            Format::Schema,
            &dir.path().join("nope"),
            &dir.path().join("out"),
            &BatchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::BatchRoot { .. }));

        let input = dir.path().join("in.json");
        std::fs::write(&input, "{}").unwrap();
        let blocked = dir.path().join("file");
        std::fs::write(&blocked, "").unwrap();
        let err = run(Format::Schema, &input, &blocked, &BatchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BatchRoot { .. }));
    }

    #[test]
    fn examples_go_through_pointer_then_jq() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.ndjson");
        std::fs::write(
            &path,
            "{\"payload\": {\"blocks\": [1, 2]}}\n\n{\"payload\": {\"blocks\": [3]}}\n",
        )
        .unwrap();
        let options = BatchOptions {
            json_pointer: Some("/payload".into()),
            jq_expr: Some(".blocks[]".into()),
            ..BatchOptions::default()
        };
        let examples = load_examples(&path, &options).unwrap();
        assert_eq!(examples, vec![json!(1), json!(2), json!(3)]);
    }
}
