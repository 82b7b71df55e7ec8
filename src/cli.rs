//! CLI: (schema | tabular | infer) → generated modules
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::batch::{self, BatchOptions, BatchReport, Format};
use crate::pipeline::GenerateOptions;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate typed workbook/sheet/block classes from a schema, a spreadsheet or example data
#[derive(Parser, Debug)]
#[command(name = "sheetschema", version)]
pub struct CommandLineInterface {
    /// log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate from schema-shaped IR documents (.json)
    Schema(SchemaOut),
    /// generate from spreadsheet grids (.csv, or .json grid documents)
    Tabular(TabularOut),
    /// infer a schema from example data (.json, .ndjson) and generate from it
    Infer(InferOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs: files, directories (walked recursively) or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// output root; every input gets a mirrored sub-directory
    #[arg(short, long)]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct GenerateSettings {
    /// hoist structurally identical blocks into shared definitions
    #[arg(long, default_value_t = false)]
    dedup: bool,

    /// inline existing definitions before generating
    #[arg(long, default_value_t = false)]
    inline: bool,

    /// always append the fingerprint hash to shared definition names
    #[arg(long, default_value_t = false)]
    hash_suffix: bool,

    /// also write the final IR as schema.json next to the generated modules
    #[arg(long, default_value_t = false)]
    emit_ir: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,
    #[command(flatten)]
    generate_settings: GenerateSettings,
}

#[derive(clap::Parser, Debug)]
struct TabularOut {
    #[command(flatten)]
    input_settings: InputSettings,
    #[command(flatten)]
    generate_settings: GenerateSettings,
}

#[derive(clap::Parser, Debug)]
struct InferOut {
    #[command(flatten)]
    input_settings: InputSettings,
    #[command(flatten)]
    generate_settings: GenerateSettings,

    /// JSON Pointer to select a subnode in each document (e.g. /data/workbook)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl GenerateSettings {
    fn options(&self) -> BatchOptions {
        BatchOptions {
            generate: GenerateOptions {
                dedup: self.dedup,
                inline: self.inline,
                hash_suffix: self.hash_suffix,
            },
            emit_ir: self.emit_ir,
            ..BatchOptions::default()
        }
    }
}

impl InputSettings {
    fn run(&self, format: Format, options: &BatchOptions) -> Result<bool> {
        let inputs = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let several = inputs.len() > 1;
        let mut clean = true;
        for input in inputs {
            // several directory roots are kept apart under the output root
            let out = match input.file_name() {
                Some(name) if several && input.is_dir() => self.out.join(name),
                _ => self.out.clone(),
            };
            let report = batch::run(format, &input, &out, options)
                .with_context(|| format!("{format} run over {} failed", input.display()))?;
            print_report(&report);
            clean &= report.is_clean();
        }
        Ok(clean)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Run the selected subcommand. Per-file failures are reported, not
    /// raised; they turn into a non-zero exit at the end.
    pub fn run(&self) -> Result<()> {
        let clean = match &self.cmd {
            Command::Schema(target) => {
                let options = target.generate_settings.options();
                target.input_settings.run(Format::Schema, &options)?
            }
            Command::Tabular(target) => {
                let options = target.generate_settings.options();
                target.input_settings.run(Format::Tabular, &options)?
            }
            Command::Infer(target) => {
                let options = BatchOptions {
                    jq_expr: target.jq_expr.clone(),
                    json_pointer: target.json_pointer.clone(),
                    ..target.generate_settings.options()
                };
                target.input_settings.run(Format::Infer, &options)?
            }
        };
        if !clean {
            bail!("some inputs failed to generate");
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn print_report(report: &BatchReport) {
    for done in &report.generated {
        eprintln!(
            "{} {} → {} ({} files)",
            "✓".green(),
            done.input.display(),
            done.output.display(),
            done.artifacts
        );
    }
    for failed in &report.failed {
        eprintln!("{} {}: {}", "✗".red(), failed.input.display(), failed.error);
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
