//! `mod.rs` index files for the emitted tree.
//!
//! Module names are snake case but files are kebab case, so each declaration
//! whose file name differs from the module name gets a `#[path]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::namespace::ModulePath;
use super::writer::SourceWriter;
use super::Artifact;

const INDEX_FILE: &str = "mod.rs";

#[derive(Debug, Default)]
struct Dir {
    /// Module name → (file or directory name, sub-directory if any).
    entries: BTreeMap<String, (String, Option<Dir>)>,
}

impl Dir {
    fn insert(&mut self, modules: &[String], files: &[String], at: &Path) -> Result<()> {
        let (Some((module, modules_rest)), Some((file, files_rest))) = (modules.split_first(), files.split_first())
        else {
            return Err(Error::malformed(at.display().to_string(), "module path and file path disagree"));
        };
        if modules_rest.is_empty() {
            self.entries.entry(module.clone()).or_insert_with(|| (file.clone(), None));
            return Ok(());
        }
        let (_, sub) = self
            .entries
            .entry(module.clone())
            .or_insert_with(|| (file.clone(), Some(Dir::default())));
        sub.get_or_insert_with(Dir::default).insert(modules_rest, files_rest, at)
    }

    fn emit(&self, module: ModulePath, dir: PathBuf, out: &mut Vec<Artifact>) {
        let summary = match module.segments().last() {
            Some(name) => format!("`{name}` modules."),
            None => "Generated classes.".to_string(),
        };
        let mut w = SourceWriter::with_banner(&summary);
        for (name, (file, sub)) in &self.entries {
            let target = match sub {
                Some(_) => format!("{file}/{INDEX_FILE}"),
                None => file.clone(),
            };
            let natural = match sub {
                Some(_) => format!("{name}/{INDEX_FILE}"),
                None => format!("{name}.rs"),
            };
            if target != natural {
                w.line(format!("#[path = \"{target}\"]"));
            }
            w.line(format!("pub mod {name};"));
        }
        out.push(Artifact {
            path: dir.join(INDEX_FILE),
            module: module.clone(),
            classes: Vec::new(),
            source: w.into_string(),
        });

        for (name, (file, sub)) in &self.entries {
            if let Some(sub) = sub {
                let mut segments = module.segments().to_vec();
                segments.push(name.clone());
                sub.emit(ModulePath::new(segments), dir.join(file), out);
            }
        }
    }
}

/// One `mod.rs` per directory of `artifacts`, root first.
pub fn synthesize_indexes(artifacts: &[Artifact]) -> Result<Vec<Artifact>> {
    let mut root = Dir::default();
    for artifact in artifacts {
        let files: Vec<String> = artifact
            .path
            .iter()
            .map(|part| part.to_string_lossy().into_owned())
            .collect();
        if files.len() != artifact.module.segments().len() {
            return Err(Error::malformed(
                artifact.path.display().to_string(),
                "module path and file path disagree",
            ));
        }
        root.insert(artifact.module.segments(), &files, &artifact.path)?;
    }
    let mut out = Vec::new();
    root.emit(ModulePath::default(), PathBuf::new(), &mut out);
    Ok(out)
}
