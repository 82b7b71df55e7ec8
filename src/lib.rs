//! Typed workbook → sheet → block classes from a schema-shaped IR, a
//! spreadsheet grid or example data.
//!
//! ```text
//! spreadsheet grid ── tabular ───┐
//! example data ────── inference ─┴─ model ── synth ──▶ IR
//! IR document ──────────────────────────────────────▶ IR ── dedup ── codegen ──▶ artifacts
//! ```

pub mod batch;
pub mod cli;
pub mod codegen;
pub mod dedup;
pub mod error;
pub mod grid;
pub mod inference;
pub mod jq_exec;
pub mod model;
pub mod naming;
pub mod path_de;
pub mod pipeline;
pub mod pointer;
pub mod schema;
pub mod synth;
pub mod tabular;

pub use error::{Error, Result};
