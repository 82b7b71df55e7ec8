//! Identifier derivation.
//!
//! Every name in the emitted tree is derived here. The functions are total
//! and stateless: the same label always yields the same identifier. Collision
//! handling is driven by the rule tables below rather than ad hoc checks.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

// ------------------------------- Rule tables ------------------------------- //

/// Type names that would shadow something the emitted modules rely on.
pub const RESERVED_TYPE_NAMES: &[&str] = &[
    "Self", "Option", "Result", "Some", "None", "Ok", "Err", "String", "Vec", "Box",
    "Default", "Value", "Map", "Entry", "Entity", "Serialize", "Deserialize",
];

/// Words that cannot be used as plain field or module identifiers.
pub const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait",
    "true", "try", "type", "unsafe", "use", "where", "while", "abstract", "become", "box",
    "do", "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield",
];

/// Block module names that would clash with files every sheet directory
/// already has (`mod.rs`, `sheet.rs`).
pub const RESERVED_MODULE_NAMES: &[&str] = &["mod", "sheet"];

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("separator pattern is valid"));

/// The kind of class an identifier names. Doubles as the registry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Workbook,
    Sheet,
    Table,
    List,
    Row,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Workbook,
        Category::Sheet,
        Category::Table,
        Category::List,
        Category::Row,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Workbook => "workbook",
            Category::Sheet => "sheet",
            Category::Table => "table",
            Category::List => "list",
            Category::Row => "row",
        }
    }

    /// Appended to type names that are empty or reserved.
    pub fn suffix(self) -> &'static str {
        match self {
            Category::Workbook => "Workbook",
            Category::Sheet => "Sheet",
            Category::Table => "Table",
            Category::List => "List",
            Category::Row => "Row",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------------------------- Case helpers ------------------------------ //

/// Split a label into words on separators and case boundaries.
///
/// `"employeeTable"`, `"employee_table"` and `"Employee Table"` all give
/// `["employee", "Table"]`-shaped splits; acronyms stay together
/// (`"HTTPServer"` → `["HTTP", "Server"]`), digits stick to the word before.
pub fn split_words(label: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in SEPARATORS.split(label).filter(|c| !c.is_empty()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut start = 0;
        for i in 1..chars.len() {
            let prev = chars[i - 1];
            let cur = chars[i];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            let boundary = (cur.is_uppercase() && (prev.is_lowercase() || prev.is_numeric()))
                || (cur.is_uppercase() && prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(chars[start..i].iter().collect());
                start = i;
            }
        }
        words.push(chars[start..].iter().collect());
    }
    words
}

/// Upper-case the first character, leave the rest alone.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn camel_case(label: &str) -> String {
    let mut out = String::new();
    for (i, word) in split_words(label).iter().enumerate() {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            out.push_str(&capitalize(&lower));
        }
    }
    out
}

pub fn pascal_case(label: &str) -> String {
    capitalize(&camel_case(label))
}

/// Lower-case words joined by `-`; used for file and directory names.
pub fn kebab_case(label: &str) -> String {
    join_lower(label, "-")
}

pub fn snake_case(label: &str) -> String {
    join_lower(label, "_")
}

fn join_lower(label: &str, sep: &str) -> String {
    split_words(label)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(sep)
}

// ------------------------------ Sanitization ------------------------------- //

/// Type name for a class of the given category.
///
/// Empty or reserved names get the category suffix; names that would start
/// with a digit get it as a prefix instead.
pub fn sanitize_identifier(label: &str, category: Category) -> String {
    let name = pascal_case(label);
    if name.is_empty() || RESERVED_TYPE_NAMES.contains(&name.as_str()) {
        return format!("{name}{}", category.suffix());
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("{}{name}", category.suffix());
    }
    name
}

/// Plain accessor/field identifier: snake case, `_` before a leading digit,
/// trailing `_` after a keyword.
pub fn field_identifier(label: &str) -> String {
    rust_identifier(label, "field")
}

/// Module name for an emitted file; same rules as [`field_identifier`].
pub fn module_identifier(label: &str) -> String {
    rust_identifier(label, "module")
}

/// `prefix_<snake label>`, e.g. `add_street_name`. The prefix already makes
/// the identifier valid, so no digit or keyword fix-up is needed.
pub fn accessor_name(prefix: &str, label: &str) -> String {
    let snake = snake_case(label);
    if snake.is_empty() {
        format!("{prefix}_field")
    } else {
        format!("{prefix}_{snake}")
    }
}

fn rust_identifier(label: &str, fallback: &str) -> String {
    let snake = snake_case(label);
    if snake.is_empty() {
        return fallback.to_string();
    }
    if snake.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("_{snake}");
    }
    if RUST_KEYWORDS.contains(&snake.as_str()) {
        return format!("{snake}_");
    }
    snake
}
