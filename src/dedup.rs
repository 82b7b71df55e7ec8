//! Structural deduplication of block subtrees.
//!
//! Every block slot of every sheet alternation is fingerprinted (sorted-key
//! canonical JSON, arrays in order). A fingerprint seen more than once is
//! hoisted into `definitions` and each of its slots becomes a
//! `{"$ref": "#/definitions/<name>"}`. Slot order and alternation length
//! never change, and every slot still resolves to the same schema.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pointer::{resolve, to_pointer};
use crate::schema::SchemaNode;
use crate::synth::{BLOCKS_KEY, SHEETS_KEY};

const GENERIC_BLOCK_NAME: &str = "block";
const SHORT_HASH_LEN: usize = 8;

/// Order-independent serialization of a subtree; equal fingerprints mean
/// equal definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalFingerprint(String);

impl CanonicalFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First hex digits of the SHA-256 of the fingerprint.
    pub fn short_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(SHORT_HASH_LEN);
        hex
    }
}

impl fmt::Display for CanonicalFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recursively sort object keys; arrays keep their order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

pub fn fingerprint(node: &SchemaNode) -> Result<CanonicalFingerprint> {
    let value = serde_json::to_value(node)?;
    Ok(CanonicalFingerprint(serde_json::to_string(&canonicalize(&value))?))
}

#[derive(Debug, Clone, Default)]
pub struct DedupOptions {
    /// Always append the short fingerprint hash to definition names. Set for
    /// inferred input, where equal names do not imply equal shapes.
    pub hash_suffix: bool,
}

/// Position of a block slot: `(sheet index, block index)`.
pub type SlotRef = (usize, usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDefinition {
    pub name: String,
    pub pointer: String,
    pub slots: Vec<SlotRef>,
    /// False when an input definition already held this shape.
    pub added: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub shared: Vec<SharedDefinition>,
}

struct Group {
    hint: Option<String>,
    node: SchemaNode,
    slots: Vec<SlotRef>,
}

/// Hoist repeated block subtrees of `root` into `definitions`, in place.
pub fn deduplicate(root: &mut SchemaNode, options: &DedupOptions) -> Result<DedupReport> {
    let mut groups = IndexMap::<CanonicalFingerprint, Group>::new();

    let sheets = root
        .alternation(SHEETS_KEY)
        .ok_or_else(|| missing_alternation("#/properties/sheets/items/oneOf"))?;
    for (i, sheet) in sheets.iter().enumerate() {
        if sheet.is_reference() {
            debug!(sheet = i, "sheet slot is already a reference, not scanning its blocks");
            continue;
        }
        let blocks = sheet.alternation(BLOCKS_KEY).ok_or_else(|| {
            missing_alternation(format!(
                "#/properties/sheets/items/oneOf/{i}/properties/blocks/items/oneOf"
            ))
        })?;
        for (j, block) in blocks.iter().enumerate() {
            if block.is_reference() {
                continue;
            }
            let fp = fingerprint(block)?;
            groups
                .entry(fp)
                .or_insert_with(|| Group {
                    hint: block.literal_name().map(str::to_string),
                    node: block.clone(),
                    slots: Vec::new(),
                })
                .slots
                .push((i, j));
        }
    }

    let mut report = DedupReport::default();
    for (fp, group) in groups {
        if group.slots.len() < 2 {
            continue;
        }
        let name = definition_name(&root.definitions, &fp, &group, options)?;
        let pointer = to_pointer(["definitions", name.as_str()]);
        debug!(definition = %name, occurrences = group.slots.len(), "hoisting shared block");
        let added = !root.definitions.contains_key(&name);
        if added {
            root.definitions.insert(name.clone(), group.node);
        }
        report.shared.push(SharedDefinition {
            name,
            pointer,
            slots: group.slots,
            added,
        });
    }

    for shared in &report.shared {
        for &(i, j) in &shared.slots {
            let slot = block_slot_mut(root, i, j)?;
            *slot = SchemaNode::reference(shared.pointer.clone());
        }
    }

    info!(event = "dedup_finished", shared = report.shared.len());
    Ok(report)
}

/// Pick a definition name that is free (or already holds this very shape).
fn definition_name(
    existing: &IndexMap<String, SchemaNode>,
    fp: &CanonicalFingerprint,
    group: &Group,
    options: &DedupOptions,
) -> Result<String> {
    let hash = fp.short_hash();
    let base = match &group.hint {
        Some(name) if !options.hash_suffix => name.clone(),
        Some(name) => format!("{name}_{hash}"),
        None => format!("{GENERIC_BLOCK_NAME}_{hash}"),
    };
    let mut candidates = vec![base.clone()];
    if !base.ends_with(&hash) {
        candidates.push(format!("{base}_{hash}"));
    }
    for candidate in candidates {
        match existing.get(&candidate) {
            None => return Ok(candidate),
            Some(taken) if fingerprint(taken)? == *fp => return Ok(candidate),
            Some(_) => {}
        }
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{hash}_{n}");
        if !existing.contains_key(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn block_slot_mut(root: &mut SchemaNode, sheet: usize, block: usize) -> Result<&mut SchemaNode> {
    let path = format!("#/properties/sheets/items/oneOf/{sheet}/properties/blocks/items/oneOf/{block}");
    root.alternation_mut(SHEETS_KEY)
        .and_then(|sheets| sheets.get_mut(sheet))
        .and_then(|s| s.alternation_mut(BLOCKS_KEY))
        .and_then(|blocks| blocks.get_mut(block))
        .ok_or_else(|| missing_alternation(path))
}

fn missing_alternation(path: impl Into<String>) -> Error {
    Error::malformed(path, "missing alternation (`oneOf`)")
}

/// Exact inverse of [`deduplicate`] for the `report` it returned: the
/// rewritten slots get their subtree back and the definitions it added are
/// dropped. References and definitions the input already had are kept.
pub fn restore(root: &SchemaNode, report: &DedupReport) -> Result<SchemaNode> {
    let mut out = root.clone();
    for shared in &report.shared {
        let node = root
            .definitions
            .get(&shared.name)
            .ok_or_else(|| Error::UnresolvedPointer {
                pointer: shared.pointer.clone(),
                segment: shared.name.clone(),
            })?;
        for &(i, j) in &shared.slots {
            *block_slot_mut(&mut out, i, j)? = node.clone();
        }
    }
    for shared in report.shared.iter().filter(|s| s.added) {
        out.definitions.shift_remove(&shared.name);
    }
    Ok(out)
}

/// Inline everything: substitute every sheet- and block-level reference
/// with the node it points at, then drop definitions nothing refers to
/// anymore. Unlike [`restore`] this also inlines references the input had.
pub fn inline_definitions(root: &SchemaNode) -> Result<SchemaNode> {
    let mut out = root.clone();
    let sheets = out
        .alternation_mut(SHEETS_KEY)
        .ok_or_else(|| missing_alternation("#/properties/sheets/items/oneOf"))?;
    for (i, sheet) in sheets.iter_mut().enumerate() {
        if sheet.is_reference() {
            *sheet = resolve(sheet, root)?.into_owned();
        }
        let blocks = sheet.alternation_mut(BLOCKS_KEY).ok_or_else(|| {
            missing_alternation(format!(
                "#/properties/sheets/items/oneOf/{i}/properties/blocks/items/oneOf"
            ))
        })?;
        for block in blocks.iter_mut() {
            if block.is_reference() {
                *block = resolve(block, root)?.into_owned();
            }
        }
    }

    let mut definitions = std::mem::take(&mut out.definitions);
    // Definitions can point at each other; drop until nothing changes.
    loop {
        let mut probe = out.clone();
        probe.definitions = definitions.clone();
        let used = referenced_pointers(&serde_json::to_value(&probe)?);
        let before = definitions.len();
        definitions.retain(|name, _| used.contains(&to_pointer(["definitions", name.as_str()])));
        if definitions.len() == before {
            break;
        }
    }
    out.definitions = definitions;
    Ok(out)
}

fn referenced_pointers(value: &Value) -> BTreeSet<String> {
    fn walk(value: &Value, out: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(pointer)) = map.get("$ref") {
                    out.insert(pointer.clone());
                }
                map.values().for_each(|v| walk(v, out));
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut out = BTreeSet::new();
    walk(value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn block(name: &str, field_type: &str) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "enum": [name]},
                "@entity": {"type": "string", "enum": ["list"]},
                "items": {"type": "array", "items": {
                    "type": "object",
                    "properties": {"street": {"type": field_type}},
                    "additionalProperties": false
                }}
            },
            "required": ["name", "@entity", "items"]
        })
    }

    fn workbook(sheets: Vec<Vec<Value>>) -> SchemaNode {
        let sheets: Vec<Value> = sheets
            .into_iter()
            .enumerate()
            .map(|(i, blocks)| {
                json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "enum": [format!("sheet{i}")]},
                        "blocks": {"type": "array", "items": {"oneOf": blocks}}
                    }
                })
            })
            .collect();
        serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "enum": ["book"]},
                "sheets": {"type": "array", "items": {"oneOf": sheets}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn fingerprint_ignores_key_order_but_not_values_or_array_order() {
        let a: SchemaNode = serde_json::from_value(json!({"type": "object", "required": ["a", "b"], "properties": {"a": {}, "b": {}}})).unwrap();
        let b: SchemaNode = serde_json::from_value(json!({"properties": {"b": {}, "a": {}}, "required": ["a", "b"], "type": "object"})).unwrap();
        let c: SchemaNode = serde_json::from_value(json!({"type": "object", "required": ["b", "a"], "properties": {"a": {}, "b": {}}})).unwrap();
        let d: SchemaNode = serde_json::from_value(json!({"type": "array", "required": ["a", "b"], "properties": {"a": {}, "b": {}}})).unwrap();
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&c).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&d).unwrap());
    }

    #[test]
    fn canonicalize_sorts_nested_keys() {
        let v = canonicalize(&json!({"b": {"d": 1, "c": [{"z": 1, "y": 2}]}, "a": 0}));
        assert_eq!(v.to_string(), r#"{"a":0,"b":{"c":[{"y":2,"z":1}],"d":1}}"#);
    }

    #[test]
    fn repeated_blocks_become_one_definition() {
        let mut root = workbook(vec![
            vec![block("address_list", "string")],
            vec![block("other_list", "number"), block("address_list", "string")],
            vec![block("address_list", "number")],
        ]);
        let report = deduplicate(&mut root, &DedupOptions::default()).unwrap();
        assert_eq!(report.shared.len(), 1);
        assert_eq!(report.shared[0].name, "address_list");
        assert_eq!(report.shared[0].slots, vec![(0, 0), (1, 1)]);

        let sheets = root.alternation(SHEETS_KEY).unwrap();
        let pointer = |i: usize, j: usize| {
            sheets[i].alternation(BLOCKS_KEY).unwrap()[j].reference.clone()
        };
        assert_eq!(pointer(0, 0).as_deref(), Some("#/definitions/address_list"));
        assert_eq!(pointer(1, 1).as_deref(), Some("#/definitions/address_list"));
        assert_eq!(pointer(1, 0), None);
        assert_eq!(pointer(2, 0), None, "different shape with the same name stays inline");
        assert_eq!(sheets[1].alternation(BLOCKS_KEY).unwrap().len(), 2);
    }

    #[test]
    fn inlining_restores_the_original() {
        let original = workbook(vec![
            vec![block("a_list", "string"), block("b_list", "number")],
            vec![block("b_list", "number"), block("a_list", "string")],
            vec![block("a_list", "string")],
        ]);
        let mut rewritten = original.clone();
        let report = deduplicate(&mut rewritten, &DedupOptions::default()).unwrap();
        assert_eq!(report.shared.len(), 2);
        assert_ne!(rewritten, original);
        assert_eq!(restore(&rewritten, &report).unwrap(), original);
        assert_eq!(inline_definitions(&rewritten).unwrap(), original);
    }

    #[test]
    fn restore_keeps_references_the_input_already_had() {
        let mut original = workbook(vec![
            vec![json!({"$ref": "#/definitions/kept_list"}), block("a_list", "string")],
            vec![block("a_list", "string")],
        ]);
        original
            .definitions
            .insert("kept_list".into(), serde_json::from_value(block("kept_list", "number")).unwrap());

        let mut rewritten = original.clone();
        let report = deduplicate(&mut rewritten, &DedupOptions::default()).unwrap();
        assert_eq!(report.shared.len(), 1);
        assert!(report.shared[0].added);
        assert_eq!(rewritten.definitions.len(), 2);

        let restored = restore(&rewritten, &report).unwrap();
        assert_eq!(restored, original);
        let first = &restored.alternation(SHEETS_KEY).unwrap()[0].alternation(BLOCKS_KEY).unwrap()[0];
        assert_eq!(first.reference.as_deref(), Some("#/definitions/kept_list"));

        // full inlining is a different operation and drops the input's definition too
        assert!(inline_definitions(&rewritten).unwrap().definitions.is_empty());
    }

    #[test]
    fn restore_keeps_a_definition_that_already_held_the_shape() {
        let mut original = workbook(vec![
            vec![block("a_list", "string")],
            vec![block("a_list", "string")],
        ]);
        original
            .definitions
            .insert("a_list".into(), serde_json::from_value(block("a_list", "string")).unwrap());

        let mut rewritten = original.clone();
        let report = deduplicate(&mut rewritten, &DedupOptions::default()).unwrap();
        assert_eq!(report.shared[0].name, "a_list");
        assert!(!report.shared[0].added);
        assert_eq!(restore(&rewritten, &report).unwrap(), original);
    }

    #[test]
    fn hash_suffix_and_collisions_disambiguate() {
        let mut root = workbook(vec![
            vec![block("x_list", "string")],
            vec![block("x_list", "string")],
        ]);
        let report = deduplicate(&mut root, &DedupOptions { hash_suffix: true }).unwrap();
        let name = &report.shared[0].name;
        assert!(name.starts_with("x_list_") && name.len() == "x_list_".len() + 8, "{name}");

        let mut root = workbook(vec![
            vec![block("x_list", "string")],
            vec![block("x_list", "string")],
        ]);
        root.definitions.insert("x_list".into(), SchemaNode::of_type("null"));
        let report = deduplicate(&mut root, &DedupOptions::default()).unwrap();
        assert_ne!(report.shared[0].name, "x_list");
        assert_eq!(root.definitions["x_list"], SchemaNode::of_type("null"));
    }

    #[test]
    fn unnamed_blocks_use_a_generic_hashed_name() {
        let anonymous = json!({"type": "object", "properties": {"rows": {"type": "array"}}});
        let mut root = workbook(vec![vec![anonymous.clone()], vec![anonymous]]);
        let report = deduplicate(&mut root, &DedupOptions::default()).unwrap();
        assert!(report.shared[0].name.starts_with("block_"));
    }

    #[test]
    fn missing_alternation_is_malformed() {
        let mut root = SchemaNode::of_type("object");
        let err = deduplicate(&mut root, &DedupOptions::default()).unwrap_err();
        assert!(err.to_string().contains("#/properties/sheets/items/oneOf"), "{err}");
    }
}
