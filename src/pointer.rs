//! In-document reference resolution.
//!
//! Pointers look like `#/definitions/address_list`. Each segment is a literal
//! mapping key; array indices are not addressable. Chains are followed
//! iteratively and a visited set stops cycles.
//!
//! Keywords the IR models (`definitions`, `$defs`, `properties`, `items`)
//! resolve to borrowed nodes. Anything else lives in [`SchemaNode::extra`]
//! as plain JSON, so the target is walked there and deserialized into an
//! owned node.

use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::SchemaNode;

const LOCAL_PREFIX: &str = "#";

/// Follow `node`'s `$ref` chain inside `root`.
///
/// A node without `$ref` comes back as the very same reference.
pub fn resolve<'a>(node: &'a SchemaNode, root: &'a SchemaNode) -> Result<Cow<'a, SchemaNode>> {
    let mut current = Cow::Borrowed(node);
    let mut visited = BTreeSet::<String>::new();
    while let Some(pointer) = current.reference.clone() {
        if !visited.insert(pointer.clone()) {
            return Err(Error::CyclicReference(pointer));
        }
        current = lookup(&pointer, root)?;
    }
    Ok(current)
}

/// Split a local pointer into decoded segments.
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>> {
    let rest = pointer
        .strip_prefix(LOCAL_PREFIX)
        .ok_or_else(|| Error::UnsupportedReference(pointer.to_string()))?;
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let rest = rest
        .strip_prefix('/')
        .ok_or_else(|| Error::UnsupportedReference(pointer.to_string()))?;
    Ok(rest.split('/').map(unescape).collect())
}

/// Build `#/seg/...` from raw segments, escaping `~` and `/`.
pub fn to_pointer<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::from(LOCAL_PREFIX);
    for segment in segments {
        out.push('/');
        out.push_str(&segment.as_ref().replace('~', "~0").replace('/', "~1"));
    }
    out
}

/// Walk a single pointer (no chain following).
fn lookup<'a>(pointer: &str, root: &'a SchemaNode) -> Result<Cow<'a, SchemaNode>> {
    let segments = parse_pointer(pointer)?;
    let missing = |segment: &str| Error::UnresolvedPointer {
        pointer: pointer.to_string(),
        segment: segment.to_string(),
    };

    let mut node = root;
    let mut iter = segments.iter();
    while let Some(keyword) = iter.next() {
        node = match keyword.as_str() {
            "definitions" | "$defs" | "properties" => {
                let key = iter.next().ok_or_else(|| missing(keyword.as_str()))?;
                let map = match keyword.as_str() {
                    "definitions" => &node.definitions,
                    "$defs" => &node.defs,
                    _ => &node.properties,
                };
                map.get(key.as_str()).ok_or_else(|| missing(key.as_str()))?
            }
            "items" => node.items.as_deref().ok_or_else(|| missing(keyword.as_str()))?,
            _ => {
                let mut value = node.extra.get(keyword.as_str()).ok_or_else(|| missing(keyword.as_str()))?;
                for key in iter.by_ref() {
                    value = value
                        .as_object()
                        .and_then(|map| map.get(key.as_str()))
                        .ok_or_else(|| missing(key.as_str()))?;
                }
                let target = serde_json::from_value(value.clone())
                    .map_err(|e| Error::malformed(pointer, format!("target is not a schema: {e}")))?;
                return Ok(Cow::Owned(target));
            }
        };
    }
    Ok(Cow::Borrowed(node))
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> SchemaNode {
        serde_json::from_value(json!({
            "definitions": {
                "a": {"$ref": "#/definitions/b"},
                "b": {"$ref": "#/definitions/c"},
                "c": {"type": "object", "properties": {"x": {"type": "number"}}},
                "self": {"$ref": "#/definitions/self"},
                "ping": {"$ref": "#/definitions/pong"},
                "pong": {"$ref": "#/definitions/ping"},
                "a/b": {"type": "string"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn node_without_reference_is_returned_as_is() {
        let root = root();
        let node = SchemaNode::of_type("string");
        let resolved = resolve(&node, &root).unwrap();
        assert!(matches!(resolved, Cow::Borrowed(n) if std::ptr::eq(n, &node)));
    }

    #[test]
    fn follows_chains_to_the_concrete_node() {
        let root = root();
        let start = SchemaNode::reference("#/definitions/a");
        let resolved = resolve(&start, &root).unwrap();
        assert!(!resolved.is_reference());
        assert!(std::ptr::eq(&*resolved, &root.definitions["c"]));
    }

    #[test]
    fn walks_into_properties_and_items() {
        let root = root();
        let start = SchemaNode::reference("#/definitions/c/properties/x");
        let resolved = resolve(&start, &root).unwrap();
        assert_eq!(*resolved, SchemaNode::of_type("number"));
    }

    #[test]
    fn missing_segment_is_named() {
        let mut root = root();
        root.definitions.shift_remove("b");
        let start = SchemaNode::reference("#/definitions/a");
        match resolve(&start, &root) {
            Err(Error::UnresolvedPointer { pointer, segment }) => {
                assert_eq!(pointer, "#/definitions/b");
                assert_eq!(segment, "b");
            }
            other => panic!("expected unresolved pointer, got {other:?}"),
        }
    }

    #[test]
    fn array_indices_are_not_segments() {
        let root: SchemaNode =
            serde_json::from_value(json!({"oneOf": [{"type": "string"}]})).unwrap();
        let start = SchemaNode::reference("#/oneOf/0");
        assert!(matches!(
            resolve(&start, &root),
            Err(Error::UnresolvedPointer { .. })
        ));
    }

    #[test]
    fn other_keywords_are_walked_as_plain_keys() {
        let root: SchemaNode = serde_json::from_value(json!({
            "components": {
                "address_list": {"$ref": "#/components/street"},
                "street": {"type": "string", "maxLength": 80},
                "indexed": [{"type": "string"}]
            }
        }))
        .unwrap();
        let start = SchemaNode::reference("#/components/address_list");
        let resolved = resolve(&start, &root).unwrap();
        assert!(matches!(resolved, Cow::Owned(_)));
        assert_eq!(resolved.type_, SchemaNode::of_type("string").type_);
        assert_eq!(resolved.max_length, Some(80));

        for (pointer, segment) in [("#/components/indexed/0", "0"), ("#/nowhere/x", "nowhere")] {
            match resolve(&SchemaNode::reference(pointer), &root) {
                Err(Error::UnresolvedPointer { segment: s, .. }) => assert_eq!(s, segment),
                other => panic!("expected unresolved pointer, got {other:?}"),
            }
        }
    }

    #[test]
    fn remote_references_are_rejected() {
        let root = root();
        let start = SchemaNode::reference("other.json#/definitions/a");
        assert!(matches!(
            resolve(&start, &root),
            Err(Error::UnsupportedReference(_))
        ));
    }

    #[test]
    fn cycles_are_reported_instead_of_looping() {
        let root = root();
        for start in ["#/definitions/self", "#/definitions/ping"] {
            let node = SchemaNode::reference(start);
            assert!(matches!(
                resolve(&node, &root),
                Err(Error::CyclicReference(_))
            ));
        }
    }

    #[test]
    fn escaped_segments_round_trip() {
        let pointer = to_pointer(["definitions", "a/b"]);
        assert_eq!(pointer, "#/definitions/a~1b");
        assert_eq!(parse_pointer(&pointer).unwrap(), vec!["definitions", "a/b"]);
        let root = root();
        let start = SchemaNode::reference(pointer);
        let resolved = resolve(&start, &root).unwrap();
        assert_eq!(*resolved, SchemaNode::of_type("string"));
    }

    #[test]
    fn root_pointer_is_the_document() {
        assert!(parse_pointer("#").unwrap().is_empty());
        assert!(matches!(parse_pointer("#definitions"), Err(Error::UnsupportedReference(_))));
    }
}
