//! Path operations over the JSON tree held by a store.
//!
//! The tree follows realtime-database semantics: `null` is the absence of a value,
//! containers never hold `null` children and empty containers do not exist.

use serde_json::{Map, Value};

use crate::store::path::StorePath;

/// Clone the value found at `path`, or `null` when nothing is stored there.
pub fn value_at(root: &Value, path: &StorePath) -> Value {
    let mut node = root;
    for segment in path.segments() {
        let next = match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(child) => node = child,
            None => return Value::Null,
        }
    }
    node.clone()
}

/// Replace the subtree at `path`, creating intermediate objects as needed.
pub fn set_at(root: &mut Value, path: &StorePath, value: Value) {
    let value = normalize(value);
    if value.is_null() {
        delete_at(root, path);
        return;
    }

    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.clone())
            .or_insert(Value::Null);
    }
    ensure_object(node).insert(last.clone(), value);
}

/// Remove the subtree at `path` and prune parents left empty.
pub fn delete_at(root: &mut Value, path: &StorePath) {
    remove(root, path.segments());
}

/// Strip `null` members and collapse empty containers to `null`.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| (key, normalize(child)))
                .filter(|(_, child)| !child.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().map(normalize).collect();
            if items.iter().all(Value::is_null) {
                Value::Null
            } else {
                Value::Array(items)
            }
        }
        other => other,
    }
}

/// Returns true when `node` ended up empty and should be dropped by its parent.
fn remove(node: &mut Value, segments: &[String]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        *node = Value::Null;
        return true;
    };

    if node.is_null() {
        return true;
    }
    if !node.is_object() && !node.is_array() {
        return false;
    }

    let map = ensure_object(node);
    if let Some(child) = map.get_mut(head) {
        if remove(child, rest) {
            map.remove(head);
        }
    }
    if map.is_empty() {
        *node = Value::Null;
        return true;
    }
    false
}

/// Coerce `node` into an object, turning arrays into index-keyed maps.
fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        let map = match std::mem::take(node) {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null())
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            _ => Map::new(),
        };
        *node = Value::Object(map);
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was coerced into an object above"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = Value::Null;
        set_at(&mut root, &path("level1/votes/p1"), json!(2));
        assert_eq!(root, json!({"level1": {"votes": {"p1": 2}}}));
        assert_eq!(value_at(&root, &path("level1/votes/p1")), json!(2));
    }

    #[test]
    fn setting_null_or_empty_deletes_and_prunes_parents() {
        let mut root = json!({"level1": {"votes": {"p1": 2}, "status": "voting"}});
        set_at(&mut root, &path("level1/votes/p1"), Value::Null);
        assert_eq!(root, json!({"level1": {"status": "voting"}}));

        set_at(&mut root, &path("level1"), json!({}));
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn value_at_reads_into_arrays() {
        let root = json!({"level2": {"questions": [{"text": "a"}, {"text": "b"}]}});
        assert_eq!(value_at(&root, &path("level2/questions/1/text")), json!("b"));
        assert_eq!(value_at(&root, &path("level2/questions/7")), Value::Null);
    }

    #[test]
    fn normalize_drops_null_members() {
        let value = normalize(json!({"a": null, "b": {"c": null}, "d": 1}));
        assert_eq!(value, json!({"d": 1}));
    }
}
