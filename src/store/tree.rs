//! Helpers for addressing a JSON tree by slash-separated paths.

use serde_json::{Map, Value};

// ---

/// Split a store path into its non-empty segments.
pub fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Value at `path`, if present and non-null.
pub fn get<'a>(tree: &'a Value, path: &[String]) -> Option<&'a Value> {
    // ---
    let mut node = tree;
    for key in path {
        node = node.as_object()?.get(key)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Replace the value at `path`, creating intermediate objects. Writing
/// `null` removes the key, and objects left empty are pruned the way the
/// hosted store prunes them.
pub fn set(tree: &mut Value, path: &[String], value: Value) {
    // ---
    let Some((key, parents)) = path.split_last() else {
        *tree = value;
        return;
    };

    if value.is_null() {
        remove(tree, parents, key);
        return;
    }

    let mut node = tree;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(key.clone(), value);
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn remove(tree: &mut Value, parents: &[String], key: &str) -> bool {
    // ---
    // Returns true when `tree` ended up empty and should be pruned by the caller.
    let Some(map) = tree.as_object_mut() else {
        return false;
    };
    match parents.split_first() {
        None => {
            map.remove(key);
        }
        Some((head, rest)) => {
            let prune = map.get_mut(head).map(|child| remove(child, rest, key)).unwrap_or(false);
            if prune {
                map.remove(head);
            }
        }
    }
    map.is_empty()
}
