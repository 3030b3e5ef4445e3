//! Conversion between nested maps and slash-joined paths.
//!
//! Only maps are path-expanded. Lists and scalars are leaves, and so is an
//! empty map.
//!
//! Paths are not escaped. A top-level key that already contains `/` reads as
//! a path on the way back, so `{"a/b": x, "a": {"c": 1}}` unflattens into a
//! single `a` map holding both `b` and `c`.

use serde_json::{Map, Value};

pub const PATH_SEPARATOR: char = '/';

pub fn flatten(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(map, None, &mut out);
    out
}

fn flatten_into(map: Map<String, Value>, prefix: Option<&str>, out: &mut Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{key}"),
            None => key,
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(inner, Some(&path), out),
            leaf => {
                out.insert(path, leaf);
            }
        }
    }
}

pub fn unflatten(flat: Map<String, Value>) -> Map<String, Value> {
    let mut root = Map::new();
    for (path, value) in flat {
        insert_path(&mut root, &path, value);
    }
    root
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let (parents, leaf) = match path.rsplit_once(PATH_SEPARATOR) {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut node = root;
    if let Some(parents) = parents {
        for segment in parents.split(PATH_SEPARATOR) {
            let slot = node
                .entry(segment)
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            match slot {
                Value::Object(next) => node = next,
                _ => return,
            }
        }
    }
    node.insert(leaf.to_string(), value);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn nested_maps_become_paths() {
        let flat = flatten(obj(json!({
            "temporal-extent": {"begin": "2014", "end": "2018"},
            "organization": {"meta": {"id": 7}},
            "title": "x",
        })));
        let keys: Vec<_> = flat.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "temporal-extent/begin",
                "temporal-extent/end",
                "organization/meta/id",
                "title"
            ]
        );
        assert_eq!(flat["organization/meta/id"], json!(7));
    }

    #[test]
    fn lists_are_leaves() {
        let flat = flatten(obj(json!({"resources": [{"url": "a"}, {"url": "b"}]})));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat["resources"], json!([{"url": "a"}, {"url": "b"}]));
    }

    #[test]
    fn empty_maps_are_leaves() {
        let flat = flatten(obj(json!({"extras": {}})));
        assert_eq!(flat["extras"], json!({}));
    }

    #[test]
    fn unflatten_restores_structure() {
        let original = json!({
            "a": {"b": {"c": 1}, "d": [1, 2]},
            "e": "f",
            "g": {},
        });
        let restored = unflatten(flatten(obj(original.clone())));
        assert_eq!(Value::Object(restored), original);
    }

    #[test]
    fn unflatten_prefers_structure_over_scalar() {
        let mut flat = Map::new();
        flat.insert("a".into(), json!(1));
        flat.insert("a/b".into(), json!(2));
        assert_eq!(Value::Object(unflatten(flat)), json!({"a": {"b": 2}}));
    }

    #[test]
    fn slash_keys_merge_into_nested_map() {
        let flat = flatten(obj(json!({"a/b": "x", "a": {"c": 1}})));
        assert_eq!(
            Value::Object(unflatten(flat)),
            json!({"a": {"b": "x", "c": 1}})
        );
    }
}
