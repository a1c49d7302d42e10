//! Partial-file document merging
//!
//! Merging is a reduction over the contributing documents in file-name
//! lexicographic order. Maps merge recursively, scalars overwrite
//! last-wins, and lists concatenate unless an element carries an
//! `operator` field:
//!
//!   `+`  append (the default)
//!   `-`  remove the element with the same stable key
//!   `U`  update (replace) the element with the same stable key
//!
//! The stable element key is the element's `name` field, falling back to
//! `local_column` for foreign keys, or the scalar value itself.

use serde_yaml::{Mapping, Value};

const OPERATOR_KEY: &str = "operator";

/// Merge the documents of one definition group into a single document.
pub fn merge_documents(documents: Vec<Value>) -> Value {
    let mut iter = documents.into_iter();
    let first = iter.next().unwrap_or(Value::Null);
    iter.fold(first, merge_value)
}

fn merge_value(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            Value::Mapping(merge_mappings(base_map, overlay_map))
        }
        (Value::Sequence(base_seq), Value::Sequence(overlay_seq)) => {
            Value::Sequence(merge_sequences(base_seq, overlay_seq))
        }
        // Scalars (and mismatched shapes) overwrite last-wins
        (_, overlay) => overlay,
    }
}

fn merge_mappings(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, overlay_value) in overlay {
        match base.remove(&key) {
            Some(base_value) => {
                base.insert(key, merge_value(base_value, overlay_value));
            }
            None => {
                base.insert(key, overlay_value);
            }
        }
    }
    base
}

fn merge_sequences(mut base: Vec<Value>, overlay: Vec<Value>) -> Vec<Value> {
    for element in overlay {
        let operator = element_operator(&element);
        let element = strip_operator(element);
        match operator.as_deref() {
            Some("-") => {
                if let Some(key) = element_key(&element) {
                    base.retain(|existing| element_key(existing).as_ref() != Some(&key));
                }
            }
            Some("U") => {
                let key = element_key(&element);
                let mut replaced = false;
                if let Some(key) = &key {
                    for existing in base.iter_mut() {
                        if element_key(existing).as_ref() == Some(key) {
                            *existing = element.clone();
                            replaced = true;
                            break;
                        }
                    }
                }
                if !replaced {
                    base.push(element);
                }
            }
            // `+` and absent both append
            _ => base.push(element),
        }
    }
    base
}

fn element_operator(element: &Value) -> Option<String> {
    element
        .as_mapping()?
        .get(OPERATOR_KEY)?
        .as_str()
        .map(|s| s.to_string())
}

fn strip_operator(element: Value) -> Value {
    match element {
        Value::Mapping(mut map) => {
            map.remove(OPERATOR_KEY);
            Value::Mapping(map)
        }
        other => other,
    }
}

/// Stable identity of a list element for `-`/`U` operators.
fn element_key(element: &Value) -> Option<String> {
    match element {
        Value::Mapping(map) => {
            for field in ["name", "local_column"] {
                if let Some(s) = map.get(field).and_then(Value::as_str) {
                    return Some(s.to_string());
                }
            }
            None
        }
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
