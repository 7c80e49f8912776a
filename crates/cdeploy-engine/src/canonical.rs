//! canonicalization of desired, initial and new states.
//!
//! all three operate on json views guided by the resource schema, so that
//! the same rules apply to every nested record of every kind.

use crate::codec::is_unset;
use cdeploy_core::{names_match, FieldSchema, JsonMap, ResourceSchema, ValueKind};
use serde_json::Value;
use tracing::warn;

/// clear one-of groups that report more than one member.
pub fn canonicalize_initial(initial: JsonMap, schema: &ResourceSchema) -> JsonMap {
    let mut initial = initial;
    clear_conflicts(&mut initial, schema.fields, schema.kind);
    initial
}

/// returns true when clearing left the record with nothing but nulls.
fn clear_conflicts(map: &mut JsonMap, fields: &[FieldSchema], path: &str) -> bool {
    let mut clear = Vec::new();
    for field in fields {
        if field.conflicts.is_empty() || is_unset(field, map.get(field.name)) {
            continue;
        }
        let peers_set = field
            .conflicts
            .iter()
            .any(|peer| map.get(*peer).is_some_and(|value| !value.is_null()));
        if peers_set {
            clear.push(field.name);
        }
    }
    if !clear.is_empty() {
        warn!(path, fields = ?clear, "conflicting fields reported; clearing");
        for name in &clear {
            map.insert(name.to_string(), Value::Null);
        }
    }

    for field in fields {
        let child_path = format!("{path}.{}", field.name);
        let Some(value) = map.get_mut(field.name) else {
            continue;
        };
        let emptied = match &mut *value {
            Value::Object(inner) if field.kind.is_object() => {
                clear_conflicts(inner, field.children, &child_path)
            }
            Value::Array(items) if field.kind.is_object_list() => {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        clear_conflicts(inner, field.children, &child_path);
                    }
                }
                false
            }
            _ => false,
        };
        if emptied {
            *value = Value::Null;
        }
    }

    !clear.is_empty() && map.values().all(Value::is_null)
}

/// merge desired with an observed initial state.
///
/// fields the caller did not mention inherit the initial value, explicit
/// empties stay empty, and selecting one member of a one-of group drops the
/// initial state's other members.
pub fn canonicalize_desired(
    desired: &JsonMap,
    initial: Option<&JsonMap>,
    schema: &ResourceSchema,
) -> JsonMap {
    match initial {
        Some(initial) => merge_desired(desired, initial, schema.fields),
        None => desired.clone(),
    }
}

fn merge_desired(desired: &JsonMap, initial: &JsonMap, fields: &[FieldSchema]) -> JsonMap {
    let mut out = desired.clone();
    for field in fields {
        let init = initial.get(field.name).filter(|value| !value.is_null());
        match desired.get(field.name) {
            None => {
                let peer_selected = field
                    .conflicts
                    .iter()
                    .any(|peer| desired.get(*peer).is_some_and(|value| !value.is_null()));
                if peer_selected {
                    continue;
                }
                if let Some(init) = init {
                    out.insert(field.name.to_string(), init.clone());
                }
            }
            Some(Value::Null) => {}
            Some(des) => {
                if let Some(init) = init {
                    out.insert(field.name.to_string(), merge_value(field, des, init));
                }
            }
        }
    }
    out
}

fn merge_value(field: &FieldSchema, desired: &Value, initial: &Value) -> Value {
    match (&field.kind, desired, initial) {
        (ValueKind::ResourceName, Value::String(des), Value::String(init))
            if names_match(des, init) =>
        {
            initial.clone()
        }
        (ValueKind::String, Value::String(des), _) if des.is_empty() => initial.clone(),
        (ValueKind::Object, Value::Object(des), Value::Object(init)) => {
            Value::Object(merge_desired(des, init, field.children))
        }
        (ValueKind::ObjectList, Value::Array(des), Value::Array(init))
            if des.len() == init.len() =>
        {
            Value::Array(
                des.iter()
                    .zip(init)
                    .map(|pair| match pair {
                        (Value::Object(d), Value::Object(i)) => {
                            Value::Object(merge_desired(d, i, field.children))
                        }
                        (d, _) => d.clone(),
                    })
                    .collect(),
            )
        }
        _ => desired.clone(),
    }
}

/// align a freshly read state with the raw desired state.
///
/// fields unset on both sides take the desired representation, and names
/// that refer to the same resource take the desired spelling.
pub fn canonicalize_new(new: &JsonMap, desired: &JsonMap, schema: &ResourceSchema) -> JsonMap {
    merge_new(new, desired, schema.fields)
}

fn merge_new(new: &JsonMap, desired: &JsonMap, fields: &[FieldSchema]) -> JsonMap {
    let mut out = new.clone();
    for field in fields {
        let nw = new.get(field.name);
        let des = desired.get(field.name);
        if is_unset(field, nw) && is_unset(field, des) {
            match des {
                Some(des) => out.insert(field.name.to_string(), des.clone()),
                None => out.remove(field.name),
            };
            continue;
        }
        let (Some(nw), Some(des)) = (nw, des) else {
            continue;
        };
        let merged = match (&field.kind, nw, des) {
            (ValueKind::ResourceName, Value::String(n), Value::String(d)) if names_match(n, d) => {
                des.clone()
            }
            (ValueKind::Object, Value::Object(n), Value::Object(d)) => {
                Value::Object(merge_new(n, d, field.children))
            }
            (ValueKind::ObjectList, Value::Array(n), Value::Array(d)) if n.len() == d.len() => {
                Value::Array(
                    n.iter()
                        .zip(d)
                        .map(|pair| match pair {
                            (Value::Object(n), Value::Object(d)) => {
                                Value::Object(merge_new(n, d, field.children))
                            }
                            (n, _) => n.clone(),
                        })
                        .collect(),
                )
            }
            _ => continue,
        };
        out.insert(field.name.to_string(), merged);
    }
    out
}
