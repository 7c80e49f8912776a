//! structural diff between canonicalized desired state and actual state.

use crate::codec::is_unset;
use crate::types::{DiffKind, FieldDiff};
use cdeploy_core::{names_match, FieldSchema, JsonMap, Operation, ResourceSchema, ValueKind};
use serde_json::Value;

/// compare two views field by field, in schema order.
///
/// records recurse, lists of records of equal length compare element-wise,
/// everything else compares by deep equality.
pub fn diff(desired: &JsonMap, actual: &JsonMap, schema: &ResourceSchema) -> Vec<FieldDiff> {
    let mut walk = Walk {
        update_operation: schema.update_operation,
        diffs: Vec::new(),
    };
    let root = Scope {
        path: "",
        operation: schema.default_operation(),
        output_only: false,
    };
    walk.fields(desired, actual, schema.fields, &root);
    walk.diffs
}

struct Walk {
    update_operation: &'static str,
    diffs: Vec<FieldDiff>,
}

/// where in the resource a walk currently is.
struct Scope<'a> {
    path: &'a str,
    operation: Operation,
    output_only: bool,
}

impl Walk {
    fn fields(
        &mut self,
        desired: &JsonMap,
        actual: &JsonMap,
        fields: &[FieldSchema],
        parent: &Scope<'_>,
    ) {
        for field in fields {
            let path = if parent.path.is_empty() {
                field.name.to_string()
            } else {
                format!("{}.{}", parent.path, field.name)
            };
            let scope = Scope {
                path: &path,
                operation: field.resolve_operation(parent.operation),
                output_only: parent.output_only || field.output_only,
            };
            let kind = self.kind(scope.operation, scope.output_only);

            let des = desired.get(field.name);
            let act = actual.get(field.name);
            let des_unset = is_unset(field, des);
            let act_unset = is_unset(field, act);

            if des_unset && (act_unset || field.server_default) {
                continue;
            }
            let (Some(des), Some(act)) = (des, act) else {
                self.diffs.push(field_diff(path.clone(), des, act, kind));
                continue;
            };
            if des_unset || act_unset {
                self.diffs
                    .push(field_diff(path.clone(), Some(des), Some(act), kind));
                continue;
            }

            match (&field.kind, des, act) {
                (ValueKind::Object, Value::Object(d), Value::Object(a)) => {
                    self.fields(d, a, field.children, &scope);
                }
                (ValueKind::ObjectList, Value::Array(d), Value::Array(a))
                    if d.len() == a.len() =>
                {
                    for (index, pair) in d.iter().zip(a).enumerate() {
                        let item_path = format!("{path}[{index}]");
                        match pair {
                            (Value::Object(d), Value::Object(a)) => {
                                let item = Scope {
                                    path: &item_path,
                                    ..scope
                                };
                                self.fields(d, a, field.children, &item);
                            }
                            (d, a) if d != a => {
                                self.diffs.push(field_diff(item_path, Some(d), Some(a), kind))
                            }
                            _ => {}
                        }
                    }
                }
                (ValueKind::ResourceName, Value::String(d), Value::String(a)) => {
                    if !names_match(d, a) {
                        self.diffs
                            .push(field_diff(path.clone(), Some(des), Some(act), kind));
                    }
                }
                _ => {
                    if des != act {
                        self.diffs
                            .push(field_diff(path.clone(), Some(des), Some(act), kind));
                    }
                }
            }
        }
    }

    fn kind(&self, operation: Operation, output_only: bool) -> DiffKind {
        if output_only {
            return DiffKind::Informational;
        }
        match operation {
            Operation::Recreate => DiffKind::Recreate,
            Operation::Update(name) => DiffKind::Update(name),
            Operation::Inherit => DiffKind::Update(self.update_operation),
        }
    }
}

fn field_diff(
    field: String,
    desired: Option<&Value>,
    actual: Option<&Value>,
    kind: DiffKind,
) -> FieldDiff {
    FieldDiff {
        field,
        desired: desired.cloned().unwrap_or(Value::Null),
        actual: actual.cloned().unwrap_or(Value::Null),
        kind,
    }
}
