//! validation of resource documents against their schema.

use crate::names::is_valid_resource_id;
use crate::schema::{FieldSchema, ResourceSchema, ValueKind};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// validation errors emitted before any request is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field {field}")]
    MissingRequired { field: String },
    #[error("conflicting fields set in {field}: {}", .fields.join(", "))]
    ConflictingFields { field: String, fields: Vec<String> },
    #[error("{field} requires one of: {}", .options.join(", "))]
    MissingVariant { field: String, options: Vec<String> },
    #[error("invalid value for {field}: expected {expected}, got {actual}")]
    InvalidValue {
        field: String,
        expected: String,
        actual: String,
    },
    #[error("invalid resource id for {field}: {value}")]
    InvalidName { field: String, value: String },
    #[error("unknown field {field}")]
    UnknownField { field: String },
}

impl ValidationError {
    pub fn conflicting(field: &str, fields: &[&str]) -> Self {
        ValidationError::ConflictingFields {
            field: field.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn missing_variant(field: &str, options: &[&str]) -> Self {
        ValidationError::MissingVariant {
            field: field.to_string(),
            options: options.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// dotted path of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingRequired { field }
            | ValidationError::ConflictingFields { field, .. }
            | ValidationError::MissingVariant { field, .. }
            | ValidationError::InvalidValue { field, .. }
            | ValidationError::InvalidName { field, .. }
            | ValidationError::UnknownField { field } => field,
        }
    }
}

/// aggregated validation report.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// return true when no errors are present.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// return true when errors are present.
    pub fn is_err(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("validation failed:")?;
        for error in &self.errors {
            write!(f, "\n- {error}")?;
        }
        Ok(())
    }
}

/// validate a resource document (the json view of a resource).
///
/// checks required fields, one-of groups, value shapes, enum members and
/// resource ids. output-only fields are accepted as-is.
pub fn validate_document(value: &Value, schema: &ResourceSchema) -> ValidationReport {
    let mut report = ValidationReport::default();
    match value.as_object() {
        Some(map) => validate_fields(map, schema.fields, "", &mut report),
        None => report.push(ValidationError::InvalidValue {
            field: schema.kind.to_string(),
            expected: "object".to_string(),
            actual: value_type_label(value),
        }),
    }
    report
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn is_set(value: Option<&Value>) -> bool {
    value.is_some_and(|value| !value.is_null())
}

fn validate_fields(
    map: &Map<String, Value>,
    fields: &[FieldSchema],
    prefix: &str,
    report: &mut ValidationReport,
) {
    let mut reported_conflicts = BTreeSet::new();

    for field in fields {
        let path = join_path(prefix, field.name);
        let value = map.get(field.name);

        if field.required && value.map_or(true, crate::field::is_blank) {
            report.push(ValidationError::MissingRequired { field: path });
            continue;
        }
        if !is_set(value) || field.output_only {
            continue;
        }

        if !field.conflicts.is_empty() && !reported_conflicts.contains(field.name) {
            let peers: Vec<&str> = field
                .conflicts
                .iter()
                .copied()
                .filter(|peer| is_set(map.get(*peer)))
                .collect();
            if !peers.is_empty() {
                let mut names = vec![field.name];
                names.extend(peers);
                reported_conflicts.extend(names.iter().copied());
                let group = if prefix.is_empty() { field.name } else { prefix };
                report.push(ValidationError::conflicting(group, &names));
            }
        }

        if let Some(value) = value {
            validate_value(field, value, &path, report);
        }
    }

    for key in map.keys() {
        if !fields.iter().any(|field| field.name == key) {
            report.push(ValidationError::UnknownField {
                field: join_path(prefix, key),
            });
        }
    }
}

fn validate_value(field: &FieldSchema, value: &Value, path: &str, report: &mut ValidationReport) {
    let mismatch = |report: &mut ValidationReport| {
        report.push(ValidationError::InvalidValue {
            field: path.to_string(),
            expected: field.kind.label().to_string(),
            actual: value_type_label(value),
        })
    };

    match &field.kind {
        ValueKind::String => {
            if !value.is_string() {
                mismatch(report);
            }
        }
        ValueKind::ResourceName => match value.as_str() {
            Some(raw) if !field.url_param && !is_valid_resource_id(raw) => {
                report.push(ValidationError::InvalidName {
                    field: path.to_string(),
                    value: raw.to_string(),
                })
            }
            Some(_) => {}
            None => mismatch(report),
        },
        ValueKind::Bool => {
            if !value.is_boolean() {
                mismatch(report);
            }
        }
        ValueKind::Integer => {
            if !(value.is_i64() || value.is_u64()) {
                mismatch(report);
            }
        }
        ValueKind::StringList => {
            if !value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string))
            {
                mismatch(report);
            }
        }
        ValueKind::IntegerList => {
            if !value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| item.is_i64() || item.is_u64()))
            {
                mismatch(report);
            }
        }
        ValueKind::StringMap => {
            if !value
                .as_object()
                .is_some_and(|entries| entries.values().all(Value::is_string))
            {
                mismatch(report);
            }
        }
        ValueKind::EnumList { values } => {
            let Some(items) = value.as_array() else {
                mismatch(report);
                return;
            };
            for item in items {
                match item.as_str() {
                    Some(raw) if values.contains(&raw) => {}
                    Some(raw) => report.push(ValidationError::InvalidValue {
                        field: path.to_string(),
                        expected: format!("enum({})", values.join("|")),
                        actual: raw.to_string(),
                    }),
                    None => mismatch(report),
                }
            }
        }
        ValueKind::Object => match value.as_object() {
            Some(map) => validate_fields(map, field.children, path, report),
            None => mismatch(report),
        },
        ValueKind::ObjectList => {
            let Some(items) = value.as_array() else {
                mismatch(report);
                return;
            };
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{index}]");
                match item.as_object() {
                    Some(map) => validate_fields(map, field.children, &item_path, report),
                    None => report.push(ValidationError::InvalidValue {
                        field: item_path,
                        expected: "object".to_string(),
                        actual: value_type_label(item),
                    }),
                }
            }
        }
    }
}

fn value_type_label(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DELIVERY_PIPELINE, TARGET};
    use serde_json::json;

    #[test]
    fn missing_placement_is_reported() {
        let report = validate_document(&json!({"name": "web"}), &DELIVERY_PIPELINE);
        let fields: Vec<_> = report.errors.iter().map(ValidationError::field).collect();
        assert_eq!(fields, vec!["project", "location"]);
    }

    #[test]
    fn two_runtimes_conflict_once() {
        let report = validate_document(
            &json!({
                "name": "prod",
                "project": "p",
                "location": "l",
                "gke": {"cluster": "c"},
                "run": {"location": "projects/p/locations/l"}
            }),
            &TARGET,
        );
        assert_eq!(
            report.errors,
            vec![ValidationError::conflicting("gke", &["gke", "run"])]
        );
    }

    #[test]
    fn nested_required_and_enum_members() {
        let report = validate_document(
            &json!({
                "name": "prod",
                "project": "p",
                "location": "l",
                "multiTarget": {},
                "executionConfigs": [{"usages": ["RENDER", "BUILD"]}, {"workerPool": "wp"}]
            }),
            &TARGET,
        );
        let fields: Vec<_> = report.errors.iter().map(ValidationError::field).collect();
        assert_eq!(
            fields,
            vec![
                "multiTarget.targetIds",
                "executionConfigs[0].usages",
                "executionConfigs[1].usages"
            ]
        );
    }

    #[test]
    fn strategy_variants_conflict_inside_stage() {
        let report = validate_document(
            &json!({
                "name": "web",
                "project": "p",
                "location": "l",
                "serialPipeline": {"stages": [{
                    "targetId": "prod",
                    "strategy": {"standard": {}, "canary": {}}
                }]}
            }),
            &DELIVERY_PIPELINE,
        );
        assert_eq!(
            report.errors,
            vec![ValidationError::conflicting(
                "serialPipeline.stages[0].strategy",
                &["standard", "canary"]
            )]
        );
    }

    #[test]
    fn invalid_names_and_unknown_fields() {
        let report = validate_document(
            &json!({"name": "Web_1", "project": "p", "location": "l", "colour": "red"}),
            &DELIVERY_PIPELINE,
        );
        assert!(matches!(report.errors[0], ValidationError::InvalidName { .. }));
        assert!(matches!(report.errors[1], ValidationError::UnknownField { .. }));
    }

    #[test]
    fn output_only_fields_are_accepted() {
        let report = validate_document(
            &json!({
                "name": "web",
                "project": "p",
                "location": "l",
                "uid": "1",
                "condition": {"pipelineReadyCondition": {"status": true}}
            }),
            &DELIVERY_PIPELINE,
        );
        assert!(report.is_ok(), "{report}");
    }
}
