//! conversion between typed resources, json views and wire bodies.
//!
//! a *view* is the serde json form of a resource: absent fields are missing,
//! explicitly empty fields are null. a *body* is what goes over the wire:
//! output-only, url-only and empty fields stripped, names fully qualified.

use crate::canonical::canonicalize_initial;
use crate::types::Resource;
use cdeploy_core::{is_blank, resource_name, FieldSchema, JsonMap, ResourceSchema, ValueKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// serialize a resource into its json view.
pub fn to_view<R: Serialize>(resource: &R) -> Result<JsonMap, serde_json::Error> {
    match serde_json::to_value(resource)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "resource serialized to {other}, expected an object"
        ))),
    }
}

/// decode a json view into a typed resource.
pub fn from_view<R: DeserializeOwned>(view: JsonMap) -> Result<R, serde_json::Error> {
    serde_json::from_value(Value::Object(view))
}

/// the diff view of a resource: every field it carries, output-only included.
pub fn expand_full<R: Resource>(resource: &R) -> Result<JsonMap, serde_json::Error> {
    to_view(resource)
}

/// build a request body from a typed resource.
pub fn expand<R: Resource>(resource: &R) -> Result<JsonMap, serde_json::Error> {
    Ok(expand_view(&to_view(resource)?, R::schema()))
}

/// build a request body from a json view.
pub fn expand_view(view: &JsonMap, schema: &ResourceSchema) -> JsonMap {
    let mut body = strip(view, schema.fields);
    let part = |key: &str| view.get(key).and_then(Value::as_str);
    if let (Some(project), Some(location), Some(name)) =
        (part("project"), part("location"), part("name"))
    {
        body.insert(
            "name".to_string(),
            Value::String(resource_name(project, location, schema.collection, name)),
        );
    }
    body
}

fn strip(map: &JsonMap, fields: &[FieldSchema]) -> JsonMap {
    let mut out = JsonMap::new();
    for field in fields {
        if field.output_only || field.url_param {
            continue;
        }
        let Some(value) = map.get(field.name) else {
            continue;
        };
        let value = match (&field.kind, value) {
            (ValueKind::Object, Value::Object(inner)) => Value::Object(strip(inner, field.children)),
            (ValueKind::ObjectList, Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(inner) => Value::Object(strip(inner, field.children)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            _ => value.clone(),
        };
        let keep_empty = field.send_empty && !value.is_null();
        if is_blank(&value) && !keep_empty {
            continue;
        }
        out.insert(field.name.to_string(), value);
    }
    out
}

/// decode a server body into a typed resource.
///
/// missing collections and records become explicitly empty, and one-of
/// groups the server reports more than one member of are cleared.
pub fn flatten<R: Resource>(body: JsonMap) -> Result<R, serde_json::Error> {
    let schema = R::schema();
    let mut view = body;
    settle(&mut view, schema.fields);
    let view = canonicalize_initial(view, schema);
    from_view(view)
}

fn is_container(kind: &ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Object
            | ValueKind::ObjectList
            | ValueKind::StringList
            | ValueKind::IntegerList
            | ValueKind::StringMap
            | ValueKind::EnumList { .. }
    )
}

/// mark missing containers as explicitly empty, recursing into populated
/// records.
pub fn settle(map: &mut JsonMap, fields: &[FieldSchema]) {
    for field in fields {
        match map.get_mut(field.name) {
            None => {
                if is_container(&field.kind) {
                    map.insert(field.name.to_string(), Value::Null);
                }
            }
            Some(Value::Object(inner)) if field.kind.is_object() && !inner.is_empty() => {
                settle(inner, field.children);
            }
            Some(Value::Array(items)) if field.kind.is_object_list() => {
                for item in items {
                    if let Value::Object(inner) = item {
                        if !inner.is_empty() {
                            settle(inner, field.children);
                        }
                    }
                }
            }
            Some(_) => {}
        }
    }
}

/// true when a view value carries nothing for the given field.
///
/// `false` and `0` count as unset: the server omits them from responses.
/// members of one-of groups are set by `{}`.
pub(crate) fn is_unset(field: &FieldSchema, value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(_) if field.send_empty => false,
        Some(Value::Bool(flag)) => !flag,
        Some(Value::Number(number)) => number.as_f64() == Some(0.0),
        Some(other) => is_blank(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdeploy_core::{
        Canary, CanaryDeployment, CloudRunConfig, CustomCanaryDeployment, DeliveryPipeline,
        ExecutionConfig, ExecutionUsage, Field, GatewayServiceMesh, Hook, KubernetesConfig,
        PercentageRamp, PhaseConfig, RuntimeConfig, SerialPipeline, Stage, Strategy, Target,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn body(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn expand_strips_output_only_and_empty_fields() {
        let mut pipeline = DeliveryPipeline::new("p", "l", "web");
        pipeline.uid = Some("123".to_string());
        pipeline.etag = Some("e".to_string());
        pipeline.labels = Field::Empty;
        pipeline.annotations = Field::Value(BTreeMap::new());
        pipeline.serial_pipeline = Field::Value(SerialPipeline::new(vec![Stage::for_target("a")]));

        let body = expand(&pipeline).unwrap();
        assert_eq!(
            Value::Object(body),
            json!({
                "name": "projects/p/locations/l/deliveryPipelines/web",
                "serialPipeline": {"stages": [{"targetId": "a"}]}
            })
        );
    }

    #[test]
    fn expand_keeps_selected_variant_with_defaults() {
        let value = json!({
            "name": "prod",
            "project": "p",
            "location": "l",
            "anthosCluster": {},
        });
        let target: Target = serde_json::from_value(value).unwrap();
        let body = expand(&target).unwrap();
        assert_eq!(body.get("anthosCluster"), Some(&json!({})));
        assert_eq!(
            body.get("name"),
            Some(&json!("projects/p/locations/l/targets/prod"))
        );
    }

    #[test]
    fn flatten_marks_missing_collections_empty() {
        let target: Target = flatten(body(json!({
            "name": "projects/p/locations/l/targets/prod",
            "description": "d"
        })))
        .unwrap();
        assert!(target.labels.is_empty());
        assert!(target.execution_configs.is_empty());
        assert!(target.runtime.is_empty());
        assert_eq!(target.description.as_deref(), Some("d"));
        assert_eq!(target.require_approval, None);
    }

    #[test]
    fn flatten_clears_conflicting_runtimes() {
        let target: Target = flatten(body(json!({
            "name": "prod",
            "gke": {"cluster": "c"},
            "anthosCluster": {"membership": "m"}
        })))
        .unwrap();
        assert!(target.runtime.is_empty());
    }

    #[test]
    fn usages_round_trip_in_order() {
        let target: Target = flatten(body(json!({
            "name": "prod",
            "executionConfigs": [{"usages": ["RENDER", "DEPLOY"]}]
        })))
        .unwrap();
        let configs = target.execution_configs.value().unwrap();
        assert_eq!(
            configs[0].usages.value().cloned(),
            Some(vec![ExecutionUsage::Render, ExecutionUsage::Deploy])
        );
        let body = expand(&target).unwrap();
        assert_eq!(
            body.get("executionConfigs"),
            Some(&json!([{"usages": ["RENDER", "DEPLOY"]}]))
        );
    }

    #[test]
    fn populated_and_empty_fields_survive_expand_then_flatten() {
        let mut target = Target::new("p", "l", "prod");
        target.description = Some("production".to_string());
        target.require_approval = Some(true);
        target.labels = Field::Value(BTreeMap::from([("env".to_string(), "prod".to_string())]));
        target.annotations = Field::Empty;
        target.deploy_parameters = Field::Empty;
        target.execution_configs = Field::Value(vec![ExecutionConfig {
            usages: Field::Value(vec![ExecutionUsage::Render, ExecutionUsage::Deploy]),
            worker_pool: Some("projects/p/locations/l/workerPools/wp".to_string()),
            ..Default::default()
        }]);

        let mut back: Target = flatten(expand(&target).unwrap()).unwrap();
        back.project = target.project.clone();
        back.location = target.location.clone();
        back.name = target.name.clone();
        back.runtime = target.runtime.clone();

        assert_eq!(back, target);
    }

    fn hook(action: &str) -> Field<Hook> {
        Field::Value(Hook {
            actions: Field::Value(vec![action.to_string()]),
        })
    }

    fn stage(target_id: &str, canary: Canary) -> Stage {
        Stage {
            profiles: Field::Empty,
            strategy: Field::Value(Strategy::Canary(canary)),
            deploy_parameters: Field::Empty,
            ..Stage::for_target(target_id)
        }
    }

    #[test]
    fn canary_strategies_survive_expand_then_flatten() {
        let ramp = Canary {
            runtime_config: Field::Value(RuntimeConfig::CloudRun(CloudRunConfig {
                automatic_traffic_control: Some(true),
                canary_revision_tags: Field::Value(vec!["canary".to_string()]),
                prior_revision_tags: Field::Empty,
                stable_revision_tags: Field::Empty,
            })),
            deployment: Field::Value(CanaryDeployment::Percentages(PercentageRamp {
                percentages: Field::Value(vec![25, 50]),
                verify: Some(true),
                predeploy: hook("migrate"),
                postdeploy: Field::Empty,
            })),
        };
        let custom = Canary {
            runtime_config: Field::Value(RuntimeConfig::Kubernetes(
                KubernetesConfig::GatewayServiceMesh(GatewayServiceMesh {
                    http_route: Some("route".to_string()),
                    service: Some("svc".to_string()),
                    deployment: Some("web".to_string()),
                    ..Default::default()
                }),
            )),
            deployment: Field::Value(CanaryDeployment::Custom(CustomCanaryDeployment {
                phase_configs: Field::Value(vec![
                    PhaseConfig {
                        phase_id: Some("canary".to_string()),
                        percentage: Some(50),
                        profiles: Field::Value(vec!["canary".to_string()]),
                        verify: None,
                        predeploy: Field::Empty,
                        postdeploy: hook("notify"),
                    },
                    PhaseConfig {
                        phase_id: Some("stable".to_string()),
                        percentage: Some(100),
                        profiles: Field::Empty,
                        verify: Some(true),
                        predeploy: Field::Empty,
                        postdeploy: Field::Empty,
                    },
                ]),
            })),
        };
        let mut pipeline = DeliveryPipeline::new("p", "l", "web");
        pipeline.serial_pipeline = Field::Value(SerialPipeline::new(vec![
            stage("staging", ramp),
            stage("prod", custom),
        ]));

        let back: DeliveryPipeline = flatten(expand(&pipeline).unwrap()).unwrap();
        assert_eq!(back.stages(), pipeline.stages());
    }

    #[test]
    fn zero_values_count_as_unset() {
        let field = FieldSchema::new("suspended", ValueKind::Bool);
        assert!(is_unset(&field, Some(&json!(false))));
        assert!(!is_unset(&field, Some(&json!(true))));
        let variant = FieldSchema::variant("gke", &[], &[]);
        assert!(!is_unset(&variant, Some(&json!({}))));
        assert!(is_unset(&variant, Some(&Value::Null)));
    }
}
