//! deployment target resource.

use crate::field::{deserialize_variant, Field};
use crate::schema::TARGET_RUNTIMES;
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// a deployment target: where a pipeline stage deploys to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TargetRecord", into = "TargetRecord")]
pub struct Target {
    pub name: Option<String>,
    /// server-assigned short id.
    pub target_id: Option<String>,
    pub uid: Option<String>,
    pub description: Option<String>,
    pub annotations: Field<BTreeMap<String, String>>,
    pub labels: Field<BTreeMap<String, String>>,
    /// rollouts to this target wait for approval.
    pub require_approval: Option<bool>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
    pub runtime: Field<Runtime>,
    pub etag: Option<String>,
    pub execution_configs: Field<Vec<ExecutionConfig>>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub deploy_parameters: Field<BTreeMap<String, String>>,
}

/// the single runtime a target deploys to.
#[derive(Debug, Clone, PartialEq)]
pub enum Runtime {
    Gke(GkeCluster),
    AnthosCluster(AnthosCluster),
    Run(CloudRunLocation),
    MultiTarget(MultiTarget),
    CustomTarget(CustomTarget),
}

impl Runtime {
    /// wire name of the selected runtime.
    pub fn key(&self) -> &'static str {
        match self {
            Runtime::Gke(_) => "gke",
            Runtime::AnthosCluster(_) => "anthosCluster",
            Runtime::Run(_) => "run",
            Runtime::MultiTarget(_) => "multiTarget",
            Runtime::CustomTarget(_) => "customTarget",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GkeCluster {
    /// `projects/{project}/locations/{location}/clusters/{cluster}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnthosCluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudRunLocation {
    /// `projects/{project}/locations/{location}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTarget {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub target_ids: Field<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_target_type: Option<String>,
}

/// execution environment for one or more phases of a rollout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub usages: Field<Vec<ExecutionUsage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionUsage {
    ExecutionEnvironmentUsageUnspecified,
    Render,
    Deploy,
    Verify,
    Predeploy,
    Postdeploy,
}

impl Target {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            project: Some(project.into()),
            location: Some(location.into()),
            ..Default::default()
        }
    }
}

/// wire shape of a target.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub annotations: Field<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub labels: Field<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_approval: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub gke: Field<GkeCluster>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub anthos_cluster: Field<AnthosCluster>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub run: Field<CloudRunLocation>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub multi_target: Field<MultiTarget>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub custom_target: Field<CustomTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub execution_configs: Field<Vec<ExecutionConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub deploy_parameters: Field<BTreeMap<String, String>>,
}

impl TargetRecord {
    fn take_runtime(&mut self) -> Result<Field<Runtime>, ValidationError> {
        let gke = std::mem::take(&mut self.gke);
        let anthos = std::mem::take(&mut self.anthos_cluster);
        let run = std::mem::take(&mut self.run);
        let multi = std::mem::take(&mut self.multi_target);
        let custom = std::mem::take(&mut self.custom_target);

        let any_empty = [
            gke.is_empty(),
            anthos.is_empty(),
            run.is_empty(),
            multi.is_empty(),
            custom.is_empty(),
        ]
        .into_iter()
        .any(|empty| empty);

        let mut selected: Vec<Runtime> = Vec::new();
        selected.extend(gke.into_value().map(Runtime::Gke));
        selected.extend(anthos.into_value().map(Runtime::AnthosCluster));
        selected.extend(run.into_value().map(Runtime::Run));
        selected.extend(multi.into_value().map(Runtime::MultiTarget));
        selected.extend(custom.into_value().map(Runtime::CustomTarget));

        match selected.len() {
            0 if any_empty => Ok(Field::Empty),
            0 => Ok(Field::Absent),
            1 => Ok(selected.pop().map(Field::Value).unwrap_or_default()),
            _ => Err(ValidationError::conflicting("target", TARGET_RUNTIMES)),
        }
    }
}

impl TryFrom<TargetRecord> for Target {
    type Error = ValidationError;

    fn try_from(mut record: TargetRecord) -> Result<Self, Self::Error> {
        let runtime = record.take_runtime()?;
        Ok(Target {
            name: record.name,
            target_id: record.target_id,
            uid: record.uid,
            description: record.description,
            annotations: record.annotations,
            labels: record.labels,
            require_approval: record.require_approval,
            create_time: record.create_time,
            update_time: record.update_time,
            runtime,
            etag: record.etag,
            execution_configs: record.execution_configs,
            project: record.project,
            location: record.location,
            deploy_parameters: record.deploy_parameters,
        })
    }
}

impl From<Target> for TargetRecord {
    fn from(target: Target) -> Self {
        let mut record = TargetRecord {
            name: target.name,
            target_id: target.target_id,
            uid: target.uid,
            description: target.description,
            annotations: target.annotations,
            labels: target.labels,
            require_approval: target.require_approval,
            create_time: target.create_time,
            update_time: target.update_time,
            etag: target.etag,
            execution_configs: target.execution_configs,
            project: target.project,
            location: target.location,
            deploy_parameters: target.deploy_parameters,
            ..Default::default()
        };
        match target.runtime {
            Field::Value(Runtime::Gke(gke)) => record.gke = Field::Value(gke),
            Field::Value(Runtime::AnthosCluster(anthos)) => {
                record.anthos_cluster = Field::Value(anthos)
            }
            Field::Value(Runtime::Run(run)) => record.run = Field::Value(run),
            Field::Value(Runtime::MultiTarget(multi)) => record.multi_target = Field::Value(multi),
            Field::Value(Runtime::CustomTarget(custom)) => {
                record.custom_target = Field::Value(custom)
            }
            Field::Empty => {
                record.gke = Field::Empty;
                record.anthos_cluster = Field::Empty;
                record.run = Field::Empty;
                record.multi_target = Field::Empty;
                record.custom_target = Field::Empty;
            }
            Field::Absent => {}
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn single_runtime_decodes_into_sum_type() {
        let target: Target = serde_json::from_value(json!({
            "name": "prod",
            "run": {"location": "projects/p/locations/us-central1"}
        }))
        .unwrap();
        assert_eq!(target.runtime.value().map(Runtime::key), Some("run"));
    }

    #[test]
    fn conflicting_runtimes_are_rejected() {
        let err = serde_json::from_value::<Target>(json!({
            "name": "prod",
            "gke": {"cluster": "projects/p/locations/l/clusters/c"},
            "run": {"location": "projects/p/locations/l"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("conflicting"));
    }

    #[test]
    fn usages_keep_order() {
        let target: Target = serde_json::from_value(json!({
            "executionConfigs": [{"usages": ["RENDER", "DEPLOY"]}]
        }))
        .unwrap();
        let configs = target.execution_configs.value().unwrap();
        assert_eq!(
            configs[0].usages.value().cloned(),
            Some(vec![ExecutionUsage::Render, ExecutionUsage::Deploy])
        );
    }

    #[test]
    fn empty_runtime_serializes_as_nulls() {
        let target = Target {
            runtime: Field::Empty,
            ..Target::new("p", "l", "t")
        };
        let value = serde_json::to_value(&target).unwrap();
        for key in TARGET_RUNTIMES {
            assert_eq!(value[*key], Value::Null);
            assert!(value.as_object().unwrap().contains_key(*key));
        }
    }
}
