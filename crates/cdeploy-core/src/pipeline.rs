//! delivery pipeline resource.

use crate::field::Field;
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// a delivery pipeline: an ordered promotion flow across targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPipeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// server-assigned unique id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub annotations: Field<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub labels: Field<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub serial_pipeline: Field<SerialPipeline>,
    /// readiness reported by the server.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub condition: Field<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// when true, releases and rollouts are blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
}

impl DeliveryPipeline {
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

    /// stages in promotion order; empty when no serial pipeline is set.
    pub fn stages(&self) -> &[Stage] {
        self.serial_pipeline
            .value()
            .and_then(|serial| serial.stages.value())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialPipeline {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub stages: Field<Vec<Stage>>,
}

impl SerialPipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages: Field::Value(stages),
        }
    }
}

/// one promotion step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// skaffold profiles used when rendering for this stage.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub profiles: Field<Vec<String>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub strategy: Field<Strategy>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub deploy_parameters: Field<Vec<DeployParameters>>,
}

impl Stage {
    pub fn for_target(target_id: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployParameters {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub values: Field<BTreeMap<String, String>>,
    /// only targets carrying all of these labels receive the values.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub match_target_labels: Field<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub pipeline_ready_condition: Field<PipelineReadyCondition>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub targets_present_condition: Field<TargetsPresentCondition>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub targets_type_condition: Field<TargetsTypeCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReadyCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsPresentCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub missing_targets: Field<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsTypeCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}
