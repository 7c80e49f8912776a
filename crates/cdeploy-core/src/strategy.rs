//! deployment strategies attached to pipeline stages.
//!
//! each one-of group on the wire is a sum type here. the `*Record` types are
//! the raw wire shapes used for (de)serialization only.

use crate::field::{deserialize_variant, Field};
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};

/// deployment strategy of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StrategyRecord", into = "StrategyRecord")]
pub enum Strategy {
    Standard(Standard),
    Canary(Canary),
}

/// a single deploy with optional hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub predeploy: Field<Hook>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub postdeploy: Field<Hook>,
}

/// custom actions run before or after a deploy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub actions: Field<Vec<String>>,
}

/// progressive traffic shifting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CanaryRecord", into = "CanaryRecord")]
pub struct Canary {
    pub runtime_config: Field<RuntimeConfig>,
    pub deployment: Field<CanaryDeployment>,
}

/// runtime-specific traffic configuration for a canary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuntimeConfigRecord", into = "RuntimeConfigRecord")]
pub enum RuntimeConfig {
    Kubernetes(KubernetesConfig),
    CloudRun(CloudRunConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KubernetesRecord", into = "KubernetesRecord")]
pub enum KubernetesConfig {
    GatewayServiceMesh(GatewayServiceMesh),
    ServiceNetworking(ServiceNetworking),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayServiceMesh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_update_wait_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_cutback_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNetworking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_pod_overprovisioning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudRunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_traffic_control: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub canary_revision_tags: Field<Vec<String>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub prior_revision_tags: Field<Vec<String>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub stable_revision_tags: Field<Vec<String>>,
}

/// how a canary ramps traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum CanaryDeployment {
    /// the same phases for every target, given as percentages.
    Percentages(PercentageRamp),
    /// explicit per-phase configuration.
    Custom(CustomCanaryDeployment),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageRamp {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub percentages: Field<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub predeploy: Field<Hook>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub postdeploy: Field<Hook>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCanaryDeployment {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub phase_configs: Field<Vec<PhaseConfig>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub profiles: Field<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub predeploy: Field<Hook>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub postdeploy: Field<Hook>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRecord {
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub standard: Field<Standard>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub canary: Field<Canary>,
}

impl TryFrom<StrategyRecord> for Strategy {
    type Error = ValidationError;

    fn try_from(record: StrategyRecord) -> Result<Self, Self::Error> {
        match (record.standard.into_value(), record.canary.into_value()) {
            (Some(standard), None) => Ok(Strategy::Standard(standard)),
            (None, Some(canary)) => Ok(Strategy::Canary(canary)),
            (None, None) => Err(ValidationError::missing_variant(
                "strategy",
                &["standard", "canary"],
            )),
            (Some(_), Some(_)) => Err(ValidationError::conflicting(
                "strategy",
                &["standard", "canary"],
            )),
        }
    }
}

impl From<Strategy> for StrategyRecord {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Standard(standard) => StrategyRecord {
                standard: Field::Value(standard),
                ..Default::default()
            },
            Strategy::Canary(canary) => StrategyRecord {
                canary: Field::Value(canary),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryRecord {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub runtime_config: Field<RuntimeConfig>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub canary_deployment: Field<PercentageRamp>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub custom_canary_deployment: Field<CustomCanaryDeployment>,
}

impl TryFrom<CanaryRecord> for Canary {
    type Error = ValidationError;

    fn try_from(record: CanaryRecord) -> Result<Self, Self::Error> {
        let deployment = match (record.canary_deployment, record.custom_canary_deployment) {
            (Field::Value(_), Field::Value(_)) => {
                return Err(ValidationError::conflicting(
                    "canary",
                    &["canaryDeployment", "customCanaryDeployment"],
                ))
            }
            (Field::Value(ramp), _) => Field::Value(CanaryDeployment::Percentages(ramp)),
            (_, Field::Value(custom)) => Field::Value(CanaryDeployment::Custom(custom)),
            (Field::Empty, _) | (_, Field::Empty) => Field::Empty,
            (Field::Absent, Field::Absent) => Field::Absent,
        };
        Ok(Canary {
            runtime_config: record.runtime_config,
            deployment,
        })
    }
}

impl From<Canary> for CanaryRecord {
    fn from(canary: Canary) -> Self {
        let mut record = CanaryRecord {
            runtime_config: canary.runtime_config,
            ..Default::default()
        };
        match canary.deployment {
            Field::Value(CanaryDeployment::Percentages(ramp)) => {
                record.canary_deployment = Field::Value(ramp)
            }
            Field::Value(CanaryDeployment::Custom(custom)) => {
                record.custom_canary_deployment = Field::Value(custom)
            }
            Field::Empty => record.canary_deployment = Field::Empty,
            Field::Absent => {}
        }
        record
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfigRecord {
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub kubernetes: Field<KubernetesConfig>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub cloud_run: Field<CloudRunConfig>,
}

impl TryFrom<RuntimeConfigRecord> for RuntimeConfig {
    type Error = ValidationError;

    fn try_from(record: RuntimeConfigRecord) -> Result<Self, Self::Error> {
        match (record.kubernetes.into_value(), record.cloud_run.into_value()) {
            (Some(kubernetes), None) => Ok(RuntimeConfig::Kubernetes(kubernetes)),
            (None, Some(cloud_run)) => Ok(RuntimeConfig::CloudRun(cloud_run)),
            (None, None) => Err(ValidationError::missing_variant(
                "runtimeConfig",
                &["kubernetes", "cloudRun"],
            )),
            (Some(_), Some(_)) => Err(ValidationError::conflicting(
                "runtimeConfig",
                &["kubernetes", "cloudRun"],
            )),
        }
    }
}

impl From<RuntimeConfig> for RuntimeConfigRecord {
    fn from(config: RuntimeConfig) -> Self {
        match config {
            RuntimeConfig::Kubernetes(kubernetes) => RuntimeConfigRecord {
                kubernetes: Field::Value(kubernetes),
                ..Default::default()
            },
            RuntimeConfig::CloudRun(cloud_run) => RuntimeConfigRecord {
                cloud_run: Field::Value(cloud_run),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesRecord {
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub gateway_service_mesh: Field<GatewayServiceMesh>,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        skip_serializing_if = "Field::is_absent"
    )]
    pub service_networking: Field<ServiceNetworking>,
}

impl TryFrom<KubernetesRecord> for KubernetesConfig {
    type Error = ValidationError;

    fn try_from(record: KubernetesRecord) -> Result<Self, Self::Error> {
        match (
            record.gateway_service_mesh.into_value(),
            record.service_networking.into_value(),
        ) {
            (Some(mesh), None) => Ok(KubernetesConfig::GatewayServiceMesh(mesh)),
            (None, Some(networking)) => Ok(KubernetesConfig::ServiceNetworking(networking)),
            (None, None) => Err(ValidationError::missing_variant(
                "kubernetes",
                &["gatewayServiceMesh", "serviceNetworking"],
            )),
            (Some(_), Some(_)) => Err(ValidationError::conflicting(
                "kubernetes",
                &["gatewayServiceMesh", "serviceNetworking"],
            )),
        }
    }
}

impl From<KubernetesConfig> for KubernetesRecord {
    fn from(config: KubernetesConfig) -> Self {
        match config {
            KubernetesConfig::GatewayServiceMesh(mesh) => KubernetesRecord {
                gateway_service_mesh: Field::Value(mesh),
                ..Default::default()
            },
            KubernetesConfig::ServiceNetworking(networking) => KubernetesRecord {
                service_networking: Field::Value(networking),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_with_defaults_is_selected_by_empty_object() {
        let strategy: Strategy = serde_json::from_value(json!({"standard": {}})).unwrap();
        assert_eq!(strategy, Strategy::Standard(Standard::default()));
        assert_eq!(
            serde_json::to_value(&strategy).unwrap(),
            json!({"standard": {}})
        );
    }

    #[test]
    fn standard_and_canary_conflict() {
        let err = serde_json::from_value::<Strategy>(json!({
            "standard": {"verify": true},
            "canary": {}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("standard"));
    }

    #[test]
    fn canary_cloud_run_with_custom_phases() {
        let raw = json!({
            "canary": {
                "runtimeConfig": {"cloudRun": {"automaticTrafficControl": true}},
                "customCanaryDeployment": {
                    "phaseConfigs": [
                        {"phaseId": "ten", "percentage": 10, "verify": true},
                        {"phaseId": "stable", "percentage": 100}
                    ]
                }
            }
        });
        let strategy: Strategy = serde_json::from_value(raw.clone()).unwrap();
        let Strategy::Canary(canary) = &strategy else {
            panic!("expected canary");
        };
        assert!(matches!(
            canary.runtime_config,
            Field::Value(RuntimeConfig::CloudRun(_))
        ));
        let Field::Value(CanaryDeployment::Custom(custom)) = &canary.deployment else {
            panic!("expected custom deployment");
        };
        assert_eq!(custom.phase_configs.value().map(Vec::len), Some(2));
        assert_eq!(serde_json::to_value(&strategy).unwrap(), raw);
    }

    #[test]
    fn percentage_ramp_and_custom_phases_conflict() {
        let err = serde_json::from_value::<Canary>(json!({
            "canaryDeployment": {"percentages": [25, 50]},
            "customCanaryDeployment": {"phaseConfigs": [{"phaseId": "p", "percentage": 5}]}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("customCanaryDeployment"));
    }

    #[test]
    fn kubernetes_service_networking() {
        let config: RuntimeConfig = serde_json::from_value(json!({
            "kubernetes": {"serviceNetworking": {"service": "web", "deployment": "web"}}
        }))
        .unwrap();
        assert!(matches!(
            config,
            RuntimeConfig::Kubernetes(KubernetesConfig::ServiceNetworking(_))
        ));
    }
}
