//! core resource model and validation primitives for cdeploy.

pub mod field;
pub mod names;
pub mod pipeline;
pub mod schema;
pub mod strategy;
pub mod target;
pub mod validation;

/// generic json object used for wire bodies and resource views.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

pub use field::{is_blank, Field};
pub use names::{names_match, parent_path, resource_name, short_name};
pub use pipeline::{
    Condition, DeliveryPipeline, DeployParameters, PipelineReadyCondition, SerialPipeline, Stage,
    TargetsPresentCondition, TargetsTypeCondition,
};
pub use schema::{FieldSchema, Operation, ResourceSchema, ValueKind};
pub use strategy::{
    Canary, CanaryDeployment, CloudRunConfig, CustomCanaryDeployment, GatewayServiceMesh, Hook,
    KubernetesConfig, PercentageRamp, PhaseConfig, RuntimeConfig, ServiceNetworking, Standard,
    Strategy,
};
pub use target::{
    AnthosCluster, CloudRunLocation, CustomTarget, ExecutionConfig, ExecutionUsage, GkeCluster,
    MultiTarget, Runtime, Target,
};
pub use validation::{validate_document, ValidationError, ValidationReport};
