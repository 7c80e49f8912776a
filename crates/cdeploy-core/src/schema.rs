//! static schema descriptors for the supported resource kinds.
//!
//! the descriptors mirror the wire representation field by field and drive
//! validation, canonicalization, diffing and request body construction.

use serde::Serialize;

/// shape of a field's json value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    String,
    /// a resource name, compared by its last path segment.
    ResourceName,
    Bool,
    Integer,
    StringList,
    IntegerList,
    StringMap,
    EnumList { values: &'static [&'static str] },
    Object,
    ObjectList,
}

impl ValueKind {
    /// label used in validation messages.
    pub fn label(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::ResourceName => "resource_name",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "int",
            ValueKind::StringList => "list<string>",
            ValueKind::IntegerList => "list<int>",
            ValueKind::StringMap => "map<string,string>",
            ValueKind::EnumList { .. } => "list<enum>",
            ValueKind::Object => "object",
            ValueKind::ObjectList => "list<object>",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ValueKind::Object)
    }

    pub fn is_object_list(&self) -> bool {
        matches!(self, ValueKind::ObjectList)
    }
}

/// the operation a difference on a field resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Operation {
    /// inherit from the parent field, or the resource's update operation.
    Inherit,
    /// the field is immutable; changing it means recreating the resource.
    Recreate,
    /// a named update call.
    Update(&'static str),
}

/// one field of a resource or nested record.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: ValueKind,
    pub required: bool,
    pub output_only: bool,
    /// the server fills the field when the caller leaves it unset.
    pub server_default: bool,
    /// send the field even when its value is empty.
    pub send_empty: bool,
    /// the field is encoded in the url, never in a request body.
    pub url_param: bool,
    /// fields that may not be set together with this one.
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub conflicts: &'static [&'static str],
    pub operation: Operation,
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub children: &'static [FieldSchema],
}

impl FieldSchema {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            output_only: false,
            server_default: false,
            send_empty: false,
            url_param: false,
            conflicts: &[],
            operation: Operation::Inherit,
            children: &[],
        }
    }

    pub const fn object(name: &'static str, children: &'static [FieldSchema]) -> Self {
        let mut field = Self::new(name, ValueKind::Object);
        field.children = children;
        field
    }

    pub const fn object_list(name: &'static str, children: &'static [FieldSchema]) -> Self {
        let mut field = Self::new(name, ValueKind::ObjectList);
        field.children = children;
        field
    }

    /// a member of a one-of group; `{}` selects it, so it is always sent.
    pub const fn variant(
        name: &'static str,
        children: &'static [FieldSchema],
        conflicts: &'static [&'static str],
    ) -> Self {
        let mut field = Self::object(name, children);
        field.send_empty = true;
        field.conflicts = conflicts;
        field
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn output_only(mut self) -> Self {
        self.output_only = true;
        self
    }

    pub const fn server_default(mut self) -> Self {
        self.server_default = true;
        self
    }

    pub const fn recreate(mut self) -> Self {
        self.operation = Operation::Recreate;
        self
    }

    pub const fn url_param(mut self) -> Self {
        self.url_param = true;
        self
    }

    /// look up a direct child by wire name.
    pub fn child(&self, name: &str) -> Option<&'static FieldSchema> {
        self.children.iter().find(|field| field.name == name)
    }

    /// resolve the effective operation given the parent's.
    pub fn resolve_operation(&self, parent: Operation) -> Operation {
        match self.operation {
            Operation::Inherit => parent,
            other => other,
        }
    }
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// schema of a top-level resource kind.
#[derive(Debug, Serialize)]
pub struct ResourceSchema {
    pub kind: &'static str,
    /// url collection segment, also the list response key.
    pub collection: &'static str,
    /// query parameter carrying the id on create.
    pub id_param: &'static str,
    pub update_operation: &'static str,
    /// delete requests carry `force=true`.
    pub force_delete: bool,
    pub fields: &'static [FieldSchema],
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// operation assigned to top-level fields that do not override it.
    pub fn default_operation(&self) -> Operation {
        Operation::Update(self.update_operation)
    }
}

use ValueKind::{Bool, Integer, IntegerList, ResourceName, StringList, StringMap};

const STRING: ValueKind = ValueKind::String;

const ACTIONS: &[FieldSchema] = &[FieldSchema::new("actions", StringList)];

const STANDARD: &[FieldSchema] = &[
    FieldSchema::new("verify", Bool),
    FieldSchema::object("predeploy", ACTIONS),
    FieldSchema::object("postdeploy", ACTIONS),
];

const GATEWAY_SERVICE_MESH: &[FieldSchema] = &[
    FieldSchema::new("httpRoute", STRING).required(),
    FieldSchema::new("service", STRING).required(),
    FieldSchema::new("deployment", STRING).required(),
    FieldSchema::new("routeUpdateWaitTime", STRING),
    FieldSchema::new("stableCutbackDuration", STRING),
    FieldSchema::new("podSelectorLabel", STRING),
];

const SERVICE_NETWORKING: &[FieldSchema] = &[
    FieldSchema::new("service", STRING).required(),
    FieldSchema::new("deployment", STRING).required(),
    FieldSchema::new("disablePodOverprovisioning", Bool),
    FieldSchema::new("podSelectorLabel", STRING),
];

const KUBERNETES: &[FieldSchema] = &[
    FieldSchema::variant(
        "gatewayServiceMesh",
        GATEWAY_SERVICE_MESH,
        &["serviceNetworking"],
    ),
    FieldSchema::variant(
        "serviceNetworking",
        SERVICE_NETWORKING,
        &["gatewayServiceMesh"],
    ),
];

const CLOUD_RUN: &[FieldSchema] = &[
    FieldSchema::new("automaticTrafficControl", Bool),
    FieldSchema::new("canaryRevisionTags", StringList),
    FieldSchema::new("priorRevisionTags", StringList),
    FieldSchema::new("stableRevisionTags", StringList),
];

const RUNTIME_CONFIG: &[FieldSchema] = &[
    FieldSchema::variant("kubernetes", KUBERNETES, &["cloudRun"]),
    FieldSchema::variant("cloudRun", CLOUD_RUN, &["kubernetes"]),
];

const CANARY_DEPLOYMENT: &[FieldSchema] = &[
    FieldSchema::new("percentages", IntegerList).required(),
    FieldSchema::new("verify", Bool),
    FieldSchema::object("predeploy", ACTIONS),
    FieldSchema::object("postdeploy", ACTIONS),
];

const PHASE_CONFIG: &[FieldSchema] = &[
    FieldSchema::new("phaseId", STRING).required(),
    FieldSchema::new("percentage", Integer).required(),
    FieldSchema::new("profiles", StringList),
    FieldSchema::new("verify", Bool),
    FieldSchema::object("predeploy", ACTIONS),
    FieldSchema::object("postdeploy", ACTIONS),
];

const CUSTOM_CANARY_DEPLOYMENT: &[FieldSchema] =
    &[FieldSchema::object_list("phaseConfigs", PHASE_CONFIG).required()];

const CANARY: &[FieldSchema] = &[
    FieldSchema::object("runtimeConfig", RUNTIME_CONFIG),
    FieldSchema::variant(
        "canaryDeployment",
        CANARY_DEPLOYMENT,
        &["customCanaryDeployment"],
    ),
    FieldSchema::variant(
        "customCanaryDeployment",
        CUSTOM_CANARY_DEPLOYMENT,
        &["canaryDeployment"],
    ),
];

const STRATEGY: &[FieldSchema] = &[
    FieldSchema::variant("standard", STANDARD, &["canary"]),
    FieldSchema::variant("canary", CANARY, &["standard"]),
];

const DEPLOY_PARAMETERS: &[FieldSchema] = &[
    FieldSchema::new("values", StringMap).required(),
    FieldSchema::new("matchTargetLabels", StringMap),
];

const STAGE: &[FieldSchema] = &[
    FieldSchema::new("targetId", STRING),
    FieldSchema::new("profiles", StringList),
    FieldSchema::object("strategy", STRATEGY),
    FieldSchema::object_list("deployParameters", DEPLOY_PARAMETERS),
];

const SERIAL_PIPELINE: &[FieldSchema] = &[FieldSchema::object_list("stages", STAGE)];

const PIPELINE_READY_CONDITION: &[FieldSchema] = &[
    FieldSchema::new("status", Bool),
    FieldSchema::new("updateTime", STRING),
];

const TARGETS_PRESENT_CONDITION: &[FieldSchema] = &[
    FieldSchema::new("status", Bool),
    FieldSchema::new("missingTargets", StringList),
    FieldSchema::new("updateTime", STRING),
];

const TARGETS_TYPE_CONDITION: &[FieldSchema] = &[
    FieldSchema::new("status", Bool),
    FieldSchema::new("errorDetails", STRING),
];

const CONDITION: &[FieldSchema] = &[
    FieldSchema::object("pipelineReadyCondition", PIPELINE_READY_CONDITION),
    FieldSchema::object("targetsPresentCondition", TARGETS_PRESENT_CONDITION),
    FieldSchema::object("targetsTypeCondition", TARGETS_TYPE_CONDITION),
];

pub static DELIVERY_PIPELINE: ResourceSchema = ResourceSchema {
    kind: "DeliveryPipeline",
    collection: "deliveryPipelines",
    id_param: "deliveryPipelineId",
    update_operation: "updateDeliveryPipelineUpdateDeliveryPipelineOperation",
    force_delete: true,
    fields: &[
        FieldSchema::new("name", ResourceName).required().recreate(),
        FieldSchema::new("uid", STRING).output_only(),
        FieldSchema::new("description", STRING),
        FieldSchema::new("annotations", StringMap),
        FieldSchema::new("labels", StringMap),
        FieldSchema::new("createTime", STRING).output_only(),
        FieldSchema::new("updateTime", STRING).output_only(),
        FieldSchema::object("serialPipeline", SERIAL_PIPELINE),
        FieldSchema::object("condition", CONDITION).output_only(),
        FieldSchema::new("etag", STRING).output_only(),
        FieldSchema::new("project", ResourceName)
            .required()
            .recreate()
            .url_param(),
        FieldSchema::new("location", ResourceName)
            .required()
            .recreate()
            .url_param(),
        FieldSchema::new("suspended", Bool),
    ],
};

/// allowed values for `executionConfigs[].usages`.
pub const EXECUTION_USAGES: &[&str] = &[
    "EXECUTION_ENVIRONMENT_USAGE_UNSPECIFIED",
    "RENDER",
    "DEPLOY",
    "VERIFY",
    "PREDEPLOY",
    "POSTDEPLOY",
];

const GKE: &[FieldSchema] = &[
    FieldSchema::new("cluster", ResourceName),
    FieldSchema::new("internalIp", Bool),
];

const ANTHOS_CLUSTER: &[FieldSchema] = &[FieldSchema::new("membership", ResourceName)];

/// moving a cloud run target to another location needs a new target.
const RUN: &[FieldSchema] = &[FieldSchema::new("location", STRING).required().recreate()];

const MULTI_TARGET: &[FieldSchema] = &[FieldSchema::new("targetIds", StringList).required()];

const CUSTOM_TARGET: &[FieldSchema] =
    &[FieldSchema::new("customTargetType", ResourceName).required()];

const EXECUTION_CONFIG: &[FieldSchema] = &[
    FieldSchema::new(
        "usages",
        ValueKind::EnumList {
            values: EXECUTION_USAGES,
        },
    )
    .required(),
    FieldSchema::new("workerPool", ResourceName),
    FieldSchema::new("serviceAccount", STRING).server_default(),
    FieldSchema::new("artifactStorage", STRING).server_default(),
    FieldSchema::new("executionTimeout", STRING).server_default(),
    FieldSchema::new("verbose", Bool),
];

/// wire names of the mutually exclusive target runtimes.
pub const TARGET_RUNTIMES: &[&str] = &["gke", "anthosCluster", "run", "multiTarget", "customTarget"];

pub static TARGET: ResourceSchema = ResourceSchema {
    kind: "Target",
    collection: "targets",
    id_param: "targetId",
    update_operation: "updateTargetUpdateTargetOperation",
    force_delete: false,
    fields: &[
        FieldSchema::new("name", ResourceName).required().recreate(),
        FieldSchema::new("targetId", STRING).output_only(),
        FieldSchema::new("uid", STRING).output_only(),
        FieldSchema::new("description", STRING),
        FieldSchema::new("annotations", StringMap),
        FieldSchema::new("labels", StringMap),
        FieldSchema::new("requireApproval", Bool),
        FieldSchema::new("createTime", STRING).output_only(),
        FieldSchema::new("updateTime", STRING).output_only(),
        FieldSchema::variant(
            "gke",
            GKE,
            &["anthosCluster", "run", "multiTarget", "customTarget"],
        ),
        FieldSchema::variant(
            "anthosCluster",
            ANTHOS_CLUSTER,
            &["gke", "run", "multiTarget", "customTarget"],
        ),
        FieldSchema::variant(
            "run",
            RUN,
            &["gke", "anthosCluster", "multiTarget", "customTarget"],
        ),
        FieldSchema::variant(
            "multiTarget",
            MULTI_TARGET,
            &["gke", "anthosCluster", "run", "customTarget"],
        ),
        FieldSchema::variant(
            "customTarget",
            CUSTOM_TARGET,
            &["gke", "anthosCluster", "run", "multiTarget"],
        ),
        FieldSchema::new("etag", STRING).output_only(),
        FieldSchema::object_list("executionConfigs", EXECUTION_CONFIG).server_default(),
        FieldSchema::new("project", ResourceName)
            .required()
            .recreate()
            .url_param(),
        FieldSchema::new("location", ResourceName)
            .required()
            .recreate()
            .url_param(),
        FieldSchema::new("deployParameters", StringMap),
    ],
};

/// all resource schemas known to this crate.
pub fn all() -> [&'static ResourceSchema; 2] {
    [&DELIVERY_PIPELINE, &TARGET]
}
