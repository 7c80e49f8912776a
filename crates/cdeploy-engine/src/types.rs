//! core engine types and the resource api contract.

use crate::error::ApiError;
use async_trait::async_trait;
use cdeploy_core::{parent_path, resource_name, short_name, ResourceSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// placement of a resource collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Parent {
    pub project: String,
    pub location: String,
}

impl Parent {
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
        }
    }

    /// `projects/{project}/locations/{location}`.
    pub fn path(&self) -> String {
        parent_path(&self.project, &self.location)
    }
}

/// fully resolved identity of a single resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub project: String,
    pub location: String,
    /// short name (the last segment of the resource name).
    pub name: String,
}

impl ResourceId {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let project = project.into();
        let location = location.into();
        let name = name.into();
        Self {
            project: short_name(&project).to_string(),
            location: short_name(&location).to_string(),
            name: short_name(&name).to_string(),
        }
    }

    /// build an id from optional parts; `None` when any part is missing.
    pub fn from_parts(
        project: Option<&str>,
        location: Option<&str>,
        name: Option<&str>,
    ) -> Option<Self> {
        match (project, location, name) {
            (Some(project), Some(location), Some(name))
                if !project.is_empty() && !location.is_empty() && !name.is_empty() =>
            {
                Some(Self::new(project, location, name))
            }
            _ => None,
        }
    }

    pub fn parent(&self) -> Parent {
        Parent::new(self.project.clone(), self.location.clone())
    }

    /// full resource name within the given collection.
    pub fn path(&self, schema: &ResourceSchema) -> String {
        resource_name(&self.project, &self.location, schema.collection, &self.name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.location, self.name)
    }
}

/// classification of a single field difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "operation", rename_all = "snake_case")]
pub enum DiffKind {
    /// the field is immutable on an existing resource.
    Recreate,
    /// resolved by the named update call.
    Update(&'static str),
    /// output-only; reported but never acted upon.
    Informational,
}

/// a difference between desired and actual state at one field path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    /// dotted wire path, with `[i]` for list elements.
    pub field: String,
    pub desired: Value,
    pub actual: Value,
    #[serde(flatten)]
    pub kind: DiffKind,
}

impl FieldDiff {
    pub fn is_actionable(&self) -> bool {
        !matches!(self.kind, DiffKind::Informational)
    }

    /// the top-level wire field this diff belongs to.
    pub fn top_level_field(&self) -> &str {
        self.field
            .split(['.', '['])
            .next()
            .unwrap_or(self.field.as_str())
    }
}

/// one named update call and the diffs it resolves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedUpdate {
    pub operation: &'static str,
    /// snake_case top-level fields sent as `updateMask`.
    pub update_mask: Vec<String>,
    pub diffs: Vec<FieldDiff>,
}

/// operation derived from a diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlannedOp {
    /// immutable fields differ; not executable against an existing resource.
    Recreate { diffs: Vec<FieldDiff> },
    Update(PlannedUpdate),
}

/// action the driver will take for a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update { ops: Vec<PlannedOp> },
    NoChange,
}

/// plan for a single resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourcePlan {
    pub kind: &'static str,
    pub id: ResourceId,
    #[serde(flatten)]
    pub action: PlanAction,
    /// every diff found, including informational ones.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diffs: Vec<FieldDiff>,
}

/// caller policies that can block parts of an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    BlockCreation,
    BlockAcquire,
    BlockModification,
    BlockDestruction,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub lifecycle: BTreeSet<Lifecycle>,
    /// identity to read the initial state from, when it differs from desired.
    pub state_hint: Option<ResourceId>,
}

impl ApplyOptions {
    pub fn blocks(&self, lifecycle: Lifecycle) -> bool {
        self.lifecycle.contains(&lifecycle)
    }
}

/// list page size; `Unlimited` leaves the choice to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    Unlimited,
    Limit(u32),
}

#[derive(Debug, Clone)]
pub struct ListPage<R> {
    pub items: Vec<R>,
    pub next_page_token: Option<String>,
}

/// a resource kind managed by the engine.
pub trait Resource:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    fn schema() -> &'static ResourceSchema;

    /// identity, when project, location and name are all set.
    fn id(&self) -> Option<ResourceId>;

    fn set_id(&mut self, id: &ResourceId);

    fn labels(&self) -> Option<&BTreeMap<String, String>>;
}

/// backend contract for a resource kind.
///
/// implementations own transport concerns (auth, retries on conflict,
/// waiting for long-running operations); the engine owns reconciliation.
#[async_trait]
pub trait ResourceApi<R: Resource>: Send + Sync {
    async fn get(&self, id: &ResourceId) -> Result<R, ApiError>;

    async fn list(
        &self,
        parent: &Parent,
        page_token: Option<&str>,
        page_size: PageSize,
    ) -> Result<ListPage<R>, ApiError>;

    async fn create(&self, desired: &R) -> Result<(), ApiError>;

    async fn update(&self, desired: &R, update: &PlannedUpdate) -> Result<(), ApiError>;

    async fn delete(&self, id: &ResourceId) -> Result<(), ApiError>;
}
