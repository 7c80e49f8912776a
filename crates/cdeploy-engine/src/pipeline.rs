use crate::canonical::{canonicalize_desired, canonicalize_initial, canonicalize_new};
use crate::codec::{expand_full, from_view};
use crate::diff::diff;
use crate::error::ApplyError;
use crate::planner::plan;
use crate::types::{
    ApplyOptions, FieldDiff, Lifecycle, PlanAction, PlannedOp, Resource, ResourceApi, ResourceId,
    ResourcePlan,
};
use cdeploy_core::{validate_document, JsonMap};
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{debug, info};

pub(crate) struct DesiredContext<'a, R> {
    raw: JsonMap,
    id: ResourceId,
    options: &'a ApplyOptions,
    kind: PhantomData<R>,
}

impl<'a, R: Resource> DesiredContext<'a, R> {
    pub(crate) fn new(desired: &R, options: &'a ApplyOptions) -> Result<Self, ApplyError> {
        let raw = expand_full(desired)?;
        let report = validate_document(&Value::Object(raw.clone()), R::schema());
        if report.is_err() {
            return Err(ApplyError::Validation(report));
        }
        let id = desired.id().ok_or_else(|| {
            ApplyError::infeasible("desired resource has no project, location and name")
        })?;
        Ok(Self {
            raw,
            id,
            options,
            kind: PhantomData,
        })
    }

    pub(crate) async fn observe<A>(self, api: &A) -> Result<ObservedContext<'a, R>, ApplyError>
    where
        A: ResourceApi<R> + ?Sized,
    {
        let lookup = self.options.state_hint.as_ref().unwrap_or(&self.id);
        info!(kind = R::schema().kind, id = %lookup, "fetching initial state");
        let initial = match api.get(lookup).await {
            Ok(found) => {
                let view = canonicalize_initial(expand_full(&found)?, R::schema());
                let shown = Value::Object(view.clone());
                debug!(initial = %shown, "canonicalized initial state");
                Some(view)
            }
            Err(err) if err.is_not_found() => {
                info!(id = %lookup, "resource not found; will create");
                None
            }
            Err(err) => return Err(err.into()),
        };
        Ok(ObservedContext {
            raw: self.raw,
            id: self.id,
            options: self.options,
            initial,
            kind: PhantomData,
        })
    }
}

pub(crate) struct ObservedContext<'a, R> {
    raw: JsonMap,
    id: ResourceId,
    options: &'a ApplyOptions,
    initial: Option<JsonMap>,
    kind: PhantomData<R>,
}

impl<'a, R: Resource> ObservedContext<'a, R> {
    pub(crate) fn plan(self) -> PlanContext<'a, R> {
        let schema = R::schema();
        let canonical = canonicalize_desired(&self.raw, self.initial.as_ref(), schema);
        let shown = Value::Object(canonical.clone());
        debug!(desired = %shown, "canonicalized desired state");

        let (action, diffs) = match &self.initial {
            None => (PlanAction::Create, Vec::new()),
            Some(initial) => {
                let diffs = diff(&canonical, initial, schema);
                for found in &diffs {
                    debug!(
                        field = %found.field,
                        desired = %found.desired,
                        actual = %found.actual,
                        "diff found"
                    );
                }
                let ops = plan(&diffs);
                if ops.is_empty() {
                    (PlanAction::NoChange, diffs)
                } else {
                    (PlanAction::Update { ops }, diffs)
                }
            }
        };

        PlanContext {
            raw: self.raw,
            canonical,
            id: self.id,
            options: self.options,
            exists: self.initial.is_some(),
            action,
            diffs,
            kind: PhantomData,
        }
    }
}

pub(crate) struct PlanContext<'a, R> {
    raw: JsonMap,
    canonical: JsonMap,
    id: ResourceId,
    options: &'a ApplyOptions,
    exists: bool,
    action: PlanAction,
    diffs: Vec<FieldDiff>,
    kind: PhantomData<R>,
}

impl<'a, R: Resource> PlanContext<'a, R> {
    pub(crate) fn report(&self) -> ResourcePlan {
        ResourcePlan {
            kind: R::schema().kind,
            id: self.id.clone(),
            action: self.action.clone(),
            diffs: self.diffs.clone(),
        }
    }

    pub(crate) async fn apply<A>(self, api: &A) -> Result<VerifyContext<R>, ApplyError>
    where
        A: ResourceApi<R> + ?Sized,
    {
        let kind = R::schema().kind;
        if self.exists && self.options.blocks(Lifecycle::BlockAcquire) {
            return Err(ApplyError::infeasible(format!(
                "{kind} {} already exists and acquiring it is blocked",
                self.id
            )));
        }

        match &self.action {
            PlanAction::Create => {
                if self.options.blocks(Lifecycle::BlockCreation) {
                    return Err(ApplyError::infeasible(format!(
                        "{kind} {} does not exist and creation is blocked",
                        self.id
                    )));
                }
                let desired: R = from_view(self.canonical)?;
                info!(kind, id = %self.id, "creating resource");
                api.create(&desired).await?;
            }
            PlanAction::Update { ops } => {
                if let Some(PlannedOp::Recreate { diffs }) = ops
                    .iter()
                    .find(|op| matches!(op, PlannedOp::Recreate { .. }))
                {
                    let fields: Vec<_> = diffs.iter().map(|d| d.field.as_str()).collect();
                    return Err(ApplyError::infeasible(format!(
                        "{kind} {} requires recreation to change {}",
                        self.id,
                        fields.join(", ")
                    )));
                }
                if self.options.blocks(Lifecycle::BlockModification) {
                    return Err(ApplyError::infeasible(format!(
                        "{kind} {} has changes and modification is blocked",
                        self.id
                    )));
                }
                let desired: R = from_view(self.canonical)?;
                for op in ops {
                    if let PlannedOp::Update(update) = op {
                        info!(
                            kind,
                            id = %self.id,
                            operation = update.operation,
                            mask = %update.update_mask.join(","),
                            "operation required due to diff"
                        );
                        api.update(&desired, update).await?;
                    }
                }
            }
            PlanAction::NoChange => {
                info!(kind, id = %self.id, "no changes");
            }
        }

        Ok(VerifyContext {
            raw: self.raw,
            id: self.id,
            kind: PhantomData,
        })
    }
}

pub(crate) struct VerifyContext<R> {
    raw: JsonMap,
    id: ResourceId,
    kind: PhantomData<R>,
}

impl<R: Resource> VerifyContext<R> {
    /// re-read the resource and confirm no actionable diff remains.
    pub(crate) async fn verify<A>(self, api: &A) -> Result<R, ApplyError>
    where
        A: ResourceApi<R> + ?Sized,
    {
        let schema = R::schema();
        let fetched = api.get(&self.id).await?;
        let new = canonicalize_new(&expand_full(&fetched)?, &self.raw, schema);
        let desired = canonicalize_desired(&self.raw, Some(&new), schema);
        let remaining: Vec<_> = diff(&desired, &new, schema)
            .into_iter()
            .filter(FieldDiff::is_actionable)
            .collect();
        if !remaining.is_empty() {
            return Err(ApplyError::DiffAfterApply { diffs: remaining });
        }
        debug!(kind = schema.kind, id = %self.id, "state converged");
        Ok(from_view(new)?)
    }
}
