//! engine orchestration: validate, canonicalize, diff, plan, apply.

mod canonical;
mod codec;
mod diff;
mod error;
mod loader;
mod pipeline;
mod planner;
mod resources;
mod types;


use cdeploy_core::{validate_document, ValidationReport};
use pipeline::DesiredContext;
use serde_json::Value;
use tracing::{info, warn};

pub use canonical::{canonicalize_desired, canonicalize_initial, canonicalize_new};
pub use codec::{expand, expand_full, expand_view, flatten, from_view, settle, to_view};
pub use diff::diff;
pub use error::{ApiError, ApplyError, DeleteFailure};
pub use loader::{load_manifest, Manifest, ManifestEntry, SourceLocation};
pub use planner::{plan, update_mask};
pub use types::{
    ApplyOptions, DiffKind, FieldDiff, Lifecycle, ListPage, PageSize, Parent, PlanAction,
    PlannedOp, PlannedUpdate, Resource, ResourceApi, ResourceId, ResourcePlan,
};

/// validate a typed resource against its schema.
pub fn validate<R: Resource>(resource: &R) -> Result<ValidationReport, ApplyError> {
    let view = expand_full(resource)?;
    Ok(validate_document(&Value::Object(view), R::schema()))
}

/// validate a raw document, then decode it strictly.
pub fn decode_desired<R: Resource>(document: &Value) -> Result<R, ApplyError> {
    let report = validate_document(document, R::schema());
    if report.is_err() {
        return Err(ApplyError::Validation(report));
    }
    Ok(serde_json::from_value(document.clone())?)
}

/// observe the backend and describe what `apply` would do, without mutating.
pub async fn build_plan<R, A>(
    api: &A,
    desired: &R,
    options: &ApplyOptions,
) -> Result<ResourcePlan, ApplyError>
where
    R: Resource,
    A: ResourceApi<R> + ?Sized,
{
    let planned = DesiredContext::new(desired, options)?
        .observe(api)
        .await?
        .plan();
    Ok(planned.report())
}

/// reconcile one resource toward its desired state and return the new state.
pub async fn apply<R, A>(api: &A, desired: &R, options: &ApplyOptions) -> Result<R, ApplyError>
where
    R: Resource,
    A: ResourceApi<R> + ?Sized,
{
    DesiredContext::new(desired, options)?
        .observe(api)
        .await?
        .plan()
        .apply(api)
        .await?
        .verify(api)
        .await
}

/// decode a raw document and apply it.
pub async fn apply_document<R, A>(
    api: &A,
    document: &Value,
    options: &ApplyOptions,
) -> Result<R, ApplyError>
where
    R: Resource,
    A: ResourceApi<R> + ?Sized,
{
    let desired = decode_desired::<R>(document)?;
    apply(api, &desired, options).await
}

/// delete one resource; a resource that is already gone is not an error.
pub async fn delete<R, A>(api: &A, id: &ResourceId, options: &ApplyOptions) -> Result<(), ApplyError>
where
    R: Resource,
    A: ResourceApi<R> + ?Sized,
{
    let kind = R::schema().kind;
    if options.blocks(Lifecycle::BlockDestruction) {
        return Err(ApplyError::Infeasible {
            reason: format!("deleting {kind} {id} is blocked"),
        });
    }
    info!(kind, %id, "deleting resource");
    match api.delete(id).await {
        Err(err) if err.is_not_found() => {
            info!(kind, %id, "resource not found; nothing to delete");
            Ok(())
        }
        other => Ok(other?),
    }
}

/// read every page of a collection.
pub async fn list_all<R, A>(api: &A, parent: &Parent) -> Result<Vec<R>, ApiError>
where
    R: Resource,
    A: ResourceApi<R> + ?Sized,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = api
            .list(parent, token.as_deref(), PageSize::Unlimited)
            .await?;
        items.extend(page.items);
        match page.next_page_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }
    Ok(items)
}

/// delete every listed resource matching `filter`.
///
/// keeps going past individual failures and reports them together; returns
/// the number of resources deleted.
pub async fn delete_all<R, A, F>(api: &A, parent: &Parent, filter: F) -> Result<usize, ApplyError>
where
    R: Resource,
    A: ResourceApi<R> + ?Sized,
    F: Fn(&R) -> bool,
{
    let kind = R::schema().kind;
    let mut deleted = 0;
    let mut failures = Vec::new();
    for item in list_all::<R, A>(api, parent).await? {
        if !filter(&item) {
            continue;
        }
        let Some(id) = item.id() else {
            warn!(kind, "listed resource has no identity; skipping");
            continue;
        };
        info!(kind, %id, "deleting resource");
        match api.delete(&id).await {
            Ok(()) => deleted += 1,
            Err(error) => failures.push(DeleteFailure {
                resource: id.to_string(),
                error,
            }),
        }
    }
    if failures.is_empty() {
        Ok(deleted)
    } else {
        Err(ApplyError::DeleteAll { failures })
    }
}
