use crate::client::CloudDeployClient;
use async_trait::async_trait;
use cdeploy_core::{short_name, JsonMap};
use cdeploy_engine::{
    expand, flatten, ApiError, ListPage, PageSize, Parent, PlannedUpdate, Resource, ResourceApi,
    ResourceId,
};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

fn request_id() -> (&'static str, String) {
    ("requestId", Uuid::new_v4().to_string())
}

fn into_object(value: Value, context: &str) -> Result<JsonMap, ApiError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ApiError::Decode(format!(
            "{context}: expected an object, got {other}"
        ))),
    }
}

fn desired_id<R: Resource>(desired: &R) -> Result<ResourceId, ApiError> {
    desired.id().ok_or_else(|| {
        ApiError::Decode(format!(
            "{} is missing project, location or name",
            R::schema().kind
        ))
    })
}

fn collection_path<R: Resource>(parent: &Parent) -> String {
    format!("{}/{}", parent.path(), R::schema().collection)
}

impl CloudDeployClient {
    async fn get_raw<R: Resource>(&self, id: &ResourceId) -> Result<JsonMap, ApiError> {
        let path = id.path(R::schema());
        let body = self.send(Method::GET, &path, &[], None).await?;
        into_object(body, &path)
    }
}

#[async_trait]
impl<R: Resource> ResourceApi<R> for CloudDeployClient {
    async fn get(&self, id: &ResourceId) -> Result<R, ApiError> {
        let mut resource: R = flatten(self.get_raw::<R>(id).await?)?;
        resource.set_id(id);
        Ok(resource)
    }

    async fn list(
        &self,
        parent: &Parent,
        page_token: Option<&str>,
        page_size: PageSize,
    ) -> Result<ListPage<R>, ApiError> {
        let schema = R::schema();
        let path = collection_path::<R>(parent);
        let mut query = Vec::new();
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        if let PageSize::Limit(size) = page_size {
            query.push(("pageSize", size.to_string()));
        }
        let mut body = into_object(self.send(Method::GET, &path, &query, None).await?, &path)?;

        let mut items = Vec::new();
        if let Some(Value::Array(entries)) = body.remove(schema.collection) {
            for entry in entries {
                let entry = into_object(entry, &path)?;
                let name = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|name| short_name(name).to_string())
                    .unwrap_or_default();
                let mut item: R = flatten(entry)?;
                item.set_id(&ResourceId::new(
                    parent.project.clone(),
                    parent.location.clone(),
                    name,
                ));
                items.push(item);
            }
        }
        let next_page_token = match body.remove("nextPageToken") {
            Some(Value::String(token)) if !token.is_empty() => Some(token),
            _ => None,
        };
        debug!(kind = schema.kind, count = items.len(), "listed page");
        Ok(ListPage {
            items,
            next_page_token,
        })
    }

    async fn create(&self, desired: &R) -> Result<(), ApiError> {
        let schema = R::schema();
        let id = desired_id(desired)?;
        let body = expand(desired)?;
        let query = [(schema.id_param, id.name.clone()), request_id()];
        info!(kind = schema.kind, %id, "creating");
        let operation = self
            .send(
                Method::POST,
                &collection_path::<R>(&id.parent()),
                &query,
                Some(&body),
            )
            .await?;
        self.wait(operation).await?;
        Ok(())
    }

    async fn update(&self, desired: &R, update: &PlannedUpdate) -> Result<(), ApiError> {
        let schema = R::schema();
        let id = desired_id(desired)?;
        let current = self.get_raw::<R>(&id).await?;

        let mut body = expand(desired)?;
        if let Some(etag) = current.get("etag") {
            body.insert("etag".to_string(), etag.clone());
        }
        body.insert("name".to_string(), Value::String(id.path(schema)));

        let query = [("updateMask", update.update_mask.join(",")), request_id()];
        info!(
            kind = schema.kind,
            %id,
            operation = update.operation,
            mask = %query[0].1,
            "updating"
        );
        let operation = self
            .send(Method::PATCH, &id.path(schema), &query, Some(&body))
            .await?;
        self.wait(operation).await?;
        Ok(())
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), ApiError> {
        let schema = R::schema();
        match self.get_raw::<R>(id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                info!(kind = schema.kind, %id, "not found; skipping delete");
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let mut query = vec![request_id()];
        if schema.force_delete {
            query.push(("force", "true".to_string()));
        }
        info!(kind = schema.kind, %id, "deleting");
        let operation = self
            .send(Method::DELETE, &id.path(schema), &query, None)
            .await?;
        self.wait(operation).await?;
        Ok(())
    }
}
