//! cloud deploy rest adapter for cdeploy.

mod client;
mod config;
mod operation;
mod ops;

pub use client::{ClientError, CloudDeployClient};
pub use config::{ClientConfig, DEFAULT_BASE_PATH};
pub use operation::{Operation, Status};

#[cfg(test)]
mod tests {
    use super::*;
    use cdeploy_core::{DeliveryPipeline, Field, Runtime, Target};
    use cdeploy_engine::{
        ApiError, PageSize, Parent, PlannedUpdate, ResourceApi, ResourceId,
    };
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use serde_json::json;

    const TARGETS: &str = "/v1/projects/p/locations/l/targets";
    const PROD: &str = "/v1/projects/p/locations/l/targets/prod";
    const UPDATE_TARGET: &str = "updateTargetUpdateTargetOperation";

    fn client(server: &MockServer) -> CloudDeployClient {
        let config = ClientConfig {
            operation_poll_interval_ms: 1,
            operation_timeout_secs: 5,
            conflict_retries: 2,
            ..ClientConfig::new(server.url("/v1/")).with_access_token("token")
        };
        CloudDeployClient::new(config).unwrap()
    }

    fn prod_id() -> ResourceId {
        ResourceId::new("p", "l", "prod")
    }

    #[tokio::test]
    async fn get_flattens_and_sets_identity() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(PROD)
                .header("authorization", "Bearer token");
            then.status(200).json_body(json!({
                "name": "projects/p/locations/l/targets/prod",
                "uid": "u1",
                "etag": "e1",
                "run": {"location": "projects/p/locations/l"}
            }));
        });

        let target: Target = client(&server).get(&prod_id()).await.unwrap();
        mock.assert();
        assert_eq!(target.name.as_deref(), Some("prod"));
        assert_eq!(target.project.as_deref(), Some("p"));
        assert!(matches!(target.runtime, Field::Value(Runtime::Run(_))));
        assert!(target.labels.is_empty());
    }

    #[tokio::test]
    async fn get_maps_404_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(PROD);
            then.status(404)
                .json_body(json!({"error": {"code": 404, "message": "not found"}}));
        });

        let err = ResourceApi::<Target>::get(&client(&server), &prod_id())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_posts_body_and_polls_operation() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path(TARGETS)
                .query_param("targetId", "prod")
                .query_param_exists("requestId")
                .json_body(json!({
                    "name": "projects/p/locations/l/targets/prod",
                    "requireApproval": true,
                    "anthosCluster": {}
                }));
            then.status(200)
                .json_body(json!({"name": "operations/op-1", "done": false}));
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/v1/operations/op-1");
            then.status(200)
                .json_body(json!({"name": "operations/op-1", "done": true, "response": {}}));
        });

        let mut target = Target::new("p", "l", "prod");
        target.require_approval = Some(true);
        target.runtime = Field::Value(Runtime::AnthosCluster(Default::default()));
        client(&server).create(&target).await.unwrap();

        create.assert();
        poll.assert();
    }

    #[tokio::test]
    async fn update_sends_mask_etag_and_full_name() {
        let server = MockServer::start();
        let get = server.mock(|when, then| {
            when.method(GET).path(PROD);
            then.status(200).json_body(json!({
                "name": "projects/p/locations/l/targets/prod",
                "etag": "etag-7",
                "description": "old"
            }));
        });
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path(PROD)
                .query_param("updateMask", "description,labels")
                .query_param_exists("requestId")
                .json_body(json!({
                    "name": "projects/p/locations/l/targets/prod",
                    "description": "new",
                    "labels": {"team": "a"},
                    "etag": "etag-7"
                }));
            then.status(200)
                .json_body(json!({"name": "operations/op-2", "done": true}));
        });

        let mut target = Target::new("p", "l", "prod");
        target.description = Some("new".to_string());
        target.labels = Field::Value([("team".to_string(), "a".to_string())].into());
        let update = PlannedUpdate {
            operation: UPDATE_TARGET,
            update_mask: vec!["description".to_string(), "labels".to_string()],
            diffs: Vec::new(),
        };
        client(&server).update(&target, &update).await.unwrap();

        get.assert();
        patch.assert();
    }

    #[tokio::test]
    async fn delete_pipeline_forces_and_waits() {
        let server = MockServer::start();
        let path = "/v1/projects/p/locations/l/deliveryPipelines/web";
        server.mock(|when, then| {
            when.method(GET).path(path);
            then.status(200)
                .json_body(json!({"name": "projects/p/locations/l/deliveryPipelines/web"}));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE)
                .path(path)
                .query_param("force", "true")
                .query_param_exists("requestId");
            then.status(200)
                .json_body(json!({"name": "operations/op-3", "done": true}));
        });

        let id = ResourceId::new("p", "l", "web");
        ResourceApi::<DeliveryPipeline>::delete(&client(&server), &id)
            .await
            .unwrap();
        delete.assert();
    }

    #[tokio::test]
    async fn delete_of_missing_resource_skips_request() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(PROD);
            then.status(404);
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path(PROD);
            then.status(200).json_body(json!({"done": true}));
        });

        ResourceApi::<Target>::delete(&client(&server), &prod_id())
            .await
            .unwrap();
        delete.assert_hits(0);
    }

    #[tokio::test]
    async fn conflicts_are_retried_then_reported() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(PROD);
            then.status(409)
                .json_body(json!({"error": {"code": 409, "message": "busy"}}));
        });

        let err = ResourceApi::<Target>::get(&client(&server), &prod_id())
            .await
            .unwrap_err();
        mock.assert_hits(3);
        match err {
            ApiError::Http { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "busy");
            }
            other => panic!("expected http error, got {other}"),
        }
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(PROD);
            then.status(400)
                .json_body(json!({"error": {"code": 400, "message": "bad name"}}));
        });

        let err = ResourceApi::<Target>::get(&client(&server), &prod_id())
            .await
            .unwrap_err();
        mock.assert_hits(1);
        assert_eq!(err.to_string(), "http 400: bad name");
    }

    #[tokio::test]
    async fn failed_operation_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(PROD);
            then.status(200)
                .json_body(json!({"name": "projects/p/locations/l/targets/prod"}));
        });
        server.mock(|when, then| {
            when.method(DELETE).path(PROD);
            then.status(200).json_body(json!({
                "name": "operations/op-4",
                "done": true,
                "error": {"code": 9, "message": "target is in use"}
            }));
        });

        let err = ResourceApi::<Target>::delete(&client(&server), &prod_id())
            .await
            .unwrap_err();
        match err {
            ApiError::Operation { name, code, message } => {
                assert_eq!(name, "operations/op-4");
                assert_eq!(code, 9);
                assert_eq!(message, "target is in use");
            }
            other => panic!("expected operation error, got {other}"),
        }
    }

    #[tokio::test]
    async fn list_reads_collection_key_and_page_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(TARGETS)
                .query_param("pageToken", "t1")
                .query_param("pageSize", "2");
            then.status(200).json_body(json!({
                "targets": [
                    {"name": "projects/p/locations/l/targets/a", "labels": {"team": "x"}},
                    {"name": "projects/p/locations/l/targets/b"}
                ],
                "nextPageToken": "t2"
            }));
        });

        let page: cdeploy_engine::ListPage<Target> = client(&server)
            .list(&Parent::new("p", "l"), Some("t1"), PageSize::Limit(2))
            .await
            .unwrap();
        mock.assert();
        let names: Vec<_> = page
            .items
            .iter()
            .map(|item| item.name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(page.items[1].location.as_deref(), Some("l"));
        assert_eq!(page.next_page_token.as_deref(), Some("t2"));
    }
}
