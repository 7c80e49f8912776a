//! long-running operations returned by mutating calls.

use crate::client::CloudDeployClient;
use cdeploy_engine::ApiError;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<Status>,
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl CloudDeployClient {
    /// poll an operation at the configured interval until it completes.
    pub(crate) async fn wait(&self, operation: Value) -> Result<Option<Value>, ApiError> {
        let mut operation: Operation = serde_json::from_value(operation)?;
        let started = Instant::now();
        let timeout = self.config.operation_timeout();
        info!(operation = %operation.name, "waiting for operation");
        loop {
            if operation.done {
                if let Some(status) = operation.error {
                    return Err(ApiError::Operation {
                        name: operation.name,
                        code: status.code,
                        message: status.message,
                    });
                }
                debug!(operation = %operation.name, "operation done");
                return Ok(operation.response);
            }
            if operation.name.is_empty() {
                return Err(ApiError::Decode(
                    "operation is not done and has no name to poll".to_string(),
                ));
            }
            if started.elapsed() >= timeout {
                return Err(ApiError::OperationTimeout {
                    name: operation.name,
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.config.poll_interval()).await;
            let polled = self.send(Method::GET, &operation.name, &[], None).await?;
            operation = serde_json::from_value(polled)?;
        }
    }
}
