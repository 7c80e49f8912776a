use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BASE_PATH: &str = "https://clouddeploy.googleapis.com/v1/";

/// configuration for the cloud deploy rest client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// api root; operation names are resolved against it too.
    pub base_path: String,
    /// oauth2 bearer token.
    pub access_token: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// fixed interval between operation polls.
    pub operation_poll_interval_ms: u64,
    /// give up waiting on an operation after this long.
    pub operation_timeout_secs: u64,
    /// extra attempts on http 409.
    pub conflict_retries: u32,
    /// additional headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            access_token: None,
            user_agent: default_user_agent(),
            request_timeout_secs: 60,
            operation_poll_interval_ms: 2_000,
            operation_timeout_secs: 20 * 60,
            conflict_retries: 3,
            headers: BTreeMap::new(),
        }
    }
}

fn default_user_agent() -> String {
    format!("cdeploy/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.operation_poll_interval_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// `{base_path}/{path}` with exactly one slash between them.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_path.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"access_token": "t", "conflict_retries": 0}"#).unwrap();
        assert_eq!(config.base_path, DEFAULT_BASE_PATH);
        assert_eq!(config.conflict_retries, 0);
        assert_eq!(config.access_token.as_deref(), Some("t"));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn url_joins_with_single_slash() {
        let config = ClientConfig::new("http://localhost:8080/v1/");
        assert_eq!(
            config.url("/projects/p/locations/l/targets"),
            "http://localhost:8080/v1/projects/p/locations/l/targets"
        );
    }
}
