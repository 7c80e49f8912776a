use crate::config::ClientConfig;
use cdeploy_core::JsonMap;
use cdeploy_engine::ApiError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// errors raised while building the http client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid header {name}")]
    InvalidHeader { name: String },
    #[error("build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// rest client for the cloud deploy api.
///
/// implements `ResourceApi` for every supported resource kind.
pub struct CloudDeployClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: ClientConfig,
}

impl CloudDeployClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let invalid = || ClientError::InvalidHeader { name: name.clone() };
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header, value);
        }
        if let Some(token) = &config.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::InvalidHeader {
                    name: AUTHORIZATION.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { http, config })
    }

    /// send one request, retrying conflicts, and decode the json response.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&JsonMap>,
    ) -> Result<Value, ApiError> {
        let url = self.config.url(path);
        let mut attempt = 0;
        loop {
            debug!(%method, %url, attempt, "sending request");
            let mut request = self.http.request(method.clone(), &url).query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request
                .send()
                .await
                .map_err(|err| ApiError::Transport(err.to_string()))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|err| ApiError::Transport(err.to_string()))?;

            if status.is_success() {
                if text.trim().is_empty() {
                    return Ok(Value::Object(JsonMap::new()));
                }
                return Ok(serde_json::from_str(&text)?);
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ApiError::NotFound {
                    resource: path.to_string(),
                });
            }

            let err = ApiError::Http {
                status: status.as_u16(),
                message: error_message(&text),
            };
            if err.is_retryable() && attempt < self.config.conflict_retries {
                attempt += 1;
                warn!(%url, attempt, "conflict; retrying");
                tokio::time::sleep(self.config.poll_interval()).await;
                continue;
            }
            return Err(err);
        }
    }
}

/// the `error.message` of a google api error body, or the raw text.
fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| {
            body.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_api_error_body() {
        let body = r#"{"error": {"code": 400, "message": "bad target", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "bad target");
        assert_eq!(error_message(" upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn rejects_invalid_header_names() {
        let mut config = ClientConfig::default();
        config
            .headers
            .insert("bad header".to_string(), "v".to_string());
        assert!(matches!(
            CloudDeployClient::new(config),
            Err(ClientError::InvalidHeader { .. })
        ));
    }
}
