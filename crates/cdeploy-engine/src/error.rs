//! typed errors for backend calls and reconciliation.

use crate::types::FieldDiff;
use cdeploy_core::ValidationReport;
use thiserror::Error;

/// errors surfaced by a resource backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("operation {name} failed with code {code}: {message}")]
    Operation {
        name: String,
        code: i64,
        message: String,
    },
    #[error("operation {name} did not complete within {seconds}s")]
    OperationTimeout { name: String, seconds: u64 },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// only conflicts (409) are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Http { status: 409, .. })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// one failed delete during a bulk sweep.
#[derive(Debug)]
pub struct DeleteFailure {
    pub resource: String,
    pub error: ApiError,
}

/// errors returned by apply, delete and delete-all.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("{0}")]
    Validation(ValidationReport),
    #[error("infeasible: {reason}")]
    Infeasible { reason: String },
    #[error("diffs found after apply: {}", diff_fields(.diffs))]
    DiffAfterApply { diffs: Vec<FieldDiff> },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("{}", join_failures(.failures))]
    DeleteAll { failures: Vec<DeleteFailure> },
}

impl ApplyError {
    pub(crate) fn infeasible(reason: impl Into<String>) -> Self {
        ApplyError::Infeasible {
            reason: reason.into(),
        }
    }
}

fn diff_fields(diffs: &[FieldDiff]) -> String {
    diffs
        .iter()
        .map(|diff| diff.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_failures(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.resource, failure.error))
        .collect::<Vec<_>>()
        .join("\n")
}
