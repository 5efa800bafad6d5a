//! The service-level error taxonomy and its transport mappings.
//!
//! Handlers speak `ServiceError`; the HTTP surface maps it to a status code
//! and the RPC surface to a typed error code. Messages never disclose schema
//! details, other principals' identifiers, or whether a name exists under a
//! different owner.

use axum::http::StatusCode;
use thiserror::Error;

use lockbox_proto::ErrorCode;
use lockbox_storage::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthenticated(&'static str),
    #[error("data entry not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("entry was modified concurrently; sync and retry")]
    VersionMismatch,
    #[error("internal error")]
    Internal,
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(message.into())
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::VersionMismatch => StatusCode::CONFLICT,
            ServiceError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn rpc_code(&self) -> ErrorCode {
        match self {
            ServiceError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            ServiceError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            ServiceError::NotFound => ErrorCode::NotFound,
            ServiceError::Conflict(_) => ErrorCode::AlreadyExists,
            ServiceError::VersionMismatch => ErrorCode::FailedPrecondition,
            ServiceError::Internal => ErrorCode::Internal,
        }
    }

    /// Short machine-readable tag used in HTTP error bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            ServiceError::InvalidArgument(_) => "invalid_argument",
            ServiceError::Unauthenticated(_) => "unauthenticated",
            ServiceError::NotFound => "not_found",
            ServiceError::Conflict(_) => "already_exists",
            ServiceError::VersionMismatch => "failed_precondition",
            ServiceError::Internal => "internal",
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::AlreadyExists => ServiceError::Conflict("already exists".to_string()),
            StoreError::VersionMismatch => ServiceError::VersionMismatch,
            StoreError::Backend(cause) => {
                tracing::error!(error = %cause, "storage backend failure");
                ServiceError::Internal
            }
        }
    }
}
