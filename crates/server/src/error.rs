//! Mutation and API error types.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Failure of a repository mutation.
///
/// Validation failures are detected before any state changes. Infrastructure
/// failures abort the mutation. `SigningFailed` is reported after the package
/// change is already durable.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("repository requires a package signature")]
    SignatureRequired,

    #[error("package signature is invalid")]
    SignatureInvalid,

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("metadata store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("index signing failed: {0}")]
    SigningFailed(String),
}

impl MutationError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownRepository(_) => "unknown_repository",
            Self::MalformedPackage(_) => "malformed_package",
            Self::SignatureRequired => "signature_required",
            Self::SignatureInvalid => "signature_invalid",
            Self::PackageNotFound(_) => "package_not_found",
            Self::StorageWriteFailed(_) => "storage_write_failed",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::SigningFailed(_) => "signing_failed",
        }
    }
}

impl From<depot_metadata::MetadataError> for MutationError {
    fn from(e: depot_metadata::MetadataError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("metadata error: {0}")]
    Metadata(#[from] depot_metadata::MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Internal(_) => "internal_error",
            Self::Multipart(_) => "bad_request",
            Self::Mutation(e) => e.kind(),
            Self::Metadata(_) => "store_unavailable",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Multipart(e) => e.status(),
            Self::Mutation(e) => match e {
                MutationError::UnknownRepository(_) | MutationError::PackageNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                MutationError::MalformedPackage(_)
                | MutationError::SignatureRequired
                | MutationError::SignatureInvalid => StatusCode::BAD_REQUEST,
                MutationError::StorageWriteFailed(_)
                | MutationError::StoreUnavailable(_)
                | MutationError::SigningFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(crate::auth::CHALLENGE),
            );
        }
        response
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
