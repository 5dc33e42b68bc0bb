use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthFailure;
use crate::rbac::{Decision, DenyReason};

/// AccessError
///
/// The error taxonomy of the access control gate, surfaced to the HTTP layer.
/// Every failure is an explicit value the caller branches on — never an
/// exception path — and every kind maps to a fixed status code. Messages are
/// intentionally generic: a deny never reveals which other permissions the
/// principal lacks, and invalid-credentials never reveals whether the email
/// existed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// No credential, an invalid/expired credential, or an expired session.
    #[error("authentication required")]
    Unauthenticated,
    /// Authenticated, but the wrong role for this action.
    #[error("this action requires a different role")]
    RoleMismatch,
    /// Authenticated, but the effective permission set is insufficient.
    #[error("insufficient permissions for this action")]
    MissingPermission,
    /// Bad email/secret pair. Deliberately indistinguishable from
    /// "identity not found".
    #[error("invalid email or password")]
    InvalidCredentials,
    /// The gate's own configuration is inconsistent. Fails closed to a deny,
    /// never open.
    #[error("access control configuration error")]
    Configuration,
    /// Unexpected infrastructure failure (persistence, hashing).
    #[error("internal error")]
    Internal,
}

impl AccessError {
    /// Stable machine-readable reason code for the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated => "unauthenticated",
            AccessError::RoleMismatch => "role_mismatch",
            AccessError::MissingPermission => "missing_permission",
            AccessError::InvalidCredentials => "invalid_credentials",
            AccessError::Configuration => "configuration_error",
            AccessError::Internal => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessError::RoleMismatch => StatusCode::FORBIDDEN,
            AccessError::MissingPermission => StatusCode::FORBIDDEN,
            AccessError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccessError::Configuration => StatusCode::FORBIDDEN,
            AccessError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DenyReason> for AccessError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => AccessError::Unauthenticated,
            DenyReason::RoleMismatch => AccessError::RoleMismatch,
            DenyReason::MissingPermission => AccessError::MissingPermission,
        }
    }
}

impl From<AuthFailure> for AccessError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::InvalidToken | AuthFailure::Expired => AccessError::Unauthenticated,
            AuthFailure::InvalidCredentials => AccessError::InvalidCredentials,
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

/// ApiError
///
/// Handler-level error: either a gate outcome or a plain resource miss. Kept
/// separate from `AccessError` so the access-control taxonomy stays exactly
/// the five kinds the gate can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("not found")]
    NotFound,
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        ApiError::Access(reason.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Access(err) => err.into_response(),
            ApiError::NotFound => {
                let body = Json(json!({
                    "error": "not_found",
                    "message": "not found",
                }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
        }
    }
}

impl Decision {
    /// require
    ///
    /// Converts a gate decision into the `?`-able form handlers use: Allow
    /// passes, Deny carries its reason into the HTTP error mapping.
    pub fn require(self) -> Result<(), AccessError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}
