//! Authentication and authorization errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingAuthHeader,

    #[error("invalid authorization header format")]
    InvalidAuthHeader,

    #[error("unsupported JWT algorithm: {0}, only RSA-family algorithms are accepted")]
    UnsupportedAlgorithm(String),

    #[error("token header is missing a key id")]
    MissingKeyId,

    #[error("no JWKS key found for kid {0}")]
    UnknownKeyId(String),

    #[error("token validation failed: {0}")]
    InvalidToken(String),

    #[error("failed to fetch JWKS from {0}: {1}")]
    JwksFetchFailed(String, String),

    #[error("authentication is required for this resource")]
    AuthenticationRequired,

    #[error("access denied")]
    AccessDenied,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        };
        (status, self.to_string()).into_response()
    }
}

impl From<AuthError> for attestore_common::Error {
    fn from(err: AuthError) -> Self {
        use attestore_common::error::ErrorCode;
        let code = match &err {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::AuthenticationRequired => ErrorCode::Unauthorized,
            AuthError::AccessDenied => ErrorCode::Forbidden,
            AuthError::UnsupportedAlgorithm(_)
            | AuthError::MissingKeyId
            | AuthError::UnknownKeyId(_)
            | AuthError::InvalidToken(_) => ErrorCode::Unauthorized,
            AuthError::JwksFetchFailed(..) => ErrorCode::ServiceUnavailable,
        };
        Self::new(code, err.to_string())
    }
}
