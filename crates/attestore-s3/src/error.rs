//! S3-flavored error responses. Every handler returns `Result<_, S3Error>`;
//! `IntoResponse` renders the S3 XML error body AWS clients expect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum S3Error {
    #[error("access denied")]
    AccessDenied,
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),
    #[error("no such key: {0}")]
    NoSuchKey(String),
    #[error("no such upload: {0}")]
    NoSuchUpload(String),
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),
    #[error("bucket not empty: {0}")]
    BucketNotEmpty(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid range")]
    InvalidRange { size: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl S3Error {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::NoSuchKey(_) => "NoSuchKey",
            Self::NoSuchUpload(_) => "NoSuchUpload",
            Self::BucketAlreadyExists(_) => "BucketAlreadyExists",
            Self::BucketNotEmpty(_) => "BucketNotEmpty",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::InvalidRange { .. } => "InvalidRange",
            Self::Internal(_) => "InternalError",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NoSuchBucket(_) | Self::NoSuchKey(_) | Self::NoSuchUpload(_) => {
                StatusCode::NOT_FOUND
            }
            Self::BucketAlreadyExists(_) | Self::BucketNotEmpty(_) => StatusCode::CONFLICT,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
#[serde(rename = "Error")]
struct ErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "RequestId")]
    request_id: String,
}

impl IntoResponse for S3Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
        };
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
            quick_xml::se::to_string(&body).unwrap_or_default()
        );
        let mut response = (status, xml).into_response();
        if let Self::InvalidRange { size } = self {
            response.headers_mut().insert(
                axum::http::header::CONTENT_RANGE,
                format!("bytes */{size}").parse().unwrap(),
            );
        }
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            "application/xml".parse().unwrap(),
        );
        response
    }
}

/// Maps a core error (backend, meta-store) onto the matching S3 error,
/// using `bucket`/`key` only to fill in a readable message.
impl From<attestore_common::Error> for S3Error {
    fn from(err: attestore_common::Error) -> Self {
        use attestore_common::error::ErrorCode;
        match err.code {
            ErrorCode::NotFound => Self::NoSuchKey(err.message),
            ErrorCode::AlreadyExists => Self::BucketAlreadyExists(err.message),
            ErrorCode::BucketNotEmpty => Self::BucketNotEmpty(err.message),
            ErrorCode::BadRequest | ErrorCode::InvalidConfig => Self::InvalidArgument(err.message),
            ErrorCode::Forbidden | ErrorCode::Unauthorized => Self::AccessDenied,
            _ => Self::Internal(err.message),
        }
    }
}
