//! Error taxonomy for the artifact store
//!
//! Every error raised by the core carries a coarse [`ErrorCode`], an
//! [`ErrorType`] bucket (client/transient/server), an HTTP status, a
//! retryability hint, and an optional detail map — mirroring the taxonomy
//! described for the reliability and handler layers. Storage and transport
//! errors are wrapped rather than discarded so causes survive across
//! layers.

use std::collections::BTreeMap;
use std::fmt;

/// Coarse error code shared across backend, meta-store, auth and handler
/// layers. Kept as a flat enum (not nested per-subsystem) so `RetryBackend`
/// and the S3 handler can match on it without depending on every crate
/// that can produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    AlreadyExists,
    Conflict,
    RangeNotSatisfiable,
    NetworkTimeout,
    ServiceUnavailable,
    Internal,
    ReadError,
    WriteError,
    StatError,
    HashError,
    HealthCheckFailed,
    ChecksumMismatch,
    BucketNotEmpty,
    InvalidConfig,
    CircuitOpen,
}

impl ErrorCode {
    /// Coarse error class used for retry/backoff decisions.
    #[must_use]
    pub const fn kind(self) -> ErrorType {
        match self {
            Self::BadRequest
            | Self::Unauthorized
            | Self::Forbidden
            | Self::NotFound
            | Self::AlreadyExists
            | Self::Conflict
            | Self::RangeNotSatisfiable
            | Self::ChecksumMismatch
            | Self::BucketNotEmpty
            | Self::InvalidConfig => ErrorType::Client,
            Self::NetworkTimeout
            | Self::ServiceUnavailable
            | Self::ReadError
            | Self::WriteError
            | Self::StatError
            | Self::CircuitOpen => ErrorType::Transient,
            Self::Internal | Self::HashError | Self::HealthCheckFailed => ErrorType::Server,
        }
    }

    /// HTTP status this code maps to when surfaced to an S3 client.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict | Self::AlreadyExists | Self::BucketNotEmpty => 409,
            Self::RangeNotSatisfiable => 416,
            Self::ServiceUnavailable | Self::CircuitOpen => 503,
            Self::NetworkTimeout => 504,
            Self::Internal
            | Self::ReadError
            | Self::WriteError
            | Self::StatError
            | Self::HashError
            | Self::HealthCheckFailed
            | Self::ChecksumMismatch
            | Self::InvalidConfig => 500,
        }
    }

    /// Whether the `Retryer` in `attestore-reliability` should retry an
    /// operation that failed with this code. `NOT_FOUND` /
    /// `BUCKET_NOT_EMPTY` / `CHECKSUM_MISMATCH` / `INVALID_CONFIG` are
    /// explicitly excluded even though some are technically
    /// transient-shaped, per the backend contract.
    #[must_use]
    pub const fn retryable(self) -> bool {
        matches!(
            self.kind(),
            ErrorType::Transient
        ) && !matches!(
            self,
            Self::ChecksumMismatch | Self::BucketNotEmpty | Self::InvalidConfig
        )
    }

    /// Stable upper-snake string form, used in log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Conflict => "CONFLICT",
            Self::RangeNotSatisfiable => "RANGE_NOT_SATISFIABLE",
            Self::NetworkTimeout => "NETWORK_TIMEOUT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL",
            Self::ReadError => "READ_ERROR",
            Self::WriteError => "WRITE_ERROR",
            Self::StatError => "STAT_ERROR",
            Self::HashError => "HASH_ERROR",
            Self::HealthCheckFailed => "HEALTH_CHECK_FAILED",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
            Self::BucketNotEmpty => "BUCKET_NOT_EMPTY",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::CircuitOpen => "CIRCUIT_OPEN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error class, used by the reliability layer to decide whether an
/// operation is worth retrying at all before consulting the finer-grained
/// [`ErrorCode::retryable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Client,
    Transient,
    Server,
}

/// The error type threaded through backend, meta-store, auth, and handler
/// code. Deliberately a struct rather than a deep enum hierarchy: every
/// layer that raises one fills in `code`, an operator-facing `message`, and
/// whatever `details` are useful for the audit log, and may attach a
/// `source` to preserve the original cause.
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: BTreeMap<String, String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: BTreeMap::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorType {
        self.code.kind()
    }

    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Whether a caller may retry the operation that produced this error.
    /// Honors an explicit wrapped transient cause even when the outer code
    /// itself isn't individually marked retryable, per the propagation rule
    /// in the error-handling design (wrapped transient backend errors stay
    /// retryable through the mapping).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code.retryable()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("details", &self.details)
            .field("source", &self.source.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::NotFound,
            std::io::ErrorKind::AlreadyExists => ErrorCode::AlreadyExists,
            std::io::ErrorKind::TimedOut => ErrorCode::NetworkTimeout,
            _ => ErrorCode::WriteError,
        };
        Self::new(code, err.to_string()).with_source(err)
    }
}

/// Result alias used throughout the core crates.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_mismatch_is_not_retryable() {
        assert!(!ErrorCode::ChecksumMismatch.retryable());
        assert!(!ErrorCode::BucketNotEmpty.retryable());
        assert!(!ErrorCode::InvalidConfig.retryable());
    }

    #[test]
    fn transient_io_codes_are_retryable() {
        assert!(ErrorCode::ReadError.retryable());
        assert!(ErrorCode::ServiceUnavailable.retryable());
    }

    #[test]
    fn http_status_mapping_matches_taxonomy() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::RangeNotSatisfiable.http_status(), 416);
        assert_eq!(ErrorCode::Conflict.http_status(), 409);
    }
}
