//! Shared types, error taxonomy, and configuration for the artifact store.
//!
//! Every other crate in the workspace depends on this one for its
//! [`Error`]/[`Result`] types and the [`Config`] struct the binary builds
//! at startup.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorCode, ErrorType, Result};
pub use types::{BackendKind, BucketName, ObjectKey};
