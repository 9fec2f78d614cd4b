//! The S3-compatible HTTP surface: route handlers, request/response
//! codecs, and the router that wires them to an [`AppState`] plus the
//! authentication and audit middleware from `attestore-auth`.

pub mod error;
pub mod handlers;
pub mod hashing;
pub mod health;
pub mod metadata;
pub mod metrics;
pub mod range;
pub mod router;
pub mod state;
pub mod xml;

pub use error::S3Error;
pub use router::build_router;
pub use state::AppState;
