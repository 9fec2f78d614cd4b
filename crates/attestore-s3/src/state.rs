//! Shared application state handed to every handler through axum's
//! `State` extractor.

use attestore_backend::Backend;
use attestore_meta_store::MetaStore;
use attestore_supplychain::SigningAuthority;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub meta_store: Arc<MetaStore>,
    pub signing_authority: Arc<SigningAuthority>,
    pub started_at: Instant,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        meta_store: Arc<MetaStore>,
        signing_authority: Arc<SigningAuthority>,
    ) -> Self {
        Self { backend, meta_store, signing_authority, started_at: Instant::now(), start_time: Utc::now() }
    }
}
