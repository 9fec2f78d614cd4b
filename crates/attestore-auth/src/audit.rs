//! Request auditing: wraps every response and records an [`AuditLog`]
//! entry through the metadata store, including for anonymous callers.

use crate::identity::Identity;
use attestore_meta_store::{AuditLog, MetaStore};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

pub async fn audit_layer(State(meta_store): State<Arc<MetaStore>>, request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let resource = path.strip_prefix("/s3/").unwrap_or(&path).to_string();
    let identity = request.extensions().get::<Identity>().cloned();
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;
    let status = response.status().as_u16();

    let identity = identity.unwrap_or_else(Identity::anonymous);
    let log = AuditLog {
        id: uuid::Uuid::new_v4(),
        timestamp: chrono::Utc::now(),
        user_id: identity.user_id.clone().unwrap_or_else(|| "anonymous".to_string()),
        user_name: identity.username.unwrap_or_else(|| "anonymous".to_string()),
        action: method.clone(),
        resource,
        method,
        status,
        client_ip,
        user_agent,
        extra: std::collections::HashMap::new(),
        error: if status >= 400 { Some(response.status().to_string()) } else { None },
    };

    if let Err(err) = meta_store.append_audit_log(log).await {
        tracing::warn!(%err, "failed to append audit log");
    }

    response
}
