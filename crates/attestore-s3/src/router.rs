//! Builds the full axum [`Router`] for the gateway: bucket and object
//! routes (with the query-string dispatchers for multipart and
//! supply-chain sub-resources), health and metrics endpoints, and the
//! authentication/authorization/audit middleware stack.

use crate::handlers;
use crate::health;
use crate::state::AppState;
use attestore_auth::{audit_layer, authenticate, authorize, AuthState};
use axum::body::Body;
use axum::extract::Request;
use axum::middleware;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, head};
use axum::Router;
use std::sync::Arc;

/// Wraps the RBAC state used to layer `authenticate`/`authorize`/audit
/// middleware onto the S3 routes. `None` disables RBAC entirely — every
/// caller then reaches handlers as an anonymous identity with no policy
/// check, which is the configuration a single-operator deployment with
/// `extensions.rbac.enabled = false` runs with.
///
/// `require_auth` (reject every anonymous caller outright) is
/// deliberately not layered here: [`PolicyEngine::authorize`] already
/// encodes the anonymous-read opt-in, and applying `require_auth`
/// unconditionally in front of it would make that opt-in unreachable.
/// It stays available from `attestore-auth` for a deployment that wants
/// a hard "no anonymous calls, ever" gate on top of its own routes.
pub struct AuthLayers {
    pub state: Arc<AuthState>,
}

/// Low-cardinality endpoint label for a request path: `/health` and
/// `/metrics` pass through verbatim, everything under `/s3` collapses
/// bucket and key segments away so the label space stays bounded
/// regardless of how many buckets/objects exist, the same shape the
/// teacher's `extract_operation` classifies S3 paths into before
/// recording a metric.
fn endpoint_label(path: &str) -> String {
    if path == "/metrics" || path.starts_with("/health") {
        return path.to_string();
    }
    let Some(rest) = path.strip_prefix("/s3") else {
        return "/other".to_string();
    };
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    match segments.len() {
        0 => "/s3".to_string(),
        1 => "/s3/{bucket}".to_string(),
        _ => "/s3/{bucket}/{key}".to_string(),
    }
}

/// Outermost request-level middleware: tracks in-flight connections and
/// records `system_requests_total`/`system_errors_total` for every
/// response, mirroring the way the teacher's `metrics_layer` wraps the
/// whole router rather than each handler individually.
async fn system_metrics_layer(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = endpoint_label(request.uri().path());

    crate::metrics::connection_opened();
    let response = next.run(request).await;
    crate::metrics::connection_closed();

    let status = response.status().as_u16();
    crate::metrics::record_system_request(&method, &endpoint, status);
    if status >= 500 {
        crate::metrics::record_system_error("server_error", &endpoint);
    }
    response
}

pub fn build_router(app_state: Arc<AppState>, auth: Option<AuthLayers>) -> Router {
    let s3_routes = Router::new()
        .route("/", get(handlers::list_buckets))
        .route(
            "/{bucket}",
            get(handlers::list_objects).put(handlers::create_bucket).delete(handlers::delete_bucket),
        )
        .route(
            "/{bucket}/{*key}",
            get(handlers::get_dispatch)
                .put(handlers::put_dispatch)
                .post(handlers::post_dispatch)
                .delete(handlers::delete_dispatch)
                .head(handlers::head_object),
        )
        .with_state(app_state.clone());

    let s3_routes = match auth {
        Some(AuthLayers { state: auth_state }) => s3_routes
            .layer(middleware::from_fn_with_state(auth_state.clone(), authorize))
            .layer(middleware::from_fn_with_state(auth_state.meta_store.clone(), audit_layer))
            .layer(middleware::from_fn_with_state(auth_state, authenticate)),
        None => s3_routes,
    };

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .route("/health/live", head(health::health_live).get(health::health_live))
        .with_state(app_state);

    Router::new()
        .nest("/s3", s3_routes)
        .merge(health_routes)
        .layer(middleware::from_fn(system_metrics_layer))
}

#[cfg(test)]
mod tests {
    use super::endpoint_label;

    #[test]
    fn collapses_bucket_and_key_segments() {
        assert_eq!(endpoint_label("/s3"), "/s3");
        assert_eq!(endpoint_label("/s3/my-bucket"), "/s3/{bucket}");
        assert_eq!(endpoint_label("/s3/my-bucket/deep/key.bin"), "/s3/{bucket}/{key}");
    }

    #[test]
    fn health_and_metrics_pass_through() {
        assert_eq!(endpoint_label("/health"), "/health");
        assert_eq!(endpoint_label("/health/ready"), "/health/ready");
        assert_eq!(endpoint_label("/metrics"), "/metrics");
    }
}
