//! Three composable middleware layers: `authenticate` (optional bearer
//! token), `require_auth` (rejects anonymous callers), and `authorize`
//! (deny-wins policy check, action derived from HTTP method).

use crate::error::AuthError;
use crate::identity::Identity;
use crate::jwt::JwtValidator;
use crate::policy::{action_for_method, PolicyEngine};
use attestore_meta_store::MetaStore;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

pub struct AuthState {
    pub jwt: JwtValidator,
    pub policy_engine: PolicyEngine,
    pub meta_store: Arc<MetaStore>,
}

/// Extracts and validates a bearer token if present, inserting an
/// [`Identity`] (anonymous if no token was given) into request
/// extensions. Never rejects by itself — that's `require_auth`'s job.
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = match request.headers().get(axum::http::header::AUTHORIZATION) {
        None => {
            crate::metrics::record_authentication_attempt("anonymous", "success");
            Identity::anonymous()
        }
        Some(value) => {
            let result = authenticate_bearer(&state, value).await;
            let status = if result.is_ok() { "success" } else { "error" };
            crate::metrics::record_authentication_attempt("bearer", status);
            result?
        }
    };
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn authenticate_bearer(
    state: &AuthState,
    header: &axum::http::HeaderValue,
) -> Result<Identity, AuthError> {
    let header = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
    let token = header.strip_prefix("Bearer ").ok_or(AuthError::InvalidAuthHeader)?;
    state.jwt.validate(token).await
}

/// Rejects the request unless `authenticate` populated a non-anonymous
/// identity.
pub async fn require_auth(request: Request<Body>, next: Next) -> Result<Response, AuthError> {
    match request.extensions().get::<Identity>() {
        Some(identity) if !identity.is_anonymous() => Ok(next.run(request).await),
        _ => Err(AuthError::AuthenticationRequired),
    }
}

/// Derives `action` from the HTTP method and `resource` by stripping a
/// leading `/s3/`, then runs the deny-wins policy engine.
pub async fn authorize(
    State(state): State<Arc<AuthState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .cloned()
        .unwrap_or_else(Identity::anonymous);
    let action = action_for_method(request.method().as_str());
    let resource = request
        .uri()
        .path()
        .strip_prefix("/s3/")
        .unwrap_or_else(|| request.uri().path());

    let policies = state
        .meta_store
        .list_policies()
        .await
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let decision = state.policy_engine.authorize(&identity, resource, action, &policies);
    let result = match decision {
        crate::policy::Decision::Allow => "allow",
        crate::policy::Decision::Deny => "deny",
    };
    crate::metrics::record_authorization_check(resource, action_label(action), result);

    match decision {
        crate::policy::Decision::Allow => Ok(next.run(request).await),
        crate::policy::Decision::Deny => Err(AuthError::AccessDenied),
    }
}

fn action_label(action: attestore_meta_store::Action) -> &'static str {
    match action {
        attestore_meta_store::Action::Read => "read",
        attestore_meta_store::Action::Write => "write",
        attestore_meta_store::Action::Delete => "delete",
        attestore_meta_store::Action::List => "list",
        attestore_meta_store::Action::Admin => "admin",
        attestore_meta_store::Action::Any => "any",
    }
}
