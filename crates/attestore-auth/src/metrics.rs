//! RBAC metrics, recorded through the `metrics` facade the same way
//! `attestore-s3::metrics` records the S3 API surface — an exporter is
//! installed once by the binary crate.

pub fn record_authentication_attempt(method: &str, status: &str) {
    metrics::counter!(
        "rbac_authentication_attempts_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_authorization_check(resource: &str, action: &str, result: &str) {
    metrics::counter!(
        "rbac_authorization_checks_total",
        "resource" => resource.to_string(),
        "action" => action.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}
