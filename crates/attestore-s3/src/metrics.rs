//! Prometheus metrics for the S3 API surface, recorded through the
//! `metrics` facade (an exporter is installed once by the binary crate).

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Exponential histogram buckets: 1KiB * 10^k for k in 0..=7. Installed
/// against `artifact_size_bytes` by the binary crate when it sets up the
/// Prometheus recorder, since `set_buckets_for_metric` is a recorder-wide
/// registration and doesn't belong behind this module's per-call API.
pub const SIZE_BUCKETS: [f64; 8] = [
    1024.0,
    10_240.0,
    102_400.0,
    1_024_000.0,
    10_240_000.0,
    102_400_000.0,
    1_024_000_000.0,
    10_240_000_000.0,
];

pub fn record_upload(bucket: &str, content_type: &str, status: &str, size: u64, duration: Duration) {
    counter!(
        "artifact_uploads_total",
        "bucket" => bucket.to_string(),
        "type" => content_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    record_size(bucket, content_type, "upload", size);
    record_duration("upload", bucket, duration);
}

pub fn record_download(bucket: &str, content_type: &str, status: &str, size: u64, duration: Duration) {
    counter!(
        "artifact_downloads_total",
        "bucket" => bucket.to_string(),
        "type" => content_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    record_size(bucket, content_type, "download", size);
    record_duration("download", bucket, duration);
}

pub fn record_delete(bucket: &str, status: &str) {
    counter!("artifact_deletes_total", "bucket" => bucket.to_string(), "status" => status.to_string())
        .increment(1);
}

fn record_size(bucket: &str, content_type: &str, operation: &str, size: u64) {
    let bucket_owned = bucket.to_string();
    let type_owned = content_type.to_string();
    let operation_owned = operation.to_string();
    histogram!(
        "artifact_size_bytes",
        "bucket" => bucket_owned,
        "type" => type_owned,
        "operation" => operation_owned
    )
    .record(size as f64);
}

fn record_duration(operation: &str, bucket: &str, duration: Duration) {
    histogram!(
        "artifact_operation_duration_seconds",
        "operation" => operation.to_string(),
        "bucket" => bucket.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_signing(status: &str, duration: Duration) {
    counter!("supplychain_signing_operations_total", "status" => status.to_string()).increment(1);
    histogram!("supplychain_operation_duration_seconds", "operation" => "sign".to_string())
        .record(duration.as_secs_f64());
}

pub fn record_verification(status: &str, duration: Duration) {
    counter!("supplychain_verification_operations_total", "status" => status.to_string())
        .increment(1);
    histogram!("supplychain_operation_duration_seconds", "operation" => "verify".to_string())
        .record(duration.as_secs_f64());
}

pub fn record_sbom_operation(operation: &str, format: &str, status: &str, duration: Duration) {
    counter!(
        "supplychain_sbom_operations_total",
        "operation" => operation.to_string(),
        "format" => format.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("supplychain_operation_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_attestation_operation(operation: &str, attestation_type: &str, status: &str, duration: Duration) {
    counter!(
        "supplychain_attestation_operations_total",
        "operation" => operation.to_string(),
        "type" => attestation_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("supplychain_operation_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_system_request(method: &str, endpoint: &str, status: u16) {
    counter!(
        "system_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_system_error(error_type: &str, component: &str) {
    counter!("system_errors_total", "type" => error_type.to_string(), "component" => component.to_string())
        .increment(1);
}

pub fn connection_opened() {
    gauge!("system_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("system_active_connections").decrement(1.0);
}
