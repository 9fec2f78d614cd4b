//! End-to-end coverage of the assembled router, driven directly with
//! `tower::ServiceExt::oneshot` (no listening socket needed).

use attestore_auth::{AuthState, JwtValidator, PolicyEngine};
use attestore_backend::filesystem::FilesystemBackend;
use attestore_backend::Backend;
use attestore_meta_store::{Action, Effect, MetaStore, Policy};
use attestore_s3::router::{build_router, AuthLayers};
use attestore_s3::AppState;
use attestore_supplychain::SigningAuthority;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

async fn test_state() -> (Arc<AppState>, Arc<MetaStore>) {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn Backend> = Arc::new(FilesystemBackend::new(dir.path(), true));
    std::mem::forget(dir);

    let meta_dir = tempfile::tempdir().unwrap();
    let meta_store = Arc::new(MetaStore::open(meta_dir.path().join("meta.redb")).await.unwrap());
    std::mem::forget(meta_dir);

    let signing_authority = Arc::new(SigningAuthority::generate().unwrap());
    let state = Arc::new(AppState::new(backend, meta_store.clone(), signing_authority));
    (state, meta_store)
}

fn app_without_auth(state: Arc<AppState>) -> Router {
    build_router(state, None)
}

async fn app_with_anonymous_read(state: Arc<AppState>, meta_store: Arc<MetaStore>) -> Router {
    let auth_state = Arc::new(AuthState {
        jwt: JwtValidator::new("http://127.0.0.1:0", "attestore"),
        policy_engine: PolicyEngine::new(true),
        meta_store,
    });
    build_router(state, Some(AuthLayers { state: auth_state }))
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn put_get_delete_round_trip() {
    let (state, _meta) = test_state().await;
    let app = app_without_auth(state);

    let create = app
        .clone()
        .oneshot(Request::builder().method("PUT").uri("/s3/artifacts").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);

    let put = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/s3/artifacts/release.tar.gz")
                .header("content-type", "application/gzip")
                .header("x-amz-meta-version", "1.2.3")
                .body(Body::from("hello world"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::OK);
    let etag = put.headers().get("etag").unwrap().to_str().unwrap().to_string();
    // ETag is the md5 of the bytes actually sent, not of the sha256 digest.
    assert_eq!(etag, "\"5eb63bbbe01eeed093cb22bb8f5acdc3\"");

    let get = app
        .clone()
        .oneshot(Request::builder().method("GET").uri("/s3/artifacts/release.tar.gz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(get.status(), StatusCode::OK);
    assert_eq!(get.headers().get("x-amz-meta-version").unwrap(), "1.2.3");
    let bytes = body_bytes(get).await;
    assert_eq!(bytes, b"hello world");

    let delete = app
        .clone()
        .oneshot(Request::builder().method("DELETE").uri("/s3/artifacts/release.tar.gz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    let missing = app
        .oneshot(Request::builder().method("GET").uri("/s3/artifacts/release.tar.gz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn range_request_returns_partial_content_and_416_when_unsatisfiable() {
    let (state, _meta) = test_state().await;
    let app = app_without_auth(state);

    app.clone()
        .oneshot(Request::builder().method("PUT").uri("/s3/artifacts").body(Body::empty()).unwrap())
        .await
        .unwrap();
    app.clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/s3/artifacts/hello.txt")
                .body(Body::from("hello world"))
                .unwrap(),
        )
        .await
        .unwrap();

    let partial = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/s3/artifacts/hello.txt")
                .header("range", "bytes=6-10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(partial.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.headers().get("content-range").unwrap(), "bytes 6-10/11");
    assert_eq!(body_bytes(partial).await, b"world");

    let unsatisfiable = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/s3/artifacts/hello.txt")
                .header("range", "bytes=20-30")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unsatisfiable.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(unsatisfiable.headers().get("content-range").unwrap(), "bytes */11");
}

#[tokio::test]
async fn list_objects_filters_by_prefix_and_reports_truncation() {
    let (state, _meta) = test_state().await;
    let app = app_without_auth(state);

    app.clone()
        .oneshot(Request::builder().method("PUT").uri("/s3/artifacts").body(Body::empty()).unwrap())
        .await
        .unwrap();
    for key in ["releases/a.bin", "releases/b.bin", "scratch/c.bin"] {
        app.clone()
            .oneshot(Request::builder().method("PUT").uri(format!("/s3/artifacts/{key}")).body(Body::from("x")).unwrap())
            .await
            .unwrap();
    }

    let listing = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/s3/artifacts?prefix=releases/&max-keys=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listing.status(), StatusCode::OK);
    let xml = String::from_utf8(body_bytes(listing).await).unwrap();
    assert!(xml.contains("<IsTruncated>true</IsTruncated>"));
    assert!(xml.contains("releases/"));
    assert!(!xml.contains("scratch/c.bin"));
}

#[tokio::test]
async fn multipart_upload_concatenates_parts_in_order() {
    let (state, _meta) = test_state().await;
    let app = app_without_auth(state);

    app.clone()
        .oneshot(Request::builder().method("PUT").uri("/s3/artifacts").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let initiate = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/s3/artifacts/big.bin?uploads").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(initiate.status(), StatusCode::OK);
    let xml = String::from_utf8(body_bytes(initiate).await).unwrap();
    let upload_id = xml
        .split("<UploadId>")
        .nth(1)
        .and_then(|s| s.split("</UploadId>").next())
        .unwrap()
        .to_string();

    let mut etags = Vec::new();
    for (part_number, chunk) in [(1, "AAA"), (2, "BBB"), (3, "CCC")] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/s3/artifacts/big.bin?uploadId={upload_id}&partNumber={part_number}"))
                    .body(Body::from(chunk))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        etags.push(response.headers().get("etag").unwrap().to_str().unwrap().trim_matches('"').to_string());
    }

    let complete_body = format!(
        "<CompleteMultipartUpload>{}</CompleteMultipartUpload>",
        (1..=3)
            .zip(&etags)
            .map(|(n, etag)| format!("<Part><PartNumber>{n}</PartNumber><ETag>\"{etag}\"</ETag></Part>"))
            .collect::<String>()
    );
    let complete = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/s3/artifacts/big.bin?uploadId={upload_id}"))
                .body(Body::from(complete_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(complete.status(), StatusCode::OK);

    let get = app
        .oneshot(Request::builder().method("GET").uri("/s3/artifacts/big.bin").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(get.status(), StatusCode::OK);
    assert_eq!(body_bytes(get).await, b"AAABBBCCC");
}

#[tokio::test]
async fn anonymous_read_allowed_but_write_denied_under_rbac() {
    let (state, meta) = test_state().await;

    state.backend.create_bucket("artifacts").await.unwrap();
    meta.create_bucket("artifacts").await.unwrap();

    let app = app_with_anonymous_read(state, meta.clone()).await;

    let denied_write = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/s3/artifacts/secret.bin")
                .body(Body::from("nope"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied_write.status(), StatusCode::FORBIDDEN);

    // Allow admin writes, then reads should still be open to anonymous callers.
    meta.put_policy(Policy {
        id: "allow-admin-write".to_string(),
        name: "allow-admin-write".to_string(),
        resource: "artifacts/*".to_string(),
        actions: vec![Action::Write],
        effect: Effect::Allow,
        principals: vec!["role:admin".to_string()],
        condition: None,
    })
    .await
    .unwrap();

    let allowed_read = app
        .oneshot(Request::builder().method("GET").uri("/s3/artifacts").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(allowed_read.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_endpoints_report_ok() {
    let (state, _meta) = test_state().await;
    let app = app_without_auth(state);

    let live = app
        .clone()
        .oneshot(Request::builder().method("GET").uri("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);

    let health = app
        .oneshot(Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
