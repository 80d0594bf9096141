//! HTTP API Tests
//!
//! Both routers driven in-process through `tower::ServiceExt::oneshot`,
//! sharing one token secret the way the deployed services do.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use filevault::auth::crypto::PasswordPolicy;
use filevault::auth::{IdentityService, JwtConfig, JwtManager, SqliteUserRepository};
use filevault::db::connect_in_memory;
use filevault::file_storage::{
    BlobStoreConfig, ObjectStoreBackend, SqliteMetadataStore, StorageCoordinator,
};
use filevault::http_server::{HttpServer, HttpServerConfig, IdentityState, StorageState};

const SECRET: &str = "integration-secret";
const BOUNDARY: &str = "filevault-test-boundary";

struct Services {
    identity: Router,
    storage: Router,
}

async fn services() -> Services {
    let users = SqliteUserRepository::new(connect_in_memory().await.unwrap())
        .await
        .unwrap();
    let identity = IdentityService::new(
        Arc::new(users),
        JwtManager::new(JwtConfig::new(SECRET)),
        PasswordPolicy::default(),
    );

    let metadata = SqliteMetadataStore::new(connect_in_memory().await.unwrap())
        .await
        .unwrap();
    let blobs = ObjectStoreBackend::from_config(&BlobStoreConfig::memory()).unwrap();
    let coordinator = StorageCoordinator::new(Arc::new(metadata), Arc::new(blobs));
    let storage = StorageState::new(coordinator, JwtManager::new(JwtConfig::new(SECRET)));

    Services {
        identity: HttpServer::identity(
            HttpServerConfig::default(),
            Arc::new(IdentityState::new(identity)),
        )
        .router(),
        storage: HttpServer::storage(HttpServerConfig::default(), Arc::new(storage)).router(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(builder: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
}

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(token: &str, filename: &str, data: &[u8]) -> Request<Body> {
    authed(Request::post("/upload"), token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(
            "file",
            filename,
            "application/pdf",
            data,
        )))
        .unwrap()
}

async fn register_and_login(services: &Services, username: &str) -> String {
    let credentials = json!({"username": username, "password": "correct horse"});

    let response = send(&services.identity, post_json("/register", credentials.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Registration successful"})
    );

    let response = send(&services.identity, post_json("/login", credentials)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

// =============================================================================
// END-TO-END SCENARIO
// =============================================================================

/// Register, log in, upload, list, cross-user denial, delete.
#[tokio::test]
async fn test_upload_share_delete_scenario() {
    let services = services().await;
    let alice = register_and_login(&services, "alice").await;
    let bob = register_and_login(&services, "bob").await;

    let report = b"%PDF-1.4\n!";
    assert_eq!(report.len(), 10);

    let response = send(&services.storage, upload_request(&alice, "report.pdf", report)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"filename": "report.pdf"}));

    let response = send(
        &services.storage,
        authed(Request::get("/files"), &alice).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    let files = listing["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], "report.pdf");
    assert_eq!(files[0]["owner"], "alice");
    assert_eq!(files[0]["size"], 10);
    assert!(files[0].get("blob_key").is_none());

    let response = send(
        &services.storage,
        authed(Request::get("/download/report.pdf"), &alice)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment; filename=\"report.pdf\""));
    assert_eq!(body_bytes(response).await, report);

    let response = send(
        &services.storage,
        authed(Request::get("/download/report.pdf"), &bob)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "permission_denied");

    let response = send(
        &services.storage,
        authed(Request::delete("/delete/report.pdf"), &bob)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &services.storage,
        authed(Request::delete("/delete/report.pdf"), &alice)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"detail": "File deleted"}));

    let response = send(
        &services.storage,
        authed(Request::get("/download/report.pdf"), &alice)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(matches!(
        response.status(),
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
    ));
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Every storage endpoint rejects a request without a token.
#[tokio::test]
async fn test_storage_requires_token() {
    let services = services().await;

    for request in [
        Request::get("/files").body(Body::empty()).unwrap(),
        Request::get("/download/a.txt").body(Body::empty()).unwrap(),
        Request::delete("/delete/a.txt").body(Body::empty()).unwrap(),
    ] {
        let response = send(&services.storage, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Not authenticated");
        assert_eq!(body["error"], "unauthenticated");
    }
}

/// A token signed with another secret is rejected.
#[tokio::test]
async fn test_foreign_token_rejected() {
    let services = services().await;
    let forged = JwtManager::new(JwtConfig::new("someone-else"))
        .issue_token("alice")
        .unwrap();

    let response = send(
        &services.storage,
        authed(Request::get("/files"), &forged).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Downloads accept `?token=` when no bearer header is present.
#[tokio::test]
async fn test_download_with_query_token() {
    let services = services().await;
    let alice = register_and_login(&services, "alice").await;

    let response = send(&services.storage, upload_request(&alice, "link.txt", b"via link")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &services.storage,
        Request::get(format!("/download/link.txt?token={}", alice))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"via link");
}

/// A bad bearer header fails even when the query token is good.
#[tokio::test]
async fn test_header_token_takes_precedence() {
    let services = services().await;
    let alice = register_and_login(&services, "alice").await;

    send(&services.storage, upload_request(&alice, "x.txt", b"x")).await;

    let response = send(
        &services.storage,
        authed(
            Request::get(format!("/download/x.txt?token={}", alice)),
            "not-a-token",
        )
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Authentication is decided before the upload body is read.
#[tokio::test]
async fn test_unauthenticated_upload_checked_before_body() {
    let services = services().await;

    for request in [
        Request::post("/upload").body(Body::empty()).unwrap(),
        Request::post("/upload")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not multipart"))
            .unwrap(),
    ] {
        let response = send(&services.storage, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "unauthenticated");
    }
}

// =============================================================================
// UPLOAD VALIDATION
// =============================================================================

/// An authenticated upload that is not multipart gets a JSON 400.
#[tokio::test]
async fn test_upload_requires_multipart() {
    let services = services().await;
    let alice = register_and_login(&services, "alice").await;

    let request = authed(Request::post("/upload"), &alice)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = send(&services.storage, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");
}

/// A query string that cannot be decoded is a JSON 400 once the header authenticates.
#[tokio::test]
async fn test_download_with_unreadable_query() {
    let services = services().await;
    let alice = register_and_login(&services, "alice").await;

    let response = send(
        &services.storage,
        authed(Request::get("/download/x.txt?token=a&token=b"), &alice)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");

    let response = send(
        &services.storage,
        Request::get("/download/x.txt?token=a&token=b")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Multipart without a `file` field is a bad request.
#[tokio::test]
async fn test_upload_without_file_field() {
    let services = services().await;
    let alice = register_and_login(&services, "alice").await;

    let request = authed(Request::post("/upload"), &alice)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body("other", "a.txt", "text/plain", b"a")))
        .unwrap();

    let response = send(&services.storage, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Invalid input: No file provided");
}

/// Uploading the same name twice conflicts.
#[tokio::test]
async fn test_duplicate_upload_conflicts() {
    let services = services().await;
    let alice = register_and_login(&services, "alice").await;

    let first = send(&services.storage, upload_request(&alice, "dup.pdf", b"1")).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(&services.storage, upload_request(&alice, "dup.pdf", b"2")).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"], "conflict");
}

// =============================================================================
// IDENTITY SERVICE
// =============================================================================

#[tokio::test]
async fn test_identity_endpoints() {
    let services = services().await;
    let token = register_and_login(&services, "alice").await;

    let response = send(
        &services.identity,
        post_json(
            "/register",
            json!({"username": "alice", "password": "another pass"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "user_exists");

    let response = send(
        &services.identity,
        post_json("/login", json!({"username": "alice", "password": "wrong pass"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &services.identity,
        authed(Request::get("/users/me"), &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"username": "alice"}));

    let response = send(
        &services.identity,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["service"], "identity");
}

/// Malformed credential bodies get a JSON 400, not axum's plain-text rejection.
#[tokio::test]
async fn test_malformed_credentials_rejected() {
    let services = services().await;

    for uri in ["/register", "/login"] {
        let response = send(&services.identity, post_json(uri, json!({"username": "alice"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_input");
        assert!(body["detail"].as_str().unwrap().contains("password"));

        let response = send(
            &services.identity,
            Request::post(uri).body(Body::from("username=alice")).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_input");
    }
}
