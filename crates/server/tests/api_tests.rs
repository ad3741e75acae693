//! Integration tests for HTTP API endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{
    FakeSigner, TestPackage, TestServer, admin_auth, basic_auth, fake_signature, get_raw,
    index_packages, json_request, upload_request,
};
use depot_core::{database_alias_name, signature_file_name};
use tower::ServiceExt;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;
    let (status, body) = json_request(&server.router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["repositories"], 2);
}

#[tokio::test]
async fn test_health_check_reports_missing_repository_root() {
    let server = TestServer::new().await;
    std::fs::remove_dir_all(server.repo_root("extra")).unwrap();

    let (status, body) = json_request(&server.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"].as_str().unwrap().contains("extra"));
}

#[tokio::test]
async fn test_mutations_require_credentials() {
    let server = TestServer::new().await;
    let pkg = TestPackage::new("hello", "1-1", "x86_64");
    let archive = pkg.archive().await;

    let wrong = basic_auth("admin", "wrong");
    for auth in [None, Some(wrong.as_str()), Some("Bearer token")] {
        let (status, body) =
            upload_request(&server.router, "core", &pkg.file_name(), &archive, None, auth).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }

    let (status, _) = json_request(
        &server.router,
        "DELETE",
        "/api/unstable/core/package/hello.pkg.tar.zst",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(server.metadata().list_packages("core").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unauthorized_response_carries_challenge() {
    let server = TestServer::new().await;
    let request = Request::builder()
        .uri("/api/unstable/core/packages")
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Basic realm=\"depot\""
    );
}

#[tokio::test]
async fn test_auth_precedes_repository_lookup() {
    let server = TestServer::new().await;
    let (status, _) =
        json_request(&server.router, "GET", "/api/unstable/missing/packages", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_list_and_remove() {
    let server = TestServer::new().await;
    let auth = admin_auth();
    let pkg = TestPackage::new("hello", "2.12-1", "x86_64").depends("glibc");
    let archive = pkg.archive().await;

    let (status, body) = upload_request(
        &server.router,
        "core",
        &pkg.file_name(),
        &archive,
        None,
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["repo"], "core");
    assert_eq!(body["file_name"], pkg.file_name());
    assert_eq!(body["name"], "hello");
    assert_eq!(body["version"], "2.12-1");
    assert_eq!(body["architecture"], "x86_64");
    assert_eq!(
        body["checksum"],
        depot_core::ContentHash::compute(&archive).to_hex()
    );

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/api/unstable/core/packages",
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let packages = body["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0]["name"], "hello");
    assert_eq!(packages[0]["has_signature"], false);
    assert!(packages[0]["ingested_at"].as_str().unwrap().contains('T'));

    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/api/unstable/core/package/{}", pkg.file_name()),
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_name"], pkg.file_name());

    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/api/unstable/core/package/{}", pkg.file_name()),
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "package_not_found");
}

#[tokio::test]
async fn test_upload_status_mapping() {
    let server = TestServer::with_config(FakeSigner::inactive(), |c| {
        c.repositories.require_signed_packages = true;
    })
    .await;
    let auth = admin_auth();
    let pkg = TestPackage::new("hello", "1-1", "x86_64");
    let archive = pkg.archive().await;

    let (status, body) = upload_request(
        &server.router,
        "missing",
        &pkg.file_name(),
        &archive,
        None,
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_repository");

    let (status, body) = upload_request(
        &server.router,
        "core",
        "broken.pkg.tar.zst",
        b"definitely not a package",
        None,
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "malformed_package");

    let (status, body) = upload_request(
        &server.router,
        "core",
        &pkg.file_name(),
        &archive,
        None,
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "signature_required");

    let (status, body) = upload_request(
        &server.router,
        "core",
        &pkg.file_name(),
        &archive,
        Some(b"bogus".as_slice()),
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "signature_invalid");

    let sig = fake_signature(&archive);
    let (status, _) = upload_request(
        &server.router,
        "core",
        &pkg.file_name(),
        &archive,
        Some(sig.as_slice()),
        Some(auth.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signing_failure_is_server_error_but_package_kept() {
    let server = TestServer::with_config(FakeSigner::failing(), |_| {}).await;
    let pkg = TestPackage::new("hello", "1-1", "x86_64");

    let (status, body) = upload_request(
        &server.router,
        "core",
        &pkg.file_name(),
        &pkg.archive().await,
        None,
        Some(admin_auth().as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "signing_failed");

    assert!(
        server
            .metadata()
            .get_package("core", &pkg.file_name())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_upload_without_package_part_is_rejected() {
    let server = TestServer::new().await;
    let boundary = common::BOUNDARY;
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"signature\"; filename=\"x.sig\"\r\n\r\n\
         sig\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/unstable/core/package")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header(header::AUTHORIZATION, admin_auth())
        .body(Body::from(body))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_over_body_limit_is_rejected() {
    let server = TestServer::with_config(FakeSigner::inactive(), |c| {
        c.server.max_upload_bytes = 1024;
    })
    .await;
    let (status, _) = upload_request(
        &server.router,
        "core",
        "big.pkg.tar.zst",
        &vec![0u8; 64 * 1024],
        None,
        Some(admin_auth().as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(server.metadata().list_packages("core").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_static_serving_of_packages_and_index() {
    let server = TestServer::with_config(FakeSigner::active(), |_| {}).await;
    let pkg = TestPackage::new("hello", "1-1", "x86_64");
    let archive = pkg.archive().await;

    let (status, _) = upload_request(
        &server.router,
        "core",
        &pkg.file_name(),
        &archive,
        None,
        Some(admin_auth().as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_raw(
        &server.router,
        &format!("/repo/core/x86_64/{}", pkg.file_name()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, archive);

    let (status, db) = get_raw(
        &server.router,
        &format!("/repo/core/x86_64/{}", database_alias_name("core")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index_packages(&db), vec!["hello-1-1"]);

    let (status, sig) = get_raw(
        &server.router,
        &format!(
            "/repo/core/x86_64/{}",
            signature_file_name(&database_alias_name("core"))
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sig.to_vec(), fake_signature(&db));

    let (status, _) = get_raw(&server.router, "/repo/extra/x86_64/missing.pkg.tar.zst").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    depot_server::metrics::register_metrics();
    let server = TestServer::new().await;
    let pkg = TestPackage::new("hello", "1-1", "x86_64");
    upload_request(
        &server.router,
        "core",
        &pkg.file_name(),
        &pkg.archive().await,
        None,
        Some(admin_auth().as_str()),
    )
    .await;

    let (status, body) = get_raw(&server.router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("depot_packages_added_total"));
}

#[tokio::test]
async fn test_metrics_endpoint_can_be_disabled() {
    let server = TestServer::with_config(FakeSigner::inactive(), |c| {
        c.server.metrics_enabled = false;
    })
    .await;
    let (status, _) = get_raw(&server.router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
