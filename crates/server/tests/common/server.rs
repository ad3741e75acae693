//! Server test utilities.

use super::signers::FakeSigner;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use depot_core::config::AppConfig;
use depot_metadata::{MetadataStore, SqliteStore};
use depot_server::{AppState, MutationEngine, create_router};
use depot_signer::IndexSigner;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "depot-test-boundary";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub signer: Arc<FakeSigner>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Server with repositories `core` and `extra` and no signing key.
    pub async fn new() -> Self {
        Self::with_config(FakeSigner::inactive(), |_| {}).await
    }

    /// Create a test server with a custom signer and config modifications.
    pub async fn with_config<F>(signer: FakeSigner, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let mut config = AppConfig::for_testing(temp_dir.path(), &["core", "extra"]);
        modifier(&mut config);

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&config.metadata.path)
                .await
                .expect("Failed to create metadata store"),
        );

        let signer = Arc::new(signer);
        let state = AppState::from_config(
            config,
            metadata,
            signer.clone() as Arc<dyn IndexSigner>,
        )
        .await
        .expect("Failed to build application state");
        state
            .engine
            .reconcile()
            .await
            .expect("Failed to reconcile indexes");

        let router = create_router(state.clone());

        Self {
            router,
            state,
            signer,
            _temp_dir: temp_dir,
        }
    }

    pub fn engine(&self) -> &Arc<MutationEngine> {
        &self.state.engine
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Root directory of a configured repository.
    pub fn repo_root(&self, repo: &str) -> PathBuf {
        self.state
            .registry
            .get(repo)
            .expect("unknown repository")
            .root()
            .to_path_buf()
    }

    /// Path of a file under a repository's architecture directory.
    pub fn repo_file(&self, repo: &str, arch: &str, name: &str) -> PathBuf {
        self.repo_root(repo).join(arch).join(name)
    }

    /// Bytes of the published `<repo>.db` for an architecture.
    pub fn index_bytes(&self, repo: &str, arch: &str) -> Vec<u8> {
        std::fs::read(self.repo_file(repo, arch, &depot_core::database_alias_name(repo)))
            .expect("index not published")
    }
}

/// `Authorization` header value for the test credentials.
#[allow(dead_code)]
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Authorization header matching `ApiConfig::for_testing`.
#[allow(dead_code)]
pub fn admin_auth() -> String {
    basic_auth("admin", "secret")
}

/// Build a multipart body with a `package` part and optional `signature` part.
#[allow(dead_code)]
pub fn multipart_body(file_name: &str, archive: &[u8], signature: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"package\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(archive);
    body.extend_from_slice(b"\r\n");

    if let Some(sig) = signature {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"signature\"; filename=\"{file_name}.sig\"\r\n\
                 Content-Type: application/pgp-signature\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(sig);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Send a request and decode a JSON response body.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    let request = builder.body(Body::empty()).unwrap();
    send(router, request).await
}

/// POST a package upload.
#[allow(dead_code)]
pub async fn upload_request(
    router: &axum::Router,
    repo: &str,
    file_name: &str,
    archive: &[u8],
    signature: Option<&[u8]>,
    auth: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/unstable/{repo}/package"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    let request = builder
        .body(Body::from(multipart_body(file_name, archive, signature)))
        .unwrap();
    send(router, request).await
}

/// GET a path and return the raw body.
#[allow(dead_code)]
pub async fn get_raw(router: &axum::Router, uri: &str) -> (StatusCode, Bytes) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}
