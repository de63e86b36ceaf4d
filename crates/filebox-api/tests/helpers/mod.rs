//! Test helpers: build the application router over an isolated local
//! container for integration tests.
//!
//! Run from workspace root: `cargo test -p filebox-api`.

#![allow(dead_code)]

pub mod vision_stub;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use filebox_api::setup::{initialize_app, routes};
use filebox_api::state::AppState;
use filebox_core::Config;
use filebox_storage::{InitOutcome, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Test application: server plus the container directory behind it.
pub struct TestApp {
    pub server: TestServer,
    pub storage_dir: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Setup a test app backed by local storage in a fresh temp directory.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Same as [`setup_test_app`], letting the caller adjust configuration first.
pub async fn setup_test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage_dir = temp_dir.path().join("files");

    let mut config = Config::local(storage_dir.to_string_lossy());
    configure(&mut config);

    let app = initialize_app(config, CancellationToken::new())
        .await
        .expect("Failed to initialize app");
    let outcome = app.storage_init.await.expect("Initializer task panicked");
    assert_eq!(outcome, InitOutcome::Initialized);

    let server =
        TestServer::new(app.router.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        storage_dir,
        _temp_dir: temp_dir,
    }
}

/// Serve the routes over an arbitrary storage backend, with a one-second
/// health check timeout.
pub fn server_with_storage(storage: Arc<dyn Storage>) -> TestServer {
    let mut config = Config::local("/unused");
    config.health_check_timeout_secs = 1;
    let state = Arc::new(AppState {
        config,
        storage,
        vision: None,
    });
    let router = routes::setup_routes(&state.config, state.clone()).expect("Failed to build routes");
    TestServer::new(router.into_make_service()).expect("Failed to create test server")
}

/// Multipart form with a single `file` field.
pub fn file_form(file_name: &str, data: &[u8]) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::copy_from_slice(data))
        .file_name(file_name.to_string())
        .mime_type("application/octet-stream");
    MultipartForm::new().add_part("file", part)
}
