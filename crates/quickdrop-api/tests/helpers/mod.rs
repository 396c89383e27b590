//! Test helpers: build the router over a temporary storage directory.
//!
//! Run from workspace root: `cargo test -p quickdrop-api`.

pub mod fixtures;

use axum_test::TestServer;
use quickdrop_api::setup::build_app;
use quickdrop_api::state::AppState;
use quickdrop_core::Config;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Test application: server, shared state, and the storage directory it owns.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage_dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Names of all files currently in the storage directory.
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.storage_dir())
            .expect("Failed to read storage dir")
            .map(|entry| {
                entry
                    .expect("Failed to read dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

/// Setup test app with default configuration.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup test app, letting the caller adjust the configuration first.
pub async fn setup_test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let mut config = Config {
        storage_path: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    configure(&mut config);

    let (state, app) = build_app(config).await.expect("Failed to build app");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}
