//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use pastecat_core::{BackendKind, ByteSize, Config};
use pastecat_server::{create_app, AppState, StoreContext};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) const SITE_URL: &str = "http://paste.test";

pub(crate) fn test_config(backend: BackendKind, data_dir: &Path) -> Config {
    Config {
        site_url: SITE_URL.to_string(),
        port: 0,
        data_dir: data_dir.to_str().expect("data dir").to_string(),
        backend,
        lifetime: Duration::from_secs(3600),
        max_size: ByteSize(1024),
        ..Config::default()
    }
}

pub(crate) fn test_server_for_config(config: Config) -> TestServer {
    let ctx = StoreContext::open(config).expect("open store");
    let app = create_app(AppState::new(ctx));
    TestServer::new(app).expect("server")
}

pub(crate) fn setup_test_server(backend: BackendKind) -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config(backend, temp_dir.path());
    (test_server_for_config(config), temp_dir)
}

/// Id at the end of a paste URL returned by `POST /`.
pub(crate) fn id_from_url(body: &str) -> String {
    let url = body.trim_end();
    assert!(url.starts_with(SITE_URL), "unexpected url: {}", url);
    url.rsplit('/').next().expect("id segment").to_string()
}
