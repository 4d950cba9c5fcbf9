//! Integration tests for the pastecat HTTP API.

mod support;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use pastecat_core::{BackendKind, ByteSize};
use support::{id_from_url, setup_test_server, test_config, test_server_for_config};
use tempfile::TempDir;

const BACKENDS: [BackendKind; 3] = [BackendKind::Fs, BackendKind::Mmap, BackendKind::Mem];

async fn upload(server: &TestServer, content: &str) -> String {
    let response = server
        .post("/")
        .multipart(MultipartForm::new().add_text("paste", content.to_string()))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK, "{}", response.text());
    id_from_url(&response.text())
}

#[tokio::test]
async fn index_describes_usage() {
    let (server, _temp) = setup_test_server(BackendKind::Mem);
    let response = server.get("/").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("curl -F paste=@file http://paste.test"));
    assert!(body.contains("1.00KB"));
    assert!(body.contains("deleted after 1h"));
}

#[tokio::test]
async fn test_paste_lifecycle() {
    for backend in BACKENDS {
        let (server, _temp) = setup_test_server(backend);
        let id = upload(&server, "Hello, World!").await;
        assert_eq!(id.len(), 8, "{backend}");

        let response = server.get(&format!("/{}", id)).await;
        assert_eq!(response.status_code(), StatusCode::OK, "{backend}");
        assert_eq!(response.text(), "Hello, World!", "{backend}");

        let headers = response.headers();
        assert_eq!(
            headers.get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain; charset=utf-8"))
        );
        let etag = headers
            .get(header::ETAG)
            .and_then(|value| value.to_str().ok())
            .expect("etag");
        assert!(etag.ends_with(&format!("-{}\"", id)), "{backend}: {etag}");
        assert!(headers.contains_key(header::LAST_MODIFIED));
        assert!(headers.contains_key(header::EXPIRES));
        let cache_control = headers
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .expect("cache-control");
        assert!(cache_control.starts_with("max-age="), "{backend}");
    }
}

#[tokio::test]
async fn ids_are_case_insensitive() {
    let (server, _temp) = setup_test_server(BackendKind::Mem);
    let id = upload(&server, "shout").await;
    let response = server.get(&format!("/{}", id.to_uppercase())).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "shout");
}

#[tokio::test]
async fn if_none_match_returns_not_modified() {
    let (server, _temp) = setup_test_server(BackendKind::Fs);
    let id = upload(&server, "cached").await;
    let first = server.get(&format!("/{}", id)).await;
    let etag = first.headers().get(header::ETAG).expect("etag").clone();

    let second = server
        .get(&format!("/{}", id))
        .add_header(header::IF_NONE_MATCH, etag)
        .await;
    assert_eq!(second.status_code(), StatusCode::NOT_MODIFIED);
    assert!(second.text().is_empty());
}

#[tokio::test]
async fn binary_pastes_are_octet_streams() {
    let (server, _temp) = setup_test_server(BackendKind::Mmap);
    let response = server
        .post("/")
        .multipart(
            MultipartForm::new().add_part("paste", Part::bytes(vec![0xff, 0x00, 0xfe]).file_name("blob")),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let id = id_from_url(&response.text());

    let response = server.get(&format!("/{}", id)).await;
    assert_eq!(response.as_bytes().as_ref(), &[0xff, 0x00, 0xfe]);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE),
        Some(&HeaderValue::from_static("application/octet-stream"))
    );
}

#[tokio::test]
async fn malformed_and_unknown_ids() {
    let (server, _temp) = setup_test_server(BackendKind::Mem);

    let response = server.get("/not-an-id").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Invalid paste id.\n");

    let response = server.get("/0123abcd").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "Paste doesn't exist.\n");
}

#[tokio::test]
async fn upload_errors() {
    let (server, _temp) = setup_test_server(BackendKind::Mem);

    let response = server
        .post("/")
        .multipart(MultipartForm::new().add_text("other", "x"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("could not be found"));

    let response = server
        .post("/")
        .multipart(MultipartForm::new().add_text("paste", ""))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/")
        .multipart(MultipartForm::new().add_text("paste", "x".repeat(1025)))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn full_store_is_unavailable() {
    let temp = TempDir::new().expect("temp dir");
    let mut config = test_config(BackendKind::Fs, temp.path());
    config.max_number = 1;
    config.max_storage = ByteSize(4096);
    let server = test_server_for_config(config);

    upload(&server, "first").await;
    let response = server
        .post("/")
        .multipart(MultipartForm::new().add_text("paste", "second"))
        .await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.text().contains("maximum number of pastes"));
}

#[tokio::test]
async fn pastes_survive_restart() {
    let temp = TempDir::new().expect("temp dir");
    let id = {
        let server = test_server_for_config(test_config(BackendKind::Fs, temp.path()));
        upload(&server, "persistent").await
    };

    let server = test_server_for_config(test_config(BackendKind::Mmap, temp.path()));
    let response = server.get(&format!("/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "persistent");
}

#[tokio::test]
async fn infinite_lifetime_is_publicly_cacheable() {
    let temp = TempDir::new().expect("temp dir");
    let mut config = test_config(BackendKind::Mem, temp.path());
    config.lifetime = std::time::Duration::ZERO;
    let server = test_server_for_config(config);

    let id = upload(&server, "forever").await;
    let response = server.get(&format!("/{}", id)).await;
    let headers = response.headers();
    assert_eq!(
        headers.get(header::CACHE_CONTROL),
        Some(&HeaderValue::from_static("public"))
    );
    assert!(!headers.contains_key(header::EXPIRES));
}

#[tokio::test]
async fn responses_carry_nosniff() {
    let (server, _temp) = setup_test_server(BackendKind::Mem);
    let response = server.get("/").await;
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS),
        Some(&HeaderValue::from_static("nosniff"))
    );
}
