//! Image downloads against a mock HTTP server

mod common;

use pricat_import::images::{ImageFetchConfig, ImageFetcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> ImageFetcher {
    ImageFetcher::new(ImageFetchConfig {
        max_concurrent: 3,
        timeout: Duration::from_secs(5),
        skip_existing: true,
    })
    .unwrap()
}

fn jpeg() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "image/jpeg")
        .set_body_bytes(vec![0xD8u8; 256])
}

#[tokio::test]
async fn test_existing_file_is_not_requested() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(jpeg())
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.jpg"), b"already here").unwrap();

    let outcome = fetcher().fetch_all(&[format!("{}/a.jpg", server.uri())], dir.path()).await;

    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.success, 0);
}

#[tokio::test]
async fn test_duplicates_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/b.jpg"))
        .respond_with(jpeg())
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/x/b.jpg", server.uri());
    let outcome = fetcher().fetch_all(&[url.clone(), url.clone(), url], dir.path()).await;

    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.success, 1);
    assert_eq!(outcome.downloaded_paths, vec![dir.path().join("b.jpg")]);
    assert_eq!(std::fs::read(dir.path().join("b.jpg")).unwrap().len(), 256);
}

#[tokio::test]
async fn test_failures_are_per_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.jpg"))
        .respond_with(jpeg())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/error.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>no</html>"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<String> = ["ok.jpg", "missing.jpg", "error.jpg"]
        .iter()
        .map(|name| format!("{}/{}", server.uri(), name))
        .collect();

    let outcome = fetcher().fetch_all(&urls, dir.path()).await;

    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.success, 1);
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.failed_urls.len(), 2);
    assert!(outcome.errors.iter().any(|e| e.contains("HTTP 404")));
    assert!(!dir.path().join("missing.jpg").exists());
    assert!(!dir.path().join("error.jpg").exists());
}

#[tokio::test]
async fn test_timeout_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.jpg"))
        .respond_with(jpeg().set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher = ImageFetcher::new(ImageFetchConfig {
        max_concurrent: 1,
        timeout: Duration::from_millis(200),
        skip_existing: false,
    })
    .unwrap();

    let outcome = fetcher.fetch_all(&[format!("{}/slow.jpg", server.uri())], dir.path()).await;
    assert_eq!(outcome.failed, 1);
    assert!(outcome.errors[0].contains("timed out"));
}

#[tokio::test]
async fn test_progress_callback_sees_every_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(jpeg()).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<String> = (0..7).map(|i| format!("{}/{}.jpg", server.uri(), i)).collect();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let outcome = fetcher()
        .fetch_all_with_progress(&urls, dir.path(), move |progress| {
            assert_eq!(progress.total, 7);
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    assert_eq!(outcome.success, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 7);
}
