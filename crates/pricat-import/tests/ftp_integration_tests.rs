//! FTP round trips against a real server
//!
//! Marked with #[ignore]; point them at a scratch server and run:
//!
//! ```bash
//! PRICAT_TEST_FTP_HOST=localhost PRICAT_TEST_FTP_USER=test PRICAT_TEST_FTP_PASSWORD=test \
//!     cargo test --test ftp_integration_tests -- --ignored --nocapture
//! ```

mod common;

use anyhow::Result;
use pricat_import::ftp::{FtpEndpointConfig, TransferClient};
use pricat_import::storage::{EntityStore, MemoryEntityStore};
use tracing::info;

fn endpoint() -> FtpEndpointConfig {
    let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    FtpEndpointConfig {
        host: var("PRICAT_TEST_FTP_HOST", "localhost"),
        port: var("PRICAT_TEST_FTP_PORT", "21").parse().unwrap_or(21),
        username: var("PRICAT_TEST_FTP_USER", "anonymous"),
        password: var("PRICAT_TEST_FTP_PASSWORD", ""),
        base_path: var("PRICAT_TEST_FTP_BASE_PATH", "/"),
        ..FtpEndpointConfig::default()
    }
}

#[tokio::test]
#[ignore]
async fn test_upload_then_download() -> Result<()> {
    common::init_tracing();
    let client = TransferClient::new(endpoint());
    let dir = tempfile::tempdir()?;

    let csv = dir.path().join("pricat_1872_Lego Spielwaren GmbH_0.csv");
    std::fs::write(&csv, common::five_line_feed("http://img.example.com"))?;
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images)?;
    std::fs::write(images.join("60198.jpg"), vec![0u8; 256])?;

    let upload = client.upload_package(&csv, Some(&images), "pricat-test/inbox").await;
    info!(?upload, "Uploaded");
    assert!(upload.success, "{:?}", upload.errors);
    assert_eq!(upload.files, 2);

    let download = client
        .download_source("pricat-test/inbox/pricat_1872_Lego Spielwaren GmbH_0.csv", dir.path())
        .await;
    assert!(download.success, "{:?}", download.errors);
    assert_eq!(download.bytes, std::fs::metadata(&csv)?.len());

    let store = MemoryEntityStore::new();
    // The inbox holds the feed and the images directory, which sync passes over
    let sync = client.sync_suppliers("pricat-test/inbox", &store).await;
    assert!(sync.success, "{:?}", sync.errors);
    assert_eq!(sync.files_seen, 1);
    assert_eq!(sync.created, 1);
    assert_eq!(store.list_suppliers().await?[0].supplier_number.as_deref(), Some("1872"));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_list_files() -> Result<()> {
    common::init_tracing();
    let files = TransferClient::new(endpoint()).list_files("").await?;
    info!(count = files.len(), "Listed remote files");
    Ok(())
}
