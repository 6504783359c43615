//! Elena import trigger
//!
//! One `GET` against the importer endpoint tells Elena to pick up an uploaded
//! package. The response body is not inspected; HTTP 200 is the only success.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::error::{ImportError, Result};

pub const IMPORTER_PATH: &str = "importer/getData.php";
pub const MAX_DEBUG_LEVEL: u8 = 3;
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 120;

/// Result of one trigger call
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotifyOutcome {
    pub status_code: Option<u16>,
    pub success: bool,
    pub message: String,
    pub url: String,
}

pub struct ImportNotifier {
    client: Client,
}

impl ImportNotifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pricat-import/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Ask the importer at `base_url` to load `import_file` from `start_dir`
    pub async fn trigger(
        &self,
        base_url: &str,
        start_dir: &str,
        import_file: &str,
        debug_level: u8,
    ) -> NotifyOutcome {
        let url = match build_trigger_url(base_url, start_dir, import_file, debug_level) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Import trigger rejected");
                return NotifyOutcome {
                    message: e.to_string(),
                    ..NotifyOutcome::default()
                };
            },
        };

        info!(url = %url, "Triggering Elena import");

        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                let success = status == StatusCode::OK;
                if success {
                    info!(status = status.as_u16(), "Import triggered");
                } else {
                    warn!(status = status.as_u16(), "Importer answered with an error");
                }
                NotifyOutcome {
                    status_code: Some(status.as_u16()),
                    success,
                    message: format!("Importer responded with HTTP {}", status.as_u16()),
                    url: url.to_string(),
                }
            },
            Err(e) => {
                let message = if e.is_timeout() {
                    "Importer request timed out".to_string()
                } else {
                    format!("Importer request failed: {}", e)
                };
                warn!(url = %url, error = %e, "Import trigger failed");
                NotifyOutcome {
                    status_code: None,
                    success: false,
                    message,
                    url: url.to_string(),
                }
            },
        }
    }
}

/// `{base}/importer/getData.php?startdir=..&importfile=..&debuglevel=..`
pub fn build_trigger_url(
    base_url: &str,
    start_dir: &str,
    import_file: &str,
    debug_level: u8,
) -> Result<Url> {
    if debug_level > MAX_DEBUG_LEVEL {
        return Err(ImportError::Notify(format!(
            "debug level {} out of range 0-{}",
            debug_level, MAX_DEBUG_LEVEL
        )));
    }

    let base = format!("{}/", base_url.trim_end_matches('/'));
    let mut url = Url::parse(&base)
        .and_then(|b| b.join(IMPORTER_PATH))
        .map_err(|e| ImportError::Notify(format!("invalid importer URL '{}': {}", base_url, e)))?;

    url.query_pairs_mut()
        .append_pair("startdir", start_dir)
        .append_pair("importfile", import_file)
        .append_pair("debuglevel", &debug_level.to_string());

    Ok(url)
}
