//! Concurrent product image download
//!
//! A fixed number of workers drain one shared queue of URLs. Results are
//! collected in a shared [`FetchOutcome`]; a failed URL never stops the
//! others.

use indexmap::IndexSet;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{ImportError, Result};

pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bodies below this size are only accepted when declared as `image/*`
pub const MIN_IMAGE_BYTES: usize = 100;

#[derive(Debug, Clone)]
pub struct ImageFetchConfig {
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub skip_existing: bool,
}

impl Default for ImageFetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            skip_existing: true,
        }
    }
}

/// Result of one batch download
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchOutcome {
    /// Unique URLs in the batch
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub downloaded_paths: Vec<PathBuf>,
    pub failed_urls: Vec<String>,
    pub errors: Vec<String>,
}

/// Reported after every finished URL
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pub completed: usize,
    pub total: usize,
    pub url: String,
    pub success: bool,
}

#[derive(Debug)]
struct Job {
    url: String,
    path: PathBuf,
}

type ProgressFn = Arc<dyn Fn(&FetchProgress) + Send + Sync>;

/// Downloads image URLs into a directory
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
    config: ImageFetchConfig,
}

impl ImageFetcher {
    pub fn new(config: ImageFetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pricat-import/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ImageFetchConfig {
        &self.config
    }

    /// Download every URL into `target_dir` and wait for the pool to drain
    pub async fn fetch_all(&self, urls: &[String], target_dir: &Path) -> FetchOutcome {
        self.run(urls, target_dir, None).await
    }

    /// Same as [`ImageFetcher::fetch_all`], calling `on_progress` after each
    /// finished URL
    pub async fn fetch_all_with_progress<F>(
        &self,
        urls: &[String],
        target_dir: &Path,
        on_progress: F,
    ) -> FetchOutcome
    where
        F: Fn(&FetchProgress) + Send + Sync + 'static,
    {
        self.run(urls, target_dir, Some(Arc::new(on_progress))).await
    }

    async fn run(&self, urls: &[String], target_dir: &Path, progress: Option<ProgressFn>) -> FetchOutcome {
        let unique: IndexSet<&str> =
            urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect();

        let mut outcome = FetchOutcome {
            total: unique.len(),
            ..FetchOutcome::default()
        };

        if let Err(e) = tokio::fs::create_dir_all(target_dir).await {
            error!(dir = %target_dir.display(), error = %e, "Cannot create image directory");
            outcome.failed = unique.len();
            outcome.failed_urls = unique.iter().map(|u| u.to_string()).collect();
            outcome.errors.push(format!("Cannot create {}: {}", target_dir.display(), e));
            return outcome;
        }

        let mut queue = VecDeque::new();
        for url in unique {
            let name = match file_name_from_url(url) {
                Some(name) => name,
                None => {
                    outcome.failed += 1;
                    outcome.failed_urls.push(url.to_string());
                    outcome.errors.push(format!("{}: no file name in URL", url));
                    continue;
                },
            };

            let path = target_dir.join(&name);
            if self.config.skip_existing && path.exists() {
                debug!(url, "Image already present, skipping");
                outcome.skipped += 1;
                continue;
            }

            queue.push_back(Job {
                url: url.to_string(),
                path,
            });
        }

        let pending = queue.len();
        if pending == 0 {
            return outcome;
        }

        let workers = self.config.max_concurrent.max(1).min(pending);
        info!(images = pending, workers, "Downloading images");

        let queue = Arc::new(Mutex::new(queue));
        let shared = Arc::new(Mutex::new(outcome));

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let shared = Arc::clone(&shared);
            let progress = progress.clone();
            let client = self.client.clone();
            let timeout = self.config.timeout;

            handles.push(tokio::spawn(async move {
                worker_task(worker, client, timeout, queue, shared, progress).await
            }));
        }

        for (worker, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!(worker, error = %e, "Image worker panicked");
            }
        }

        let mut outcome = {
            let guard = shared.lock().await;
            guard.clone()
        };

        // A panicked worker leaves its jobs unaccounted
        let leftover: Vec<Job> = queue.lock().await.drain(..).collect();
        for job in leftover {
            outcome.failed += 1;
            outcome.errors.push(format!("{}: not attempted", job.url));
            outcome.failed_urls.push(job.url);
        }

        info!(
            total = outcome.total,
            success = outcome.success,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "Image download finished"
        );
        outcome
    }
}

async fn worker_task(
    worker: usize,
    client: Client,
    timeout: Duration,
    queue: Arc<Mutex<VecDeque<Job>>>,
    shared: Arc<Mutex<FetchOutcome>>,
    progress: Option<ProgressFn>,
) {
    loop {
        let next = queue.lock().await.pop_front();
        let Some(job) = next else {
            break;
        };

        let result = fetch_one(&client, &job, timeout).await;
        let success = result.is_ok();

        let report = {
            let mut outcome = shared.lock().await;
            match result {
                Ok(bytes) => {
                    debug!(worker, url = %job.url, bytes, "Image stored");
                    outcome.success += 1;
                    outcome.downloaded_paths.push(job.path.clone());
                },
                Err(e) => {
                    warn!(worker, url = %job.url, error = %e, "Image download failed");
                    outcome.failed += 1;
                    outcome.failed_urls.push(job.url.clone());
                    outcome.errors.push(e.to_string());
                },
            }
            FetchProgress {
                completed: outcome.success + outcome.failed + outcome.skipped,
                total: outcome.total,
                url: job.url.clone(),
                success,
            }
        };

        if let Some(callback) = &progress {
            callback(&report);
        }
    }
}

async fn fetch_one(client: &Client, job: &Job, timeout: Duration) -> Result<usize> {
    let fail = |message: String| ImportError::Fetch {
        url: job.url.clone(),
        message,
    };

    let response = client
        .get(&job.url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| fail(describe(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {}", status.as_u16())));
    }

    let is_image = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);

    let body = response.bytes().await.map_err(|e| fail(describe(&e)))?;
    if !is_image && body.len() < MIN_IMAGE_BYTES {
        return Err(fail(format!("not an image ({} bytes)", body.len())));
    }

    if let Err(e) = tokio::fs::write(&job.path, &body).await {
        let _ = tokio::fs::remove_file(&job.path).await;
        return Err(fail(format!("cannot write {}: {}", job.path.display(), e)));
    }

    Ok(body.len())
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.to_string()
    }
}

/// Last path segment of `url`, without query or fragment
pub fn file_name_from_url(url: &str) -> Option<String> {
    let name = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string)),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            path.rsplit('/').next().map(str::to_string)
        },
    }?;

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
