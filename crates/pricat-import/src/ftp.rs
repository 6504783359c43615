//! FTP transfers for the source feed and the Elena import package
//!
//! suppaftp is blocking, so every operation runs on the blocking pool with a
//! fresh connection. Sessions end with a best-effort `QUIT` whether the
//! operation succeeded or not.
//!
//! # Examples
//!
//! ```rust,ignore
//! use pricat_import::ftp::{FtpEndpointConfig, TransferClient};
//!
//! let client = TransferClient::new(FtpEndpointConfig {
//!     host: "ftp.supplier.example".to_string(),
//!     username: "pricat".to_string(),
//!     password: "secret".to_string(),
//!     ..FtpEndpointConfig::default()
//! });
//!
//! let outcome = client.download_source("pricat_1872_Lego_3.csv", "/data/imports".as_ref()).await;
//! ```

use anyhow::{anyhow, Context};
use chrono::Utc;
use indexmap::IndexMap;
use pricat_common::types::{file_timestamp, strip_leading_zeros};
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpStream, Mode};
use tracing::{debug, info, warn};

use crate::error::{ImportError, Result};
use crate::storage::{EntityStore, NewSupplier};

pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_FTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_FTP_TRANSFER_TIMEOUT_SECS: u64 = 600;

/// Name pattern of supplier feeds: `pricat_{number}_{name}_{version}.csv`
pub const SUPPLIER_FILE_PATTERN: &str = r"(?i)^pricat_(\d+)_(.+)_([^_]+)\.csv$";

/// Directory entries next to the feeds that are not feeds themselves
pub const IGNORED_SYNC_ENTRIES: &[&str] = &["images"];

/// Connection settings for one FTP server
#[derive(Debug, Clone)]
pub struct FtpEndpointConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,

    /// Remote directory all relative paths are resolved against
    pub base_path: String,

    pub passive: bool,

    /// Connect and control-channel read timeout
    pub timeout_secs: u64,

    /// Deadline for a whole operation, data transfers included
    pub transfer_timeout_secs: u64,
}

impl Default for FtpEndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_FTP_PORT,
            username: "anonymous".to_string(),
            password: String::new(),
            base_path: "/".to_string(),
            passive: true,
            timeout_secs: DEFAULT_FTP_TIMEOUT_SECS,
            transfer_timeout_secs: DEFAULT_FTP_TRANSFER_TIMEOUT_SECS,
        }
    }
}

impl FtpEndpointConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    /// Resolve `path` against the base path; absolute paths are kept
    pub fn remote_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            return path.to_string();
        }
        let base = self.base_path.trim_end_matches('/');
        let path = path.trim_start_matches("./");
        if path.is_empty() {
            if base.is_empty() {
                "/".to_string()
            } else {
                base.to_string()
            }
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Result of a download or upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferOutcome {
    pub success: bool,
    pub message: String,
    pub local_path: Option<PathBuf>,
    pub bytes: u64,
    pub files: usize,
    pub errors: Vec<String>,
}

impl TransferOutcome {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            errors: vec![message.clone()],
            message,
            ..Self::default()
        }
    }
}

/// Result of a supplier discovery run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub files_seen: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: Vec<String>,
}

/// Supplier identity taken from a feed file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierFile {
    /// Supplier number without leading zeros
    pub number: String,
    pub name: String,
    pub version: String,
    pub file_name: String,
}

impl SupplierFile {
    /// Whether this file carries a later version than `other`.
    ///
    /// Numeric versions (optionally prefixed with `v`) compare as numbers,
    /// anything else lexically.
    pub fn is_newer_than(&self, other: &SupplierFile) -> bool {
        match (numeric_version(&self.version), numeric_version(&other.version)) {
            (Some(a), Some(b)) if a != b => a > b,
            (Some(_), Some(_)) => self.file_name > other.file_name,
            _ => self.version > other.version,
        }
    }
}

fn numeric_version(version: &str) -> Option<u64> {
    version.trim_start_matches(['v', 'V']).parse().ok()
}

/// Feed files picked by a supplier sync
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Latest file per supplier number, in first-seen order
    pub latest: IndexMap<String, SupplierFile>,
    pub files_seen: usize,
    /// One entry per name that is not a supplier feed
    pub errors: Vec<String>,
}

/// Compiled [`SUPPLIER_FILE_PATTERN`]
#[derive(Debug, Clone)]
pub struct SupplierFileMatcher {
    pattern: Regex,
}

impl SupplierFileMatcher {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(SUPPLIER_FILE_PATTERN)
            .map_err(|e| ImportError::Config(format!("invalid supplier file pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    pub fn parse(&self, file_name: &str) -> Option<SupplierFile> {
        let file_name = file_name.rsplit('/').next().unwrap_or(file_name);
        let captures = self.pattern.captures(file_name)?;

        let name = captures.get(2)?.as_str().trim();
        if name.is_empty() {
            return None;
        }

        Some(SupplierFile {
            number: strip_leading_zeros(captures.get(1)?.as_str()),
            name: name.to_string(),
            version: captures.get(3)?.as_str().to_string(),
            file_name: file_name.to_string(),
        })
    }
}

/// Sort a remote listing into the latest feed per supplier and the names
/// that could not be parsed
pub fn plan_sync(matcher: &SupplierFileMatcher, names: &[String]) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for name in names {
        if IGNORED_SYNC_ENTRIES.contains(&name.as_str()) {
            debug!(entry = %name, "Skipping known directory");
            continue;
        }

        let Some(file) = matcher.parse(name) else {
            warn!(file = %name, "Not a supplier feed file name");
            plan.errors.push(format!("{}: not a supplier feed file name", name));
            continue;
        };

        plan.files_seen += 1;
        let newer = plan
            .latest
            .get(&file.number)
            .is_none_or(|current| file.is_newer_than(current));
        if newer {
            plan.latest.insert(file.number.clone(), file);
        }
    }

    plan
}

/// Parse `pricat_{number}_{name}_{version}.csv`
pub fn parse_supplier_filename(file_name: &str) -> Option<SupplierFile> {
    SupplierFileMatcher::new().ok()?.parse(file_name)
}

/// FTP operations against one endpoint
#[derive(Debug, Clone)]
pub struct TransferClient {
    config: FtpEndpointConfig,
}

impl TransferClient {
    pub fn new(config: FtpEndpointConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FtpEndpointConfig {
        &self.config
    }

    /// Fetch `remote_path` into `target_dir` under a timestamped name
    pub async fn download_source(&self, remote_path: &str, target_dir: &Path) -> TransferOutcome {
        let config = self.config.clone();
        let remote = self.config.remote_path(remote_path);
        let file_name = remote.rsplit('/').next().unwrap_or(&remote).to_string();
        let local_path =
            target_dir.join(format!("{}_{}", file_timestamp(Utc::now()), file_name));

        info!(host = %config.host, remote = %remote, "Downloading source feed");

        let result = self
            .run_blocking({
                let remote = remote.clone();
                let local_path = local_path.clone();
                move || download_sync(&config, &remote, &local_path)
            })
            .await;

        match result {
            Ok(bytes) => {
                info!(local = %local_path.display(), bytes, "Source feed downloaded");
                TransferOutcome {
                    success: true,
                    message: format!("Downloaded {} ({} bytes)", remote, bytes),
                    local_path: Some(local_path),
                    bytes,
                    files: 1,
                    errors: Vec::new(),
                }
            },
            Err(e) => {
                if local_path.exists() {
                    if let Err(rm) = std::fs::remove_file(&local_path) {
                        warn!(path = %local_path.display(), error = %rm, "Cannot remove partial download");
                    }
                }
                warn!(remote = %remote, error = %e, "Source download failed");
                TransferOutcome::failed(format!("Download of {} failed: {:#}", remote, e))
            },
        }
    }

    /// Upload the import CSV and the image directory into `remote_dir`.
    ///
    /// The CSV must arrive; individual image failures are recorded and the
    /// upload continues.
    pub async fn upload_package(
        &self,
        csv_path: &Path,
        images_dir: Option<&Path>,
        remote_dir: &str,
    ) -> TransferOutcome {
        let config = self.config.clone();
        let remote = self.config.remote_path(remote_dir);
        let csv_path = csv_path.to_path_buf();
        let images: Vec<PathBuf> = match images_dir {
            Some(dir) => match list_local_files(dir) {
                Ok(files) => files,
                Err(e) => {
                    return TransferOutcome::failed(format!(
                        "Cannot read image directory {}: {}",
                        dir.display(),
                        e
                    ))
                },
            },
            None => Vec::new(),
        };

        info!(host = %config.host, remote = %remote, images = images.len(), "Uploading import package");

        let result = self
            .run_blocking({
                let remote = remote.clone();
                move || upload_sync(&config, &csv_path, &images, &remote)
            })
            .await;

        match result {
            Ok(stats) => {
                if !stats.errors.is_empty() {
                    warn!(failed = stats.errors.len(), "Some images were not uploaded");
                }
                info!(files = stats.files, bytes = stats.bytes, "Import package uploaded");
                TransferOutcome {
                    success: true,
                    message: format!(
                        "Uploaded {} files ({} bytes) to {}",
                        stats.files, stats.bytes, remote
                    ),
                    local_path: None,
                    bytes: stats.bytes,
                    files: stats.files,
                    errors: stats.errors,
                }
            },
            Err(e) => {
                warn!(remote = %remote, error = %e, "Package upload failed");
                TransferOutcome::failed(format!("Upload to {} failed: {:#}", remote, e))
            },
        }
    }

    /// File names in `remote_dir`
    pub async fn list_files(&self, remote_dir: &str) -> Result<Vec<String>> {
        let config = self.config.clone();
        let remote = self.config.remote_path(remote_dir);

        self.run_blocking(move || list_sync(&config, &remote))
            .await
            .map_err(|e| ImportError::Connection(format!("{:#}", e)))
    }

    /// Run a blocking FTP operation under the endpoint's transfer deadline.
    ///
    /// suppaftp only lets us time out the control socket; the deadline also
    /// covers stalled data connections. A timed-out task is abandoned and
    /// ends when its socket does.
    async fn run_blocking<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let limit = self.config.transfer_timeout();
        match tokio::time::timeout(limit, tokio::task::spawn_blocking(op)).await {
            Ok(joined) => flatten(joined),
            Err(_) => Err(anyhow!(
                "FTP operation on {} timed out after {}s",
                self.config.host,
                limit.as_secs()
            )),
        }
    }

    /// Create or refresh suppliers from the feed file names in `remote_dir`
    pub async fn sync_suppliers(&self, remote_dir: &str, store: &dyn EntityStore) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        let matcher = match SupplierFileMatcher::new() {
            Ok(matcher) => matcher,
            Err(e) => {
                outcome.errors.push(e.to_string());
                return outcome;
            },
        };

        let names = match self.list_files(remote_dir).await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Supplier sync could not list files");
                outcome.errors.push(e.to_string());
                return outcome;
            },
        };

        let plan = plan_sync(&matcher, &names);
        outcome.files_seen = plan.files_seen;
        outcome.errors.extend(plan.errors);

        for file in plan.latest.values() {
            if let Err(e) = apply_supplier_file(file, store, &mut outcome).await {
                warn!(file = %file.file_name, error = %e, "Supplier sync entry failed");
                outcome.errors.push(format!("{}: {}", file.file_name, e));
            }
        }

        outcome.success = outcome.errors.is_empty();
        info!(
            files = outcome.files_seen,
            created = outcome.created,
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            "Supplier sync finished"
        );
        outcome
    }
}

async fn apply_supplier_file(
    file: &SupplierFile,
    store: &dyn EntityStore,
    outcome: &mut SyncOutcome,
) -> Result<()> {
    match store.find_supplier_by_number(&file.number).await? {
        None => {
            store
                .insert_supplier(NewSupplier {
                    gln: None,
                    supplier_number: Some(file.number.clone()),
                    name: file.name.clone(),
                    active: false,
                    source_filename: Some(file.file_name.clone()),
                })
                .await?;
            outcome.created += 1;
        },
        Some(supplier) => {
            let mut changed = false;
            if supplier.name != file.name {
                store.update_supplier_name(supplier.id, &file.name).await?;
                changed = true;
            }
            if supplier.source_filename.as_deref() != Some(file.file_name.as_str()) {
                store
                    .update_supplier_source_filename(supplier.id, &file.file_name)
                    .await?;
                changed = true;
            }
            if changed {
                outcome.updated += 1;
            } else {
                outcome.unchanged += 1;
            }
        },
    }
    Ok(())
}

#[derive(Debug, Default)]
struct UploadStats {
    files: usize,
    bytes: u64,
    errors: Vec<String>,
}

fn flatten<T>(
    result: std::result::Result<anyhow::Result<T>, tokio::task::JoinError>,
) -> anyhow::Result<T> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(anyhow!("FTP task panicked: {}", e)),
    }
}

/// Connect, log in, run `op`, then always try to `QUIT`
fn with_session<T>(
    config: &FtpEndpointConfig,
    op: impl FnOnce(&mut FtpStream) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .with_context(|| format!("Cannot resolve {}:{}", config.host, config.port))?
        .next()
        .ok_or_else(|| anyhow!("No address for {}:{}", config.host, config.port))?;

    debug!(host = %config.host, port = config.port, "Connecting to FTP server");
    let mut ftp = FtpStream::connect_timeout(addr, timeout)
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;

    if let Err(e) = ftp.get_ref().set_read_timeout(Some(timeout)) {
        warn!(error = %e, "Cannot set FTP read timeout");
    }
    ftp.set_mode(if config.passive {
        Mode::Passive
    } else {
        Mode::Active
    });

    let result = ftp
        .login(&config.username, &config.password)
        .context("FTP login failed")
        .and_then(|_| {
            ftp.transfer_type(FileType::Binary)
                .context("Failed to set binary mode")
        })
        .and_then(|_| op(&mut ftp));

    if let Err(e) = ftp.quit() {
        warn!(error = %e, "Failed to quit FTP session gracefully");
    }

    result
}

fn download_sync(config: &FtpEndpointConfig, remote: &str, local_path: &Path) -> anyhow::Result<u64> {
    let data = with_session(config, |ftp| {
        let mut reader = ftp
            .retr_as_buffer(remote)
            .with_context(|| format!("Failed to download {}", remote))?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).context("Failed to read file data")?;
        Ok(data)
    })?;

    if let Some(parent) = local_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    std::fs::write(local_path, &data)
        .with_context(|| format!("Cannot write {}", local_path.display()))?;

    Ok(data.len() as u64)
}

fn upload_sync(
    config: &FtpEndpointConfig,
    csv_path: &Path,
    images: &[PathBuf],
    remote_dir: &str,
) -> anyhow::Result<UploadStats> {
    let csv_name = file_name(csv_path)?;

    with_session(config, |ftp| {
        ensure_remote_dir(ftp, remote_dir)?;

        let mut stats = UploadStats::default();

        let mut csv = File::open(csv_path)
            .with_context(|| format!("Cannot open {}", csv_path.display()))?;
        let target = format!("{}/{}", remote_dir.trim_end_matches('/'), csv_name);
        stats.bytes += ftp
            .put_file(&target, &mut csv)
            .with_context(|| format!("Failed to upload {}", target))?;
        stats.files += 1;

        if images.is_empty() {
            return Ok(stats);
        }

        let images_dir = format!("{}/images", remote_dir.trim_end_matches('/'));
        ensure_remote_dir(ftp, &images_dir)?;

        upload_each(images, &mut stats, |image| upload_one(ftp, image, &images_dir));

        Ok(stats)
    })
}

/// Upload every image, recording failures instead of stopping
fn upload_each<F>(images: &[PathBuf], stats: &mut UploadStats, mut upload: F)
where
    F: FnMut(&Path) -> anyhow::Result<u64>,
{
    for image in images {
        match upload(image) {
            Ok(bytes) => {
                stats.files += 1;
                stats.bytes += bytes;
            },
            Err(e) => {
                warn!(file = %image.display(), error = %e, "Image upload failed");
                stats.errors.push(format!("{:#}", e));
            },
        }
    }
}

fn upload_one(ftp: &mut FtpStream, path: &Path, remote_dir: &str) -> anyhow::Result<u64> {
    let name = file_name(path)?;
    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let target = format!("{}/{}", remote_dir, name);
    ftp.put_file(&target, &mut file)
        .with_context(|| format!("Failed to upload {}", target))
}

/// Create every missing component of `path`
fn ensure_remote_dir(ftp: &mut FtpStream, path: &str) -> anyhow::Result<()> {
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);

        if ftp.cwd(&current).is_err() {
            debug!(dir = %current, "Creating remote directory");
            ftp.mkdir(&current)
                .with_context(|| format!("Cannot create remote directory {}", current))?;
        }
    }
    Ok(())
}

fn list_sync(config: &FtpEndpointConfig, remote_dir: &str) -> anyhow::Result<Vec<String>> {
    with_session(config, |ftp| {
        let entries = ftp
            .nlst(Some(remote_dir))
            .with_context(|| format!("Failed to list {}", remote_dir))?;

        // Some servers answer with full paths
        Ok(entries
            .iter()
            .filter_map(|entry| entry.trim_end().rsplit('/').next())
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(str::to_string)
            .collect())
    })
}

fn list_local_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryEntityStore;

    #[test]
    fn test_parse_supplier_filename() {
        let file = parse_supplier_filename("pricat_0000001872_Lego Spielwaren GmbH_0.csv").unwrap();
        assert_eq!(file.number, "1872");
        assert_eq!(file.name, "Lego Spielwaren GmbH");
        assert_eq!(file.version, "0");
    }

    #[test]
    fn test_parse_supplier_filename_with_underscores_in_name() {
        let file = parse_supplier_filename("/in/pricat_42_Spiel_und_Freizeit_v3.csv").unwrap();
        assert_eq!(file.number, "42");
        assert_eq!(file.name, "Spiel_und_Freizeit");
        assert_eq!(file.version, "v3");
        assert_eq!(file.file_name, "pricat_42_Spiel_und_Freizeit_v3.csv");
    }

    #[test]
    fn test_parse_supplier_filename_rejects_others() {
        assert!(parse_supplier_filename("pricat_abc_Name_1.csv").is_none());
        assert!(parse_supplier_filename("pricat_12_Name.csv").is_none());
        assert!(parse_supplier_filename("readme.txt").is_none());
    }

    #[test]
    fn test_remote_path() {
        let config = FtpEndpointConfig {
            base_path: "/elena/".to_string(),
            ..FtpEndpointConfig::default()
        };
        assert_eq!(config.remote_path("7_Lego"), "/elena/7_Lego");
        assert_eq!(config.remote_path("/abs/file.csv"), "/abs/file.csv");
        assert_eq!(config.remote_path(""), "/elena");
    }

    #[tokio::test]
    async fn test_apply_supplier_file() {
        let store = MemoryEntityStore::new();
        let mut outcome = SyncOutcome::default();
        let file = parse_supplier_filename("pricat_1872_Lego Spielwaren GmbH_0.csv").unwrap();

        apply_supplier_file(&file, &store, &mut outcome).await.unwrap();
        apply_supplier_file(&file, &store, &mut outcome).await.unwrap();

        let newer = parse_supplier_filename("pricat_1872_Lego Spielwaren GmbH_1.csv").unwrap();
        apply_supplier_file(&newer, &store, &mut outcome).await.unwrap();

        assert_eq!((outcome.created, outcome.unchanged, outcome.updated), (1, 1, 1));
        let suppliers = store.list_suppliers().await.unwrap();
        assert_eq!(suppliers.len(), 1);
        assert!(!suppliers[0].active);
        assert_eq!(
            suppliers[0].source_filename.as_deref(),
            Some("pricat_1872_Lego Spielwaren GmbH_1.csv")
        );
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_plan_sync_reports_unparseable_names() {
        let matcher = SupplierFileMatcher::new().unwrap();
        let plan = plan_sync(
            &matcher,
            &names(&["readme.txt", "images", "pricat_1_A_0.csv", "pricat_0002_B_v3.csv"]),
        );

        assert_eq!(plan.errors, vec!["readme.txt: not a supplier feed file name".to_string()]);
        assert_eq!(plan.files_seen, 2);
        assert_eq!(plan.latest.keys().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_plan_sync_keeps_numerically_latest_version() {
        let matcher = SupplierFileMatcher::new().unwrap();
        let plan = plan_sync(
            &matcher,
            &names(&["pricat_1_A_9.csv", "pricat_1_A_10.csv", "pricat_1_A_2.csv"]),
        );

        assert_eq!(plan.files_seen, 3);
        assert!(plan.errors.is_empty());
        assert_eq!(plan.latest["1"].file_name, "pricat_1_A_10.csv");
    }

    #[test]
    fn test_version_ordering() {
        let file = |name: &str| parse_supplier_filename(name).unwrap();

        assert!(file("pricat_1_A_10.csv").is_newer_than(&file("pricat_1_A_9.csv")));
        assert!(file("pricat_1_A_v12.csv").is_newer_than(&file("pricat_1_A_v3.csv")));
        assert!(!file("pricat_1_A_2.csv").is_newer_than(&file("pricat_1_A_2.csv")));
        assert!(file("pricat_1_A_b.csv").is_newer_than(&file("pricat_1_A_a.csv")));
    }

    #[test]
    fn test_upload_each_continues_past_failures() {
        let images = vec![
            PathBuf::from("/pkg/a.jpg"),
            PathBuf::from("/pkg/broken.jpg"),
            PathBuf::from("/pkg/c.jpg"),
        ];
        let mut stats = UploadStats::default();
        let mut attempted = Vec::new();

        upload_each(&images, &mut stats, |path| {
            attempted.push(path.to_path_buf());
            if path.ends_with("broken.jpg") {
                Err(anyhow!("553 Could not create file"))
            } else {
                Ok(100)
            }
        });

        assert_eq!(attempted, images);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.bytes, 200);
        assert_eq!(stats.errors, vec!["553 Could not create file".to_string()]);
    }

    #[tokio::test]
    async fn test_stalled_server_hits_transfer_deadline() {
        // Accepts the connection but never sends a greeting
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(3));
            drop(socket);
        });

        let client = TransferClient::new(FtpEndpointConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_secs: 30,
            transfer_timeout_secs: 1,
            ..FtpEndpointConfig::default()
        });

        let started = std::time::Instant::now();
        let err = client.list_files("").await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(err.to_string().contains("timed out after 1s"), "{}", err);
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_download_failure_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = TransferClient::new(FtpEndpointConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_secs: 2,
            ..FtpEndpointConfig::default()
        });

        let outcome = client.download_source("feed.csv", dir.path()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.local_path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
