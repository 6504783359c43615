//! Configuration management
//!
//! Values come from a [`ConfigProvider`] (the process environment, after
//! `.env` has been loaded) and fall back to the `DEFAULT_*` constants.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::ftp::{
    FtpEndpointConfig, DEFAULT_FTP_PORT, DEFAULT_FTP_TIMEOUT_SECS, DEFAULT_FTP_TRANSFER_TIMEOUT_SECS,
};
use crate::images::{ImageFetchConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT_SECS};
use crate::notifier::{DEFAULT_NOTIFY_TIMEOUT_SECS, MAX_DEBUG_LEVEL};

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_IMPORTS_DIR: &str = "data/imports";
pub const DEFAULT_EXPORTS_DIR: &str = "data/exports";
pub const DEFAULT_IMAGES_DIR: &str = "data/images";

pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/pricat";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_IMPORTER_URL: &str = "http://localhost/elena";
pub const DEFAULT_IMPORTER_DEBUG_LEVEL: u8 = 0;

/// Key/value source for configuration
pub trait ConfigProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigProvider;

impl ConfigProvider for EnvConfigProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed set of values, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MapConfigProvider {
    values: HashMap<String, String>,
}

impl MapConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigProvider for MapConfigProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub paths: PathsConfig,
    pub database: DatabaseConfig,
    pub source_ftp: FtpEndpointConfig,
    pub target_ftp: FtpEndpointConfig,
    pub images: ImageFetchConfig,
    pub importer: ImporterConfig,
    pub pipeline: PipelineToggles,
}

/// Local filesystem roots
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub imports_dir: PathBuf,
    pub exports_dir: PathBuf,
    pub images_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Elena importer endpoint
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub debug_level: u8,
}

/// Optional pipeline steps
#[derive(Debug, Clone)]
pub struct PipelineToggles {
    pub download_images: bool,
    pub export_report: bool,
    pub upload_package: bool,
    pub trigger_import: bool,
}

impl Default for PipelineToggles {
    fn default() -> Self {
        Self {
            download_images: true,
            export_report: true,
            upload_package: true,
            trigger_import: true,
        }
    }
}

impl Config {
    /// Load `.env`, then the environment, then validate
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_provider(&EnvConfigProvider)
    }

    pub fn from_provider(provider: &dyn ConfigProvider) -> anyhow::Result<Self> {
        let config = Config {
            paths: PathsConfig {
                imports_dir: string(provider, "PRICAT_IMPORTS_DIR", DEFAULT_IMPORTS_DIR).into(),
                exports_dir: string(provider, "PRICAT_EXPORTS_DIR", DEFAULT_EXPORTS_DIR).into(),
                images_dir: string(provider, "PRICAT_IMAGES_DIR", DEFAULT_IMAGES_DIR).into(),
            },
            database: DatabaseConfig {
                url: string(provider, "DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: parsed(
                    provider,
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                connect_timeout_secs: parsed(
                    provider,
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
            },
            source_ftp: ftp_endpoint(provider, "PRICAT_SOURCE_FTP"),
            target_ftp: ftp_endpoint(provider, "PRICAT_TARGET_FTP"),
            images: ImageFetchConfig {
                max_concurrent: parsed(provider, "PRICAT_IMAGES_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT),
                timeout: Duration::from_secs(parsed(
                    provider,
                    "PRICAT_IMAGES_TIMEOUT",
                    DEFAULT_TIMEOUT_SECS,
                )),
                skip_existing: flag(provider, "PRICAT_IMAGES_SKIP_EXISTING", true),
            },
            importer: ImporterConfig {
                base_url: string(provider, "PRICAT_IMPORTER_URL", DEFAULT_IMPORTER_URL),
                timeout_secs: parsed(provider, "PRICAT_IMPORTER_TIMEOUT", DEFAULT_NOTIFY_TIMEOUT_SECS),
                debug_level: parsed(
                    provider,
                    "PRICAT_IMPORTER_DEBUG_LEVEL",
                    DEFAULT_IMPORTER_DEBUG_LEVEL,
                ),
            },
            pipeline: PipelineToggles {
                download_images: flag(provider, "PRICAT_DOWNLOAD_IMAGES", true),
                export_report: flag(provider, "PRICAT_EXPORT_REPORT", true),
                upload_package: flag(provider, "PRICAT_UPLOAD_PACKAGE", true),
                trigger_import: flag(provider, "PRICAT_TRIGGER_IMPORT", true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        for (name, endpoint) in [("source", &self.source_ftp), ("target", &self.target_ftp)] {
            if endpoint.port == 0 {
                anyhow::bail!("The {} FTP port must be greater than 0", name);
            }
            if endpoint.timeout_secs == 0 || endpoint.transfer_timeout_secs == 0 {
                anyhow::bail!("The {} FTP timeouts must be greater than 0", name);
            }
        }

        if self.pipeline.upload_package && self.target_ftp.host.trim().is_empty() {
            anyhow::bail!("PRICAT_TARGET_FTP_HOST is required when package upload is enabled");
        }

        if self.images.max_concurrent == 0 {
            anyhow::bail!("Image download needs at least one worker");
        }

        if self.importer.debug_level > MAX_DEBUG_LEVEL {
            anyhow::bail!(
                "Importer debug level {} out of range 0-{}",
                self.importer.debug_level,
                MAX_DEBUG_LEVEL
            );
        }

        if self.pipeline.trigger_import {
            url::Url::parse(&self.importer.base_url).map_err(|e| {
                anyhow::anyhow!("Invalid importer URL '{}': {}", self.importer.base_url, e)
            })?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                imports_dir: DEFAULT_IMPORTS_DIR.into(),
                exports_dir: DEFAULT_EXPORTS_DIR.into(),
                images_dir: DEFAULT_IMAGES_DIR.into(),
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            source_ftp: FtpEndpointConfig::default(),
            target_ftp: FtpEndpointConfig::default(),
            images: ImageFetchConfig::default(),
            importer: ImporterConfig {
                base_url: DEFAULT_IMPORTER_URL.to_string(),
                timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
                debug_level: DEFAULT_IMPORTER_DEBUG_LEVEL,
            },
            pipeline: PipelineToggles::default(),
        }
    }
}

fn ftp_endpoint(provider: &dyn ConfigProvider, prefix: &str) -> FtpEndpointConfig {
    let key = |suffix: &str| format!("{}_{}", prefix, suffix);
    let defaults = FtpEndpointConfig::default();

    FtpEndpointConfig {
        host: string(provider, &key("HOST"), &defaults.host),
        port: parsed(provider, &key("PORT"), DEFAULT_FTP_PORT),
        username: string(provider, &key("USER"), &defaults.username),
        password: string(provider, &key("PASSWORD"), &defaults.password),
        base_path: string(provider, &key("BASE_PATH"), &defaults.base_path),
        passive: flag(provider, &key("PASSIVE"), defaults.passive),
        timeout_secs: parsed(provider, &key("TIMEOUT"), DEFAULT_FTP_TIMEOUT_SECS),
        transfer_timeout_secs: parsed(
            provider,
            &key("TRANSFER_TIMEOUT"),
            DEFAULT_FTP_TRANSFER_TIMEOUT_SECS,
        ),
    }
}

fn string(provider: &dyn ConfigProvider, key: &str, default: &str) -> String {
    provider.get(key).unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(provider: &dyn ConfigProvider, key: &str, default: T) -> T {
    match provider.get(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparsable setting");
                default
            },
        },
        None => default,
    }
}

fn flag(provider: &dyn ConfigProvider, key: &str, default: bool) -> bool {
    match provider.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            warn!(key, value = %v, "Ignoring unparsable flag");
            default
        },
        None => default,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_provider(&MapConfigProvider::new()).unwrap();
        assert_eq!(config.images.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.source_ftp.port, 21);
        assert!(config.pipeline.trigger_import);
        assert_eq!(config.paths.exports_dir, PathBuf::from(DEFAULT_EXPORTS_DIR));
    }

    #[test]
    fn test_endpoint_sections() {
        let provider = MapConfigProvider::new()
            .with("PRICAT_SOURCE_FTP_HOST", "ftp.supplier.example")
            .with("PRICAT_SOURCE_FTP_PORT", "2121")
            .with("PRICAT_SOURCE_FTP_PASSIVE", "no")
            .with("PRICAT_TARGET_FTP_HOST", "ftp.erp.example")
            .with("PRICAT_TARGET_FTP_BASE_PATH", "/elena");

        let config = Config::from_provider(&provider).unwrap();
        assert_eq!(config.source_ftp.host, "ftp.supplier.example");
        assert_eq!(config.source_ftp.port, 2121);
        assert!(!config.source_ftp.passive);
        assert_eq!(config.target_ftp.host, "ftp.erp.example");
        assert_eq!(config.target_ftp.base_path, "/elena");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_workers = MapConfigProvider::new().with("PRICAT_IMAGES_MAX_CONCURRENT", "0");
        assert!(Config::from_provider(&zero_workers).is_err());

        let no_deadline = MapConfigProvider::new().with("PRICAT_SOURCE_FTP_TRANSFER_TIMEOUT", "0");
        assert!(Config::from_provider(&no_deadline).is_err());

        let debug = MapConfigProvider::new().with("PRICAT_IMPORTER_DEBUG_LEVEL", "4");
        assert!(Config::from_provider(&debug).is_err());

        let no_host = MapConfigProvider::new().with("PRICAT_TARGET_FTP_HOST", " ");
        assert!(Config::from_provider(&no_host).is_err());

        let no_host_no_upload = MapConfigProvider::new()
            .with("PRICAT_TARGET_FTP_HOST", "")
            .with("PRICAT_UPLOAD_PACKAGE", "false");
        assert!(Config::from_provider(&no_host_no_upload).is_ok());
    }

    #[test]
    fn test_unparsable_number_falls_back() {
        let provider = MapConfigProvider::new().with("PRICAT_IMAGES_TIMEOUT", "soon");
        let config = Config::from_provider(&provider).unwrap();
        assert_eq!(config.images.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
