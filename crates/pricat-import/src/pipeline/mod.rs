//! Conversion pipeline
//!
//! Drives one supplier feed from the source FTP to a triggered Elena import:
//!
//! ```text
//! DownloadFeed → ParseFeed → ExtractEntities → DownloadImages →
//! ExportTargetCsv → ExportReport → UploadPackage → TriggerImport → Completed
//! ```
//!
//! Services report outcomes; this module alone decides whether a failure ends
//! the run. Failures of [`PipelineStep::is_fatal`] steps stop immediately and
//! no later step is recorded. Everything else is collected in
//! [`PipelineRun::errors`] and the run continues.

pub mod steps;

use chrono::Utc;
use pricat_common::types::{file_timestamp, sanitize_segment};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{Config, ImporterConfig, PathsConfig, PipelineToggles};
use crate::error::Result;
use crate::export::{ReportExporter, TargetCsvExporter};
use crate::ftp::TransferClient;
use crate::images::ImageFetcher;
use crate::models::CatalogueBatch;
use crate::notifier::ImportNotifier;
use crate::parser::CatalogueParser;
use crate::storage::{EntityStore, EntityUpserter, ExtractOutcome};

pub use steps::{PipelineRun, PipelineStep, StepResult, SKIPPED};

/// Where the feed comes from
#[derive(Debug, Clone)]
pub enum FeedSource {
    /// Path on the source FTP server, relative to its base path
    Remote(String),
    /// Already on disk
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source: FeedSource,
    pub steps: PipelineToggles,
}

impl PipelineOptions {
    pub fn new(source: FeedSource) -> Self {
        Self {
            source,
            steps: PipelineToggles::default(),
        }
    }

    pub fn with_steps(mut self, steps: PipelineToggles) -> Self {
        self.steps = steps;
        self
    }
}

/// Everything a run needs, built once
pub struct PipelineServices {
    pub parser: CatalogueParser,
    pub upserter: EntityUpserter,
    pub store: Arc<dyn EntityStore>,
    pub source: TransferClient,
    pub target: TransferClient,
    pub images: ImageFetcher,
    pub target_csv: TargetCsvExporter,
    pub report: ReportExporter,
    pub notifier: ImportNotifier,
    pub paths: PathsConfig,
    pub importer: ImporterConfig,
}

impl PipelineServices {
    pub fn from_config(config: &Config, store: Arc<dyn EntityStore>) -> Result<Self> {
        Ok(Self {
            parser: CatalogueParser::new(),
            upserter: EntityUpserter::new(),
            store,
            source: TransferClient::new(config.source_ftp.clone()),
            target: TransferClient::new(config.target_ftp.clone()),
            images: ImageFetcher::new(config.images.clone())?,
            target_csv: TargetCsvExporter::new(),
            report: ReportExporter::new(),
            notifier: ImportNotifier::new(Duration::from_secs(config.importer.timeout_secs))?,
            paths: config.paths.clone(),
            importer: config.importer.clone(),
        })
    }
}

pub struct Pipeline {
    services: PipelineServices,
}

/// What the export steps produce and the upload/trigger steps consume
struct Package {
    folder: String,
    csv_path: PathBuf,
    images_dir: PathBuf,
}

impl Pipeline {
    pub fn new(services: PipelineServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    /// Execute one run to completion or to its first fatal failure
    pub async fn run(&self, options: &PipelineOptions) -> PipelineRun {
        let mut run = PipelineRun::new();
        info!(source = ?options.source, "Pipeline started");

        let completed = self.execute(options, &mut run).await;

        run.success = completed;
        run.finished_at = Some(Utc::now());
        if completed {
            info!(
                articles = run.article_count,
                manufacturers = run.manufacturer_count,
                brands = run.brand_count,
                images = run.images_downloaded,
                errors = run.errors.len(),
                "Pipeline completed"
            );
        } else {
            error!(step = %run.current_step, errors = run.errors.len(), "Pipeline failed");
        }
        run
    }

    /// Returns whether the run reached [`PipelineStep::Completed`]
    async fn execute(&self, options: &PipelineOptions, run: &mut PipelineRun) -> bool {
        let svc = &self.services;

        // DownloadFeed
        run.current_step = PipelineStep::DownloadFeed;
        let started = Instant::now();
        let source_file = match &options.source {
            FeedSource::Local(path) => {
                skip(run, PipelineStep::DownloadFeed);
                path.clone()
            },
            FeedSource::Remote(remote) => {
                let outcome = svc.source.download_source(remote, &svc.paths.imports_dir).await;
                let local = outcome.local_path.clone();
                let details = json!({ "bytes": outcome.bytes, "remote": remote });
                record(run, PipelineStep::DownloadFeed, started, outcome.success, outcome.message, Some(details));
                run.errors.extend(outcome.errors);
                match local {
                    Some(path) if outcome.success => path,
                    _ => return false,
                }
            },
        };
        run.source_file = Some(source_file.clone());

        // ParseFeed
        run.current_step = PipelineStep::ParseFeed;
        let started = Instant::now();
        let batch = svc.parser.parse(&source_file);
        run.article_count = batch.article_count();
        run.manufacturer_count = batch.manufacturers.len();
        run.brand_count = batch.brands.len();
        run.errors.extend(batch.errors.iter().cloned());

        let parsed = batch.article_count() > 0;
        let message = if parsed {
            format!("Parsed {} articles from {} rows", batch.article_count(), batch.rows_seen)
        } else {
            "No articles in feed".to_string()
        };
        let details = json!({
            "rows_seen": batch.rows_seen,
            "rows_skipped": batch.rows_skipped,
            "articles": batch.article_count(),
            "encoding": batch.encoding.as_str(),
        });
        record(run, PipelineStep::ParseFeed, started, parsed, message, Some(details));
        if !parsed {
            return false;
        }

        // ExtractEntities
        run.current_step = PipelineStep::ExtractEntities;
        let started = Instant::now();
        let extract = svc.upserter.extract(&batch, svc.store.as_ref()).await;
        let message = format!(
            "{} created, {} updated, {} brands",
            extract.created,
            extract.updated,
            extract.brands.len()
        );
        let details = json!({
            "supplier_id": extract.supplier.as_ref().map(|s| s.id),
            "manufacturers": extract.manufacturers.len(),
            "brands": extract.brands.len(),
        });
        record(run, PipelineStep::ExtractEntities, started, extract.success, message, Some(details));
        run.errors.extend(extract.errors.iter().cloned());

        let folder = package_folder(&batch, &extract);
        let stamp = file_timestamp(Utc::now());
        let package = Package {
            csv_path: svc
                .paths
                .exports_dir
                .join(&folder)
                .join(format!("elena_{}.csv", stamp)),
            images_dir: svc.paths.images_dir.join(&folder),
            folder,
        };

        // DownloadImages
        run.current_step = PipelineStep::DownloadImages;
        let started = Instant::now();
        if !options.steps.download_images {
            skip(run, PipelineStep::DownloadImages);
        } else {
            let outcome = svc.images.fetch_all(&batch.image_urls, &package.images_dir).await;
            run.images_downloaded = outcome.success;
            run.images_dir = Some(package.images_dir.clone());
            let message = format!(
                "{} downloaded, {} skipped, {} failed of {}",
                outcome.success, outcome.skipped, outcome.failed, outcome.total
            );
            let details = json!({ "failed_urls": outcome.failed_urls });
            record(run, PipelineStep::DownloadImages, started, outcome.failed == 0, message, Some(details));
            run.errors.extend(outcome.errors);
        }

        // ExportTargetCsv
        run.current_step = PipelineStep::ExportTargetCsv;
        let started = Instant::now();
        let outcome = svc.target_csv.export(&batch, &extract.brand_codes, &package.csv_path);
        let message = if outcome.success {
            format!("{} rows written", outcome.rows_exported)
        } else {
            "Target CSV not written".to_string()
        };
        record(
            run,
            PipelineStep::ExportTargetCsv,
            started,
            outcome.success,
            message,
            Some(json!({ "rows": outcome.rows_exported, "skipped": outcome.errors.len() })),
        );
        run.errors.extend(outcome.errors);
        if !outcome.success {
            return false;
        }
        run.target_csv = outcome.path;

        // ExportReport
        run.current_step = PipelineStep::ExportReport;
        let started = Instant::now();
        if !options.steps.export_report {
            skip(run, PipelineStep::ExportReport);
        } else {
            let path = svc
                .paths
                .exports_dir
                .join(&package.folder)
                .join(format!("report_{}.xlsx", stamp));
            let outcome = svc.report.export(
                extract.supplier.as_ref(),
                &extract.manufacturers,
                &extract.brands,
                &path,
                batch.article_count(),
            );
            let message = format!("{} sheets", outcome.sheets_created);
            record(run, PipelineStep::ExportReport, started, outcome.success, message, None);
            run.errors.extend(outcome.errors);
            run.report_file = outcome.path;
        }

        // UploadPackage
        run.current_step = PipelineStep::UploadPackage;
        let started = Instant::now();
        let mut uploaded = false;
        if !options.steps.upload_package {
            skip(run, PipelineStep::UploadPackage);
        } else {
            let images_dir = if options.steps.download_images {
                Some(package.images_dir.as_path())
            } else {
                None
            };
            let outcome = svc
                .target
                .upload_package(&package.csv_path, images_dir, &package.folder)
                .await;
            uploaded = outcome.success;
            let details = json!({ "files": outcome.files, "bytes": outcome.bytes });
            record(run, PipelineStep::UploadPackage, started, outcome.success, outcome.message, Some(details));
            run.errors.extend(outcome.errors);
        }

        // TriggerImport
        run.current_step = PipelineStep::TriggerImport;
        let started = Instant::now();
        if !options.steps.trigger_import {
            skip(run, PipelineStep::TriggerImport);
        } else if options.steps.upload_package && !uploaded {
            let message = "Not triggered: package upload failed".to_string();
            run.errors.push(message.clone());
            record(run, PipelineStep::TriggerImport, started, false, message, None);
        } else {
            let import_file = file_name(&package.csv_path);
            let outcome = svc
                .notifier
                .trigger(
                    &svc.importer.base_url,
                    &package.folder,
                    &import_file,
                    svc.importer.debug_level,
                )
                .await;
            let details = json!({ "status_code": outcome.status_code, "url": outcome.url });
            if !outcome.success {
                run.errors.push(outcome.message.clone());
            }
            record(run, PipelineStep::TriggerImport, started, outcome.success, outcome.message, Some(details));
        }

        run.current_step = PipelineStep::Completed;
        if let Some(supplier) = &extract.supplier {
            if let Err(e) = svc.store.mark_supplier_converted(supplier.id, Utc::now()).await {
                warn!(supplier = supplier.id, error = %e, "Cannot record conversion time");
                run.errors.push(e.to_string());
            }
        }

        true
    }
}

/// `{supplier-id}_{sanitized name}` for the per-supplier output folders
fn package_folder(batch: &CatalogueBatch, extract: &ExtractOutcome) -> String {
    match &extract.supplier {
        Some(supplier) => format!("{}_{}", supplier.id, sanitize_segment(&supplier.name)),
        None => {
            let name = batch
                .supplier
                .as_ref()
                .map(|s| sanitize_segment(&s.name))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            format!("0_{}", name)
        },
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn record(
    run: &mut PipelineRun,
    step: PipelineStep,
    started: Instant,
    success: bool,
    message: String,
    details: Option<serde_json::Value>,
) {
    if success {
        info!(step = %step, message = %message, "Step finished");
    } else if step.is_fatal() {
        error!(step = %step, message = %message, "Step failed");
    } else {
        warn!(step = %step, message = %message, "Step failed, continuing");
    }

    run.steps.push(StepResult {
        step,
        success,
        message,
        details,
        duration_ms: started.elapsed().as_millis() as u64,
    });
}

fn skip(run: &mut PipelineRun, step: PipelineStep) {
    info!(step = %step, "Step skipped");
    run.steps.push(StepResult {
        step,
        success: true,
        message: SKIPPED.to_string(),
        details: None,
        duration_ms: 0,
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::PartyIdentity;

    #[test]
    fn test_package_folder_without_store_record() {
        let batch = CatalogueBatch {
            supplier: Some(PartyIdentity {
                name: "Lego Spielwaren GmbH".to_string(),
                ..PartyIdentity::default()
            }),
            ..CatalogueBatch::default()
        };
        assert_eq!(package_folder(&batch, &ExtractOutcome::default()), "0_Lego_Spielwaren_GmbH");
        assert_eq!(
            package_folder(&CatalogueBatch::default(), &ExtractOutcome::default()),
            "0_unknown"
        );
    }
}
