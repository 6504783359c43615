//! Run state: steps, step results and the run record

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Pipeline states in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    DownloadFeed,
    ParseFeed,
    ExtractEntities,
    DownloadImages,
    ExportTargetCsv,
    ExportReport,
    UploadPackage,
    TriggerImport,
    Completed,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 9] = [
        PipelineStep::DownloadFeed,
        PipelineStep::ParseFeed,
        PipelineStep::ExtractEntities,
        PipelineStep::DownloadImages,
        PipelineStep::ExportTargetCsv,
        PipelineStep::ExportReport,
        PipelineStep::UploadPackage,
        PipelineStep::TriggerImport,
        PipelineStep::Completed,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::DownloadFeed => "download_feed",
            PipelineStep::ParseFeed => "parse_feed",
            PipelineStep::ExtractEntities => "extract_entities",
            PipelineStep::DownloadImages => "download_images",
            PipelineStep::ExportTargetCsv => "export_target_csv",
            PipelineStep::ExportReport => "export_report",
            PipelineStep::UploadPackage => "upload_package",
            PipelineStep::TriggerImport => "trigger_import",
            PipelineStep::Completed => "completed",
        }
    }

    /// A failure of this step ends the run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineStep::DownloadFeed | PipelineStep::ParseFeed | PipelineStep::ExportTargetCsv
        )
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const SKIPPED: &str = "skipped";

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: PipelineStep,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn is_skipped(&self) -> bool {
        self.success && self.message == SKIPPED
    }
}

/// Record of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub current_step: PipelineStep,
    pub steps: Vec<StepResult>,
    pub errors: Vec<String>,

    pub source_file: Option<PathBuf>,
    pub target_csv: Option<PathBuf>,
    pub report_file: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,

    pub article_count: usize,
    pub manufacturer_count: usize,
    pub brand_count: usize,
    pub images_downloaded: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Reached [`PipelineStep::Completed`]
    pub success: bool,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            current_step: PipelineStep::DownloadFeed,
            steps: Vec::new(),
            errors: Vec::new(),
            source_file: None,
            target_csv: None,
            report_file: None,
            images_dir: None,
            article_count: 0,
            manufacturer_count: 0,
            brand_count: 0,
            images_downloaded: 0,
            started_at: Utc::now(),
            finished_at: None,
            success: false,
        }
    }

    /// Fraction of the state machine passed, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        self.current_step.index() as f64 / (PipelineStep::ALL.len() - 1) as f64
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn step(&self, step: PipelineStep) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order() {
        for (i, step) in PipelineStep::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
        }
        assert_eq!(PipelineStep::TriggerImport.as_str(), "trigger_import");
    }

    #[test]
    fn test_fatal_steps() {
        let fatal: Vec<_> = PipelineStep::ALL.iter().filter(|s| s.is_fatal()).collect();
        assert_eq!(
            fatal,
            vec![
                &PipelineStep::DownloadFeed,
                &PipelineStep::ParseFeed,
                &PipelineStep::ExportTargetCsv
            ]
        );
    }

    #[test]
    fn test_progress() {
        let mut run = PipelineRun::new();
        assert_eq!(run.progress(), 0.0);
        run.current_step = PipelineStep::Completed;
        assert_eq!(run.progress(), 1.0);
        run.current_step = PipelineStep::ExtractEntities;
        assert_eq!(run.progress(), 0.25);
    }
}
