//! Run coordinator: drives extraction over every enumerated test case

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::artifact::{sanitize, ArtifactWriter, Provenance};
use crate::browser::{pause, Page};
use crate::config::{HarvestConfig, TimingConfig};
use crate::enumerate::{Enumeration, Enumerator, TestCaseRef};
use crate::error::{HarvestError, HarvestResult};
use crate::extract::{ContentExtractor, ContentSource};
use crate::session::Session;

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

/// Run-level counters. `succeeded + failed == attempted` at all times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub output_location: String,
}

impl RunSummary {
    fn new(output_location: &Path) -> Self {
        Self {
            output_location: output_location.display().to_string(),
            ..Default::default()
        }
    }

    fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    fn record_failure(&mut self) {
        self.attempted += 1;
        self.failed += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Saved,
    InsufficientContent,
    Error,
}

/// Outcome of one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub status: ItemStatus,
    pub file_name: Option<String>,
    pub source: Option<ContentSource>,
    pub content_sha256: Option<String>,
    pub reason: Option<String>,
    pub duration_ms: u64,
}

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Entries read from the source, after dedupe and before filtering
    pub discovered: usize,
    pub filter_relaxed: bool,
    pub items: Vec<ItemRecord>,
}

impl RunReport {
    /// Write the report as pretty JSON
    pub fn write(&self, path: &Path) -> HarvestResult<PathBuf> {
        let persistence = |source| HarvestError::Persistence {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(persistence)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(persistence)?;

        info!("Report written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}

/// Iterates the enumeration, one test case at a time
///
/// Owns the counters exclusively: the extractor and the writer never see them.
pub struct RunCoordinator {
    extractor: ContentExtractor,
    writer: ArtifactWriter,
    timing: TimingConfig,
    screenshot_on_error: bool,
    state: RunState,
    summary: RunSummary,
}

impl RunCoordinator {
    pub fn new(extractor: ContentExtractor, writer: ArtifactWriter, timing: TimingConfig) -> Self {
        let summary = RunSummary::new(writer.output_dir());
        Self {
            extractor,
            writer,
            timing,
            screenshot_on_error: false,
            state: RunState::Idle,
            summary,
        }
    }

    pub fn with_error_screenshots(mut self, enabled: bool) -> Self {
        self.screenshot_on_error = enabled;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Process every case; a failing item never stops the run
    pub async fn run<P: Page>(
        &mut self,
        page: &P,
        cases: Enumeration,
    ) -> HarvestResult<RunReport> {
        if self.state != RunState::Idle {
            return Err(HarvestError::InvalidState(format!(
                "coordinator already {:?}",
                self.state
            )));
        }
        self.state = RunState::Running;

        let started_at = Utc::now();
        let discovered = cases.discovered;
        let filter_relaxed = cases.filter_relaxed;
        let total = cases.len();
        let mut items = Vec::with_capacity(total);

        info!(
            "Extracting {} test case(s) into {}",
            total, self.summary.output_location
        );

        for (i, case) in cases.into_iter().enumerate() {
            info!("[{}/{}] {}", i + 1, total, case.id);
            let record = self.process(page, &case).await;
            match record.status {
                ItemStatus::Saved => self.summary.record_success(),
                ItemStatus::InsufficientContent | ItemStatus::Error => {
                    self.summary.record_failure()
                }
            }
            items.push(record);

            if i + 1 < total {
                pause(self.timing.pace()).await;
            }
        }

        self.state = RunState::Completed;
        info!(
            "Run complete: {} saved, {} failed of {}",
            self.summary.succeeded, self.summary.failed, self.summary.attempted
        );

        Ok(RunReport {
            summary: self.summary.clone(),
            started_at,
            finished_at: Utc::now(),
            discovered,
            filter_relaxed,
            items,
        })
    }

    async fn process<P: Page>(&mut self, page: &P, case: &TestCaseRef) -> ItemRecord {
        let start = Instant::now();
        let mut record = ItemRecord {
            id: case.id.clone(),
            status: ItemStatus::Error,
            file_name: None,
            source: None,
            content_sha256: None,
            reason: None,
            duration_ms: 0,
        };

        match self.extractor.extract(page, case).await {
            Ok(result) if result.succeeded => {
                record.source = Some(result.source);
                let provenance = Provenance::Extracted {
                    url: case.navigation_target.clone(),
                };
                match self
                    .writer
                    .write(&case.id, Some(&result.title), &result.content, &provenance)
                {
                    Ok(written) => {
                        info!("  ✅ Saved: {}", written.file_name);
                        record.status = ItemStatus::Saved;
                        record.file_name = Some(written.file_name);
                        record.content_sha256 = Some(written.content_sha256);
                    }
                    Err(e) => {
                        error!("  ❌ {}: {}", case.id, e);
                        record.reason = Some(e.to_string());
                    }
                }
            }
            Ok(result) => {
                let reason = result
                    .failure_reason
                    .unwrap_or_else(|| "insufficient content".to_string());
                warn!("  ⚠️  {}: {}", case.id, reason);
                record.status = ItemStatus::InsufficientContent;
                record.source = Some(result.source);
                record.reason = Some(reason);
            }
            Err(e) => {
                error!("  ❌ Error on {}: {}", case.id, e);
                record.reason = Some(e.to_string());
                if self.screenshot_on_error {
                    self.capture(page, &format!("error-{}.png", sanitize(&case.id)))
                        .await;
                }
            }
        }

        record.duration_ms = start.elapsed().as_millis() as u64;
        record
    }

    /// Best-effort screenshot into the output directory
    async fn capture<P: Page>(&self, page: &P, file_name: &str) {
        capture_screenshot(page, &self.writer.output_dir().join(file_name)).await;
    }
}

async fn capture_screenshot<P: Page>(page: &P, path: &Path) {
    match page.screenshot(path).await {
        Ok(()) => info!("Screenshot: {}", path.display()),
        Err(e) => warn!("Screenshot {} failed: {}", path.display(), e),
    }
}

/// Full pipeline on an acquired session: pick the page, enumerate, extract
/// everything, write the report.
pub async fn harvest<S: Session>(
    session: &S,
    config: &HarvestConfig,
) -> HarvestResult<RunReport> {
    config.validate()?;

    let page = session.active_page(config.page_hint.as_deref()).await?;

    let mut enumerator = Enumerator::new(
        config.extraction.clone(),
        config.pagination.clone(),
        config.timing.clone(),
    );
    if let Some(filter) = config.case_filter() {
        enumerator = enumerator.with_filter(filter);
    }

    let cases = match enumerator.enumerate(&page, &config.case_source()).await {
        Ok(cases) => cases,
        Err(e @ HarvestError::EnumerationEmpty { .. }) => {
            if config.screenshot_on_error && std::fs::create_dir_all(&config.output_dir).is_ok() {
                let path = config.output_dir.join("enumeration-empty.png");
                capture_screenshot(&page, &path).await;
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let writer = ArtifactWriter::new(&config.output_dir, config.extraction.max_file_name_len)?;
    let extractor = ContentExtractor::new(config.extraction.clone(), config.timing.clone());
    let mut coordinator = RunCoordinator::new(extractor, writer, config.timing.clone())
        .with_error_screenshots(config.screenshot_on_error);

    // Report failures are logged, never fatal
    let report = coordinator.run(&page, cases).await?;
    if !config.write_report {
        debug!("Report disabled");
    } else if let Err(e) = report.write(&config.report_path()) {
        error!("Run report not written: {}", e);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counters_stay_consistent() {
        let mut summary = RunSummary::new(Path::new("out"));
        summary.record_success();
        summary.record_failure();
        summary.record_success();
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded + summary.failed, summary.attempted);
        assert_eq!(summary.output_location, "out");
    }

    #[test]
    fn test_report_roundtrips_through_json() {
        let report = RunReport {
            summary: RunSummary {
                attempted: 1,
                succeeded: 1,
                failed: 0,
                output_location: "out".to_string(),
            },
            started_at: Utc::now(),
            finished_at: Utc::now(),
            discovered: 1,
            filter_relaxed: false,
            items: vec![ItemRecord {
                id: "T-1".to_string(),
                status: ItemStatus::Saved,
                file_name: Some("T-1.txt".to_string()),
                source: Some(ContentSource::Table),
                content_sha256: Some("ab".to_string()),
                reason: None,
                duration_ms: 12,
            }],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = report.write(&dir.path().join("harvest-report.json")).unwrap();
        let json = std::fs::read_to_string(path).unwrap();
        assert!(json.contains("\"status\": \"saved\""));
        assert!(json.contains("\"source\": \"table\""));

        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.summary, report.summary);
    }

    #[test]
    fn test_report_write_failure_is_a_persistence_error() {
        let report = RunReport {
            summary: RunSummary::new(Path::new("out")),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            discovered: 0,
            filter_relaxed: false,
            items: Vec::new(),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest-report.json");
        std::fs::create_dir(&path).unwrap();

        match report.write(&path) {
            Err(HarvestError::Persistence { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected a persistence error, got {:?}", other),
        }
    }
}
