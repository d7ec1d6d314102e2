//! Content extraction for a single test case
//!
//! Extraction is a priority list of [`ContentStrategy`] values. Each one
//! either produces text or nothing; the first whose output reaches
//! `strategy_min_chars` wins and later strategies are never run. "Not
//! found" is never an error here: only transport failures (navigation
//! timeouts, a detached page) propagate.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::browser::{bounded, pause, Element, Locator, Page};
use crate::config::{ExtractionConfig, TimingConfig};
use crate::enumerate::TestCaseRef;
use crate::error::HarvestResult;

/// Separator between two formatted table steps
pub fn step_separator() -> String {
    format!("\n\n{}\n\n", "─".repeat(60))
}

/// One way of pulling the test script text off a detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentStrategy {
    /// Dedicated script container; first visible match
    Container { selectors: String },

    /// Rows of the first visible table, numbered as steps
    Table { table: String, rows: String },

    /// Whole main-content region
    MainRegion { selectors: String },
}

impl ContentStrategy {
    pub fn defaults() -> Vec<Self> {
        vec![
            ContentStrategy::Container {
                selectors: r#"[data-testid*="test-script"], [class*="test-script"], [id*="test-script"], [data-test-id*="test-script"]"#
                    .to_string(),
            },
            ContentStrategy::Table {
                table: "table".to_string(),
                rows: "tr".to_string(),
            },
            ContentStrategy::MainRegion {
                selectors: r#"main, [role="main"], body"#.to_string(),
            },
        ]
    }

    pub fn source(&self) -> ContentSource {
        match self {
            ContentStrategy::Container { .. } => ContentSource::Container,
            ContentStrategy::Table { .. } => ContentSource::Table,
            ContentStrategy::MainRegion { .. } => ContentSource::MainRegion,
        }
    }

    /// Run the strategy against the current page
    pub async fn apply<P: Page>(&self, page: &P) -> HarvestResult<Option<String>> {
        match self {
            ContentStrategy::Container { selectors } => {
                let found = Locator::Css(selectors.clone()).first_visible(page).await?;
                match found {
                    Some(element) => Ok(element.text().await.unwrap_or(None)),
                    None => Ok(None),
                }
            }
            ContentStrategy::Table { table, rows } => {
                let Some(table) = Locator::Css(table.clone()).first_visible(page).await? else {
                    return Ok(None);
                };
                let mut texts = Vec::new();
                for row in table.query_all(rows).await? {
                    // Rows that detach mid-read are dropped.
                    if let Ok(Some(text)) = row.text().await {
                        texts.push(text);
                    }
                }
                debug!("Found {} table rows", texts.len());
                let formatted = format_steps(&texts);
                Ok((!formatted.is_empty()).then_some(formatted))
            }
            ContentStrategy::MainRegion { selectors } => {
                let regions = page.query_all(selectors).await?;
                match regions.first() {
                    Some(region) => Ok(region.text().await.unwrap_or(None)),
                    None => Ok(None),
                }
            }
        }
    }
}

/// Number non-empty rows as steps
pub fn format_steps(rows: &[String]) -> String {
    rows.iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .enumerate()
        .map(|(i, r)| format!("Step {}:\n{}", i + 1, r))
        .collect::<Vec<_>>()
        .join(&step_separator())
}

/// Which strategy produced the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Container,
    Table,
    MainRegion,
    None,
}

/// Outcome of one extraction attempt
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub case: TestCaseRef,
    /// Resolved title; falls back to the display name, then the id
    pub title: String,
    pub content: String,
    pub source: ContentSource,
    pub tab_activated: bool,
    pub succeeded: bool,
    pub failure_reason: Option<String>,
}

/// Extracts the test script from detail pages
pub struct ContentExtractor {
    config: ExtractionConfig,
    timing: TimingConfig,
    tab_locators: Vec<Locator>,
}

impl ContentExtractor {
    pub fn new(config: ExtractionConfig, timing: TimingConfig) -> Self {
        let tab_locators = config.detail_tab_locators();
        Self {
            config,
            timing,
            tab_locators,
        }
    }

    /// Extract one test case
    pub async fn extract<P: Page>(
        &self,
        page: &P,
        case: &TestCaseRef,
    ) -> HarvestResult<ExtractionResult> {
        page.navigate(&case.navigation_target, self.timing.navigation_timeout())
            .await?;
        pause(self.timing.settle()).await;

        let tab_activated = self.activate_detail_tab(page).await;
        if tab_activated {
            pause(self.timing.tab_settle()).await;
        } else {
            warn!(
                "{}: '{}' tab not found, extracting visible content",
                case.id, self.config.detail_tab_label
            );
        }

        let (content, source) = self.extract_content(page).await?;
        let title = self.read_title(page, case).await;

        let length = content.chars().count();
        let succeeded = length > self.config.accept_min_chars;
        let failure_reason = (!succeeded).then(|| match source {
            ContentSource::None => "no extraction strategy produced any text".to_string(),
            other => format!(
                "{:?} text too short ({} chars, need more than {})",
                other, length, self.config.accept_min_chars
            ),
        });

        Ok(ExtractionResult {
            case: case.clone(),
            title,
            content,
            source,
            tab_activated,
            succeeded,
            failure_reason,
        })
    }

    /// Click the first visible detail tab match. Neither absence nor a
    /// failed lookup is an error.
    async fn activate_detail_tab<P: Page>(&self, page: &P) -> bool {
        let step_timeout = self.timing.step_timeout();
        for locator in &self.tab_locators {
            let tab = match bounded("detail tab lookup", step_timeout, locator.first_visible(page))
                .await
            {
                Ok(Some(tab)) => tab,
                Ok(None) => {
                    debug!("No match for {}", locator);
                    continue;
                }
                Err(e) => {
                    debug!("Lookup of {} failed: {}", locator, e);
                    continue;
                }
            };
            match bounded("detail tab click", step_timeout, tab.click()).await {
                Ok(()) => {
                    info!("  • {} tab clicked", self.config.detail_tab_label);
                    return true;
                }
                Err(e) => debug!("Click on {} failed: {}", locator, e),
            }
        }
        false
    }

    /// Run strategies in order; keep the longest candidate if none wins
    async fn extract_content<P: Page>(&self, page: &P) -> HarvestResult<(String, ContentSource)> {
        let step_timeout = self.timing.step_timeout();
        let mut best: Option<(String, ContentSource)> = None;

        for strategy in &self.config.strategies {
            let text = bounded("content lookup", step_timeout, strategy.apply(page)).await?;
            let Some(text) = text else {
                debug!("{:?} strategy found nothing", strategy.source());
                continue;
            };

            let text = text.trim().to_string();
            let length = text.chars().count();
            if length >= self.config.strategy_min_chars {
                debug!("{:?} strategy won with {} chars", strategy.source(), length);
                return Ok((text, strategy.source()));
            }

            debug!("{:?} strategy too short ({} chars)", strategy.source(), length);
            let longer = best
                .as_ref()
                .map_or(true, |(b, _)| length > b.chars().count());
            if longer && length > 0 {
                best = Some((text, strategy.source()));
            }
        }

        Ok(best.unwrap_or_else(|| (String::new(), ContentSource::None)))
    }

    /// Page title, else the display name, else the id
    async fn read_title<P: Page>(&self, page: &P, case: &TestCaseRef) -> String {
        let locator = Locator::Css(self.config.title_selectors.clone());
        let step_timeout = self.timing.step_timeout();

        match bounded("title lookup", step_timeout, locator.first_visible(page)).await {
            Ok(Some(element)) => {
                if let Ok(Some(text)) = element.text().await {
                    let text = text.trim();
                    if !text.is_empty() {
                        return text.to_string();
                    }
                }
            }
            Ok(None) => {}
            Err(e) => debug!("{}: title lookup failed: {}", case.id, e),
        }
        case.fallback_title().to_string()
    }
}
