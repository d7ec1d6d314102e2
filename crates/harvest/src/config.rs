//! Harvest configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::Locator;
use crate::enumerate::{namespace_filter, CaseFilter, CaseSource};
use crate::error::{HarvestError, HarvestResult};
use crate::extract::ContentStrategy;

/// Placeholder substituted with a test-case key in `case_url_template`.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// How the browser session is obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Start a fresh browser owned by this run
    #[default]
    Launch,
    /// Attach to an already running browser through its debugging endpoint
    Attach,
}

/// Top-level configuration for one extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Launch a browser or attach to a running one
    pub mode: Mode,

    /// Debugging endpoint for attach mode (e.g. `http://localhost:9222`)
    pub endpoint: Option<String>,

    /// Listing page enumerating the test cases
    pub listing_url: Option<String>,

    /// Directory receiving one text file per extracted test case
    pub output_dir: PathBuf,

    /// Identifier namespace filter (e.g. `AIM`)
    pub filter_namespace: Option<String>,

    /// Substring used to pick the working tab among already open pages
    pub page_hint: Option<String>,

    /// Explicit test-case keys; used instead of the listing page when set
    pub keys: Vec<String>,

    /// Detail page URL for a key, containing `{key}`
    pub case_url_template: Option<String>,

    /// Capture a PNG when an item fails with a transport error
    pub screenshot_on_error: bool,

    /// Write `harvest-report.json` next to the artifacts
    pub write_report: bool,

    pub launch: LaunchConfig,
    pub timing: TimingConfig,
    pub extraction: ExtractionConfig,
    pub pagination: PaginationConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Launch,
            endpoint: None,
            listing_url: None,
            output_dir: PathBuf::from("TestCases"),
            filter_namespace: None,
            page_hint: None,
            keys: Vec::new(),
            case_url_template: None,
            screenshot_on_error: false,
            write_report: true,
            launch: LaunchConfig::default(),
            timing: TimingConfig::default(),
            extraction: ExtractionConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

/// Settings for a freshly launched browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    pub headless: bool,

    /// Browser binary; auto-detected when unset
    pub executable: Option<PathBuf>,

    pub window_width: u32,
    pub window_height: u32,

    /// Extra command line switches
    pub args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_width: 1280,
            window_height: 720,
            args: Vec::new(),
        }
    }
}

/// Fixed waits and per-step timeouts, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after a detail page is ready, for client-side rendering
    pub settle_ms: u64,

    /// Pause after activating the detail tab
    pub tab_settle_ms: u64,

    /// Pause before reading the listing page and after paging it
    pub listing_settle_ms: u64,

    /// Pause between two items
    pub pace_ms: u64,

    pub navigation_timeout_ms: u64,

    /// Timeout for a single element lookup or interaction
    pub step_timeout_ms: u64,

    /// Timeout for reaching the debugging endpoint
    pub connect_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: 3000,
            tab_settle_ms: 2500,
            listing_settle_ms: 2000,
            pace_ms: 1500,
            navigation_timeout_ms: 30_000,
            step_timeout_ms: 5000,
            connect_timeout_ms: 5000,
        }
    }
}

impl TimingConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn tab_settle(&self) -> Duration {
        Duration::from_millis(self.tab_settle_ms)
    }

    pub fn listing_settle(&self) -> Duration {
        Duration::from_millis(self.listing_settle_ms)
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// No fixed waits at all; timeouts keep their values.
    pub fn without_waits(mut self) -> Self {
        self.settle_ms = 0;
        self.tab_settle_ms = 0;
        self.listing_settle_ms = 0;
        self.pace_ms = 0;
        self
    }
}

/// Selectors and thresholds driving enumeration and extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// A strategy wins when its trimmed output has at least this many chars
    pub strategy_min_chars: usize,

    /// An item succeeds when its content has more than this many chars
    pub accept_min_chars: usize,

    /// Visible text of the tab holding the test script
    pub detail_tab_label: String,

    /// Heading-like elements holding the test-case title
    pub title_selectors: String,

    /// Test-case link selectors on the listing page, tried in order
    pub link_selectors: Vec<String>,

    /// Row containing a test-case link
    pub row_selector: String,

    /// Name cell inside that row
    pub name_cell_selector: String,

    /// Upper bound on an artifact file stem, in characters
    pub max_file_name_len: usize,

    /// Content strategies, tried in order
    pub strategies: Vec<ContentStrategy>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy_min_chars: 50,
            accept_min_chars: 30,
            detail_tab_label: "Test Script".to_string(),
            title_selectors: r#"[data-testid*="name"], h1, h2"#.to_string(),
            link_selectors: vec![
                r#"a[href*="/testCase/"]"#.to_string(),
                r#"[data-column-key="key"] a, td.key a"#.to_string(),
            ],
            row_selector: "tr".to_string(),
            name_cell_selector: r#"td[data-column-key="name"], td:nth-child(4)"#.to_string(),
            max_file_name_len: 150,
            strategies: ContentStrategy::defaults(),
        }
    }
}

impl ExtractionConfig {
    /// Locator chain for the detail tab, most specific first
    pub fn detail_tab_locators(&self) -> Vec<Locator> {
        let label = &self.detail_tab_label;
        vec![
            Locator::Role {
                role: "tab".to_string(),
                name: label.clone(),
            },
            Locator::CssWithText {
                css: "button".to_string(),
                text: label.clone(),
            },
            Locator::CssWithText {
                css: "a".to_string(),
                text: label.clone(),
            },
            Locator::Label(label.clone()),
            Locator::CssWithText {
                css: "span".to_string(),
                text: label.clone(),
            },
        ]
    }
}

/// Listing page pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// "Next page" control; pagination is off when unset
    pub next_selector: Option<String>,

    /// Upper bound on listing pages read, including the first
    pub max_pages: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            next_selector: None,
            max_pages: 20,
        }
    }
}

impl HarvestConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> HarvestResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> HarvestResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations that cannot produce a run
    pub fn validate(&self) -> HarvestResult<()> {
        if self.keys.is_empty() && self.listing_url.is_none() && self.mode != Mode::Attach {
            return Err(HarvestError::InvalidConfig(
                "either listing_url or keys must be set when launching a browser".to_string(),
            ));
        }
        if !self.keys.is_empty() {
            match &self.case_url_template {
                Some(t) if t.contains(KEY_PLACEHOLDER) => {}
                _ => {
                    return Err(HarvestError::InvalidConfig(format!(
                        "keys require a case_url_template containing {}",
                        KEY_PLACEHOLDER
                    )))
                }
            }
        }
        if self.extraction.max_file_name_len < 16 {
            return Err(HarvestError::InvalidConfig(format!(
                "max_file_name_len must be at least 16 (got {})",
                self.extraction.max_file_name_len
            )));
        }
        if self.extraction.strategies.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "at least one content strategy is required".to_string(),
            ));
        }
        if self.extraction.link_selectors.is_empty() && self.keys.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "at least one link selector is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Keys win over the listing URL; attach mode without either reads the
    /// listing the browser already shows
    pub fn case_source(&self) -> CaseSource {
        if !self.keys.is_empty() {
            CaseSource::Keys {
                keys: self.keys.clone(),
                template: self.case_url_template.clone().unwrap_or_default(),
            }
        } else if let Some(url) = &self.listing_url {
            CaseSource::Listing { url: url.clone() }
        } else {
            CaseSource::CurrentPage
        }
    }

    pub fn case_filter(&self) -> Option<CaseFilter> {
        self.filter_namespace
            .as_deref()
            .filter(|ns| !ns.trim().is_empty())
            .map(namespace_filter)
    }

    /// Path of the JSON run report
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("harvest-report.json")
    }
}
