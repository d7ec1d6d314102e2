//! Full extraction run

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use tracing::{info, warn};

use tcharvest::{harvest, CdpSession, HarvestConfig, Mode, Session, SessionMode};

use crate::output;

/// Session mode on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Start a fresh browser
    Launch,
    /// Attach to a browser started with --remote-debugging-port
    Attach,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Launch => Mode::Launch,
            ModeArg::Attach => Mode::Attach,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ExtractArgs {
    /// Launch a browser or attach to a running one
    #[arg(long, value_enum, env = "TCHARVEST_MODE")]
    pub mode: Option<ModeArg>,

    /// Debugging endpoint for attach mode (default: probe localhost:9222-9224)
    #[arg(long, env = "TCHARVEST_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Listing page enumerating the test cases
    #[arg(long, env = "TCHARVEST_LISTING_URL")]
    pub listing_url: Option<String>,

    /// Output directory for the text files
    #[arg(short, long, env = "TCHARVEST_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Identifier namespace filter, e.g. AIM
    #[arg(long, env = "TCHARVEST_FILTER")]
    pub filter: Option<String>,

    /// Pick the open page whose URL contains this text
    #[arg(long, env = "TCHARVEST_PAGE_HINT")]
    pub page_hint: Option<String>,

    /// Test-case key to extract instead of reading the listing (repeatable)
    #[arg(long = "key")]
    pub keys: Vec<String>,

    /// Detail page URL containing {key}
    #[arg(long, env = "TCHARVEST_CASE_URL_TEMPLATE")]
    pub case_url_template: Option<String>,

    /// Run the launched browser without a window
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub headless: Option<bool>,

    /// Write harvest-report.json into the output directory
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub report: Option<bool>,

    /// Capture a screenshot when an item fails
    #[arg(long)]
    pub screenshots: bool,

    /// Exit with status 1 when any test case failed
    #[arg(long)]
    pub strict: bool,
}

impl ExtractArgs {
    /// Flags win over the configuration file
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(url) = &self.listing_url {
            config.listing_url = Some(url.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(filter) = &self.filter {
            config.filter_namespace = Some(filter.clone());
        }
        if let Some(hint) = &self.page_hint {
            config.page_hint = Some(hint.clone());
        }
        if !self.keys.is_empty() {
            config.keys = self.keys.clone();
        }
        if let Some(template) = &self.case_url_template {
            config.case_url_template = Some(template.clone());
        }
        if let Some(headless) = self.headless {
            config.launch.headless = headless;
        }
        if let Some(report) = self.report {
            config.write_report = report;
        }
        if self.screenshots {
            config.screenshot_on_error = true;
        }
    }
}

pub async fn execute(args: ExtractArgs, config_path: &Path) -> anyhow::Result<()> {
    let mut config = HarvestConfig::load(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    let mode = SessionMode::from_config(&config);
    let session = CdpSession::acquire(&mode, &config.timing).await?;
    info!("Browser session ready at {}", session.endpoint());

    let result = harvest(&session, &config).await;
    if let Err(e) = session.close().await {
        warn!("Failed to release browser session: {}", e);
    }
    let report = result?;

    if report.filter_relaxed {
        output::print_warning("The filter matched nothing; all test cases were extracted");
    }
    output::print_summary(&report.summary);

    if args.strict && report.summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
