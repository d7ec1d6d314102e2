//! List pages of a running browser

use std::path::Path;

use clap::Args;

use tcharvest::{CdpSession, HarvestConfig, Page, Session, SessionMode};

use crate::output;

#[derive(Args, Debug)]
pub struct PagesArgs {
    /// Debugging endpoint (default: probe localhost:9222-9224)
    #[arg(long, env = "TCHARVEST_ENDPOINT")]
    pub endpoint: Option<String>,
}

pub async fn execute(args: PagesArgs, config_path: &Path) -> anyhow::Result<()> {
    let mut config = HarvestConfig::load(config_path)?;
    config.mode = tcharvest::Mode::Attach;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = Some(endpoint);
    }

    let session = CdpSession::acquire(&SessionMode::from_config(&config), &config.timing).await?;

    let mut rows = Vec::new();
    for (index, page) in session.pages().await?.iter().enumerate() {
        let url = page.url().await.unwrap_or_default();
        let title = page.title().await.ok().flatten().unwrap_or_default();
        rows.push((index, title, url));
    }
    session.close().await?;

    output::print_pages(&rows);
    Ok(())
}
