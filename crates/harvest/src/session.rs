//! Browser session provider

use async_trait::async_trait;
use tracing::{debug, info};

use crate::browser::Page;
use crate::config::{HarvestConfig, LaunchConfig, Mode};
use crate::error::HarvestResult;

/// Debugging endpoints probed when attach mode has no explicit endpoint
pub const DEFAULT_ATTACH_ENDPOINTS: [&str; 3] = [
    "http://localhost:9222",
    "http://localhost:9223",
    "http://localhost:9224",
];

/// How to obtain a session
#[derive(Debug, Clone)]
pub enum SessionMode {
    /// Launch a browser owned by this session
    Launch(LaunchConfig),

    /// Attach to a running browser; candidates are tried in order
    Attach { endpoints: Vec<String> },
}

impl SessionMode {
    pub fn from_config(config: &HarvestConfig) -> Self {
        match config.mode {
            Mode::Launch => SessionMode::Launch(config.launch.clone()),
            Mode::Attach => {
                let endpoints = match &config.endpoint {
                    Some(endpoint) => vec![endpoint.clone()],
                    None => DEFAULT_ATTACH_ENDPOINTS
                        .iter()
                        .map(|e| e.to_string())
                        .collect(),
                };
                SessionMode::Attach { endpoints }
            }
        }
    }
}

/// A connected browser. One per run.
#[async_trait]
pub trait Session: Send + Sync + Sized {
    type Page: Page + Clone;

    /// All open pages, in browser order
    async fn pages(&self) -> HarvestResult<Vec<Self::Page>>;

    async fn new_page(&self) -> HarvestResult<Self::Page>;

    /// Release the browser. Launched browsers are closed, attached ones left running.
    async fn close(self) -> HarvestResult<()>;

    /// The page to drive: first whose URL contains `url_hint`, else the first
    /// page, else a new blank page.
    async fn active_page(&self, url_hint: Option<&str>) -> HarvestResult<Self::Page> {
        let pages = self.pages().await?;
        if pages.is_empty() {
            debug!("No open pages, opening a new one");
            return self.new_page().await;
        }

        let mut urls = Vec::with_capacity(pages.len());
        for page in &pages {
            urls.push(page.url().await.unwrap_or_default());
        }

        let index = pick_page(&urls, url_hint);
        info!("Using page {}: {}", index, urls[index]);
        Ok(pages[index].clone())
    }
}

/// Index of the first URL containing `hint`, falling back to 0
pub fn pick_page(urls: &[String], hint: Option<&str>) -> usize {
    hint.and_then(|h| urls.iter().position(|u| u.contains(h)))
        .unwrap_or(0)
}
