//! Browser capability traits
//!
//! The pipeline only ever talks to a browser through these traits. The CDP
//! engine in [`crate::cdp`] implements them for a real Chromium; tests drive
//! the same pipeline with an in-memory page.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};

/// A single DOM element handle
#[async_trait]
pub trait Element: Send + Sync + Sized {
    /// Rendered text of the element
    async fn text(&self) -> HarvestResult<Option<String>>;

    async fn attribute(&self, name: &str) -> HarvestResult<Option<String>>;

    /// Whether the element has a non-empty layout box
    async fn is_visible(&self) -> HarvestResult<bool>;

    async fn click(&self) -> HarvestResult<()>;

    /// Descendants matching a CSS selector
    async fn query_all(&self, css: &str) -> HarvestResult<Vec<Self>>;

    /// Text of the first `cell_css` inside the closest `ancestor_css`
    async fn related_text(&self, ancestor_css: &str, cell_css: &str)
        -> HarvestResult<Option<String>>;
}

/// A browser tab
#[async_trait]
pub trait Page: Send + Sync {
    type Element: Element;

    async fn url(&self) -> HarvestResult<String>;

    /// Navigate and return once the document is no longer loading
    async fn navigate(&self, url: &str, timeout: Duration) -> HarvestResult<()>;

    async fn query_all(&self, css: &str) -> HarvestResult<Vec<Self::Element>>;

    async fn title(&self) -> HarvestResult<Option<String>>;

    async fn screenshot(&self, path: &Path) -> HarvestResult<()>;
}

/// A selector strategy used to find one interactive element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Plain CSS selector
    Css(String),

    /// CSS selector narrowed to elements whose text contains `text`
    CssWithText { css: String, text: String },

    /// ARIA role with an accessible name
    Role { role: String, name: String },

    /// `aria-label` attribute
    Label(String),
}

impl Locator {
    /// CSS part of the locator
    pub fn css(&self) -> String {
        match self {
            Locator::Css(css) | Locator::CssWithText { css, .. } => css.clone(),
            Locator::Role { role, .. } => format!("[role=\"{}\"]", escape_attr(role)),
            Locator::Label(label) => format!("[aria-label=\"{}\"]", escape_attr(label)),
        }
    }

    /// Text filter applied after the CSS query, if any
    pub fn text_filter(&self) -> Option<&str> {
        match self {
            Locator::CssWithText { text, .. } => Some(text),
            Locator::Role { name, .. } => Some(name),
            Locator::Css(_) | Locator::Label(_) => None,
        }
    }

    /// First visible element matching this locator
    ///
    /// Elements that vanish while being inspected are skipped.
    pub async fn first_visible<P: Page>(&self, page: &P) -> HarvestResult<Option<P::Element>> {
        let css = self.css();
        let candidates = page.query_all(&css).await?;
        let needle = self.text_filter().map(str::to_lowercase);

        for element in candidates {
            if let Some(needle) = &needle {
                match element.text().await {
                    Ok(Some(text)) if text.to_lowercase().contains(needle.as_str()) => {}
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("Skipping element for '{}': {}", css, e);
                        continue;
                    }
                }
            }
            match element.is_visible().await {
                Ok(true) => return Ok(Some(element)),
                Ok(false) => {}
                Err(e) => debug!("Skipping element for '{}': {}", css, e),
            }
        }
        Ok(None)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.text_filter() {
            Some(text) => write!(f, "{}:has-text(\"{}\")", self.css(), text),
            None => write!(f, "{}", self.css()),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Run a browser step under its own timeout
pub async fn bounded<T, F>(step: &str, limit: Duration, fut: F) -> HarvestResult<T>
where
    F: Future<Output = HarvestResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(HarvestError::Timeout {
            step: step.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

/// Fixed pause; zero durations return immediately
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
