//! Chrome DevTools Protocol engine backed by chromiumoxide

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::js_protocol::runtime::CallFunctionOnReturns;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{bounded, pause, Element, Page};
use crate::config::{LaunchConfig, TimingConfig};
use crate::error::{HarvestError, HarvestResult};
use crate::session::{Session, SessionMode};

const READY_POLL: Duration = Duration::from_millis(100);
const TARGET_ATTACH_POLLS: usize = 20;

const VISIBLE_FN: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    const s = window.getComputedStyle(this); \
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; \
}";

/// Reply of the `/json/version` debugging endpoint
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Browser", default)]
    browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// A CDP browser connection
pub struct CdpSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// Launched by us, so closed by us
    owned: bool,
    endpoint: String,
}

impl CdpSession {
    /// Obtain a session; failures are [`HarvestError::Connection`]
    pub async fn acquire(mode: &SessionMode, timing: &TimingConfig) -> HarvestResult<Self> {
        match mode {
            SessionMode::Launch(config) => Self::launch(config).await,
            SessionMode::Attach { endpoints } => {
                Self::attach(endpoints, timing.connect_timeout()).await
            }
        }
    }

    /// Where the session is connected
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn launch(config: &LaunchConfig) -> HarvestResult<Self> {
        info!("Launching browser (headless: {})", config.headless);

        let mut builder =
            BrowserConfig::builder().window_size(config.window_width, config.window_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &config.args {
            builder = builder.arg(arg.as_str());
        }
        let browser_config = builder.build().map_err(HarvestError::Connection)?;

        let (browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| HarvestError::Connection(format!("Failed to launch browser: {}", e)))?;

        Ok(Self {
            endpoint: browser.websocket_address().clone(),
            handler: spawn_handler(handler),
            browser,
            owned: true,
        })
    }

    async fn attach(endpoints: &[String], timeout: Duration) -> HarvestResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let mut failures = Vec::new();

        for endpoint in endpoints {
            debug!("Trying debugging endpoint {}", endpoint);
            match Self::connect_endpoint(&client, endpoint, timeout).await {
                Ok(session) => {
                    info!("Connected to browser at {}", endpoint);
                    return Ok(session);
                }
                Err(e) => {
                    debug!("Endpoint {} not available: {}", endpoint, e);
                    failures.push(format!("{} ({})", endpoint, e));
                }
            }
        }

        Err(HarvestError::Connection(format!(
            "no browser answered at {}. Start the browser with \
             --remote-debugging-port and log in first",
            failures.join(", ")
        )))
    }

    async fn connect_endpoint(
        client: &reqwest::Client,
        endpoint: &str,
        timeout: Duration,
    ) -> HarvestResult<Self> {
        let ws_url = if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            endpoint.to_string()
        } else {
            let version_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
            let version: VersionInfo = client
                .get(&version_url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!("Endpoint {} runs {}", endpoint, version.browser);
            version.web_socket_debugger_url
        };

        let (mut browser, handler) = bounded("connect", timeout, async {
            Browser::connect(ws_url.clone()).await.map_err(HarvestError::from)
        })
        .await?;
        let handler = spawn_handler(handler);

        // Existing tabs only become pages once their targets are attached.
        let targets = browser.fetch_targets().await?;
        let expected = targets.iter().filter(|t| t.r#type == "page").count();
        for _ in 0..TARGET_ATTACH_POLLS {
            if browser.pages().await?.len() >= expected {
                break;
            }
            pause(READY_POLL).await;
        }

        Ok(Self {
            browser,
            handler,
            owned: false,
            endpoint: endpoint.to_string(),
        })
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("CDP handler event loop ended: {}", e);
                break;
            }
        }
    })
}

#[async_trait]
impl Session for CdpSession {
    type Page = CdpPage;

    async fn pages(&self) -> HarvestResult<Vec<CdpPage>> {
        let pages = self.browser.pages().await?;
        Ok(pages.into_iter().map(CdpPage).collect())
    }

    async fn new_page(&self) -> HarvestResult<CdpPage> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(CdpPage(page))
    }

    async fn close(mut self) -> HarvestResult<()> {
        if self.owned {
            info!("Closing browser");
            if let Err(e) = self.browser.close().await {
                warn!("Error closing browser: {}", e);
            }
        } else {
            debug!("Detaching from browser at {}", self.endpoint);
        }
        self.handler.abort();
        Ok(())
    }
}

/// A CDP tab
#[derive(Clone)]
pub struct CdpPage(chromiumoxide::Page);

#[async_trait]
impl Page for CdpPage {
    type Element = CdpElement;

    async fn url(&self) -> HarvestResult<String> {
        Ok(self.0.url().await?.unwrap_or_default())
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> HarvestResult<()> {
        bounded("navigate", timeout, async {
            let response = self.0.execute(NavigateParams::new(url)).await?;
            if let Some(reason) = &response.result.error_text {
                return Err(HarvestError::Navigation {
                    url: url.to_string(),
                    reason: reason.clone(),
                });
            }

            let start = Instant::now();
            loop {
                let state: String = self
                    .0
                    .evaluate("document.readyState")
                    .await?
                    .into_value()
                    .unwrap_or_default();
                if state == "interactive" || state == "complete" {
                    debug!("{} ready ({}) after {} ms", url, state, start.elapsed().as_millis());
                    return Ok(());
                }
                pause(READY_POLL).await;
            }
        })
        .await
    }

    async fn query_all(&self, css: &str) -> HarvestResult<Vec<CdpElement>> {
        let elements = self.0.find_elements(css).await?;
        Ok(elements.into_iter().map(CdpElement).collect())
    }

    async fn title(&self) -> HarvestResult<Option<String>> {
        Ok(self.0.get_title().await?)
    }

    async fn screenshot(&self, path: &Path) -> HarvestResult<()> {
        self.0
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await?;
        Ok(())
    }
}

/// A CDP element handle
pub struct CdpElement(chromiumoxide::Element);

#[async_trait]
impl Element for CdpElement {
    async fn text(&self) -> HarvestResult<Option<String>> {
        Ok(self.0.inner_text().await?)
    }

    async fn attribute(&self, name: &str) -> HarvestResult<Option<String>> {
        Ok(self.0.attribute(name).await?)
    }

    async fn is_visible(&self) -> HarvestResult<bool> {
        let returns = self.0.call_js_fn(VISIBLE_FN, false).await?;
        Ok(js_value(returns)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn click(&self) -> HarvestResult<()> {
        self.0.click().await?;
        Ok(())
    }

    async fn query_all(&self, css: &str) -> HarvestResult<Vec<CdpElement>> {
        let elements = self.0.find_elements(css).await?;
        Ok(elements.into_iter().map(CdpElement).collect())
    }

    async fn related_text(
        &self,
        ancestor_css: &str,
        cell_css: &str,
    ) -> HarvestResult<Option<String>> {
        let function = format!(
            "function() {{ \
                const row = this.closest({}); \
                if (!row) return null; \
                const cell = row.querySelector({}); \
                return cell ? cell.innerText : null; \
            }}",
            serde_json::to_string(ancestor_css)?,
            serde_json::to_string(cell_css)?,
        );
        let returns = self.0.call_js_fn(function, false).await?;
        Ok(js_value(returns)?.and_then(|v| v.as_str().map(str::to_string)))
    }
}

/// Return value of an in-page function; a thrown exception is an error
fn js_value(returns: CallFunctionOnReturns) -> HarvestResult<Option<serde_json::Value>> {
    if let Some(details) = returns.exception_details {
        return Err(HarvestError::Browser(details.text));
    }
    Ok(returns.result.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_value_reads_the_result() {
        let returns: CallFunctionOnReturns = serde_json::from_value(serde_json::json!({
            "result": { "type": "boolean", "value": true }
        }))
        .unwrap();

        assert_eq!(js_value(returns).unwrap(), Some(serde_json::Value::Bool(true)));
    }

    #[test]
    fn test_js_exception_is_a_browser_error() {
        let returns: CallFunctionOnReturns = serde_json::from_value(serde_json::json!({
            "result": { "type": "object", "subtype": "error" },
            "exceptionDetails": {
                "exceptionId": 1,
                "text": "Uncaught",
                "lineNumber": 0,
                "columnNumber": 9
            }
        }))
        .unwrap();

        match js_value(returns) {
            Err(HarvestError::Browser(text)) => assert_eq!(text, "Uncaught"),
            other => panic!("expected a browser error, got {:?}", other),
        }
    }
}
