//! In-memory browser double
//!
//! A site is a map from URL to [`FakeDoc`]. Each document answers CSS
//! queries by exact selector string, so tests register elements under the
//! same selector strings the pipeline is configured with.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tcharvest::browser::{bounded, Element, Page};
use tcharvest::config::{HarvestConfig, Mode, TimingConfig};
use tcharvest::error::{HarvestError, HarvestResult};
use tcharvest::session::Session;

/// Default first link selector
pub const LINKS: &str = r#"a[href*="/testCase/"]"#;
pub const TITLE: &str = r#"[data-testid*="name"], h1, h2"#;
pub const CONTAINER: &str = r#"[data-testid*="test-script"], [class*="test-script"], [id*="test-script"], [data-test-id*="test-script"]"#;
pub const MAIN: &str = r#"main, [role="main"], body"#;
pub const TAB: &str = r#"[role="tab"]"#;

pub const BASE: &str = "https://tm.example.com";

/// What clicking an element does
#[derive(Debug, Clone)]
pub enum ClickAction {
    Nothing,
    /// Merge the document's hidden-until-click elements into the page
    Reveal,
    /// Load another document, as a "next page" control does
    Goto(String),
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    text: Option<String>,
    attrs: HashMap<String, String>,
    visible: bool,
    related: Option<String>,
    children: HashMap<String, Vec<FakeNode>>,
    on_click: ClickAction,
    stale: bool,
}

impl FakeNode {
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            attrs: HashMap::new(),
            visible: true,
            related: None,
            children: HashMap::new(),
            on_click: ClickAction::Nothing,
            stale: false,
        }
    }

    /// A listing link `id` pointing at `href`
    pub fn link(id: &str, href: &str) -> Self {
        Self::new(id).attr("href", href)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Text returned by `related_text`, i.e. the name cell of the row
    pub fn row_name(mut self, name: &str) -> Self {
        self.related = Some(name.to_string());
        self
    }

    pub fn child(mut self, css: &str, nodes: Vec<FakeNode>) -> Self {
        self.children.insert(css.to_string(), nodes);
        self
    }

    pub fn on_click(mut self, action: ClickAction) -> Self {
        self.on_click = action;
        self
    }

    /// Detached from the document: every read fails
    pub fn stale(mut self) -> Self {
        self.stale = true;
        self
    }

    /// A `table` whose `tr` rows carry the given texts
    pub fn table(rows: &[&str]) -> Self {
        let rows = rows.iter().map(|r| FakeNode::new(r)).collect();
        FakeNode::new("").child("tr", rows)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDoc {
    title: Option<String>,
    elements: HashMap<String, Vec<FakeNode>>,
    revealed: HashMap<String, Vec<FakeNode>>,
}

impl FakeDoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with(mut self, css: &str, nodes: Vec<FakeNode>) -> Self {
        self.elements.entry(css.to_string()).or_default().extend(nodes);
        self
    }

    /// Elements that only appear once a [`ClickAction::Reveal`] node is clicked
    pub fn revealed(mut self, css: &str, nodes: Vec<FakeNode>) -> Self {
        self.revealed.entry(css.to_string()).or_default().extend(nodes);
        self
    }

    /// Detail page with a clickable "Test Script" tab revealing a table
    pub fn detail_with_tab(title: &str, rows: &[&str]) -> Self {
        FakeDoc::new()
            .with(TITLE, vec![FakeNode::new(title)])
            .with(TAB, vec![FakeNode::new("Test Script").on_click(ClickAction::Reveal)])
            .revealed("table", vec![FakeNode::table(rows)])
    }
}

#[derive(Default)]
struct Site {
    docs: HashMap<String, FakeDoc>,
    stalled: HashSet<String>,
    broken: HashSet<String>,
    visits: Vec<String>,
    screenshots: Vec<PathBuf>,
}

/// Shared fake browser
#[derive(Clone, Default)]
pub struct FakeBrowser {
    site: Arc<Mutex<Site>>,
    open: Arc<Mutex<Vec<FakePage>>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, url: &str, doc: FakeDoc) -> &Self {
        self.site.lock().unwrap().docs.insert(url.to_string(), doc);
        self
    }

    /// Navigation to `url` never completes
    pub fn stall(&self, url: &str) -> &Self {
        self.site.lock().unwrap().stalled.insert(url.to_string());
        self
    }

    /// Queries for `css` fail on every page
    pub fn fail_query(&self, css: &str) -> &Self {
        self.site.lock().unwrap().broken.insert(css.to_string());
        self
    }

    /// Open a tab already showing `url`
    pub fn open_tab(&self, url: &str) -> FakePage {
        let page = FakePage::new(self.site.clone());
        page.load(url);
        self.open.lock().unwrap().push(page.clone());
        page
    }

    pub fn visits(&self) -> Vec<String> {
        self.site.lock().unwrap().visits.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.site.lock().unwrap().screenshots.clone()
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            browser: self.clone(),
        }
    }
}

struct Live {
    url: String,
    doc: FakeDoc,
}

#[derive(Clone)]
pub struct FakePage {
    site: Arc<Mutex<Site>>,
    live: Arc<Mutex<Live>>,
}

impl FakePage {
    fn new(site: Arc<Mutex<Site>>) -> Self {
        Self {
            site,
            live: Arc::new(Mutex::new(Live {
                url: "about:blank".to_string(),
                doc: FakeDoc::default(),
            })),
        }
    }

    /// Replace the live document; unknown URLs load an empty document
    fn load(&self, url: &str) {
        let doc = self
            .site
            .lock()
            .unwrap()
            .docs
            .get(url)
            .cloned()
            .unwrap_or_default();
        *self.live.lock().unwrap() = Live {
            url: url.to_string(),
            doc,
        };
    }

    fn reveal(&self) {
        let mut live = self.live.lock().unwrap();
        let revealed = std::mem::take(&mut live.doc.revealed);
        for (css, nodes) in revealed {
            live.doc.elements.entry(css).or_default().extend(nodes);
        }
    }

    fn element(&self, node: FakeNode) -> FakeElement {
        FakeElement {
            node,
            page: self.clone(),
        }
    }
}

#[async_trait]
impl Page for FakePage {
    type Element = FakeElement;

    async fn url(&self) -> HarvestResult<String> {
        Ok(self.live.lock().unwrap().url.clone())
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> HarvestResult<()> {
        let stalled = {
            let mut site = self.site.lock().unwrap();
            site.visits.push(url.to_string());
            site.stalled.contains(url)
        };
        if stalled {
            let never = std::future::pending::<HarvestResult<()>>();
            return bounded("navigate", timeout, never).await;
        }
        self.load(url);
        Ok(())
    }

    async fn query_all(&self, css: &str) -> HarvestResult<Vec<FakeElement>> {
        if self.site.lock().unwrap().broken.contains(css) {
            return Err(HarvestError::Browser(format!("query {} failed", css)));
        }
        let nodes = self
            .live
            .lock()
            .unwrap()
            .doc
            .elements
            .get(css)
            .cloned()
            .unwrap_or_default();
        Ok(nodes.into_iter().map(|n| self.element(n)).collect())
    }

    async fn title(&self) -> HarvestResult<Option<String>> {
        Ok(self.live.lock().unwrap().doc.title.clone())
    }

    async fn screenshot(&self, path: &Path) -> HarvestResult<()> {
        std::fs::write(path, b"\x89PNG")?;
        self.site.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }
}

pub struct FakeElement {
    node: FakeNode,
    page: FakePage,
}

impl FakeElement {
    fn live(&self) -> HarvestResult<&FakeNode> {
        if self.node.stale {
            return Err(HarvestError::Browser("node is detached".to_string()));
        }
        Ok(&self.node)
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn text(&self) -> HarvestResult<Option<String>> {
        Ok(self.live()?.text.clone())
    }

    async fn attribute(&self, name: &str) -> HarvestResult<Option<String>> {
        Ok(self.live()?.attrs.get(name).cloned())
    }

    async fn is_visible(&self) -> HarvestResult<bool> {
        Ok(self.live()?.visible)
    }

    async fn click(&self) -> HarvestResult<()> {
        match &self.node.on_click {
            ClickAction::Nothing => {}
            ClickAction::Reveal => self.page.reveal(),
            ClickAction::Goto(url) => self.page.load(url),
        }
        Ok(())
    }

    async fn query_all(&self, css: &str) -> HarvestResult<Vec<FakeElement>> {
        let nodes = self.node.children.get(css).cloned().unwrap_or_default();
        Ok(nodes.into_iter().map(|n| self.page.element(n)).collect())
    }

    async fn related_text(
        &self,
        _ancestor_css: &str,
        _cell_css: &str,
    ) -> HarvestResult<Option<String>> {
        Ok(self.live()?.related.clone())
    }
}

pub struct FakeSession {
    browser: FakeBrowser,
}

#[async_trait]
impl Session for FakeSession {
    type Page = FakePage;

    async fn pages(&self) -> HarvestResult<Vec<FakePage>> {
        Ok(self.browser.open.lock().unwrap().clone())
    }

    async fn new_page(&self) -> HarvestResult<FakePage> {
        Ok(self.browser.open_tab("about:blank"))
    }

    async fn close(self) -> HarvestResult<()> {
        Ok(())
    }
}

/// Timing for tests: no fixed waits, short timeouts
pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        navigation_timeout_ms: 200,
        step_timeout_ms: 200,
        ..TimingConfig::default().without_waits()
    }
}

/// Config reading the listing at `listing_url` into `output_dir`
pub fn config(listing_url: &str, output_dir: &Path) -> HarvestConfig {
    HarvestConfig {
        mode: Mode::Launch,
        listing_url: Some(listing_url.to_string()),
        output_dir: output_dir.to_path_buf(),
        timing: fast_timing(),
        ..Default::default()
    }
}

/// Listing page linking every id to `/tc/<id>`
pub fn listing(ids: &[&str]) -> FakeDoc {
    let links = ids
        .iter()
        .map(|id| FakeNode::link(id, &format!("/tc/{}", id)))
        .collect();
    FakeDoc::new().title("Test cases").with(LINKS, links)
}

pub fn target(id: &str) -> String {
    format!("{}/tc/{}", BASE, id)
}
