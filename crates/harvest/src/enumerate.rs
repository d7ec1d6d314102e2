//! Test-case enumeration
//!
//! Element handles go stale as soon as the page navigates away, so the
//! whole listing is read up front into an [`Enumeration`] which is then
//! consumed exactly once by the run coordinator.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{bounded, pause, Element, Locator, Page};
use crate::config::{ExtractionConfig, PaginationConfig, TimingConfig, KEY_PLACEHOLDER};
use crate::error::{HarvestError, HarvestResult};

/// One test case to extract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseRef {
    /// Stable identifier, e.g. `XPM-T4436`
    pub id: String,
    pub display_name: String,
    /// Absolute URL of the detail page
    pub navigation_target: String,
}

impl TestCaseRef {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        navigation_target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            navigation_target: navigation_target.into(),
        }
    }

    /// Display name, or the id when the name is blank
    pub fn fallback_title(&self) -> &str {
        let name = self.display_name.trim();
        if name.is_empty() {
            &self.id
        } else {
            name
        }
    }
}

/// Predicate selecting test cases to keep
pub type CaseFilter = Box<dyn Fn(&TestCaseRef) -> bool + Send + Sync>;

/// Keep cases whose id contains `namespace` or whose name mentions it
pub fn namespace_filter(namespace: &str) -> CaseFilter {
    let namespace = namespace.to_string();
    let lowered = namespace.to_lowercase();
    Box::new(move |case: &TestCaseRef| {
        case.id.contains(&namespace) || case.display_name.to_lowercase().contains(&lowered)
    })
}

/// Where test cases come from
#[derive(Debug, Clone)]
pub enum CaseSource {
    /// Navigate to a listing page and read its links
    Listing { url: String },

    /// Read whatever listing the page currently shows
    CurrentPage,

    /// Fixed keys expanded through a URL template containing `{key}`
    Keys { keys: Vec<String>, template: String },
}

/// The enumerated cases of one run. Consumed once.
#[derive(Debug)]
pub struct Enumeration {
    cases: Vec<TestCaseRef>,
    /// Entries read from the source, after dedupe and before filtering
    pub discovered: usize,
    /// The filter matched nothing and was dropped
    pub filter_relaxed: bool,
}

impl Enumeration {
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn cases(&self) -> &[TestCaseRef] {
        &self.cases
    }
}

impl IntoIterator for Enumeration {
    type Item = TestCaseRef;
    type IntoIter = std::vec::IntoIter<TestCaseRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.into_iter()
    }
}

/// Reads test-case references from a listing page or a key list
pub struct Enumerator {
    extraction: ExtractionConfig,
    pagination: PaginationConfig,
    timing: TimingConfig,
    filter: Option<CaseFilter>,
}

impl Enumerator {
    pub fn new(
        extraction: ExtractionConfig,
        pagination: PaginationConfig,
        timing: TimingConfig,
    ) -> Self {
        Self {
            extraction,
            pagination,
            timing,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: CaseFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Enumerate, dedupe and filter
    pub async fn enumerate<P: Page>(
        &self,
        page: &P,
        source: &CaseSource,
    ) -> HarvestResult<Enumeration> {
        let raw = match source {
            CaseSource::Keys { keys, template } => cases_from_keys(keys, template),
            CaseSource::Listing { url } => {
                info!("Opening listing page {}", url);
                page.navigate(url, self.timing.navigation_timeout()).await?;
                self.read_listing(page).await?
            }
            CaseSource::CurrentPage => self.read_listing(page).await?,
        };

        let cases = dedupe(raw);
        let discovered = cases.len();
        if cases.is_empty() {
            return Err(HarvestError::EnumerationEmpty {
                url: page.url().await.unwrap_or_default(),
                title: page.title().await.ok().flatten().unwrap_or_default(),
            });
        }

        let (cases, filter_relaxed) = self.apply_filter(cases);
        info!("Enumerated {} test case(s)", cases.len());

        Ok(Enumeration {
            cases,
            discovered,
            filter_relaxed,
        })
    }

    fn apply_filter(&self, cases: Vec<TestCaseRef>) -> (Vec<TestCaseRef>, bool) {
        let Some(filter) = &self.filter else {
            return (cases, false);
        };

        let kept: Vec<TestCaseRef> = cases.iter().filter(|c| filter(*c)).cloned().collect();
        if kept.is_empty() {
            warn!(
                "Filter matched none of {} test case(s), using all of them instead",
                cases.len()
            );
            (cases, true)
        } else {
            (kept, false)
        }
    }

    /// Read every listing page reachable through the "next" control
    async fn read_listing<P: Page>(&self, page: &P) -> HarvestResult<Vec<TestCaseRef>> {
        pause(self.timing.listing_settle()).await;
        let base = page.url().await?;

        let mut cases = self.read_links(page, &base).await?;
        let Some(next_selector) = &self.pagination.next_selector else {
            return Ok(cases);
        };

        let mut seen: HashSet<String> = cases.iter().map(|c| c.id.clone()).collect();
        let next = Locator::Css(next_selector.clone());
        for page_number in 2..=self.pagination.max_pages {
            let step_timeout = self.timing.step_timeout();
            let Some(control) =
                bounded("next page lookup", step_timeout, next.first_visible(page)).await?
            else {
                debug!("No next page control, listing ends at page {}", page_number - 1);
                break;
            };
            if is_disabled(&control).await {
                debug!("Next page control disabled at page {}", page_number - 1);
                break;
            }

            bounded("next page click", self.timing.step_timeout(), control.click()).await?;
            pause(self.timing.listing_settle()).await;

            let fresh: Vec<TestCaseRef> = self
                .read_links(page, &base)
                .await?
                .into_iter()
                .filter(|c| seen.insert(c.id.clone()))
                .collect();
            info!("Listing page {}: {} new test case(s)", page_number, fresh.len());
            if fresh.is_empty() {
                break;
            }
            cases.extend(fresh);
        }

        Ok(cases)
    }

    /// Read the links of the listing currently shown
    async fn read_links<P: Page>(&self, page: &P, base: &str) -> HarvestResult<Vec<TestCaseRef>> {
        let mut links = Vec::new();
        for selector in &self.extraction.link_selectors {
            links = bounded("link lookup", self.timing.step_timeout(), page.query_all(selector))
                .await?;
            if !links.is_empty() {
                debug!("Found {} test case links with '{}'", links.len(), selector);
                break;
            }
        }

        let mut cases = Vec::with_capacity(links.len());
        for (i, link) in links.iter().enumerate() {
            match self.read_link(link, base).await {
                Some(case) => {
                    debug!("  {}. {}", i + 1, case.id);
                    cases.push(case);
                }
                None => debug!("  {}. skipped (stale or incomplete link)", i + 1),
            }
        }
        Ok(cases)
    }

    /// One link into a reference; `None` when the element went stale
    async fn read_link<E: Element>(&self, link: &E, base: &str) -> Option<TestCaseRef> {
        let id = link.text().await.ok()??.trim().to_string();
        if id.is_empty() {
            return None;
        }
        let href = link.attribute("href").await.ok()??;

        let display_name = match link
            .related_text(&self.extraction.row_selector, &self.extraction.name_cell_selector)
            .await
        {
            Ok(Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
            _ => id.clone(),
        };

        Some(TestCaseRef {
            navigation_target: resolve_target(base, &href),
            id,
            display_name,
        })
    }
}

async fn is_disabled<E: Element>(control: &E) -> bool {
    let disabled = control.attribute("disabled").await.ok().flatten().is_some();
    let aria = control.attribute("aria-disabled").await.ok().flatten();
    disabled || aria.as_deref() == Some("true")
}

/// Absolute target for an href, relative to the listing page
pub fn resolve_target(base: &str, href: &str) -> String {
    match Url::parse(href) {
        Ok(url) => url.to_string(),
        Err(_) => Url::parse(base)
            .and_then(|b| b.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
    }
}

fn cases_from_keys(keys: &[String], template: &str) -> Vec<TestCaseRef> {
    keys.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| TestCaseRef::new(k, k, template.replace(KEY_PLACEHOLDER, k)))
        .collect()
}

/// Drop repeated ids, keeping the first occurrence
fn dedupe(cases: Vec<TestCaseRef>) -> Vec<TestCaseRef> {
    let mut seen = HashSet::new();
    cases
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.id.clone());
            if !fresh {
                debug!("Dropping duplicate {}", c.id);
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_target() {
        let base = "https://example.atlassian.net/projects/XPM?selectedItem=x#!/v2/testCases";
        assert_eq!(
            resolve_target(base, "/testCase/XPM-T1"),
            "https://example.atlassian.net/testCase/XPM-T1"
        );
        assert_eq!(
            resolve_target(base, "https://other.example.com/tc/1"),
            "https://other.example.com/tc/1"
        );
    }

    #[test]
    fn test_resolve_target_without_usable_base() {
        assert_eq!(resolve_target("about:blank", "/tc/T-1"), "/tc/T-1");
    }

    #[test]
    fn test_keys_are_deduped_in_order() {
        let keys: Vec<String> = ["XPM-T4621", "XPM-T4617", "XPM-T4621", " ", "XPM-T4615"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cases = dedupe(cases_from_keys(&keys, "https://example.com/testCase/{key}"));
        let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["XPM-T4621", "XPM-T4617", "XPM-T4615"]);
        assert_eq!(cases[0].navigation_target, "https://example.com/testCase/XPM-T4621");
    }

    #[test]
    fn test_namespace_filter_matches_id_or_name() {
        let filter = namespace_filter("AIM");
        assert!(filter(&TestCaseRef::new("AIM-1", "x", "/")));
        assert!(filter(&TestCaseRef::new("XPM-T1", "Aim check-in", "/")));
        assert!(!filter(&TestCaseRef::new("XPM-T2", "Registration", "/")));
    }

    #[test]
    fn test_filter_relaxes_when_nothing_matches() {
        let enumerator = Enumerator::new(
            ExtractionConfig::default(),
            PaginationConfig::default(),
            TimingConfig::default(),
        )
        .with_filter(namespace_filter("AIM"));

        let cases = vec![
            TestCaseRef::new("XPM-T1", "Login", "/tc/1"),
            TestCaseRef::new("XPM-T2", "Search", "/tc/2"),
        ];
        let (kept, relaxed) = enumerator.apply_filter(cases.clone());
        assert!(relaxed);
        assert_eq!(kept, cases);

        let mut mixed = cases;
        mixed.push(TestCaseRef::new("XPM-T3", "AIM intake", "/tc/3"));
        let (kept, relaxed) = enumerator.apply_filter(mixed);
        assert!(!relaxed);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "XPM-T3");
    }

    #[test]
    fn test_fallback_title() {
        assert_eq!(TestCaseRef::new("T-1", "  ", "/").fallback_title(), "T-1");
        assert_eq!(TestCaseRef::new("T-1", "Login", "/").fallback_title(), "Login");
    }
}
