//! Navigation to an organization's member listing and profile extraction.
//!
//! [`ListingNavigator`] owns one [`PageSession`] for a whole run and drives
//! it strictly sequentially. Every session call gets its own timeout; a
//! timeout counts as a transient failure.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use linkscout_shared::{LinkScoutError, NavigatorConfig, RawProfileRecord, Result, RetryPolicy};

use crate::extractor::ProfileExtractor;
use crate::session::PageSession;

static LISTING_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/company/[^/?#]+/people").expect("listing pattern is valid"));

const COMPANY_SEARCH_BOX: &[&str] = &[r#"input[aria-label="Search"]"#, r#"input[type="search"]"#];
const COMPANY_RESULT_LINK: &[&str] = &[
    r#"[data-test-id="search-result"] h3 a"#,
    ".entity-result__title-text a",
];
const FILTER_CONTROL: &[&str] = &[
    r#"button[aria-label*="Current company filter"]"#,
    r#"button[aria-label*="Title filter"]"#,
    r#"[data-test-id="filter-button"]"#,
];
const TITLE_INPUT: &[&str] = &[
    r#"input[placeholder*="title"]"#,
    r#"input[placeholder*="Title"]"#,
];
const APPLY_BUTTON: &[&str] = &[
    r#"button[aria-label*="Apply"]"#,
    r#"button[aria-label*="Show results"]"#,
    r#"[data-test-id="filter-apply"]"#,
];
const FREE_TEXT_SEARCH: &[&str] = &[
    r#"input[placeholder*="Search employees"]"#,
    r#"input[placeholder*="Search"]"#,
    r#"input[type="search"]"#,
];
const CARD_CONTAINERS: &[&str] = &[
    r#"[data-test-id="people-card"]"#,
    ".entity-result",
    ".search-result__info",
    ".artdeco-entity-lockup",
];

// ---------------------------------------------------------------------------
// CompanyListing
// ---------------------------------------------------------------------------

/// What the orchestrator needs from page automation.
#[async_trait]
pub trait CompanyListing: Send {
    /// Bring the session to the organization's member listing.
    async fn goto_company_listing(&mut self, company: &str) -> Result<()>;

    /// Narrow the listing to a job title. `false` means no filter was applied.
    async fn apply_job_title_filter(&mut self, job_title: &str) -> bool;

    /// Extract up to `limit` raw records from the current listing.
    async fn extract_profiles(&mut self, limit: usize) -> Result<Vec<RawProfileRecord>>;

    /// Release the underlying session.
    async fn close(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ListingNavigator
// ---------------------------------------------------------------------------

/// [`CompanyListing`] implementation over a [`PageSession`].
pub struct ListingNavigator {
    session: Box<dyn PageSession>,
    extractor: ProfileExtractor,
    config: NavigatorConfig,
    retry: RetryPolicy,
    listing_url: Option<String>,
}

impl ListingNavigator {
    pub fn new(session: Box<dyn PageSession>, config: NavigatorConfig, retry: RetryPolicy) -> Self {
        Self {
            session,
            extractor: ProfileExtractor::default(),
            config,
            retry,
            listing_url: None,
        }
    }

    /// Location of the listing the navigator last landed on.
    pub fn listing_url(&self) -> Option<&str> {
        self.listing_url.as_deref()
    }

    fn limit(&self) -> Duration {
        self.config.call_timeout
    }

    async fn try_goto(&mut self, company: &str) -> Result<String> {
        let slug = slugify(company);
        let direct = format!("{}/company/{slug}/people/", self.config.base_url);
        let limit = self.limit();

        match with_timeout(limit, "navigate", self.session.navigate(&direct)).await {
            Ok(location) if is_listing(&location) => return Ok(location),
            Ok(location) => debug!(%location, "direct URL did not land on a listing"),
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => debug!(error = %e, "direct URL failed"),
        }

        info!(company, "searching for organization");
        self.search_for_company(company).await
    }

    async fn search_for_company(&mut self, company: &str) -> Result<String> {
        let limit = self.limit();
        let not_found = || LinkScoutError::navigation(format!("organization not found: {company}"));

        let search_url = format!("{}/search/results/companies/", self.config.base_url);
        with_timeout(limit, "navigate", self.session.navigate(&search_url)).await?;

        let search_box = with_timeout(limit, "locate", self.session.locate(COMPANY_SEARCH_BOX))
            .await?
            .ok_or_else(not_found)?;
        let fill = self.session.fill(search_box.as_ref(), company);
        with_timeout(limit, "fill", fill).await?;
        with_timeout(limit, "press", self.session.press("Enter")).await?;

        let result = with_timeout(limit, "locate", self.session.locate(COMPANY_RESULT_LINK))
            .await?
            .ok_or_else(not_found)?;
        let href = with_timeout(limit, "attribute", result.attribute("href"))
            .await?
            .filter(|h| !h.is_empty())
            .ok_or_else(not_found)?;

        let company_url = resolve_against(&self.session.current_url(), &href);
        let people_url = format!("{}/people/", company_url.trim_end_matches('/'));
        let location = with_timeout(limit, "navigate", self.session.navigate(&people_url)).await?;

        if is_listing(&location) {
            Ok(location)
        } else {
            Err(LinkScoutError::navigation(format!(
                "{company}: search result did not lead to a member listing ({location})"
            )))
        }
    }

    /// Structured filter UI. `Ok(false)` when the page has no such control.
    async fn structured_filter(&mut self, job_title: &str) -> Result<bool> {
        let limit = self.limit();

        let control = with_timeout(limit, "locate", self.session.locate(FILTER_CONTROL)).await?;
        let Some(control) = control else {
            return Ok(false);
        };
        with_timeout(limit, "click", self.session.click(control.as_ref())).await?;

        let input = with_timeout(limit, "locate", self.session.locate(TITLE_INPUT)).await?;
        let Some(input) = input else {
            return Ok(false);
        };
        with_timeout(limit, "fill", self.session.fill(input.as_ref(), job_title)).await?;
        with_timeout(limit, "press", self.session.press("Enter")).await?;

        let apply = with_timeout(limit, "locate", self.session.locate(APPLY_BUTTON)).await?;
        if let Some(apply) = apply {
            with_timeout(limit, "click", self.session.click(apply.as_ref())).await?;
        }
        self.settle().await?;
        Ok(true)
    }

    /// In-page free-text search fallback.
    async fn free_text_filter(&mut self, job_title: &str) -> Result<bool> {
        let limit = self.limit();

        let input = with_timeout(limit, "locate", self.session.locate(FREE_TEXT_SEARCH)).await?;
        let Some(input) = input else {
            return Ok(false);
        };
        let query = job_title.to_lowercase();
        with_timeout(limit, "fill", self.session.fill(input.as_ref(), &query)).await?;
        with_timeout(limit, "press", self.session.press("Enter")).await?;
        self.settle().await?;
        Ok(true)
    }

    async fn return_to_listing(&mut self) -> Result<()> {
        let Some(listing) = self.listing_url.clone() else {
            return Ok(());
        };
        if self.session.current_url() != listing {
            debug!(%listing, "returning to listing before filtering");
            let limit = self.limit();
            with_timeout(limit, "navigate", self.session.navigate(&listing)).await?;
        }
        Ok(())
    }

    async fn settle(&mut self) -> Result<()> {
        let limit = self.limit();
        let millis = self.config.settle.as_millis() as u64;
        with_timeout(limit, "wait", self.session.wait_millis(millis)).await
    }

    /// Scroll until at least `target` cards are present or attempts run out.
    async fn scroll_to_load(&mut self, target: usize) -> Result<()> {
        let limit = self.limit();
        let mut attempts = 0;
        while attempts < self.config.max_scroll_attempts {
            with_timeout(limit, "scroll", self.session.scroll_to_bottom()).await?;
            self.settle().await?;
            let locate = self.session.locate_all(CARD_CONTAINERS);
            let count = with_timeout(limit, "locate_all", locate).await?.len();
            attempts += 1;
            if count >= target {
                break;
            }
        }
        debug!(attempts, "scrolling finished");
        Ok(())
    }
}

#[async_trait]
impl CompanyListing for ListingNavigator {
    #[instrument(skip_all, fields(company = %company))]
    async fn goto_company_listing(&mut self, company: &str) -> Result<()> {
        self.listing_url = None;
        let mut attempt = 1;
        loop {
            match self.try_goto(company).await {
                Ok(location) => {
                    info!(%location, "landed on member listing");
                    self.listing_url = Some(location);
                    return Ok(());
                }
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "navigation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[instrument(skip_all, fields(job_title = %job_title))]
    async fn apply_job_title_filter(&mut self, job_title: &str) -> bool {
        if let Err(e) = self.return_to_listing().await {
            warn!(error = %e, "could not return to listing");
            return false;
        }

        match self.structured_filter(job_title).await {
            Ok(true) => return true,
            Ok(false) => debug!("no structured filter control, trying free-text search"),
            Err(e) => warn!(error = %e, "structured filter failed, trying free-text search"),
        }

        match self.free_text_filter(job_title).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "free-text search failed");
                false
            }
        }
    }

    #[instrument(skip_all, fields(limit = limit))]
    async fn extract_profiles(&mut self, limit: usize) -> Result<Vec<RawProfileRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.scroll_to_load(limit).await?;

        let call_limit = self.limit();
        let locate = self.session.locate_all(CARD_CONTAINERS);
        let cards = with_timeout(call_limit, "locate_all", locate)
            .await
            .map_err(|e| LinkScoutError::Extraction(format!("card lookup failed: {e}")))?;
        if cards.is_empty() {
            warn!("no profile cards found");
            return Ok(Vec::new());
        }
        debug!(cards = cards.len(), "found profile cards");

        let base = self.session.current_url();
        let mut records = Vec::new();
        for (index, card) in cards.iter().take(limit).enumerate() {
            if pauses_before(index, self.config.pause_every_records) {
                tokio::time::sleep(self.config.rate_limit_delay).await;
            }
            let extract = self.extractor.extract_one(card.as_ref());
            match with_timeout(call_limit, "extract", extract).await {
                Ok(Some(mut record)) => {
                    if let Some(href) = record.profile_url.take() {
                        record.profile_url = Some(resolve_against(&base, &href));
                    }
                    records.push(record);
                }
                Ok(None) => debug!(index, "card missing name or title"),
                Err(e) => warn!(index, error = %e, "skipping card"),
            }
        }

        info!(extracted = records.len(), "extracted profiles");
        Ok(records)
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run a session call under its own timeout.
async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(LinkScoutError::timeout(operation, limit)),
    }
}

/// Whether extraction pauses before the card at `index`: once every
/// `every` records, never before the first. `every == 0` disables pausing.
fn pauses_before(index: usize, every: usize) -> bool {
    index > 0 && every > 0 && index % every == 0
}

/// URL-safe slug for an organization name.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn is_listing(location: &str) -> bool {
    LISTING_PATH.is_match(location)
}

/// Resolve `href` against `base`, leaving it untouched when either is unusable.
fn resolve_against(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
