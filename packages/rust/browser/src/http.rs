//! Static-document page session over HTTP.
//!
//! [`HttpSession`] fetches pages with `reqwest` and resolves locators with
//! `scraper` CSS selectors. Documents are complete on load, so scrolling and
//! settle waits are no-ops. Form interaction is modelled as query parameters:
//! `fill` stages a parameter and `press("Enter")` (or clicking a non-link
//! element) submits them as a GET on the current location.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use linkscout_shared::{BrowserConfig, LinkScoutError, Result};

use crate::session::{ElementHandle, PageSession};

/// Query parameter used when a filled input has no `name` attribute.
const DEFAULT_QUERY_PARAM: &str = "keywords";

// ---------------------------------------------------------------------------
// HttpSession
// ---------------------------------------------------------------------------

/// Page session backed by plain HTTP requests.
pub struct HttpSession {
    client: Client,
    current: Option<Url>,
    document: String,
    staged: Vec<(String, String)>,
    closed: bool,
}

impl HttpSession {
    /// Build a session with the configured user agent and timeout.
    ///
    /// `cookie_header` is sent verbatim on every request.
    pub fn new(config: &BrowserConfig, cookie_header: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookies) = cookie_header.filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cookies)
                .map_err(|e| LinkScoutError::Session(format!("invalid cookie header: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| LinkScoutError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            current: None,
            document: String::new(),
            staged: Vec::new(),
            closed: false,
        })
    }

    fn resolve(&self, target: &str) -> Result<Url> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.current.as_ref().ok_or_else(|| {
                    LinkScoutError::navigation(format!("no base for relative URL {target}"))
                })?;
                base.join(target)
                    .map_err(|e| LinkScoutError::navigation(format!("invalid URL {target}: {e}")))
            }
            Err(e) => Err(LinkScoutError::navigation(format!("invalid URL {target}: {e}"))),
        }
    }

    /// Submit staged parameters as a GET on the current location.
    async fn submit_staged(&mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            return Ok(());
        }

        let mut target = self
            .current
            .clone()
            .ok_or_else(|| LinkScoutError::navigation("nothing to submit: no page loaded"))?;

        let kept: Vec<(String, String)> = target
            .query_pairs()
            .filter(|(k, _)| !staged.iter().any(|(s, _)| s == k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        target
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .extend_pairs(staged);

        debug!(%target, "submitting staged query");
        self.navigate(target.as_str()).await.map(|_| ())
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<String> {
        if self.closed {
            return Err(LinkScoutError::navigation("session is closed"));
        }
        let target = self.resolve(url)?;
        debug!(%target, "navigating");

        let response = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|e| classify_send_error(&target, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&target, status));
        }

        let location = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| LinkScoutError::transient(format!("{target}: body read failed: {e}")))?;

        self.document = body;
        self.current = Some(location.clone());
        self.staged.clear();
        Ok(location.to_string())
    }

    fn current_url(&self) -> String {
        self.current
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| "about:blank".into())
    }

    async fn locate(&self, candidates: &[&str]) -> Result<Option<Box<dyn ElementHandle>>> {
        let found = select_first(&self.document, candidates)
            .map(|el| Box::new(el) as Box<dyn ElementHandle>);
        Ok(found)
    }

    async fn locate_all(&self, candidates: &[&str]) -> Result<Vec<Box<dyn ElementHandle>>> {
        let found = select_all(&self.document, candidates)
            .into_iter()
            .map(|el| Box::new(el) as Box<dyn ElementHandle>)
            .collect();
        Ok(found)
    }

    async fn click(&mut self, element: &dyn ElementHandle) -> Result<()> {
        if let Some(href) = element.attribute("href").await? {
            let target = self.resolve(&href)?;
            self.navigate(target.as_str()).await?;
            return Ok(());
        }
        self.submit_staged().await
    }

    async fn fill(&mut self, element: &dyn ElementHandle, text: &str) -> Result<()> {
        let name = element
            .attribute("name")
            .await?
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_QUERY_PARAM.to_string());
        self.staged.retain(|(k, _)| *k != name);
        self.staged.push((name, text.to_string()));
        Ok(())
    }

    async fn press(&mut self, key: &str) -> Result<()> {
        if key == "Enter" {
            return self.submit_staged().await;
        }
        debug!(key, "ignoring key press on static document");
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        Ok(())
    }

    async fn wait_millis(&mut self, _millis: u64) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.document.clear();
        self.staged.clear();
        debug!("http session closed");
        Ok(())
    }
}

fn classify_status(url: &Url, status: StatusCode) -> LinkScoutError {
    let message = format!("{url}: HTTP {status}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        LinkScoutError::transient(message)
    } else {
        LinkScoutError::navigation(message)
    }
}

fn classify_send_error(url: &Url, err: &reqwest::Error) -> LinkScoutError {
    let message = format!("{url}: {err}");
    if err.is_timeout() || err.is_connect() {
        LinkScoutError::transient(message)
    } else {
        LinkScoutError::navigation(message)
    }
}

// ---------------------------------------------------------------------------
// Selection (sync; `Html` never crosses an await)
// ---------------------------------------------------------------------------

fn parse_candidates<'a>(candidates: &'a [&'a str]) -> impl Iterator<Item = Selector> + 'a {
    candidates.iter().filter_map(|c| match Selector::parse(c) {
        Ok(sel) => Some(sel),
        Err(_) => {
            debug!(candidate = *c, "skipping unparseable locator");
            None
        }
    })
}

fn select_first(document: &str, candidates: &[&str]) -> Option<ScrapedElement> {
    if document.is_empty() {
        return None;
    }
    let doc = Html::parse_document(document);
    parse_candidates(candidates)
        .find_map(|sel| doc.select(&sel).next())
        .map(ScrapedElement::from_element)
}

fn select_all(document: &str, candidates: &[&str]) -> Vec<ScrapedElement> {
    if document.is_empty() {
        return Vec::new();
    }
    let doc = Html::parse_document(document);
    for sel in parse_candidates(candidates) {
        let matches: Vec<ScrapedElement> =
            doc.select(&sel).map(ScrapedElement::from_element).collect();
        if !matches.is_empty() {
            return matches;
        }
    }
    Vec::new()
}

// ---------------------------------------------------------------------------
// ScrapedElement
// ---------------------------------------------------------------------------

/// Owned snapshot of a matched element.
#[derive(Debug, Clone)]
pub struct ScrapedElement {
    html: String,
    text: String,
    attrs: Vec<(String, String)>,
}

impl ScrapedElement {
    fn from_element(el: ElementRef<'_>) -> Self {
        let text = el.text().collect::<Vec<_>>().join(" ");
        Self {
            html: el.html(),
            text: text.trim().to_string(),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Snapshot the first element of an HTML fragment.
    pub fn from_fragment(html: &str) -> Option<Self> {
        let fragment = Html::parse_fragment(html);
        let root = fragment.root_element();
        root.children()
            .filter_map(ElementRef::wrap)
            .next()
            .map(Self::from_element)
    }

    fn find_in_fragment(&self, candidates: &[&str]) -> Option<ScrapedElement> {
        let fragment = Html::parse_fragment(&self.html);
        parse_candidates(candidates)
            .find_map(|sel| fragment.select(&sel).next())
            .map(ScrapedElement::from_element)
    }
}

#[async_trait]
impl ElementHandle for ScrapedElement {
    async fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    async fn find(&self, candidates: &[&str]) -> Result<Option<Box<dyn ElementHandle>>> {
        Ok(self
            .find_in_fragment(candidates)
            .map(|el| Box::new(el) as Box<dyn ElementHandle>))
    }
}
