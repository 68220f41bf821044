//! Page automation abstraction.
//!
//! A [`PageSession`] is a single, exclusively owned page that can be driven
//! by the navigator. Locators are passed as ordered candidate lists: the
//! first candidate that matches wins, and a candidate the engine cannot parse
//! is skipped rather than treated as an error.

use async_trait::async_trait;

use linkscout_shared::Result;

/// A located element on the current page.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Visible text content, unnormalized.
    async fn text(&self) -> Result<String>;

    /// Value of an attribute, `None` when absent.
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// First descendant matching one of the candidate locators.
    async fn find(&self, candidates: &[&str]) -> Result<Option<Box<dyn ElementHandle>>>;
}

/// One page driven sequentially by a single owner.
#[async_trait]
pub trait PageSession: Send {
    /// Load `url` and return the resulting location (after redirects).
    async fn navigate(&mut self, url: &str) -> Result<String>;

    /// The current location.
    fn current_url(&self) -> String;

    /// First element matching one of the candidates.
    async fn locate(&self, candidates: &[&str]) -> Result<Option<Box<dyn ElementHandle>>>;

    /// All elements matching the first candidate that matches anything.
    async fn locate_all(&self, candidates: &[&str]) -> Result<Vec<Box<dyn ElementHandle>>>;

    async fn click(&mut self, element: &dyn ElementHandle) -> Result<()>;

    async fn fill(&mut self, element: &dyn ElementHandle, text: &str) -> Result<()>;

    /// Press a named key (e.g. `"Enter"`).
    async fn press(&mut self, key: &str) -> Result<()>;

    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Let the page settle for the given number of milliseconds.
    async fn wait_millis(&mut self, millis: u64) -> Result<()>;

    /// Release the page. Further calls are undefined.
    async fn close(&mut self) -> Result<()>;
}
