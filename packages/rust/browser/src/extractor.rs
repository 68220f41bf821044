//! Selector-fallback extraction of profile records from listing cards.
//!
//! Each field has an ordered [`FieldChain`] of [`Strategy`] values. The
//! first strategy that yields a non-empty, whitespace-normalized value wins;
//! fields are resolved independently.

use std::sync::LazyLock;

use regex::Regex;

use linkscout_shared::{RawProfileRecord, Result};

use crate::session::ElementHandle;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One way of reading a field out of a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Text content of the first descendant matching `locator`.
    Text { locator: &'static str },
    /// Attribute `name` of the first descendant matching `locator`.
    Attribute {
        locator: &'static str,
        name: &'static str,
    },
}

impl Strategy {
    async fn apply(&self, card: &dyn ElementHandle) -> Result<Option<String>> {
        let raw = match self {
            Self::Text { locator } => match card.find(&[*locator]).await? {
                Some(el) => Some(el.text().await?),
                None => None,
            },
            Self::Attribute { locator, name } => match card.find(&[*locator]).await? {
                Some(el) => el.attribute(*name).await?,
                None => None,
            },
        };
        Ok(raw
            .map(|v| normalize_whitespace(&v))
            .filter(|v| !v.is_empty()))
    }
}

/// Ordered strategies for a single field.
#[derive(Debug, Clone, Default)]
pub struct FieldChain(pub Vec<Strategy>);

impl FieldChain {
    /// Text strategies for each locator, in order.
    pub fn text(locators: &[&'static str]) -> Self {
        Self(
            locators
                .iter()
                .map(|&locator| Strategy::Text { locator })
                .collect(),
        )
    }

    /// Attribute strategies for each locator, in order.
    pub fn attribute(locators: &[&'static str], name: &'static str) -> Self {
        Self(
            locators
                .iter()
                .map(|&locator| Strategy::Attribute { locator, name })
                .collect(),
        )
    }

    /// First non-empty value produced by the chain.
    pub async fn resolve(&self, card: &dyn ElementHandle) -> Result<Option<String>> {
        for strategy in &self.0 {
            if let Some(value) = strategy.apply(card).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// ProfileExtractor
// ---------------------------------------------------------------------------

/// Turns one profile card into a [`RawProfileRecord`].
#[derive(Debug, Clone)]
pub struct ProfileExtractor {
    pub name: FieldChain,
    pub title: FieldChain,
    pub profile_url: FieldChain,
    pub location: FieldChain,
}

impl Default for ProfileExtractor {
    fn default() -> Self {
        Self {
            name: FieldChain::text(&[
                r#"h3 a span[aria-hidden="true"]"#,
                ".entity-result__title-text a span:first-child",
                ".artdeco-entity-lockup__title a",
                ".artdeco-entity-lockup__title",
            ]),
            title: FieldChain::text(&[
                ".entity-result__primary-subtitle",
                ".artdeco-entity-lockup__subtitle",
                r#"[data-test-id="people-card-subtitle"]"#,
            ]),
            profile_url: FieldChain::attribute(
                &[
                    "h3 a",
                    ".entity-result__title-text a",
                    ".artdeco-entity-lockup__title a",
                ],
                "href",
            ),
            location: FieldChain::text(&[
                ".entity-result__secondary-subtitle",
                ".artdeco-entity-lockup__caption",
            ]),
        }
    }
}

impl ProfileExtractor {
    /// Extract a record, or `None` when name or title is missing.
    ///
    /// Handle errors propagate; the caller decides whether to skip the card.
    pub async fn extract_one(&self, card: &dyn ElementHandle) -> Result<Option<RawProfileRecord>> {
        let Some(name) = self.name.resolve(card).await? else {
            return Ok(None);
        };
        let Some(title) = self.title.resolve(card).await? else {
            return Ok(None);
        };

        let mut record = RawProfileRecord::new(name, title);
        record.profile_url = self.profile_url.resolve(card).await?;
        record.location = self.location.resolve(card).await?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ScrapedElement;
    use linkscout_shared::LinkScoutError;

    fn card(html: &str) -> ScrapedElement {
        ScrapedElement::from_fragment(html).expect("fixture card")
    }

    #[test]
    fn whitespace_is_collapsed() {
        let collapsed = normalize_whitespace("  Ada \n\t Lovelace  ");
        assert_eq!(collapsed, "Ada Lovelace");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[tokio::test]
    async fn extracts_all_fields_from_entity_result() {
        let card = card(
            r#"<li class="entity-result">
                <h3><a href="https://www.linkedin.com/in/ada">
                    <span aria-hidden="true">Ada
                        Lovelace</span>
                    <span class="visually-hidden">View profile</span>
                </a></h3>
                <div class="entity-result__primary-subtitle"> Staff Engineer </div>
                <div class="entity-result__secondary-subtitle">London</div>
            </li>"#,
        );

        let record = ProfileExtractor::default()
            .extract_one(&card)
            .await
            .unwrap()
            .expect("record");
        assert_eq!(record.name, "Ada Lovelace");
        assert_eq!(record.title, "Staff Engineer");
        assert_eq!(record.location.as_deref(), Some("London"));
        let url = record.profile_url.as_deref();
        assert_eq!(url, Some("https://www.linkedin.com/in/ada"));
        assert!(record.company.is_none());
    }

    #[tokio::test]
    async fn later_strategy_wins_when_earlier_is_empty() {
        let card = card(
            r#"<div class="artdeco-entity-lockup">
                <h3><a href="/in/grace"><span aria-hidden="true">   </span></a></h3>
                <div class="artdeco-entity-lockup__title"><a href="/in/grace">Grace Hopper</a></div>
                <div class="artdeco-entity-lockup__subtitle">Rear Admiral</div>
            </div>"#,
        );

        let record = ProfileExtractor::default()
            .extract_one(&card)
            .await
            .unwrap()
            .expect("record");
        assert_eq!(record.name, "Grace Hopper");
        assert_eq!(record.title, "Rear Admiral");
        assert_eq!(record.profile_url.as_deref(), Some("/in/grace"));
        assert!(record.location.is_none());
    }

    #[tokio::test]
    async fn missing_title_yields_none() {
        let card = card(
            r#"<li class="entity-result">
                <h3><a href="/in/x"><span aria-hidden="true">No Title</span></a></h3>
            </li>"#,
        );
        let record = ProfileExtractor::default().extract_one(&card).await;
        assert!(record.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_name_yields_none() {
        let card = card(
            r#"<li class="entity-result">
                <div class="entity-result__primary-subtitle">Engineer</div>
            </li>"#,
        );
        let record = ProfileExtractor::default().extract_one(&card).await;
        assert!(record.unwrap().is_none());
    }

    struct BrokenCard;

    #[async_trait::async_trait]
    impl ElementHandle for BrokenCard {
        async fn text(&self) -> Result<String> {
            Err(LinkScoutError::Extraction("detached".into()))
        }
        async fn attribute(&self, _name: &str) -> Result<Option<String>> {
            Err(LinkScoutError::Extraction("detached".into()))
        }
        async fn find(&self, _candidates: &[&str]) -> Result<Option<Box<dyn ElementHandle>>> {
            Err(LinkScoutError::Extraction("detached".into()))
        }
    }

    #[tokio::test]
    async fn handle_errors_propagate() {
        let err = ProfileExtractor::default()
            .extract_one(&BrokenCard)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("detached"));
    }
}
