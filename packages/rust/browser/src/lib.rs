//! Page automation, listing navigation, and profile extraction.
//!
//! This crate provides:
//! - [`session`]: the [`PageSession`] / [`ElementHandle`] seam
//! - [`http`]: [`HttpSession`], a static-document session over `reqwest` + `scraper`
//! - [`extractor`]: selector-fallback extraction of profile cards
//! - [`navigator`]: [`ListingNavigator`], the [`CompanyListing`] used by the orchestrator
//! - [`session_store`]: saved storage-state handling

pub mod extractor;
pub mod http;
pub mod navigator;
pub mod session;
pub mod session_store;

pub use extractor::{FieldChain, ProfileExtractor, Strategy, normalize_whitespace};
pub use http::{HttpSession, ScrapedElement};
pub use navigator::{CompanyListing, ListingNavigator, slugify};
pub use session::{ElementHandle, PageSession};
pub use session_store::{SessionInfo, SessionStore, StorageState, StoredCookie};
