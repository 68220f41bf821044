//! Saved-session storage.
//!
//! A session is a browser-exported storage-state JSON file (cookies plus
//! per-origin storage). LinkScout never logs in on its own: the user exports
//! the state from a real browser and imports it once.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use linkscout_shared::{LinkScoutError, Result};

/// File name of the storage state inside the session directory.
pub const STORAGE_STATE_FILE: &str = "linkedin_storage_state.json";

/// Cookie domain that marks a session as usable.
pub const DEFAULT_SITE_DOMAIN: &str = "linkedin.com";

/// Environment variables checked when reporting credential status.
pub const EMAIL_ENV: &str = "LINKEDIN_EMAIL";
pub const PASSWORD_ENV: &str = "LINKEDIN_PASSWORD";

// ---------------------------------------------------------------------------
// Storage state
// ---------------------------------------------------------------------------

/// One stored cookie. Unknown fields are preserved on re-export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Browser storage state as exported by automation tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

impl StorageState {
    /// Parse a storage-state document.
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| LinkScoutError::Session(format!("invalid storage state: {e}")))
    }

    fn site_cookies<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a StoredCookie> + 'a {
        self.cookies.iter().filter(move |c| c.domain.contains(domain))
    }

    /// Whether any cookie belongs to `domain`.
    pub fn has_site_cookies(&self, domain: &str) -> bool {
        self.site_cookies(domain).next().is_some()
    }

    /// `Cookie` header value for requests to `domain`.
    pub fn cookie_header(&self, domain: &str) -> String {
        self.site_cookies(domain)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Summary of the saved session, as shown by `linkscout session show`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub has_valid_session: bool,
    pub has_credentials: bool,
    pub storage_state_exists: bool,
    pub session_file: PathBuf,
}

/// Reads and writes the storage-state file in a session directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    site_domain: String,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            site_domain: DEFAULT_SITE_DOMAIN.to_string(),
        }
    }

    /// Use a different cookie domain to decide session validity.
    pub fn with_site_domain(mut self, domain: impl Into<String>) -> Self {
        self.site_domain = domain.into();
        self
    }

    pub fn storage_state_path(&self) -> PathBuf {
        self.dir.join(STORAGE_STATE_FILE)
    }

    /// Load the saved storage state.
    pub fn load_state(&self) -> Result<StorageState> {
        let path = self.storage_state_path();
        if !path.exists() {
            return Err(LinkScoutError::Session(format!(
                "no saved session at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| LinkScoutError::io(&path, e))?;
        StorageState::parse(&content)
    }

    /// True when a storage state with site cookies exists.
    pub fn has_valid_session(&self) -> bool {
        let path = self.storage_state_path();
        if !path.exists() {
            debug!(?path, "no storage state file found");
            return false;
        }
        match self.load_state() {
            Ok(state) => {
                let valid = state.has_site_cookies(&self.site_domain);
                debug!(valid, domain = %self.site_domain, "session validation");
                valid
            }
            Err(e) => {
                warn!(error = %e, "session validation failed");
                false
            }
        }
    }

    /// `Cookie` header for the saved session, if it is valid.
    pub fn cookie_header(&self) -> Result<String> {
        let state = self.load_state()?;
        if !state.has_site_cookies(&self.site_domain) {
            return Err(LinkScoutError::Session(format!(
                "saved session has no {} cookies",
                self.site_domain
            )));
        }
        Ok(state.cookie_header(&self.site_domain))
    }

    /// Copy a browser-exported storage state into the session directory.
    pub fn import(&self, source: &Path) -> Result<PathBuf> {
        let content =
            std::fs::read_to_string(source).map_err(|e| LinkScoutError::io(source, e))?;
        let state = StorageState::parse(&content)?;
        if !state.has_site_cookies(&self.site_domain) {
            return Err(LinkScoutError::Session(format!(
                "{} contains no {} cookies",
                source.display(),
                self.site_domain
            )));
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| LinkScoutError::io(&self.dir, e))?;
        let path = self.storage_state_path();
        let pretty = serde_json::to_string_pretty(&state)
            .map_err(|e| LinkScoutError::Session(e.to_string()))?;
        std::fs::write(&path, pretty).map_err(|e| LinkScoutError::io(&path, e))?;

        info!(?path, cookies = state.cookies.len(), "imported session");
        Ok(path)
    }

    /// Remove the saved session. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        let path = self.storage_state_path();
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| LinkScoutError::io(&path, e))?;
        info!(?path, "cleared session");
        Ok(true)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            has_valid_session: self.has_valid_session(),
            has_credentials: credentials_present(
                std::env::var(EMAIL_ENV).ok(),
                std::env::var(PASSWORD_ENV).ok(),
            ),
            storage_state_exists: self.storage_state_path().exists(),
            session_file: self.storage_state_path(),
        }
    }
}

fn credentials_present(email: Option<String>, password: Option<String>) -> bool {
    matches!((email, password), (Some(e), Some(p)) if !e.is_empty() && !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = r#"{
        "cookies": [
            {
                "name": "li_at", "value": "abc", "domain": ".www.linkedin.com",
                "path": "/", "httpOnly": true
            },
            {"name": "JSESSIONID", "value": "xyz", "domain": ".linkedin.com", "path": "/"},
            {"name": "other", "value": "1", "domain": "example.com"}
        ],
        "origins": []
    }"#;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ls-{tag}-{}", uuid::Uuid::now_v7()))
    }

    #[test]
    fn cookie_header_filters_by_domain() {
        let state = StorageState::parse(STATE).unwrap();
        assert!(state.has_site_cookies("linkedin.com"));
        let header = state.cookie_header("linkedin.com");
        assert_eq!(header, "li_at=abc; JSESSIONID=xyz");
        assert_eq!(state.cookie_header("example.com"), "other=1");
    }

    #[test]
    fn missing_file_is_not_valid() {
        let store = SessionStore::new(temp_dir("session-missing"));
        assert!(!store.has_valid_session());
        assert!(store.load_state().is_err());
        assert!(!store.clear().unwrap());

        let info = store.info();
        assert!(!info.has_valid_session);
        assert!(!info.storage_state_exists);
    }

    #[test]
    fn import_then_clear() {
        let dir = temp_dir("session-import");
        let source_dir = temp_dir("session-source");
        std::fs::create_dir_all(&source_dir).unwrap();
        let source = source_dir.join("state.json");
        std::fs::write(&source, STATE).unwrap();

        let store = SessionStore::new(&dir);
        let path = store.import(&source).unwrap();
        assert_eq!(path, store.storage_state_path());
        assert!(store.has_valid_session());
        assert_eq!(store.cookie_header().unwrap(), "li_at=abc; JSESSIONID=xyz");

        // Unknown cookie fields survive the round trip.
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("httpOnly"));

        assert!(store.clear().unwrap());
        assert!(!store.has_valid_session());

        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::remove_dir_all(&source_dir);
    }

    #[test]
    fn import_rejects_state_without_site_cookies() {
        let source_dir = temp_dir("session-foreign");
        std::fs::create_dir_all(&source_dir).unwrap();
        let source = source_dir.join("state.json");
        let foreign = r#"{"cookies": [{"name": "a", "value": "b", "domain": "example.com"}]}"#;
        std::fs::write(&source, foreign).unwrap();

        let store = SessionStore::new(temp_dir("session-foreign-store"));
        let err = store.import(&source).unwrap_err();
        assert!(err.to_string().contains("no linkedin.com cookies"));
        assert!(!store.storage_state_path().exists());

        let _ = std::fs::remove_dir_all(&source_dir);
    }

    #[test]
    fn corrupt_state_is_not_valid() {
        let dir = temp_dir("session-corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let store = SessionStore::new(&dir);
        std::fs::write(store.storage_state_path(), "{not json").unwrap();

        assert!(!store.has_valid_session());
        assert!(store.cookie_header().is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn credentials_require_both_values() {
        assert!(credentials_present(Some("a@b.c".into()), Some("pw".into())));
        assert!(!credentials_present(Some("a@b.c".into()), None));
        assert!(!credentials_present(Some(String::new()), Some("pw".into())));
    }
}
