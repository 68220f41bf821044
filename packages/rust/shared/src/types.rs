//! Core domain types for LinkScout searches.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Score assigned when the relevance score is missing or unparseable.
pub const UNCERTAIN_SCORE: f64 = 0.5;

// ---------------------------------------------------------------------------
// SearchRunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single search run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchRunId(pub Uuid);

impl SearchRunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SearchRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SearchRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SearchRunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// SearchCriteria
// ---------------------------------------------------------------------------

/// Network distance between the user and a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDegree {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd+")]
    ThirdPlus,
}

impl std::fmt::Display for ConnectionDegree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::First => "1st",
            Self::Second => "2nd",
            Self::ThirdPlus => "3rd+",
        };
        f.write_str(s)
    }
}

/// What the user is looking for. Immutable once a search starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Human-readable name for this search.
    pub name: String,
    #[serde(default)]
    pub companies: Vec<String>,
    #[serde(default)]
    pub job_titles: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub seniority_levels: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    /// Positive match keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Keywords that should count against a profile.
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_degree: Option<ConnectionDegree>,
}

impl SearchCriteria {
    /// Create empty criteria with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// UserContext
// ---------------------------------------------------------------------------

/// Free-form description of the user (background, interests, current role).
///
/// Passed through to prompts unmodified; the pipeline never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserContext(BTreeMap<String, serde_json::Value>);

impl UserContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Free-text background, empty when absent.
    pub fn background(&self) -> String {
        self.string_field("background")
    }

    /// Current role, empty when absent.
    pub fn current_role(&self) -> String {
        self.string_field("current_role")
    }

    /// Interests as a list. A single string value becomes a one-element list.
    pub fn interests(&self) -> Vec<String> {
        match self.0.get("interests") {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    fn string_field(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// RawProfileRecord
// ---------------------------------------------------------------------------

/// An unscored profile extracted from a listing card.
///
/// The extractor only emits records whose `name` and `title` are non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProfileRecord {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    /// Injected by the orchestrator, never by the extractor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl RawProfileRecord {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            location: None,
            profile_url: None,
            company: None,
        }
    }

    /// Attach the company this record was found under.
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Key used to make sure a person is scored at most once per run.
    pub fn identity_key(&self) -> String {
        match &self.profile_url {
            Some(url) => url.clone(),
            None => format!(
                "{}|{}|{}",
                self.name.to_lowercase(),
                self.title.to_lowercase(),
                self.company.as_deref().unwrap_or("").to_lowercase()
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// EvaluationResult
// ---------------------------------------------------------------------------

/// The scorer's inclusion decision for one raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub should_include: bool,
    /// Always within `[0.0, 1.0]`.
    #[serde(default = "uncertain_score", deserialize_with = "lenient_score")]
    pub relevance_score: f64,
    #[serde(default)]
    pub matching_criteria: Vec<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub potential_connection_points: Vec<String>,
}

impl EvaluationResult {
    /// Decision used when the scorer's reply cannot be parsed.
    ///
    /// Includes the record with an uncertain score; a reviewer can discard a
    /// false positive, a silently dropped record is never seen again.
    pub fn conservative_fallback() -> Self {
        Self {
            should_include: true,
            relevance_score: UNCERTAIN_SCORE,
            matching_criteria: vec!["basic match".into()],
            reasons: vec!["Could not parse detailed analysis".into()],
            potential_connection_points: vec!["Similar role".into()],
        }
    }
}

fn uncertain_score() -> f64 {
    UNCERTAIN_SCORE
}

/// Accept numbers and numeric strings; anything else is "uncertain". Clamp to `[0, 1]`.
fn lenient_score<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(normalize_score(raw))
}

/// Map an optional raw score into the valid range.
pub fn normalize_score(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => UNCERTAIN_SCORE,
    }
}

// ---------------------------------------------------------------------------
// Justification / Contact
// ---------------------------------------------------------------------------

/// Short natural-language reason to reach out to a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Justification {
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_angle: Option<String>,
}

impl Justification {
    /// Deterministic justification built from the matched criteria.
    pub fn templated(matching_criteria: &[String]) -> Self {
        let joined = if matching_criteria.is_empty() {
            "criteria".to_string()
        } else {
            matching_criteria.join(", ")
        };
        Self {
            justification: format!("Matches {joined}"),
            connection_angle: None,
        }
    }
}

/// A finalized, scored and justified search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    pub relevance_score: f64,
    #[serde(default)]
    pub matching_criteria: Vec<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub potential_connection_points: Vec<String>,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_angle: Option<String>,
}

impl Contact {
    /// Assemble a contact from its raw record, evaluation and justification.
    pub fn assemble(
        record: RawProfileRecord,
        evaluation: EvaluationResult,
        justification: Justification,
    ) -> Self {
        Self {
            name: record.name,
            title: record.title,
            company: record.company.unwrap_or_default(),
            location: record.location,
            profile_url: record.profile_url,
            relevance_score: normalize_score(Some(evaluation.relevance_score)),
            matching_criteria: evaluation.matching_criteria,
            reasons: evaluation.reasons,
            potential_connection_points: evaluation.potential_connection_points,
            justification: justification.justification,
            connection_angle: justification.connection_angle,
        }
    }

    /// Key used by exporters to attach justifications to a contact.
    pub fn export_key(&self) -> String {
        match &self.profile_url {
            Some(url) => url.clone(),
            None => format!("{} @ {}", self.name, self.company),
        }
    }
}

// ---------------------------------------------------------------------------
// SearchOptions
// ---------------------------------------------------------------------------

/// Bounds and context for one orchestrated search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub companies: Vec<String>,
    /// Global result limit across all companies.
    pub limit: usize,
    /// Maximum contacts contributed by a single company.
    pub results_per_company: usize,
    #[serde(default)]
    pub user_context: UserContext,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            companies: Vec::new(),
            limit: 50,
            results_per_company: 20,
            user_context: UserContext::default(),
        }
    }
}
