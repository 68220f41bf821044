//! Relevance scoring and justification of raw profile records.
//!
//! Both steps go through a [`TextGenerator`] with an individual timeout.
//! Scoring degrades to [`EvaluationResult::conservative_fallback`] when the
//! reply cannot be parsed; a failed call is an error the orchestrator
//! handles per record.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use linkscout_shared::{
    EvaluationResult, GenerationConfig, Justification, LinkScoutError, RawProfileRecord, Result,
    SearchCriteria, UserContext,
};

use crate::generation::{CompletionRequest, TextGenerator};

const SCORE_SYSTEM_PROMPT: &str =
    r#"You are an expert at evaluating professional profiles for networking potential.
Analyze the profile against the search criteria and user context to determine relevance.

Return your response as valid JSON:
{
    "should_include": true/false,
    "relevance_score": 0.0-1.0,
    "matching_criteria": ["criterion1", "criterion2"],
    "reasons": ["reason1", "reason2"],
    "potential_connection_points": ["shared experience", "complementary skills"]
}"#;

const SCORE_INSTRUCTIONS: &str =
    "Analyze this profile against the search criteria and user context. \
    Consider job title match, company relevance, shared background, and networking potential. \
    Be selective: only include profiles with strong potential for meaningful connections.";

const JUSTIFY_SYSTEM_PROMPT: &str =
    r#"You are writing brief, personalized justifications for connection requests.
Create a concise 1-2 sentence explanation of why this person would be a valuable connection.

Return as JSON:
{
    "justification": "Brief explanation of connection value",
    "connection_angle": "Specific reason for reaching out"
}"#;

const JUSTIFY_INSTRUCTIONS: &str =
    "Write a brief, specific justification for why this person would be \
    valuable to connect with. Focus on mutual interests, complementary skills, \
    or shared experiences.";

const DEFAULT_JUSTIFICATION: &str = "Qualified match";
const DEFAULT_CONNECTION_ANGLE: &str = "Professional networking";

// ---------------------------------------------------------------------------
// ProfileEvaluator
// ---------------------------------------------------------------------------

/// Scores records and writes justifications using a text generator.
#[derive(Clone)]
pub struct ProfileEvaluator {
    generator: Arc<dyn TextGenerator>,
    temperature: f32,
    max_tokens: u32,
    call_timeout: Duration,
}

impl ProfileEvaluator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            call_timeout: config.call_timeout,
        }
    }

    /// Decide whether `record` is worth surfacing.
    ///
    /// Unparseable replies yield the conservative-inclusion fallback. Only a
    /// failed or timed-out call is an error ([`LinkScoutError::Scoring`]).
    #[instrument(skip_all, fields(name = %record.name))]
    pub async fn score(
        &self,
        record: &RawProfileRecord,
        criteria: &SearchCriteria,
        user_context: &UserContext,
    ) -> Result<EvaluationResult> {
        let prompt = structured_prompt(
            "Evaluate professional profile for networking relevance",
            &score_context(record, criteria, user_context),
            SCORE_INSTRUCTIONS,
        );
        let reply = self
            .generate(SCORE_SYSTEM_PROMPT, prompt, "score")
            .await
            .map_err(|e| LinkScoutError::Scoring(e.to_string()))?;

        Ok(parse_evaluation(&reply))
    }

    /// Short natural-language reason to reach out.
    ///
    /// Empty replies and failed calls are [`LinkScoutError::Justification`].
    #[instrument(skip_all, fields(name = %record.name))]
    pub async fn justify(
        &self,
        record: &RawProfileRecord,
        evaluation: &EvaluationResult,
        user_context: &UserContext,
    ) -> Result<Justification> {
        let prompt = structured_prompt(
            "Generate connection justification",
            &justify_context(record, evaluation, user_context),
            JUSTIFY_INSTRUCTIONS,
        );
        let reply = self
            .generate(JUSTIFY_SYSTEM_PROMPT, prompt, "justify")
            .await
            .map_err(|e| LinkScoutError::Justification(e.to_string()))?;

        parse_justification(&reply)
    }

    async fn generate(&self, system: &str, prompt: String, operation: &str) -> Result<String> {
        let request = CompletionRequest {
            system_prompt: Some(system.to_string()),
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        match tokio::time::timeout(self.call_timeout, self.generator.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LinkScoutError::timeout(operation, self.call_timeout)),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Task / Context / Instructions prompt layout.
pub fn structured_prompt(task: &str, context: &[(&str, String)], instructions: &str) -> String {
    let mut lines = vec![
        format!("Task: {task}"),
        String::new(),
        "Context:".to_string(),
    ];
    for (key, value) in context {
        lines.push(format!("- {key}: {value}"));
    }
    lines.extend([
        String::new(),
        "Instructions:".to_string(),
        instructions.to_string(),
        String::new(),
        "Please provide your response below:".to_string(),
    ]);
    lines.join("\n")
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn or_unknown(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

fn score_context(
    record: &RawProfileRecord,
    criteria: &SearchCriteria,
    user_context: &UserContext,
) -> Vec<(&'static str, String)> {
    let mut context = vec![
        ("profile_name", record.name.clone()),
        ("profile_title", record.title.clone()),
        ("profile_company", or_unknown(record.company.as_deref())),
        ("profile_location", or_unknown(record.location.as_deref())),
        ("target_companies", list(&criteria.companies)),
        ("target_job_titles", list(&criteria.job_titles)),
        ("target_keywords", list(&criteria.keywords)),
        ("exclude_keywords", list(&criteria.exclude_keywords)),
    ];
    if !criteria.locations.is_empty() {
        context.push(("target_locations", list(&criteria.locations)));
    }
    if !criteria.seniority_levels.is_empty() {
        let seniority = list(&criteria.seniority_levels);
        context.push(("target_seniority_levels", seniority));
    }
    if !criteria.industries.is_empty() {
        context.push(("target_industries", list(&criteria.industries)));
    }
    if let Some(degree) = criteria.connection_degree {
        context.push(("connection_degree", degree.to_string()));
    }
    context.extend([
        ("user_background", user_context.background()),
        ("user_interests", list(&user_context.interests())),
        ("user_current_role", user_context.current_role()),
    ]);
    context
}

fn justify_context(
    record: &RawProfileRecord,
    evaluation: &EvaluationResult,
    user_context: &UserContext,
) -> Vec<(&'static str, String)> {
    vec![
        ("profile_name", record.name.clone()),
        ("profile_title", record.title.clone()),
        ("profile_company", or_unknown(record.company.as_deref())),
        (
            "relevance_score",
            format!("{:.2}", evaluation.relevance_score),
        ),
        ("matching_criteria", list(&evaluation.matching_criteria)),
        (
            "potential_connection_points",
            list(&evaluation.potential_connection_points),
        ),
        ("user_current_role", user_context.current_role()),
        ("user_interests", list(&user_context.interests())),
    ]
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Outermost `{...}` span of a reply. Tolerates prose and code fences around it.
fn json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

/// Parse a scoring reply, falling back to conservative inclusion.
///
/// `should_include` is required. An object without it is treated like any
/// other unparseable reply and yields the fallback, not an exclusion.
pub fn parse_evaluation(reply: &str) -> EvaluationResult {
    let parsed = json_object(reply)
        .and_then(|obj| serde_json::from_str::<EvaluationResult>(obj).ok());
    match parsed {
        Some(evaluation) => evaluation,
        None => {
            debug!(
                reply_len = reply.len(),
                "unparseable scoring reply, using fallback"
            );
            EvaluationResult::conservative_fallback()
        }
    }
}

/// Parse a justification reply. Non-JSON text is used verbatim.
pub fn parse_justification(reply: &str) -> Result<Justification> {
    let text = reply.trim();
    if text.is_empty() {
        return Err(LinkScoutError::Justification("empty reply".into()));
    }

    let object = json_object(text)
        .and_then(|obj| serde_json::from_str::<serde_json::Value>(obj).ok())
        .filter(serde_json::Value::is_object);

    let Some(object) = object else {
        return Ok(Justification {
            justification: text.to_string(),
            connection_angle: None,
        });
    };

    let field = |name: &str, default: &str| {
        object
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    Ok(Justification {
        justification: field("justification", DEFAULT_JUSTIFICATION),
        connection_angle: Some(field("connection_angle", DEFAULT_CONNECTION_ANGLE)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use linkscout_shared::{ConnectionDegree, ErrorKind};

    fn config() -> GenerationConfig {
        GenerationConfig {
            model: "test".into(),
            endpoint: "http://localhost:11434".into(),
            temperature: 0.1,
            max_tokens: 200,
            call_timeout: Duration::from_millis(200),
        }
    }

    const INCLUDE_REPLY: &str =
        r#"{"should_include": true, "relevance_score": 0.9, "matching_criteria": ["title"]}"#;
    const JUSTIFY_REPLY: &str =
        r#"{"justification": "Similar role at Acme.", "connection_angle": "Platform work"}"#;

    fn record() -> RawProfileRecord {
        RawProfileRecord::new("Ada Lovelace", "Staff Engineer").with_company("Acme")
    }

    #[test]
    fn structured_prompt_layout() {
        let prompt = structured_prompt(
            "Do the thing",
            &[("a", "1".into()), ("b", "x, y".into())],
            "Be brief.",
        );
        let expected = concat!(
            "Task: Do the thing\n\nContext:\n- a: 1\n- b: x, y\n\n",
            "Instructions:\nBe brief.\n\nPlease provide your response below:"
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn evaluation_parses_fenced_json() {
        let reply = concat!(
            "Sure!\n```json\n",
            r#"{"should_include": false, "relevance_score": 0.2, "reasons": ["sales role"]}"#,
            "\n```"
        );
        let eval = parse_evaluation(reply);
        assert!(!eval.should_include);
        assert!((eval.relevance_score - 0.2).abs() < f64::EPSILON);
        assert_eq!(eval.reasons, vec!["sales role"]);
    }

    #[test]
    fn malformed_evaluation_falls_back() {
        for reply in ["not json at all", "{broken", "", "[0.9]"] {
            let eval = parse_evaluation(reply);
            assert!(eval.should_include, "reply {reply:?}");
            assert_eq!(eval.relevance_score, 0.5);
            assert_eq!(eval.reasons, vec!["Could not parse detailed analysis"]);
        }
    }

    #[test]
    fn evaluation_without_decision_is_included_not_dropped() {
        let eval = parse_evaluation(r#"{"relevance_score": 0.9, "reasons": ["platform"]}"#);
        assert!(eval.should_include);
        assert_eq!(eval, EvaluationResult::conservative_fallback());

        let eval = parse_evaluation(r#"{"should_include": null, "relevance_score": 0.9}"#);
        assert_eq!(eval, EvaluationResult::conservative_fallback());
    }

    #[test]
    fn evaluation_score_always_in_range() {
        for raw in ["-3", "0", "0.7", "1", "42", "\"NaN\"", "null", "\"abc\""] {
            let reply = format!("{{\"should_include\": true, \"relevance_score\": {raw}}}");
            let score = parse_evaluation(&reply).relevance_score;
            assert!((0.0..=1.0).contains(&score), "{raw} -> {score}");
        }
    }

    #[test]
    fn justification_json_with_defaults() {
        let j = parse_justification(r#"{"justification": "Both build compilers."}"#).unwrap();
        assert_eq!(j.justification, "Both build compilers.");
        assert_eq!(j.connection_angle.unwrap(), "Professional networking");

        let j = parse_justification(r#"{"connection_angle": "Rust meetups"}"#).unwrap();
        assert_eq!(j.justification, "Qualified match");
        assert_eq!(j.connection_angle.as_deref(), Some("Rust meetups"));
    }

    #[test]
    fn justification_plain_text_is_verbatim() {
        let j = parse_justification("  Shares your focus on distributed systems.  ").unwrap();
        assert_eq!(j.justification, "Shares your focus on distributed systems.");
        assert!(j.connection_angle.is_none());
    }

    #[test]
    fn empty_justification_is_error() {
        let err = parse_justification("   \n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Justification);
    }

    #[tokio::test]
    async fn score_prompt_carries_record_criteria_and_context() {
        let generator = Arc::new(ScriptedGenerator::new(|req| {
            let system = req.system_prompt.as_deref().unwrap_or_default();
            assert!(system.contains("should_include"));
            assert!(req.prompt.contains("- profile_name: Ada Lovelace"));
            assert!(req.prompt.contains("- profile_company: Acme"));
            assert!(req.prompt.contains("- profile_location: Unknown"));
            assert!(req.prompt.contains("- target_job_titles: Engineer, Architect"));
            assert!(req.prompt.contains("- target_locations: Berlin"));
            assert!(req.prompt.contains("- connection_degree: 2nd"));
            assert!(req.prompt.contains("- user_interests: rust, compilers"));
            assert!(!req.prompt.contains("target_industries"));
            Ok(INCLUDE_REPLY.into())
        }));
        let evaluator = ProfileEvaluator::new(generator, &config());

        let mut criteria = SearchCriteria::new("infra");
        criteria.job_titles = vec!["Engineer".into(), "Architect".into()];
        criteria.locations = vec!["Berlin".into()];
        criteria.connection_degree = Some(ConnectionDegree::Second);
        let interests = serde_json::json!(["rust", "compilers"]);
        let ctx = UserContext::new().with("interests", interests);

        let eval = evaluator.score(&record(), &criteria, &ctx).await.unwrap();
        assert!((eval.relevance_score - 0.9).abs() < f64::EPSILON);
        assert_eq!(eval.matching_criteria, vec!["title"]);
    }

    #[tokio::test]
    async fn generator_failure_is_scoring_error() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(LinkScoutError::Generation("connection refused".into()))
        }));
        let evaluator = ProfileEvaluator::new(generator, &config());

        let criteria = SearchCriteria::default();
        let err = evaluator
            .score(&record(), &criteria, &UserContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Scoring);
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn slow_generator_times_out() {
        let generator = ScriptedGenerator::new(|_| Ok("late".into()))
            .with_delay(Duration::from_secs(5));
        let evaluator = ProfileEvaluator::new(Arc::new(generator), &config());

        let fallback = EvaluationResult::conservative_fallback();
        let err = evaluator
            .justify(&record(), &fallback, &UserContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Justification);
        assert!(err.to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn justify_uses_evaluation_in_prompt() {
        let generator = Arc::new(ScriptedGenerator::new(|req| {
            assert!(req.prompt.contains("- matching_criteria: basic match"));
            assert!(req.prompt.contains("- relevance_score: 0.50"));
            Ok(JUSTIFY_REPLY.into())
        }));
        let evaluator = ProfileEvaluator::new(generator, &config());

        let fallback = EvaluationResult::conservative_fallback();
        let j = evaluator
            .justify(&record(), &fallback, &UserContext::default())
            .await
            .unwrap();
        assert_eq!(j.justification, "Similar role at Acme.");
        assert_eq!(j.connection_angle.as_deref(), Some("Platform work"));
    }
}
