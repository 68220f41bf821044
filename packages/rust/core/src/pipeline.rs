//! End-to-end search pipeline: companies → listing → extraction → scoring → contacts.
//!
//! Navigation and extraction are strictly sequential on one page session.
//! Scoring and justification of extracted records run concurrently, bounded
//! by a semaphore, and are reassembled in extraction order before any limit
//! is applied.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use linkscout_browser::CompanyListing;
use linkscout_shared::{
    Contact, Justification, LinkScoutError, OrchestratorConfig, RawProfileRecord, Result,
    SearchCriteria, SearchOptions, SearchRunId, UserContext,
};

use crate::evaluator::ProfileEvaluator;

/// Result of one search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub run_id: SearchRunId,
    /// Merged contacts, in company-then-extraction order, never above the global limit.
    pub contacts: Vec<Contact>,
    pub companies_attempted: usize,
    /// Companies whose listing could not be reached.
    pub companies_failed: usize,
    pub records_extracted: usize,
    /// Records that received a scoring decision.
    pub records_scored: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting search status.
pub trait SearchProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a company is navigated to (1-based `index`).
    fn company_started(&self, company: &str, index: usize, total: usize);
    /// Called after a company has been fully processed.
    fn company_finished(&self, company: &str, contacts: usize);
    /// Called for every contact appended to the results.
    fn contact_found(&self, contact: &Contact);
    /// Called when the run completes.
    fn done(&self, outcome: &SearchOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl SearchProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn company_started(&self, _company: &str, _index: usize, _total: usize) {}
    fn company_finished(&self, _company: &str, _contacts: usize) {}
    fn contact_found(&self, _contact: &Contact) {}
    fn done(&self, _outcome: &SearchOutcome) {}
}

// ---------------------------------------------------------------------------
// SearchOrchestrator
// ---------------------------------------------------------------------------

/// Walks the company × job-title space under the configured limits.
pub struct SearchOrchestrator {
    evaluator: Arc<ProfileEvaluator>,
    config: OrchestratorConfig,
}

/// Counters for one run.
#[derive(Default)]
struct RunStats {
    companies_attempted: usize,
    companies_failed: usize,
    records_extracted: usize,
    records_scored: usize,
}

impl SearchOrchestrator {
    pub fn new(evaluator: Arc<ProfileEvaluator>, config: OrchestratorConfig) -> Self {
        Self { evaluator, config }
    }

    /// Run a search.
    ///
    /// Only configuration errors are returned; every company, job-title and
    /// record failure is logged and counts as zero contacts for that unit.
    #[instrument(skip_all, fields(companies = options.companies.len(), limit = options.limit))]
    pub async fn run(
        &self,
        listing: &mut dyn CompanyListing,
        options: &SearchOptions,
        job_titles: &[String],
        criteria: &SearchCriteria,
        progress: &dyn SearchProgress,
    ) -> Result<SearchOutcome> {
        validate(options, job_titles)?;

        let start = Instant::now();
        let run_id = SearchRunId::new();
        info!(%run_id, job_titles = job_titles.len(), "starting search");

        let criteria = Arc::new(criteria.clone());
        let user_context = Arc::new(options.user_context.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let mut results: Vec<Contact> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stats = RunStats::default();
        let total = options.companies.len();

        for (index, company) in options.companies.iter().enumerate() {
            if results.len() >= options.limit {
                debug!("global limit reached, stopping");
                break;
            }
            let remaining = options
                .results_per_company
                .min(options.limit - results.len());
            if remaining == 0 {
                continue;
            }

            if index > 0 && !self.config.inter_company_delay.is_zero() {
                tokio::time::sleep(self.config.inter_company_delay).await;
            }

            progress.company_started(company, index + 1, total);
            stats.companies_attempted += 1;

            if let Err(e) = listing.goto_company_listing(company).await {
                warn!(company = %company, phase = "navigate", error = %e, "skipping company");
                stats.companies_failed += 1;
                progress.company_finished(company, 0);
                continue;
            }

            let mut contributed: Vec<Contact> = Vec::new();
            for job_title in job_titles {
                if contributed.len() >= remaining {
                    break;
                }
                let budget = remaining - contributed.len();

                progress.phase(&format!("{company}: {job_title}"));
                if !listing.apply_job_title_filter(job_title).await {
                    info!(
                        company = %company,
                        job_title = %job_title,
                        "no filter applied, extracting unfiltered listing"
                    );
                }

                let records = match listing.extract_profiles(budget).await {
                    Ok(records) => records,
                    Err(e) => {
                        warn!(
                            company = %company,
                            job_title = %job_title,
                            phase = "extract",
                            error = %e,
                            "skipping job title"
                        );
                        continue;
                    }
                };
                stats.records_extracted += records.len();

                let fresh: Vec<RawProfileRecord> = records
                    .into_iter()
                    .map(|r| r.with_company(company.as_str()))
                    .filter(|r| seen.insert(r.identity_key()))
                    .collect();

                let mut contacts = self
                    .evaluate_batch(
                        fresh,
                        &criteria,
                        &user_context,
                        &semaphore,
                        company,
                        job_title,
                        &mut stats,
                    )
                    .await;
                contacts.truncate(budget);

                for contact in &contacts {
                    progress.contact_found(contact);
                }
                contributed.extend(contacts);
            }

            info!(company = %company, contacts = contributed.len(), "company complete");
            progress.company_finished(company, contributed.len());
            results.extend(contributed);
        }

        results.truncate(options.limit);

        let outcome = SearchOutcome {
            run_id,
            contacts: results,
            companies_attempted: stats.companies_attempted,
            companies_failed: stats.companies_failed,
            records_extracted: stats.records_extracted,
            records_scored: stats.records_scored,
            elapsed: start.elapsed(),
        };

        progress.done(&outcome);

        info!(
            run_id = %outcome.run_id,
            contacts = outcome.contacts.len(),
            companies_attempted = outcome.companies_attempted,
            companies_failed = outcome.companies_failed,
            records_extracted = outcome.records_extracted,
            records_scored = outcome.records_scored,
            elapsed_ms = outcome.elapsed.as_millis(),
            "search complete"
        );

        Ok(outcome)
    }

    /// Score and justify records concurrently; results keep extraction order.
    #[allow(clippy::too_many_arguments)]
    async fn evaluate_batch(
        &self,
        records: Vec<RawProfileRecord>,
        criteria: &Arc<SearchCriteria>,
        user_context: &Arc<UserContext>,
        semaphore: &Arc<Semaphore>,
        company: &str,
        job_title: &str,
        stats: &mut RunStats,
    ) -> Vec<Contact> {
        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            let evaluator = self.evaluator.clone();
            let criteria = criteria.clone();
            let user_context = user_context.clone();
            let sem = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|_| LinkScoutError::Scoring("scoring pool closed".into()))?;
                evaluate_record(&evaluator, record, &criteria, &user_context).await
            }));
        }

        let mut contacts = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(Evaluated::Included(contact))) => {
                    stats.records_scored += 1;
                    contacts.push(contact);
                }
                Ok(Ok(Evaluated::Excluded)) => stats.records_scored += 1,
                Ok(Err(e)) => {
                    warn!(company, job_title, phase = "score", error = %e, "skipping record");
                }
                Err(e) => {
                    warn!(company, job_title, phase = "score", error = %e, "scoring task failed");
                }
            }
        }
        contacts
    }
}

enum Evaluated {
    Included(Contact),
    Excluded,
}

async fn evaluate_record(
    evaluator: &ProfileEvaluator,
    record: RawProfileRecord,
    criteria: &SearchCriteria,
    user_context: &UserContext,
) -> Result<Evaluated> {
    let evaluation = evaluator.score(&record, criteria, user_context).await?;
    if !evaluation.should_include {
        debug!(name = %record.name, score = evaluation.relevance_score, "excluded by scorer");
        return Ok(Evaluated::Excluded);
    }

    let justification = match evaluator.justify(&record, &evaluation, user_context).await {
        Ok(justification) => justification,
        Err(e) => {
            warn!(
                name = %record.name,
                phase = "justify",
                error = %e,
                "using templated justification"
            );
            Justification::templated(&evaluation.matching_criteria)
        }
    };

    Ok(Evaluated::Included(Contact::assemble(record, evaluation, justification)))
}

fn validate(options: &SearchOptions, job_titles: &[String]) -> Result<()> {
    if options.companies.iter().all(|c| c.trim().is_empty()) {
        return Err(LinkScoutError::config("company list is empty"));
    }
    if job_titles.iter().all(|t| t.trim().is_empty()) {
        return Err(LinkScoutError::config("job title list is empty"));
    }
    if options.limit == 0 {
        return Err(LinkScoutError::config("total result limit must be at least 1"));
    }
    if options.results_per_company == 0 {
        return Err(LinkScoutError::config("results per company must be at least 1"));
    }
    Ok(())
}

/// Run a search and close the listing afterwards, whatever the outcome.
///
/// Close errors are logged, never returned.
pub async fn search_with_listing(
    orchestrator: &SearchOrchestrator,
    listing: &mut dyn CompanyListing,
    options: &SearchOptions,
    job_titles: &[String],
    criteria: &SearchCriteria,
    progress: &dyn SearchProgress,
) -> Result<SearchOutcome> {
    let outcome = orchestrator
        .run(listing, options, job_titles, criteria, progress)
        .await;
    if let Err(e) = listing.close().await {
        warn!(error = %e, "failed to close page session");
    }
    outcome
}
