//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use linkscout_browser::{HttpSession, ListingNavigator, SessionStore};
use linkscout_core::{
    ExportMeta, ExportStats, OllamaClient, ProfileEvaluator, SearchOrchestrator, SearchOutcome,
    SearchProgress, export_contacts, export_stats, search_with_listing,
};
use linkscout_shared::{
    AppConfig, Contact, GenerationConfig, Justification, NavigatorConfig, OrchestratorConfig,
    RetryPolicy, SearchCriteria, SearchOptions, UserContext, init_config, load_config,
    render_config,
};

/// Used when neither `--companies` nor `[search].companies` is set.
const DEFAULT_COMPANIES: &[&str] = &["microsoft", "google", "apple", "amazon", "meta"];

/// Used when neither `--job-titles` nor `[search].job_titles` is set.
const DEFAULT_JOB_TITLES: &[&str] = &[
    "software engineer",
    "data scientist",
    "product manager",
    "engineering manager",
];

/// Rows shown in the results summary.
const SUMMARY_ROWS: usize = 10;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LinkScout: find the people worth meeting at the companies you care about.
#[derive(Parser)]
#[command(
    name = "linkscout",
    version,
    about = "Discover relevant professional contacts at target companies.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search company member listings for relevant contacts.
    Search(SearchArgs),

    /// Saved browser session management.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `linkscout search`.
#[derive(Args, Debug, Default)]
pub(crate) struct SearchArgs {
    /// Total number of results across all companies.
    #[arg(short = 't', long)]
    pub total_results: Option<usize>,

    /// Comma-separated list of companies to search.
    #[arg(short, long)]
    pub companies: Option<String>,

    /// Maximum number of results per company.
    #[arg(short = 'r', long)]
    pub results_per_company: Option<usize>,

    /// Comma-separated list of job titles to filter by.
    #[arg(short, long)]
    pub job_titles: Option<String>,

    /// Additional matching keywords (comma-separated).
    #[arg(short, long, default_value = "")]
    pub match_conditions: String,

    /// Personal context for scoring: free text, or a JSON object.
    #[arg(short, long, default_value = "")]
    pub user_context: String,

    /// Output file (defaults to a timestamped name in the export directory).
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Run the page session headless.
    #[arg(long, overrides_with = "no_headless")]
    pub headless: bool,

    /// Run the page session with a visible window.
    #[arg(long, overrides_with = "headless")]
    pub no_headless: bool,

    /// Print the resolved search without opening a session.
    #[arg(long)]
    pub dry_run: bool,
}

/// Session subcommands.
#[derive(Subcommand)]
pub(crate) enum SessionAction {
    /// Show saved-session and credential status.
    Show,
    /// Delete the saved session.
    Clear,
    /// Import a storage-state JSON file exported from a logged-in browser.
    Import {
        /// Path to the storage-state file.
        file: PathBuf,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "linkscout=info",
        1 => "linkscout=debug",
        _ => "linkscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Search(args) => cmd_search(args).await,
        Command::Session { action } => match action {
            SessionAction::Show => cmd_session_show(),
            SessionAction::Clear => cmd_session_clear(),
            SessionAction::Import { file } => cmd_session_import(&file),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

/// A search with every flag resolved against the config.
#[derive(Debug)]
struct SearchPlan {
    options: SearchOptions,
    job_titles: Vec<String>,
    criteria: SearchCriteria,
    headless: bool,
    output_file: Option<PathBuf>,
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Flag value, then config value, then built-in default.
fn resolve_list(flag: Option<&str>, configured: &[String], fallback: &[&str]) -> Vec<String> {
    if let Some(raw) = flag {
        return split_csv(raw);
    }
    if !configured.is_empty() {
        return configured.to_vec();
    }
    fallback.iter().map(|s| s.to_string()).collect()
}

fn parse_user_context(
    raw: &str,
    job_titles: &[String],
    match_conditions: &[String],
) -> Result<UserContext> {
    let trimmed = raw.trim();
    let mut context = if trimmed.starts_with('{') {
        serde_json::from_str::<UserContext>(trimmed)
            .map_err(|e| eyre!("--user-context is not a valid JSON object: {e}"))?
    } else {
        UserContext::new().with("background", trimmed)
    };

    // Keys the user set explicitly win.
    if context.get("job_titles_of_interest").is_none() {
        context = context.with("job_titles_of_interest", job_titles.to_vec());
    }
    if context.get("match_conditions").is_none() {
        context = context.with("match_conditions", match_conditions.to_vec());
    }
    Ok(context)
}

fn plan_search(args: &SearchArgs, config: &AppConfig) -> Result<SearchPlan> {
    let companies = resolve_list(
        args.companies.as_deref(),
        &config.search.companies,
        DEFAULT_COMPANIES,
    );
    let job_titles = resolve_list(
        args.job_titles.as_deref(),
        &config.search.job_titles,
        DEFAULT_JOB_TITLES,
    );
    let match_conditions = split_csv(&args.match_conditions);

    if companies.is_empty() {
        return Err(eyre!("no companies to search: pass --companies a,b,c"));
    }
    if job_titles.is_empty() {
        return Err(eyre!("no job titles to filter by: pass --job-titles a,b,c"));
    }

    let user_context = parse_user_context(&args.user_context, &job_titles, &match_conditions)?;

    let criteria = SearchCriteria {
        companies: companies.clone(),
        job_titles: job_titles.clone(),
        keywords: match_conditions,
        ..SearchCriteria::new("cli search")
    };

    let headless = if args.no_headless {
        false
    } else if args.headless {
        true
    } else {
        config.browser.headless
    };

    Ok(SearchPlan {
        options: SearchOptions {
            companies,
            limit: args.total_results.unwrap_or(config.search.total_results),
            results_per_company: args
                .results_per_company
                .unwrap_or(config.search.results_per_company),
            user_context,
        },
        job_titles,
        criteria,
        headless,
        output_file: args.output_file.clone(),
    })
}

fn print_plan(plan: &SearchPlan, dry_run: bool) {
    println!();
    println!("  LinkScout search");
    println!("  Total results:       {}", plan.options.limit);
    println!(
        "  Companies:           {}",
        plan.options.companies.join(", ")
    );
    println!(
        "  Results per company: {}",
        plan.options.results_per_company
    );
    println!("  Job titles:          {}", plan.job_titles.join(", "));
    if !plan.criteria.keywords.is_empty() {
        println!(
            "  Match conditions:    {}",
            plan.criteria.keywords.join(", ")
        );
    }
    println!("  Output format:       JSON");
    println!("  Headless:            {}", plan.headless);
    println!("  Dry run:             {dry_run}");
    println!();
}

async fn cmd_search(args: SearchArgs) -> Result<()> {
    let mut config = load_config()?;
    let plan = plan_search(&args, &config)?;
    config.browser.headless = plan.headless;

    print_plan(&plan, args.dry_run);

    if args.dry_run {
        println!("  Dry run: no listings will be visited.");
        return Ok(());
    }

    let store = SessionStore::new(&config.paths.session_dir);
    if !store.has_valid_session() {
        return Err(eyre!(
            "no valid saved session at {}\n\
             Log in with a browser, export its storage state, then run:\n  \
             linkscout session import <storage_state.json>",
            store.storage_state_path().display()
        ));
    }
    let cookie = store.cookie_header()?;

    let session = HttpSession::new(&config.browser, Some(&cookie))?;
    let mut navigator = ListingNavigator::new(
        Box::new(session),
        NavigatorConfig::from(&config),
        RetryPolicy::from(&config),
    );

    let generation = GenerationConfig::from(&config);
    let client = OllamaClient::new(&generation)?;
    info!(model = client.model(), "using local model");
    let evaluator = ProfileEvaluator::new(Arc::new(client), &generation);
    let orchestrator =
        SearchOrchestrator::new(Arc::new(evaluator), OrchestratorConfig::from(&config));

    let reporter = CliProgress::new();
    let outcome = search_with_listing(
        &orchestrator,
        &mut navigator,
        &plan.options,
        &plan.job_titles,
        &plan.criteria,
        &reporter,
    )
    .await?;

    println!("  Found {} matching profiles", outcome.contacts.len());

    if outcome.contacts.is_empty() {
        warn!("no contacts to export");
        println!("  Nothing to export.");
        return Ok(());
    }

    let stats = export_outcome(
        &outcome,
        plan.output_file.as_deref(),
        &config.paths.export_dir,
    )?;
    println!(
        "  Results exported to: {} ({} contacts, {} bytes)",
        stats.path.display(),
        stats.contact_count,
        stats.size_bytes
    );
    print_summary(&outcome);

    Ok(())
}

/// Write the run's contacts and read the file back for the summary line.
fn export_outcome(
    outcome: &SearchOutcome,
    output_file: Option<&Path>,
    export_dir: &str,
) -> Result<ExportStats> {
    let (dir, filename) = export_target(output_file, export_dir);
    let meta = ExportMeta {
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        run_id: Some(outcome.run_id.clone()),
    };
    let path = export_contacts(
        &dir,
        filename.as_deref(),
        &outcome.contacts,
        &justifications_by_key(&outcome.contacts),
        &meta,
    )?;
    Ok(export_stats(&path)?)
}

/// Split `--output-file` into the export directory and file name.
fn export_target(output_file: Option<&Path>, export_dir: &str) -> (PathBuf, Option<String>) {
    let Some(path) = output_file else {
        return (PathBuf::from(export_dir), None);
    };
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string());
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => (parent.to_path_buf(), filename),
        None => (PathBuf::from(export_dir), filename),
    }
}

fn justifications_by_key(contacts: &[Contact]) -> HashMap<String, Justification> {
    contacts
        .iter()
        .filter(|c| !c.justification.is_empty())
        .map(|c| {
            (
                c.export_key(),
                Justification {
                    justification: c.justification.clone(),
                    connection_angle: c.connection_angle.clone(),
                },
            )
        })
        .collect()
}

fn print_summary(outcome: &SearchOutcome) {
    println!();
    println!(
        "  {:<28} {:<32} {:<16} {:>5}",
        "Name", "Title", "Company", "Score"
    );
    for contact in outcome.contacts.iter().take(SUMMARY_ROWS) {
        println!(
            "  {:<28} {:<32} {:<16} {:>5.2}",
            truncate(&contact.name, 28),
            truncate(&contact.title, 32),
            truncate(&contact.company, 16),
            contact.relevance_score
        );
    }
    if outcome.contacts.len() > SUMMARY_ROWS {
        let hidden = outcome.contacts.len() - SUMMARY_ROWS;
        println!("  ... and {hidden} more results");
    }
    println!();
    println!(
        "  Companies: {} attempted, {} unreachable",
        outcome.companies_attempted, outcome.companies_failed
    );
    println!(
        "  Profiles:  {} extracted, {} scored",
        outcome.records_extracted, outcome.records_scored
    );
    println!("  Time:      {:.1}s", outcome.elapsed.as_secs_f64());
    println!();
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl Drop for CliProgress {
    /// Clears the spinner on early exits, where `done` never runs.
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl SearchProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn company_started(&self, company: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("[{index}/{total}] {company}"));
    }

    fn company_finished(&self, company: &str, contacts: usize) {
        self.spinner
            .println(format!("  {company}: {contacts} contacts"));
    }

    fn contact_found(&self, contact: &Contact) {
        self.spinner.set_message(format!(
            "{} ({}) {:.2}",
            contact.name, contact.company, contact.relevance_score
        ));
    }

    fn done(&self, _outcome: &SearchOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// session
// ---------------------------------------------------------------------------

fn session_store() -> Result<SessionStore> {
    let config = load_config()?;
    Ok(SessionStore::new(&config.paths.session_dir))
}

fn cmd_session_show() -> Result<()> {
    let info = session_store()?.info();
    println!("  Session file:    {}", info.session_file.display());
    println!("  File exists:     {}", info.storage_state_exists);
    println!("  Valid session:   {}", info.has_valid_session);
    println!("  Credentials set: {}", info.has_credentials);
    Ok(())
}

fn cmd_session_clear() -> Result<()> {
    if session_store()?.clear()? {
        println!("Saved session removed.");
    } else {
        println!("No saved session to remove.");
    }
    Ok(())
}

fn cmd_session_import(file: &Path) -> Result<()> {
    let path = session_store()?.import(file)?;
    println!("Session imported to: {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    println!("{}", render_config(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkscout_shared::SearchRunId;

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("linkscout").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap()
    }

    fn search_args(args: &[&str]) -> SearchArgs {
        let mut argv = vec!["search"];
        argv.extend_from_slice(args);
        match parse(&argv).command {
            Command::Search(args) => args,
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(split_csv(" acme, ,zenith ,"), vec!["acme", "zenith"]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn search_flags_parse() {
        let mut argv = vec!["-t", "3", "-c", "Acme,Zenith", "-r", "2"];
        argv.extend(["-j", "engineer", "-m", "rust", "--dry-run"]);
        let args = search_args(&argv);
        assert_eq!(args.total_results, Some(3));
        assert_eq!(args.results_per_company, Some(2));
        assert!(args.dry_run);

        let plan = plan_search(&args, &AppConfig::default()).unwrap();
        assert_eq!(plan.options.companies, vec!["Acme", "Zenith"]);
        assert_eq!(plan.options.limit, 3);
        assert_eq!(plan.options.results_per_company, 2);
        assert_eq!(plan.job_titles, vec!["engineer"]);
        assert_eq!(plan.criteria.keywords, vec!["rust"]);
    }

    #[test]
    fn unset_flags_fall_back_to_config_then_defaults() {
        let mut config = AppConfig::default();
        config.search.job_titles = vec!["staff engineer".into()];
        config.search.total_results = 7;

        let plan = plan_search(&SearchArgs::default(), &config).unwrap();
        assert_eq!(plan.options.limit, 7);
        assert_eq!(plan.job_titles, vec!["staff engineer"]);
        assert_eq!(plan.options.companies.len(), DEFAULT_COMPANIES.len());
    }

    #[test]
    fn headless_flags_override_config() {
        let headless = |args: &[&str]| {
            let plan = plan_search(&search_args(args), &AppConfig::default()).unwrap();
            plan.headless
        };
        assert!(headless(&[]));
        assert!(!headless(&["--no-headless"]));
        assert!(headless(&["--no-headless", "--headless"]));
    }

    #[test]
    fn user_context_accepts_text_or_json() {
        let titles = vec!["engineer".to_string()];
        let text = parse_user_context("Rust developer", &titles, &[]).unwrap();
        assert_eq!(text.background(), "Rust developer");
        assert!(text.get("job_titles_of_interest").is_some());

        let raw = r#"{"current_role": "SRE", "interests": ["k8s"]}"#;
        let json = parse_user_context(raw, &titles, &[]).unwrap();
        assert_eq!(json.current_role(), "SRE");
        assert_eq!(json.interests(), vec!["k8s"]);

        assert!(parse_user_context("{not json", &titles, &[]).is_err());
    }

    #[test]
    fn empty_company_flag_is_rejected() {
        let args = search_args(&["-c", " , "]);
        assert!(plan_search(&args, &AppConfig::default()).is_err());
    }

    #[test]
    fn export_target_splits_output_file() {
        assert_eq!(
            export_target(None, "./exports"),
            (PathBuf::from("./exports"), None)
        );
        assert_eq!(
            export_target(Some(Path::new("out.json")), "./exports"),
            (PathBuf::from("./exports"), Some("out.json".into()))
        );
        assert_eq!(
            export_target(Some(Path::new("/tmp/runs/out")), "./exports"),
            (PathBuf::from("/tmp/runs"), Some("out".into()))
        );
    }

    #[test]
    fn export_outcome_reports_written_file() {
        let contact = Contact {
            name: "Ada Lovelace".into(),
            title: "Staff Engineer".into(),
            company: "Acme".into(),
            location: None,
            profile_url: Some("https://www.linkedin.com/in/ada".into()),
            relevance_score: 0.9,
            matching_criteria: vec!["title".into()],
            reasons: vec![],
            potential_connection_points: vec![],
            justification: "Shared platform work".into(),
            connection_angle: None,
        };
        let outcome = SearchOutcome {
            run_id: SearchRunId::new(),
            contacts: vec![contact],
            companies_attempted: 1,
            companies_failed: 0,
            records_extracted: 1,
            records_scored: 1,
            elapsed: std::time::Duration::from_millis(5),
        };
        let dir = std::env::temp_dir().join(format!("linkscout-cli-{}", outcome.run_id));
        let output = dir.join("run.json");

        let stats = export_outcome(&outcome, Some(&output), "./unused").unwrap();
        assert_eq!(stats.path, output);
        assert_eq!(stats.contact_count, 1);
        let on_disk = std::fs::metadata(&output).unwrap().len();
        assert_eq!(stats.size_bytes, on_disk);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn dropping_progress_clears_spinner() {
        let progress = CliProgress::new();
        let spinner = progress.spinner.clone();
        progress.phase("Acme: engineer");

        // An error out of the search returns before `done` is called.
        drop(progress);
        assert!(spinner.is_finished());
    }

    #[test]
    fn truncate_respects_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5).chars().count(), 5);
    }
}
