//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dealdesk_classifier::{ClassificationInput, GeminiClassifier, today};
use dealdesk_core::dashboard::{self, Kpis};
use dealdesk_core::{AppState, DealFilter, NewReferent, PendingDeletion, analyze, load_attachment};
use dealdesk_shared::{
    AppConfig, Category, Deal, DealDraft, DealId, DealStatus, ReferentId, init_config, load_config,
};
use dealdesk_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DealDesk: track deals and referents, classify documents with AI.
#[derive(Parser, Debug)]
#[command(
    name = "dealdesk",
    version,
    about = "Track asset-management deals and referents; pre-fill deals from documents with AI.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (overrides storage.db_path).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

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
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Work with deals.
    Deals {
        #[command(subcommand)]
        action: DealsAction,
    },

    /// Show KPIs, recent deals and recommended actions.
    Dashboard,

    /// Work with the referent directory.
    Referents {
        #[command(subcommand)]
        action: ReferentsAction,
    },

    /// Classify a text and/or a file and save the result as a deal.
    Analyze {
        /// Free text describing the opportunity.
        #[arg(long)]
        text: Option<String>,

        /// Image (png, jpg, ...) or text file (txt, md) to analyse.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Enrich this existing deal instead of creating a new one.
        #[arg(long, value_name = "DEAL_ID")]
        enrich: Option<String>,

        /// Referent responsible for the deal.
        #[arg(long, value_name = "NAME")]
        referent: Option<String>,

        /// Save without asking.
        #[arg(long, conflicts_with = "dry_run")]
        yes: bool,

        /// Print the extracted draft without saving it.
        #[arg(long)]
        dry_run: bool,

        /// Bypass the classification cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum DealsAction {
    /// List deals, newest first.
    List {
        /// Case-insensitive search over title, id, location and referent.
        #[arg(short, long)]
        search: Option<String>,

        /// Only this category (finance, real_estate, corporate).
        #[arg(short, long)]
        category: Option<Category>,
    },
    /// Show one deal in detail.
    Show {
        id: String,
        /// Print the stored JSON record instead.
        #[arg(long)]
        json: bool,
    },
    /// Change a deal's status.
    Status {
        id: String,
        /// lead, analysis, due_diligence, negotiation, closing, archived.
        status: DealStatus,
    },
    /// Delete a deal.
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ReferentsAction {
    /// List the directory.
    List,
    /// Add a referent by hand.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        role: String,
        #[arg(long, default_value = "")]
        department: String,
    },
    /// Import referents from a CSV file (`;`, `,` or tab separated).
    Import { path: PathBuf },
    /// Remove a referent.
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
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
        0 => "dealdesk=warn",
        1 => "dealdesk=info",
        2 => "dealdesk=debug",
        _ => "dealdesk=trace",
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
    let config = load_config()?;
    let db = cli.db.clone();

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
        Command::Dashboard => {
            let state = open_state(&config, db.as_deref()).await?;
            cmd_dashboard(&state);
            Ok(())
        }
        Command::Deals { action } => {
            let mut state = open_state(&config, db.as_deref()).await?;
            match action {
                DealsAction::List { search, category } => {
                    cmd_deals_list(&state, search.unwrap_or_default(), category);
                    Ok(())
                }
                DealsAction::Show { id, json } => cmd_deals_show(&state, &id, json),
                DealsAction::Status { id, status } => {
                    cmd_deals_status(&mut state, &id, status).await
                }
                DealsAction::Delete { id, yes } => cmd_deals_delete(&mut state, &id, yes).await,
            }
        }
        Command::Referents { action } => {
            let mut state = open_state(&config, db.as_deref()).await?;
            match action {
                ReferentsAction::List => {
                    cmd_referents_list(&state);
                    Ok(())
                }
                ReferentsAction::Add {
                    name,
                    email,
                    role,
                    department,
                } => {
                    let new = NewReferent {
                        name,
                        email,
                        role,
                        department,
                    };
                    let referent = state.add_referent(new).await?;
                    println!("Added {} <{}> ({})", referent.name, referent.email, referent.id);
                    Ok(())
                }
                ReferentsAction::Import { path } => cmd_referents_import(&mut state, &path).await,
                ReferentsAction::Delete { id, yes } => {
                    let pending = state.request_referent_deletion(&ReferentId::from(id.as_str()))?;
                    confirm_and_delete(&mut state, pending, yes).await
                }
            }
        }
        Command::Analyze {
            text,
            file,
            enrich,
            referent,
            yes,
            dry_run,
            no_cache,
        } => {
            let mut state = open_state(&config, db.as_deref()).await?;
            let request = AnalyzeRequest {
                text,
                file,
                enrich: enrich.map(|id| DealId::from(id.as_str())),
                referent,
                yes,
                dry_run,
                use_cache: config.classifier.cache && !no_cache,
            };
            cmd_analyze(&mut state, &config, request).await
        }
    }
}

async fn open_state(config: &AppConfig, db: Option<&Path>) -> Result<AppState> {
    let path = db
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.storage.resolved_db_path());
    info!(path = %path.display(), "opening database");
    let storage = Storage::open(&path).await?;
    Ok(AppState::open(Arc::new(storage), config).await)
}

// ---------------------------------------------------------------------------
// Deals
// ---------------------------------------------------------------------------

fn cmd_dashboard(state: &AppState) {
    let deals = state.deals();
    let kpis = Kpis::compute(deals);

    println!();
    println!("  Active deals:      {}", kpis.active);
    println!("  Total value:       {}", dashboard::format_eur(kpis.total_value));
    println!("  Average ROI:       {:.1}%", kpis.avg_roi);
    println!("  NDA pending:       {}", kpis.pending_nda);
    println!("  Mandate pending:   {}", kpis.pending_mandate);
    println!("  Drafts to review:  {}", kpis.drafts);
    println!();

    println!("  By category:");
    for (category, count) in dashboard::category_counts(deals) {
        println!("    {:<12} {count}", category.label());
    }
    println!();

    println!("  Recent deals:");
    for deal in dashboard::recent_deals(deals) {
        println!(
            "    {:<22} {:<48} {:>16}",
            deal.id.as_str(),
            truncate(&deal.title, 48),
            dashboard::format_eur(deal.indicative_value)
        );
    }
    println!();

    let actions = dashboard::recommended_actions(deals);
    if !actions.is_empty() {
        println!("  Recommended actions:");
        for action in actions {
            println!("    - {}: {}", action.title, action.detail);
        }
        println!();
    }
}

fn cmd_deals_list(state: &AppState, search: String, category: Option<Category>) {
    let filter = DealFilter::new(search, category);
    let deals = filter.apply(state.deals());

    if deals.is_empty() {
        println!("No deals match.");
        return;
    }

    println!(
        "{:<22} {:<40} {:<12} {:<14} {:>16} {:>5}",
        "ID", "TITLE", "CATEGORY", "STATUS", "VALUE", "CONF"
    );
    for deal in deals {
        let draft = if deal.is_draft { " *" } else { "" };
        println!(
            "{:<22} {:<40} {:<12} {:<14} {:>16} {:>4}%{draft}",
            deal.id.as_str(),
            truncate(&deal.title, 40),
            deal.category.label(),
            deal.status.label(),
            dashboard::format_eur(deal.indicative_value),
            deal.confidence
        );
    }
}

fn cmd_deals_show(state: &AppState, id: &str, json: bool) -> Result<()> {
    let deal = state
        .deal(&DealId::from(id))
        .ok_or_else(|| eyre!("deal '{id}' not found"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(deal)?);
    } else {
        print_deal(deal);
    }
    Ok(())
}

async fn cmd_deals_status(state: &mut AppState, id: &str, status: DealStatus) -> Result<()> {
    state.set_status(&DealId::from(id), status).await?;
    println!("Deal {id} is now {}", status.label());
    Ok(())
}

async fn cmd_deals_delete(state: &mut AppState, id: &str, yes: bool) -> Result<()> {
    let pending = state.request_deal_deletion(&DealId::from(id))?;
    confirm_and_delete(state, pending, yes).await
}

async fn confirm_and_delete(state: &mut AppState, pending: PendingDeletion, yes: bool) -> Result<()> {
    if !yes && !confirm(&pending.prompt())? {
        println!("Cancelled.");
        return Ok(());
    }
    state.confirm_deletion(pending).await?;
    println!("Deleted.");
    Ok(())
}

fn print_deal(deal: &Deal) {
    println!();
    println!("  {}{}", deal.title, if deal.is_draft { "  [DRAFT]" } else { "" });
    println!("  {}", deal.id);
    println!();
    println!("  Category:     {} / {}", deal.category.label(), deal.sub_type);
    println!("  Location:     {}", deal.location);
    println!("  Status:       {}", deal.status.label());
    println!("  Priority:     {}", deal.priority.label());
    println!(
        "  Value:        {} ({})",
        dashboard::format_eur(deal.indicative_value),
        deal.value_range
    );
    if let Some(roi) = deal.roi {
        println!("  ROI:          {roi:.1}%");
    }
    if let Some(cagr) = deal.cagr {
        println!("  CAGR:         {cagr:.1}%");
    }
    if let Some(irr) = deal.irr {
        println!("  IRR:          {irr:.1}%");
    }
    println!("  Referent:     {}", deal.internal_referent);
    println!("  Client:       {}", deal.client);
    println!("  Inserted:     {}", deal.insertion_date);
    println!(
        "  NDA:          {}",
        yes_no_dated(deal.nda_signed, deal.nda_date.map(|d| d.to_string()))
    );
    println!(
        "  Mandate:      {}",
        yes_no_dated(deal.mandate_acquired, deal.mandate_date.map(|d| d.to_string()))
    );
    println!("  Confidence:   {}% ({})", deal.confidence, deal.confidence_reason);

    if !deal.description.is_empty() {
        println!();
        println!("  {}", deal.description);
    }
    if !deal.signals.is_empty() {
        println!();
        println!("  Signals:");
        for signal in &deal.signals {
            println!("    {:<28} {:>2}/10", signal.label, signal.score);
        }
    }
    if !deal.contacts.is_empty() {
        println!();
        println!("  Contacts:");
        for c in &deal.contacts {
            let private = if c.is_private { " (private)" } else { "" };
            println!("    {} - {} <{}> {}{private}", c.name, c.role, c.email, c.phone);
        }
    }
    if !deal.documents.is_empty() {
        println!();
        println!("  Documents:");
        for d in &deal.documents {
            println!("    {} ({}, {}) {}", d.name, d.kind, d.size, d.upload_date);
        }
    }
    if !deal.audit_log.is_empty() {
        println!();
        println!("  Audit log:");
        for entry in deal.audit_log.entries() {
            println!(
                "    {}  {:<10} {}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.user,
                entry.action
            );
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// Referents
// ---------------------------------------------------------------------------

fn cmd_referents_list(state: &AppState) {
    let referents = state.referents();
    if referents.is_empty() {
        println!("No referents saved.");
        return;
    }
    println!("{:<42} {:<24} {:<20} {:<30}", "ID", "NAME", "ROLE", "EMAIL");
    for r in referents {
        println!(
            "{:<42} {:<24} {:<20} {:<30}",
            r.id.as_str(),
            truncate(&r.name, 24),
            truncate(&r.role, 20),
            r.email
        );
    }
}

async fn cmd_referents_import(state: &mut AppState, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
    let outcome = state.import_referents(&text).await?;
    info!(
        delimiter = %outcome.delimiter,
        added = outcome.added.len(),
        skipped = outcome.skipped,
        "import finished"
    );
    println!("{}", outcome.summary());
    Ok(())
}

// ---------------------------------------------------------------------------
// Analyze
// ---------------------------------------------------------------------------

struct AnalyzeRequest {
    text: Option<String>,
    file: Option<PathBuf>,
    enrich: Option<DealId>,
    referent: Option<String>,
    yes: bool,
    dry_run: bool,
    use_cache: bool,
}

async fn cmd_analyze(state: &mut AppState, config: &AppConfig, req: AnalyzeRequest) -> Result<()> {
    if let Some(id) = req.enrich.as_ref().filter(|id| state.deal(id).is_none()) {
        return Err(eyre!("deal '{id}' not found"));
    }

    let attachment = req.file.as_deref().map(load_attachment).transpose()?;
    let document = attachment.as_ref().map(|a| a.document(today()));
    let input = match attachment {
        Some(attachment) => attachment.into_input(req.text.clone()),
        None => ClassificationInput {
            text: req.text.clone(),
            image: None,
        },
    };
    if input.is_empty() {
        return Err(eyre!("nothing to analyse: pass --text and/or --file"));
    }

    let classifier = GeminiClassifier::from_config(&config.classifier)?;
    if !classifier.has_api_key() {
        eprintln!(
            "warning: ${} is not set; the analysis will return the fallback draft",
            config.classifier.api_key_env
        );
    }

    let spinner = spinner("Analysing document...");
    let cache = req.use_cache.then(|| state.storage().clone());
    let draft = analyze(&classifier, cache.as_deref(), &input, today()).await;
    spinner.finish_and_clear();

    print_draft(&draft);

    if req.dry_run {
        return Ok(());
    }
    let question = match &req.enrich {
        Some(id) => format!("Apply these fields to deal {id}?"),
        None => "Save as a new draft deal?".to_string(),
    };
    if !req.yes && !confirm(&question)? {
        println!("Not saved.");
        return Ok(());
    }

    let ctx = state
        .draft_context()
        .with_referent(req.referent.clone())
        .with_source_text(input.text.clone());

    let deal = match &req.enrich {
        Some(id) => state.enrich_deal(id, &draft, &ctx).await?,
        None => state.create_deal_from_draft(&draft, &ctx).await?,
    };
    if let Some(document) = document {
        state.append_document(&deal.id, document).await?;
    }

    println!("Saved deal {} ({})", deal.id, deal.title);
    Ok(())
}

fn print_draft(draft: &DealDraft) {
    println!();
    if draft.failed {
        println!("  Analysis failed; fallback draft:");
    } else {
        println!("  Extracted draft:");
    }
    let field = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            println!("    {label:<16} {value}");
        }
    };
    field("Title", draft.title.clone());
    field("Category", draft.category.map(|c| c.label().to_string()));
    field("Sub-type", draft.sub_type.clone());
    field("Location", draft.location.clone());
    field("Value", draft.indicative_value.map(dashboard::format_eur));
    field("ROI", draft.roi.map(|v| format!("{v:.1}%")));
    field("CAGR", draft.cagr.map(|v| format!("{v:.1}%")));
    field("Priority", draft.priority.map(|p| p.label().to_string()));
    field("NDA signed", draft.nda_signed.map(|b| b.to_string()));
    field("Mandate", draft.mandate_acquired.map(|b| b.to_string()));
    field("Confidence", draft.confidence.map(|c| format!("{c}%")));
    field("Reason", draft.confidence_reason.clone());
    if let Some(signals) = &draft.signals {
        for s in signals {
            println!("    {:<16} {}/10", s.label, s.score);
        }
    }
    field("Description", draft.description.clone());
    println!();
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Ask a yes/no question on stdin; anything but `y`/`yes` is a no.
fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

fn yes_no_dated(flag: bool, date: Option<String>) -> String {
    match (flag, date) {
        (true, Some(date)) => format!("yes ({date})"),
        (true, None) => "yes".into(),
        (false, _) => "no".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_deals_list_with_filters() {
        let cli = Cli::try_parse_from([
            "dealdesk", "deals", "list", "--search", "turin", "--category", "real_estate",
        ])
        .unwrap();
        match cli.command {
            Command::Deals {
                action: DealsAction::List { search, category },
            } => {
                assert_eq!(search.as_deref(), Some("turin"));
                assert_eq!(category, Some(Category::RealEstate));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_status_by_label_or_wire_value() {
        for value in ["due_diligence", "Due Diligence"] {
            let cli = Cli::try_parse_from(["dealdesk", "deals", "status", "DEAL-1", value]).unwrap();
            assert!(matches!(
                cli.command,
                Command::Deals {
                    action: DealsAction::Status {
                        status: DealStatus::DueDiligence,
                        ..
                    }
                }
            ));
        }
        assert!(Cli::try_parse_from(["dealdesk", "deals", "status", "DEAL-1", "won"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["dealdesk", "dashboard", "-vv", "--db", "/tmp/x.db", "--log-format", "json"])
                .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/x.db")));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    fn analyze_yes_conflicts_with_dry_run() {
        assert!(
            Cli::try_parse_from(["dealdesk", "analyze", "--text", "x", "--yes", "--dry-run"]).is_err()
        );
        let cli = Cli::try_parse_from([
            "dealdesk", "analyze", "--file", "memo.md", "--enrich", "DEAL-20240115-7421ab",
            "--referent", "Luca Neri",
        ])
        .unwrap();
        match cli.command {
            Command::Analyze {
                file,
                enrich,
                referent,
                yes,
                ..
            } => {
                assert_eq!(file, Some(PathBuf::from("memo.md")));
                assert_eq!(enrich.as_deref(), Some("DEAL-20240115-7421ab"));
                assert_eq!(referent.as_deref(), Some("Luca Neri"));
                assert!(!yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn referent_add_requires_name_and_email() {
        assert!(Cli::try_parse_from(["dealdesk", "referents", "add", "--name", "A"]).is_err());
        assert!(
            Cli::try_parse_from(["dealdesk", "referents", "add", "--name", "A", "--email", "a@b.it"])
                .is_ok()
        );
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Città", 10), "Città");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
