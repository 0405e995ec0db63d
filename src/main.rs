use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rate_oracle::compare::deals::{best_deals, BestDeals};
use rate_oracle::compare::group::{group_by_brand, group_by_owner};
use rate_oracle::compare::rank::{rank, RankKey, SortOrder};
use rate_oracle::compare::stats::{stats, RateStats};
use rate_oracle::compare::best_case_savings;
use rate_oracle::config::{Config, ConfigOverrides};
use rate_oracle::narrative::{
    narrate_or_fallback, narrator_or_template, NarrativeSummary, TemplateNarrator,
};
use rate_oracle::output::csv::{codes_to_csv, history_to_csv, offers_to_csv};
use rate_oracle::output::json::render_json;
use rate_oracle::output::table::{
    render_codes_table, render_deals_table, render_history_table, render_narrative,
    render_offers_table, render_source_reports_table, render_sources_table, render_stats_table,
};
use rate_oracle::search::{restrict_to_owner, SearchOrchestrator};
use rate_oracle::server::run_server;
use rate_oracle::store::{record_search, saved_code_values, RateStore, SavedCode};
use rate_oracle::types::{Offer, SearchQuery, SourceId, SourceReport};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupBy {
    Owner,
    Brand,
}

#[derive(Debug, Parser)]
#[command(
    name = "rate-oracle",
    about = "Hotel rate search across brand families with corporate discount codes"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(short, long)]
    sources: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone)]
struct ViewArgs {
    #[arg(long, default_value = "price")]
    sort: RankKey,
    #[arg(long, default_value = "asc")]
    order: SortOrder,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Search {
        #[arg(short, long)]
        location: String,
        #[arg(long = "check-in")]
        check_in: Option<NaiveDate>,
        #[arg(long = "check-out")]
        check_out: Option<NaiveDate>,
        #[arg(short, long)]
        guests: Option<u32>,
        #[arg(long = "code")]
        codes: Vec<String>,
        #[arg(long = "no-saved-codes")]
        no_saved_codes: bool,
        #[arg(long = "no-save")]
        no_save: bool,
        #[arg(long)]
        narrate: bool,
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long)]
        owner: Option<SourceId>,
        #[arg(long, value_enum)]
        group: Option<GroupBy>,
    },
    Show {
        search_id: i64,
        #[command(flatten)]
        view: ViewArgs,
    },
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Codes {
        #[command(subcommand)]
        action: CodeAction,
    },
    Sources,
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CodeAction {
    List,
    Add {
        #[arg(long)]
        corporate: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Remove {
        id: i64,
    },
    Notes {
        id: i64,
        text: String,
    },
    Find {
        corporate: String,
    },
}

#[derive(Debug, Serialize)]
struct SearchView<'a> {
    search_id: Option<i64>,
    codes_tried: &'a [String],
    sources: &'a [SourceReport],
    offers: &'a [Offer],
    total_savings: f64,
    best_case_savings: f64,
    stats: RateStats,
    best_deals: BestDeals,
    narrative: Option<NarrativeSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        enabled_sources: cli
            .sources
            .as_deref()
            .map(|raw| {
                parse_source_list(raw).map(|ids| {
                    ids.into_iter()
                        .map(|id| id.as_slug().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .transpose()?,
        db_path: None,
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let rules = Arc::new(config.rule_table()?);
    let orchestrator = SearchOrchestrator::from_config(&config, rules.clone())?;
    let db_path = config.resolved_db_path();

    match cli.command {
        Commands::Search {
            location,
            check_in,
            check_out,
            guests,
            codes,
            no_saved_codes,
            no_save,
            narrate,
            view,
            owner,
            group,
        } => {
            let query = SearchQuery::new(location)
                .with_dates(check_in, check_out)
                .with_guests(guests.unwrap_or(config.search.default_guests))
                .with_codes(codes);
            let saved_codes = if no_saved_codes {
                Vec::new()
            } else {
                saved_code_values(&db_path)
            };

            let envelope = orchestrator.execute(&query, &saved_codes).await?;
            let search_id = if no_save {
                None
            } else {
                record_search(&db_path, &envelope)
            };
            if let Some(id) = search_id {
                info!(search_id = id, "saved search");
            }
            let envelope = match &owner {
                Some(owner) => restrict_to_owner(envelope, owner),
                None => envelope,
            };

            let narrative = if narrate {
                let source_count = orchestrator.registry().len();
                let narrator = narrator_or_template(&config.narrative, source_count);
                let fallback = TemplateNarrator::new(source_count);
                Some(
                    narrate_or_fallback(
                        narrator.as_ref(),
                        &fallback,
                        &envelope.offers,
                        &envelope.codes_tried,
                    )
                    .await,
                )
            } else {
                None
            };

            let offers = &envelope.offers;
            if let Some(group) = group {
                let grouped = match group {
                    GroupBy::Owner => group_by_owner(offers, &orchestrator.registered()),
                    GroupBy::Brand => group_by_brand(offers),
                };
                return print_groups(&grouped, &view, cli.output);
            }

            let ranked = rank(offers, view.sort, view.order);
            let search_view = SearchView {
                search_id,
                codes_tried: &envelope.codes_tried,
                sources: &envelope.sources,
                offers: &ranked,
                total_savings: envelope.rounded_total_savings(),
                best_case_savings: best_case_savings(offers),
                stats: stats(offers),
                best_deals: best_deals(offers),
                narrative,
            };
            print_search(&search_view, cli.output)?;
        }
        Commands::Show { search_id, view } => {
            let store = RateStore::open(&db_path)?;
            let record = store
                .load_search(search_id)?
                .ok_or_else(|| anyhow!("search {search_id} not found"))?;
            let offers = store.load_offers(search_id)?;
            let ranked = rank(&offers, view.sort, view.order);
            let search_view = SearchView {
                search_id: Some(record.id),
                codes_tried: &record.codes_used,
                sources: &[],
                offers: &ranked,
                total_savings: record.total_savings,
                best_case_savings: best_case_savings(&offers),
                stats: stats(&offers),
                best_deals: best_deals(&offers),
                narrative: None,
            };
            print_search(&search_view, cli.output)?;
        }
        Commands::History { limit } => {
            let history = RateStore::open(&db_path)?.load_history(limit)?;
            match cli.output {
                OutputFormat::Table => {
                    if history.is_empty() {
                        println!("No searches recorded yet.");
                    } else {
                        println!("{}", render_history_table(&history));
                    }
                }
                OutputFormat::Json => println!("{}", render_json(&history)?),
                OutputFormat::Csv => println!("{}", history_to_csv(&history)?),
            }
        }
        Commands::Codes { action } => {
            let store = RateStore::open(&db_path)?;
            handle_codes_command(action, &store, cli.output)?
        }
        Commands::Sources => match cli.output {
            OutputFormat::Table => {
                println!("{}", render_sources_table(orchestrator.registry(), &rules))
            }
            OutputFormat::Json | OutputFormat::Csv => {
                if matches!(cli.output, OutputFormat::Csv) {
                    warn!("CSV output for sources not implemented, using JSON");
                }
                println!("{}", render_json(&*rules)?);
            }
        },
        Commands::Serve { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn handle_codes_command(action: CodeAction, store: &RateStore, format: OutputFormat) -> Result<()> {
    match action {
        CodeAction::List => print_codes(&store.list_codes()?, format)?,
        CodeAction::Add {
            corporate,
            code,
            notes,
        } => {
            let saved = store.add_code(&corporate, &code, notes.as_deref())?;
            info!(id = saved.id, corporate = %saved.corporate_name, "saved discount code");
            print_codes(&[saved], format)?;
        }
        CodeAction::Remove { id } => {
            let removed = store
                .delete_code(id)?
                .ok_or_else(|| anyhow!("code {id} not found"))?;
            println!("Removed {} ({})", removed.code_value, removed.corporate_name);
        }
        CodeAction::Notes { id, text } => {
            let notes = Some(text.as_str()).filter(|t| !t.trim().is_empty());
            let updated = store
                .update_code_notes(id, notes)?
                .ok_or_else(|| anyhow!("code {id} not found"))?;
            print_codes(&[updated], format)?;
        }
        CodeAction::Find { corporate } => {
            print_codes(&store.codes_by_corporate(&corporate)?, format)?
        }
    }
    Ok(())
}

fn parse_source_list(raw: &str) -> Result<Vec<SourceId>> {
    let mut out: Vec<SourceId> = Vec::new();
    for piece in raw.split(',') {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        let id = SourceId::from_str(trimmed).context("invalid --sources entry")?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    if out.is_empty() {
        return Err(anyhow!("source filter is empty"));
    }
    Ok(out)
}

fn print_search(view: &SearchView<'_>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if !view.sources.is_empty() {
                println!("{}", render_source_reports_table(view.sources));
            }
            if let Some(id) = view.search_id {
                println!("Search #{id}, codes tried: {}", view.codes_tried.join(", "));
            }
            if view.offers.is_empty() {
                println!("No offers found.");
                return Ok(());
            }
            println!("{}", render_offers_table(view.offers));
            println!("{}", render_stats_table(&view.stats, view.best_case_savings));
            println!("{}", render_deals_table(&view.best_deals));
            if let Some(narrative) = &view.narrative {
                println!("{}", render_narrative(narrative));
            }
        }
        OutputFormat::Json => println!("{}", render_json(view)?),
        OutputFormat::Csv => println!("{}", offers_to_csv(view.offers)?),
    }
    Ok(())
}

fn print_groups(
    groups: &BTreeMap<String, Vec<Offer>>,
    view: &ViewArgs,
    format: OutputFormat,
) -> Result<()> {
    let ranked = groups
        .iter()
        .map(|(key, offers)| (key.clone(), rank(offers, view.sort, view.order)))
        .collect::<BTreeMap<_, _>>();
    match format {
        OutputFormat::Table => {
            for (key, offers) in &ranked {
                println!("== {key} ({} offers)", offers.len());
                if !offers.is_empty() {
                    println!("{}", render_offers_table(offers));
                }
            }
        }
        OutputFormat::Json => println!("{}", render_json(&ranked)?),
        OutputFormat::Csv => {
            let flat = ranked.into_values().flatten().collect::<Vec<_>>();
            println!("{}", offers_to_csv(&flat)?);
        }
    }
    Ok(())
}

fn print_codes(codes: &[SavedCode], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if codes.is_empty() {
                println!("No saved codes.");
            } else {
                println!("{}", render_codes_table(codes));
            }
        }
        OutputFormat::Json => println!("{}", render_json(codes)?),
        OutputFormat::Csv => println!("{}", codes_to_csv(codes)?),
    }
    Ok(())
}
