mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use tellus_client::DownloadClient;
use tellus_core::traits::TaskStore;
use tellus_core::{
    AppError, BatchHarvestSummary, CatalogEntry, CatalogHarvestResult, CatalogsConfig, DbConfig,
    HarvestConfig, HarvestService, HttpConfig, IntervalUnit, Registration, ScheduleRequest,
    load_catalogs_config, register_repeatable_job,
};
use tellus_db::{NodeRepository, ScheduleRepository, TaskRepository, run_migrations};

use crate::config::{Command, Config};

type Harvester = HarvestService<NodeRepository, TaskRepository, DownloadClient, DownloadClient>;

const DOUBLE_RULE: &str = "═══════════════════════════════════════════════════════";
const SINGLE_RULE: &str = "───────────────────────────────────────────────────────";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::parse();

    let level = if config.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    if let Err(e) = run(config).await {
        if let Some(app_error) = e.downcast_ref::<AppError>() {
            error!("{}", app_error.user_message());
        }
        return Err(e);
    }
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("Connecting to database...");
    let db_config = DbConfig::default();
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to prepare database schema")?;

    match config.command {
        Command::Harvest {
            catalog,
            config: config_path,
            file,
            id,
            read_local,
        } => {
            let catalogs_config = load_catalogs_config(config_path)?;
            let mut harvest_config: HarvestConfig = catalogs_config
                .as_ref()
                .map(|c| c.harvest.clone())
                .unwrap_or_default();
            if read_local {
                harvest_config = harvest_config.with_read_local(true);
            }

            let client = DownloadClient::with_config(&HttpConfig::default())?;
            let harvest_service = HarvestService::with_config(
                NodeRepository::new(pool.clone()),
                TaskRepository::new(pool.clone()),
                client.clone(),
                client,
                harvest_config,
            );
            handle_harvest(&harvest_service, catalogs_config, catalog, file, id).await?;
        }
        Command::Schedule {
            name,
            callable,
            time,
            interval,
            config: config_path,
        } => {
            let request = schedule_request(name, callable, time, interval, config_path)?;
            let store = ScheduleRepository::new(pool.clone());
            match register_repeatable_job(&store, &request, chrono::Utc::now()).await? {
                Registration::Created(job) => {
                    println!(
                        "Scheduled '{}': {} every {} {} on queue '{}', first run {}",
                        job.name, job.callable, job.interval, job.unit, job.queue, job.scheduled_time
                    );
                }
                Registration::AlreadyScheduled(jobs) => {
                    println!(
                        "{} is already scheduled every {} {}:",
                        request.callable, request.interval, request.unit
                    );
                    for job in jobs {
                        println!("  - {} (first run {})", job.name, job.scheduled_time);
                    }
                }
            }
        }
        Command::Tasks { limit } => {
            show_tasks(&TaskRepository::new(pool.clone()), limit).await?;
        }
    }

    Ok(())
}

/// Handle the harvest command with its three modes:
/// 1. A catalog document given on the command line
/// 2. Named catalog from config
/// 3. Batch mode (all enabled catalogs)
async fn handle_harvest(
    harvest_service: &Harvester,
    catalogs_config: Option<CatalogsConfig>,
    catalog: Option<String>,
    file: Option<String>,
    id: Option<String>,
) -> anyhow::Result<()> {
    match (file, id, catalog) {
        (Some(location), Some(identifier), None) => {
            let entry = CatalogEntry::new(identifier, location);
            let result = harvest_service.harvest_catalog(&entry).await?;
            print_catalog_summary(&result);
        }

        (None, None, Some(name)) => {
            let catalogs_config = require_config(catalogs_config)?;
            let entry = catalogs_config
                .find_by_identifier(&name)
                .ok_or_else(|| anyhow::anyhow!("Catalog '{}' not found in configuration", name))?;

            if !entry.enabled {
                info!(
                    "Note: Catalog '{}' is marked as disabled in configuration",
                    name
                );
            }

            let result = harvest_service.harvest_catalog(entry).await?;
            print_catalog_summary(&result);
        }

        (None, None, None) => {
            let catalogs_config = require_config(catalogs_config)?;
            let enabled: Vec<&CatalogEntry> = catalogs_config.enabled_catalogs();

            if enabled.is_empty() {
                info!("No enabled catalogs found in configuration.");
                info!("Add catalogs to ~/.config/tellus/catalogs.toml or use: tellus harvest --file <PATH> --id <ID>");
                return Ok(());
            }

            info!("{}", DOUBLE_RULE);
            info!("Starting batch harvest of {} catalogs", enabled.len());
            info!("{}", DOUBLE_RULE);

            let summary = harvest_service.harvest_all(&enabled).await;
            print_batch_summary(&summary);
        }

        // clap enforces --file with --id and rejects --catalog alongside them
        _ => anyhow::bail!("--file and --id must be given together, without --catalog"),
    }

    Ok(())
}

fn require_config(config: Option<CatalogsConfig>) -> anyhow::Result<CatalogsConfig> {
    config.ok_or_else(|| {
        anyhow::anyhow!(
            "No configuration file found. Create ~/.config/tellus/catalogs.toml or use --config"
        )
    })
}

/// Builds a schedule request from command line options, falling back to the
/// `[schedule]` table of the config file and then to built-in defaults.
fn schedule_request(
    name: String,
    callable: Option<String>,
    time: Option<Vec<u32>>,
    interval: Option<Vec<String>>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<ScheduleRequest> {
    let defaults = load_catalogs_config(config_path)?
        .map(|c| c.schedule)
        .unwrap_or_default();

    let mut request = ScheduleRequest::from_defaults(name, &defaults);
    if let Some(callable) = callable {
        request = request.with_callable(callable);
    }
    if let Some([hour, minute]) = time.as_deref() {
        request = request.with_time(*hour, *minute);
    }
    if let Some(interval) = interval {
        let (count, unit) = parse_interval(&interval)?;
        request = request.with_interval(count, unit);
    }
    Ok(request)
}

fn parse_interval(args: &[String]) -> anyhow::Result<(u32, IntervalUnit)> {
    let [count, unit] = args else {
        anyhow::bail!("--interval expects a count and a unit, e.g. `24 hours`");
    };
    let count: u32 = count
        .parse()
        .with_context(|| format!("Invalid interval count '{}'", count))?;
    let unit: IntervalUnit = unit
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok((count, unit))
}

/// Print a summary for a single catalog harvest (modes 1 and 2).
fn print_catalog_summary(result: &CatalogHarvestResult) {
    let stats = &result.stats;
    info!("");
    info!("{}", DOUBLE_RULE);
    info!("Harvest {}: {} ({})", result.status, result.catalog_id, result.url);
    info!("{}", DOUBLE_RULE);
    for (label, kind) in [
        ("Datasets", &stats.datasets),
        ("Distributions", &stats.distributions),
        ("Fields", &stats.fields),
    ] {
        info!(
            "  {:<14} +{} created  ~{} updated  ={} unchanged  x{} failed",
            label, kind.created, kind.updated, kind.unchanged, kind.failed
        );
    }
    info!("{}", SINGLE_RULE);
    info!("  Payloads fetched:    {}", stats.payloads_fetched);
    info!("  Marked indexable:    {}", stats.indexable);
    info!("  Catalog updated:     {}", result.updated);
    if let Some(task_id) = result.task_id {
        info!("  Task:                {}", task_id);
    }
    info!("{}", DOUBLE_RULE);

    if let Some(err) = &result.error {
        error!("Harvest failed: {}", err);
    } else if stats.failed() > 0 {
        warn!(
            "{} nodes failed; see `tellus tasks` for details",
            stats.failed()
        );
    }
}

/// Print a summary of batch harvesting results.
fn print_batch_summary(summary: &BatchHarvestSummary) {
    info!("");
    info!("{}", DOUBLE_RULE);
    info!("BATCH HARVEST COMPLETE");
    info!("{}", DOUBLE_RULE);
    info!("  Catalogs processed:  {}", summary.total_catalogs());
    info!("  Successful:          {}", summary.successful_count());
    info!("  Failed:              {}", summary.failed_count());
    info!("  Marked indexable:    {}", summary.total_indexable());

    let updated = summary.updated_catalogs();
    if !updated.is_empty() {
        info!("  Updated catalogs:    {}", updated.join(", "));
    }

    if summary.failed_count() > 0 {
        info!("{}", SINGLE_RULE);
        info!("Failed catalogs:");
        for result in summary.results.iter().filter(|r| !r.is_success()) {
            if let Some(err) = &result.error {
                error!("  - {}: {}", result.catalog_id, err);
            }
        }
    }
    info!("{}", DOUBLE_RULE);
}

async fn show_tasks(tasks: &TaskRepository, limit: usize) -> anyhow::Result<()> {
    let recent = tasks.list_tasks(limit).await?;

    if recent.is_empty() {
        println!("\nNo harvest tasks recorded yet.\n");
        return Ok(());
    }

    println!();
    for task in &recent {
        let finished = task
            .finished_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<9} {}  started {}  finished {}",
            task.id,
            task.status,
            task.catalog_id,
            task.created_at.to_rfc3339(),
            finished
        );
        println!(
            "   datasets {}  distributions {}  fields {}  indexable {}  failed {}",
            task.stats.datasets.successful(),
            task.stats.distributions.successful(),
            task.stats.fields.successful(),
            task.stats.indexable,
            task.stats.failed()
        );
        for entry in &task.logs {
            let entity = entry
                .entity
                .as_ref()
                .map(|e| format!("{}: ", e))
                .unwrap_or_default();
            println!("   [{}] {}{}", entry.level, entity, entry.message);
        }
        println!();
    }

    Ok(())
}
