mod orchestrator;
mod prompt;
mod summary;
mod verify;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use lzscrape_core::{AppConfig, CategoryConfig, CountryConfig, RunSummary, WarehouseCredentials};
use lzscrape_scraper::{CatalogClient, RetryPolicy};
use lzscrape_store::{BackupWriter, PersistenceSink, PgWarehouse, PoolConfig, Warehouse};
use tracing_subscriber::EnvFilter;

use crate::orchestrator::Orchestrator;
use crate::prompt::{AutoConfirm, Confirm, LineConfirm};
use crate::verify::VerifyReport;

#[derive(Debug, Parser)]
#[command(name = "lzscrape")]
#[command(about = "Scrape marketplace category listings into the product warehouse")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape every configured country and category (the default)
    Run(RunArgs),
    /// Check today's stored counts per country and category
    Verify {
        /// Show per-category counts and stored history
        #[arg(long, short)]
        verbose: bool,
    },
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Restrict the run to a country key from countries.yaml (repeatable)
    #[arg(long = "country", value_name = "KEY")]
    countries: Vec<String>,

    /// Continue without prompting when today's data already exists
    #[arg(long, short)]
    yes: bool,
}

/// Process-wide inputs, loaded once before any network call.
struct Setup {
    credentials: WarehouseCredentials,
    countries: Vec<CountryConfig>,
    categories: Vec<CategoryConfig>,
}

impl Setup {
    /// The key file is read first so a missing one fails before anything else.
    fn load(config: &AppConfig, country_filter: &[String]) -> anyhow::Result<Self> {
        let credentials = lzscrape_core::load_credentials(&config.key_path)?;
        let countries = lzscrape_core::load_countries(&config.countries_path)?
            .restrict_to(country_filter)?
            .countries;
        let categories = lzscrape_core::load_categories(&config.categories_path)?.categories;
        tracing::info!(
            account = credentials.account_label(),
            countries = countries.len(),
            categories = categories.len(),
            "configuration loaded"
        );
        Ok(Self {
            credentials,
            countries,
            categories,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = lzscrape_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(env = %config.env, "lzscrape starting");

    match cli.command {
        None => run_command(&config, &RunArgs::default()).await,
        Some(Commands::Run(args)) => run_command(&config, &args).await,
        Some(Commands::Verify { verbose }) => verify_command(&config, verbose).await,
    }
}

async fn run_command(config: &AppConfig, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let setup = Setup::load(config, &args.countries)?;
    let warehouse = connect_warehouse(config, &setup.credentials).await?;

    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(LineConfirm::stdin())
    };

    let run_summary = execute_run(config, &setup, warehouse.clone(), confirm.as_mut()).await?;
    print_verification(config, &setup, warehouse.as_ref(), false).await;
    Ok(exit_code(run_summary.exit_code()))
}

async fn verify_command(config: &AppConfig, verbose: bool) -> anyhow::Result<ExitCode> {
    let setup = Setup::load(config, &[])?;
    let warehouse = connect_warehouse(config, &setup.credentials).await?;
    let healthy = print_verification(config, &setup, warehouse.as_ref(), verbose).await;
    Ok(exit_code(i32::from(!healthy)))
}

async fn connect_warehouse(
    config: &AppConfig,
    credentials: &WarehouseCredentials,
) -> anyhow::Result<Arc<dyn Warehouse>> {
    let pool = lzscrape_store::connect_pool(
        &credentials.database_url,
        credentials.dataset.as_deref(),
        PoolConfig::from_app_config(config),
    )
    .await?;
    lzscrape_store::run_migrations(&pool).await?;
    Ok(Arc::new(PgWarehouse::new(pool)))
}

/// Scrape every configured country against `warehouse` and print the summary.
async fn execute_run(
    config: &AppConfig,
    setup: &Setup,
    warehouse: Arc<dyn Warehouse>,
    confirm: &mut dyn Confirm,
) -> anyhow::Result<RunSummary> {
    let client = CatalogClient::new(
        config.request_timeout_secs,
        RetryPolicy {
            network_max_retries: config.network_max_retries,
            rate_limit_backoff_secs: config.rate_limit_backoff_secs,
        },
    )?;
    let sink = PersistenceSink::new(BackupWriter::new(&config.backup_dir), warehouse);

    let orchestrator = Orchestrator {
        config,
        countries: &setup.countries,
        categories: &setup.categories,
        client: &client,
        sink: &sink,
    };
    let run_summary = orchestrator.run(confirm).await;

    println!(
        "{}",
        summary::render(&run_summary, &setup.countries, &config.backup_dir)
    );
    Ok(run_summary)
}

/// Print today's verification report. Returns `true` when it found no issues.
async fn print_verification(
    config: &AppConfig,
    setup: &Setup,
    warehouse: &dyn Warehouse,
    verbose: bool,
) -> bool {
    let today = chrono::Utc::now().date_naive();
    let report = VerifyReport::collect(
        warehouse,
        &setup.countries,
        &setup.categories,
        config,
        today,
        verbose,
    )
    .await;
    println!("{}", report.render(verbose));
    report.is_healthy()
}

fn exit_code(code: i32) -> ExitCode {
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests;
