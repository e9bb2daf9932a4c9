use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use state_migrations::{
    CURRENT_VERSION, ClientType, JsonFileStorage, MIN_VERSION, MigrationConfig,
    MigrationHelperType, MigrationReport, MigrationRunner, create_migration_builder,
    create_rollback_builder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "state-migrate")]
#[command(about = "Inspect and migrate a persisted client state store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the stored and the target state version
    Status {
        #[arg(long)]
        store: PathBuf,
    },
    /// List the registered migration chain
    Plan,
    /// Bring a store up to the current version
    Migrate {
        #[arg(long)]
        store: PathBuf,
        #[arg(long, default_value_t = ClientType::Web)]
        client_type: ClientType,
        #[arg(long, default_value_t = MigrationHelperType::GENERAL)]
        helper_type: MigrationHelperType,
    },
    /// Roll a store back to an older version
    Rollback {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        to: u32,
        #[arg(long, default_value_t = ClientType::Web)]
        client_type: ClientType,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Status { store } => status(&store).await,
        Command::Plan => plan(),
        Command::Migrate {
            store,
            client_type,
            helper_type,
        } => migrate(&store, MigrationConfig::new(client_type).helper_type(helper_type)).await,
        Command::Rollback {
            store,
            to,
            client_type,
        } => rollback(&store, to, MigrationConfig::new(client_type)).await,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("state_migrations=warn,state_migrate=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_runner(store: &Path, config: MigrationConfig) -> Result<MigrationRunner> {
    let storage = JsonFileStorage::open(store)
        .await
        .with_context(|| format!("Failed to open state store '{}'", store.display()))?;
    Ok(MigrationRunner::new(Arc::new(storage), config))
}

async fn status(store: &Path) -> Result<()> {
    let runner = open_runner(store, MigrationConfig::default()).await?;
    match runner.current_version().await? {
        Some(version) if version < MIN_VERSION => println!(
            "Stored version {} is older than the minimum supported version {}",
            version, MIN_VERSION
        ),
        Some(version) if version < CURRENT_VERSION => println!(
            "Stored version {}, {} step(s) behind version {}",
            version,
            CURRENT_VERSION - version,
            CURRENT_VERSION
        ),
        Some(version) => println!("Stored version {} (current: {})", version, CURRENT_VERSION),
        None => println!("Empty store (current: {})", CURRENT_VERSION),
    }
    Ok(())
}

fn plan() -> Result<()> {
    let builder = create_migration_builder()?;
    for step in builder.steps() {
        println!(
            "{:>3} -> {:<3} {}",
            step.start_version(),
            step.end_version(),
            step.migrator().name()
        );
    }
    println!("Target version: {}", builder.current_version());
    Ok(())
}

async fn migrate(store: &Path, config: MigrationConfig) -> Result<()> {
    let runner = open_runner(store, config).await?;
    let report = runner.run(&create_migration_builder()?).await?;
    print_report(&report)
}

async fn rollback(store: &Path, to: u32, config: MigrationConfig) -> Result<()> {
    let runner = open_runner(store, config).await?;
    let from = runner
        .current_version()
        .await?
        .ok_or_else(|| anyhow!("Store '{}' has no state version", store.display()))?;

    let builder = create_rollback_builder(from, to)?;
    let report = runner.rollback(&builder).await?;
    print_report(&report)
}

fn print_report(report: &MigrationReport) -> Result<()> {
    let rendered = serde_json::to_string_pretty(report).context("Failed to render report")?;
    println!("{}", rendered);
    println!(
        "Applied {} step(s), skipped {}",
        report.applied_count(),
        report.skipped_count()
    );
    Ok(())
}
