//! Database maintenance tool
//!
//! Provides CLI interface for backups, table checks and the schema upgrade lock

// dbkeeper/src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dbkeeper::audit::DEFAULT_CHECK_OPTIONS;
use dbkeeper::backup::{BackupStatus, COMPRESSOR_CANDIDATES};
use dbkeeper::config::AppConfig;
use dbkeeper::process::SystemRunner;
use dbkeeper::store::MySqlStore;
use dbkeeper::utils::directories::ConfiguredDirectories;
use dbkeeper::utils::find_dump_executable;
use dbkeeper::utils::setting::check_db_connection;
use dbkeeper::{BackupPaths, DbCoordinator};

#[derive(Parser, Debug)]
#[command(name = "dbkeeper", version, about = "Backups, table checks and schema locking for the shared MySQL store")]
struct Cli {
    /// Path to config.json
    #[arg(long, env = "DBKEEPER_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up the database (script first, built-in dump as fallback)
    Backup,
    /// Report whether a backup appears to be running
    InProgress,
    /// Check the MyISAM tables, optionally repairing crashed ones
    Check {
        #[arg(long)]
        repair: bool,
        #[arg(long, default_value = DEFAULT_CHECK_OPTIONS)]
        options: String,
    },
    /// Repair the named tables
    Repair {
        #[arg(required = true)]
        tables: Vec<String>,
    },
    /// List tables, optionally restricted to storage engines
    Tables {
        #[arg(long = "engine")]
        engines: Vec<String>,
    },
    /// Report whether the database is freshly initialized
    Empty,
    /// Print the server version, or compare it with MAJOR MINOR POINT
    Version {
        #[arg(long, num_args = 3, value_names = ["MAJOR", "MINOR", "POINT"], allow_negative_numbers = true)]
        compare: Option<Vec<i64>>,
    },
    /// Estimate the number of connected client processes
    Clients,
    /// Acquire and release the schema upgrade lock
    Lock,
}

/// Main entry point for the maintenance tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_app(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "dbkeeper=debug" } else { "dbkeeper=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_app(cli: Cli) -> Result<ExitCode> {
    dotenv::dotenv().ok();

    let app_config = AppConfig::load_from_json(&cli.config).context(format!(
        "Failed to load application configuration from {}",
        cli.config.display()
    ))?;

    let store = Arc::new(
        MySqlStore::connect(&app_config.database, &app_config.host_name)
            .await
            .context("Failed to connect to the database")?,
    );
    if !check_db_connection(store.as_ref()).await {
        anyhow::bail!("Database connection is not usable");
    }

    let paths = BackupPaths {
        share_dir: app_config.share_dir.clone(),
        temp_dir: app_config.temp_dir.clone(),
        dump_program: find_dump_executable(),
        compressors: COMPRESSOR_CANDIDATES.iter().map(PathBuf::from).collect(),
    };
    let mut coordinator = DbCoordinator::new(
        store.clone(),
        store,
        Arc::new(SystemRunner),
        Arc::new(ConfiguredDirectories::new(app_config.backup_directories.clone())),
        paths,
    );

    match cli.command {
        Command::Backup => {
            info!("🚀 Starting Backup Process...");
            let outcome = coordinator.backup_database().await;
            println!("{:?}", outcome.status);
            println!("{}", outcome.artifact);
            if outcome.degraded {
                warn!("Backup left uncompressed.");
            }
            if outcome.status == BackupStatus::Failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::InProgress => {
            println!("{}", coordinator.is_backup_in_progress().await);
        }
        Command::Check { repair, options } => {
            if !coordinator.check_tables(repair, &options).await {
                return Ok(ExitCode::FAILURE);
            }
            info!("✅ Table check completed.");
        }
        Command::Repair { tables } => {
            if !coordinator.repair_tables(&tables).await {
                return Ok(ExitCode::FAILURE);
            }
            info!("✅ Table repair completed.");
        }
        Command::Tables { engines } => {
            let engines: Vec<&str> = engines.iter().map(String::as_str).collect();
            for table in coordinator.list_tables(&engines).await {
                println!("{}", table);
            }
        }
        Command::Empty => {
            println!("{}", coordinator.is_empty_store().await);
        }
        Command::Version { compare } => match compare.as_deref() {
            Some(&[major, minor, point]) => match coordinator.compare_version(major, minor, point).await {
                Some(difference) => println!("{}", difference),
                None => {
                    println!("unknown");
                    return Ok(ExitCode::FAILURE);
                }
            },
            _ => println!("{}", coordinator.version_string().await),
        },
        Command::Clients => {
            println!("{}", coordinator.count_clients().await);
        }
        Command::Lock => {
            if !coordinator.acquire_schema_lock().await {
                return Ok(ExitCode::FAILURE);
            }
            info!("🔒 Acquired schema upgrade lock.");
            coordinator.release_schema_lock().await;
            info!("🔓 Released schema upgrade lock.");
        }
    }
    Ok(ExitCode::SUCCESS)
}
