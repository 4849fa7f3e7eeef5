use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use db::{ConnectOpts, DbEngine, DbHandle};
use registrations::config::RegistrationsConfig;
use registrations::infra::directory::StaticDirectory;
use registrations::Registrations;
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

const MODULE_NAME: &str = "registrations";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps "sqlite::memory:" as-is.
/// - Normalizes backslashes into forward slashes.
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path) -> Result<String> {
    if dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
    {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };
    if path_str.is_empty() {
        bail!("Empty SQLite path in DSN");
    }
    let p = runtime::paths::resolve_under(path_str, base_dir);

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Operator tool for the registrations store
#[derive(Parser)]
#[command(name = "registrations-admin")]
#[command(about = "Operator tool for event registrations and waitlists")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check configuration
    Check,
    /// Apply pending database migrations
    Migrate,
    /// Show an event's waitlist in position order
    Waitlist { event_id: Uuid },
    /// Move the head of the waitlist into a free seat
    Promote { event_id: Uuid },
    /// Per-status registration and pending-notification counts
    Summary { event_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    if let Some(path) = cli.config.as_deref() {
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }
    }

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::init_logging_from_config(&logging_config, &config.home_path());
    tracing::info!("registrations-admin starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => check_config(&config),
        Commands::Migrate => {
            let db = connect(&config).await?;
            Registrations::new().migrate(&db).await?;
            println!("Migrations applied");
            db.close().await;
            Ok(())
        }
        Commands::Waitlist { event_id } => {
            let (module, db) = open_module(&config, args.mock).await?;
            let entries = module.service()?.waitlist(event_id).await?;
            if entries.is_empty() {
                println!("Waitlist is empty");
            }
            for e in entries {
                println!(
                    "{:>4}  {}  {}  {}",
                    e.position,
                    e.registration_id,
                    e.user_id,
                    e.created_at.to_rfc3339()
                );
            }
            db.close().await;
            Ok(())
        }
        Commands::Promote { event_id } => {
            let (module, db) = open_module(&config, args.mock).await?;
            match module.service()?.promote_next(event_id).await? {
                Some(reg) => println!("Promoted {} (user {})", reg.id, reg.user_id),
                None => println!("Nobody promoted"),
            }
            db.close().await;
            Ok(())
        }
        Commands::Summary { event_id } => {
            let (module, db) = open_module(&config, args.mock).await?;
            let summary = module.service()?.notification_summary(event_id).await?;
            for c in &summary.by_status {
                println!(
                    "{:<10}  total {:>5}  pending {:>5}",
                    c.status.as_str(),
                    c.total,
                    c.pending
                );
            }
            println!("pending notifications: {}", summary.pending);
            match summary.free_seats {
                Some(n) => println!("free seats: {n}"),
                None => println!("free seats: unlimited"),
            }
            db.close().await;
            Ok(())
        }
    }
}

/// Detect DB backend from URL scheme.
fn detect_from_dsn(cfg: &DatabaseConfig) -> Result<&'static str> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        bail!("Database URL not configured");
    }
    if raw.eq_ignore_ascii_case("sqlite::memory:") {
        return Ok("sqlite");
    }

    let url = Url::parse(raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;
    match url.scheme() {
        "sqlite" | "sqlite3" => Ok("sqlite"),
        "postgres" | "postgresql" => Ok("postgres"),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

async fn connect(config: &AppConfig) -> Result<DbHandle> {
    let db_config = config
        .database
        .as_ref()
        .ok_or_else(|| anyhow!("No database configuration found"))?;
    let backend = detect_from_dsn(db_config)?;

    let mut dsn = db_config.url.trim().to_owned();
    if backend == "sqlite" {
        dsn = absolutize_sqlite_dsn(&dsn, &config.home_path())?;
    }

    let connect_opts = ConnectOpts {
        max_conns: db_config.max_conns,
        acquire_timeout: Some(Duration::from_secs(5)),
        sqlite_busy_timeout: db_config
            .busy_timeout_ms
            .map(|ms| Duration::from_millis(u64::from(ms))),
        create_sqlite_dirs: true,
        ..Default::default()
    };

    tracing::info!(backend, "Connecting to database");
    let db = DbHandle::connect(&dsn, connect_opts).await?;
    tracing::info!("Connected DB backend: {:?}", db.engine());
    // Postgres DSNs may carry credentials.
    if db.engine() == DbEngine::Sqlite {
        tracing::debug!(dsn = db.dsn(), "Using SQLite database");
    }
    Ok(db)
}

/// An in-memory database starts empty, so it is migrated on the spot.
/// The handle is returned so the caller can close the pool on exit.
async fn open_module(config: &AppConfig, mock: bool) -> Result<(Registrations, DbHandle)> {
    let db = connect(config).await?;
    let module = Registrations::new();
    if mock {
        module.migrate(&db).await?;
    }
    let module_config: RegistrationsConfig = config.module_config(MODULE_NAME)?;
    module
        .init(&db, &module_config, Arc::new(StaticDirectory::default()))
        .await?;
    Ok((module, db))
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let module_config: RegistrationsConfig = config.module_config(MODULE_NAME)?;
    if let Some(db) = config.database.as_ref() {
        detect_from_dsn(db)?;
    }
    println!("Configuration check passed");
    println!("Registrations config:");
    println!("{module_config:#?}");
    Ok(())
}
