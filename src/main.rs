use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use password_audit_dashboard::report::{self, DashboardData};
use password_audit_dashboard::{db, fixtures, loader, risk, AuditSnapshot};

#[derive(Parser)]
#[command(name = "password-audit")]
#[command(about = "Password strength and login activity dashboard data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Directory holding users.csv, user_security.csv and login-log.txt
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Read a JSON snapshot ({"users": [...], "logs": [...]}) instead
    #[arg(long, conflicts_with = "from_db")]
    snapshot: Option<PathBuf>,
    /// Read users and login events from Postgres (DATABASE_URL)
    #[arg(long)]
    from_db: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load deterministic demo data into the database
    Seed {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 12)]
        users: usize,
        #[arg(long, default_value_t = 40)]
        logs: usize,
    },
    /// Import an audit data directory into the database
    Import {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Print summary counts and the users needing attention
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        /// Only list users whose name, email or department matches
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write the dashboard payload as JSON
    Export {
        #[command(flatten)]
        source: SourceArgs,
        /// Defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List notification payloads for users with non-strong passwords
    Notifications {
        #[command(flatten)]
        source: SourceArgs,
        /// Defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a deterministic demo snapshot
    Demo {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 12)]
        users: usize,
        #[arg(long, default_value_t = 40)]
        logs: usize,
        #[arg(long, default_value = "snapshot.json")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { seed, users, logs } => {
            let pool = connect().await?;
            let counts = db::seed(&pool, seed, users, logs).await?;
            println!(
                "Seeded {} users and {} login events.",
                counts.users, counts.logs
            );
        }
        Commands::Import { data_dir } => {
            let pool = connect().await?;
            let counts = db::import_directory(&pool, &data_dir).await?;
            println!(
                "Imported {} users and {} new login events from {}.",
                counts.users,
                counts.logs,
                data_dir.display()
            );
        }
        Commands::Summary {
            source,
            search,
            limit,
        } => {
            let dashboard = load_dashboard(&source).await?;
            let stats = &dashboard.aggregate.summary;

            println!(
                "{} users: {} strong, {} weak, {} common (score {}%)",
                stats.total_users,
                stats.strong_passwords,
                stats.weak_passwords,
                stats.common_passwords,
                stats.overall_score
            );

            let at_risk = dashboard.at_risk();
            let matches: Vec<_> = match search.as_deref() {
                Some(term) => {
                    let found = risk::search_users(&dashboard.users, term);
                    at_risk
                        .into_iter()
                        .filter(|user| found.iter().any(|hit| hit.user.email == user.user.email))
                        .collect()
                }
                None => at_risk,
            };

            if matches.is_empty() {
                println!("No users need attention.");
                return Ok(());
            }

            println!("Users needing attention:");
            for user in matches.iter().take(limit) {
                println!(
                    "- {} ({}, {}) {}: {}",
                    user.user.fullname,
                    user.user.email,
                    user.user.department_key(),
                    user.password_status,
                    user.reason_summary()
                );
            }
        }
        Commands::Report { source, out } => {
            let dashboard = load_dashboard(&source).await?;
            let report = report::build_report(Some(&source_label(&source)), &dashboard);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { source, out } => {
            let dashboard = load_dashboard(&source).await?;
            let json = serde_json::to_string_pretty(&dashboard)?;
            emit(out.as_deref(), &json)?;
        }
        Commands::Notifications { source, out } => {
            let dashboard = load_dashboard(&source).await?;
            let notifications = dashboard.notifications();
            info!(count = notifications.len(), "notification payloads prepared");
            let json = serde_json::to_string_pretty(&notifications)?;
            emit(out.as_deref(), &json)?;
        }
        Commands::Demo {
            seed,
            users,
            logs,
            out,
        } => {
            let snapshot = fixtures::SnapshotBuilder::new(seed)
                .users(users)
                .logs(logs)
                .build();
            loader::write_snapshot(&out, &snapshot)?;
            println!(
                "Demo snapshot with {} users and {} login events written to {}.",
                snapshot.users.len(),
                snapshot.logs.len(),
                out.display()
            );
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_snapshot(source: &SourceArgs) -> anyhow::Result<AuditSnapshot> {
    if source.from_db {
        let pool = connect().await?;
        return db::fetch_snapshot(&pool).await;
    }

    match &source.snapshot {
        Some(path) => loader::load_snapshot(path),
        None => loader::load_directory(&source.data_dir),
    }
}

async fn load_dashboard(source: &SourceArgs) -> anyhow::Result<DashboardData> {
    let snapshot = load_snapshot(source).await?;
    let dashboard = DashboardData::from_snapshot(&snapshot);

    let quality = dashboard.aggregate.data_quality;
    if quality.unparsable_timestamps > 0 {
        warn!(
            count = quality.unparsable_timestamps,
            "login entries with unreadable timestamps left out of the daily series"
        );
    }
    if quality.unrecognized_statuses > 0 {
        warn!(
            count = quality.unrecognized_statuses,
            "login entries with an unrecognized status counted as failed"
        );
    }

    info!(
        users = dashboard.users.len(),
        logs = snapshot.logs.len(),
        "snapshot aggregated"
    );
    Ok(dashboard)
}

fn source_label(source: &SourceArgs) -> String {
    if source.from_db {
        "the audit database".to_string()
    } else if let Some(path) = &source.snapshot {
        path.display().to_string()
    } else {
        source.data_dir.display().to_string()
    }
}

fn emit(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "written");
        }
        None => println!("{contents}"),
    }
    Ok(())
}
