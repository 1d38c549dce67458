use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod calendar;
mod config;
mod dashboard;
mod db;
mod feed;
mod models;
mod report;
mod stats;
mod store;

use crate::config::Settings;
use crate::dashboard::{Dashboard, Gate};
use crate::feed::Snapshot;
use crate::models::{FilterMode, Metric};
use crate::store::{EntryStore, UnavailableStore};

#[derive(Parser)]
#[command(name = "kpi-dashboard")]
#[command(about = "Live performance dashboard for the consultant team", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Window {
    /// week, month, year; anything else shows all entries
    #[arg(long, default_value = "week")]
    filter: String,
    /// Reference date for the window, defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl Window {
    fn apply(&self, dashboard: &mut Dashboard) {
        dashboard.set_filter(FilterMode::from_label(&self.filter));
        if let Some(date) = self.date {
            dashboard.set_date(date);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo entries for the configured roster
    Seed,
    /// Import entries from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record a day's counters for one consultant
    Submit {
        #[arg(long)]
        pin: String,
        /// Consultant name, defaults to the first roster member
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "0")]
        intakes: String,
        #[arg(long, default_value = "0")]
        interviews: String,
        #[arg(long, default_value = "0")]
        placements: String,
        #[arg(long, default_value = "0")]
        prospects: String,
    },
    /// Show team totals and per-consultant figures
    Totals {
        #[command(flatten)]
        window: Window,
    },
    /// Rank consultants by placements, intakes and interviews
    Rank {
        #[command(flatten)]
        window: Window,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown dashboard report
    Report {
        #[command(flatten)]
        window: Window,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Keep the dashboard on screen, refreshed on every change
    Watch {
        #[command(flatten)]
        window: Window,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::read_config().context("failed to read configuration")?;
    let roster = settings.roster()?;
    let today = Utc::now().date_naive();
    let mut dashboard = Dashboard::new(roster.clone(), settings.pin.clone(), today);

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&settings).await?;
            let inserted = db::seed(&pool, &roster).await?;
            println!("Inserted {inserted} demo entries.");
        }
        Commands::Import { csv } => {
            let pool = connect(&settings).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} entries from {}.", csv.display());
        }
        Commands::Submit {
            pin,
            name,
            date,
            intakes,
            interviews,
            placements,
            prospects,
        } => {
            let store = open_store(&settings).await?;
            dashboard.unlock(&pin);
            if dashboard.gate() == Gate::Locked {
                anyhow::bail!("Incorrect PIN, the dashboard is still locked.");
            }
            if let Some(name) = name {
                dashboard.select_member(&name)?;
            }
            tracing::debug!(name = %dashboard.active_member(), "Submitting entry");
            if let Some(date) = date {
                dashboard.set_date(date);
            }
            dashboard.set_field(Metric::Intakes, &intakes);
            dashboard.set_field(Metric::Interviews, &interviews);
            dashboard.set_field(Metric::Placements, &placements);
            dashboard.set_field(Metric::Prospects, &prospects);

            let submitted = dashboard
                .submit(store.as_ref())
                .await
                .context("entry was not saved")?;
            let entry = &submitted.entry;
            println!(
                "Saved {} for {} (week {}, {}/{}).",
                entry.name, entry.date, entry.bucket.week, entry.bucket.month, entry.bucket.year
            );
            if submitted.celebrate {
                println!(
                    "🎉 {} placement(s) for {}! Congratulations!",
                    entry.counters.placements, entry.name
                );
            }
        }
        Commands::Totals { window } => {
            window.apply(&mut dashboard);
            load_once(&mut dashboard, &settings).await?;
            let view = dashboard.view();

            println!("Team totals for {}:", view.window_label());
            for metric in Metric::ALL {
                println!("  {:<11} {}", metric.label(), view.grand_total.get(metric));
            }
            println!();
            for member in view.totals.iter() {
                println!(
                    "- {}: {} intakes, {} interviews, {} placements, {} prospects",
                    member.name,
                    member.tally.intakes,
                    member.tally.interviews,
                    member.tally.placements,
                    member.tally.prospects
                );
            }
        }
        Commands::Rank { window, limit } => {
            window.apply(&mut dashboard);
            load_once(&mut dashboard, &settings).await?;
            let view = dashboard.view();

            println!("Ranking for {}:", view.window_label());
            for member in view.ranking.iter().take(limit) {
                println!(
                    "{} {}. {} ({} placements, {} intakes, {} interviews)",
                    report::decoration(member.position),
                    member.position,
                    member.name,
                    member.tally.placements,
                    member.tally.intakes,
                    member.tally.interviews
                );
            }
        }
        Commands::Report { window, out } => {
            window.apply(&mut dashboard);
            load_once(&mut dashboard, &settings).await?;
            let report = report::build_report(&dashboard.view(), &dashboard.entries());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch { window } => {
            window.apply(&mut dashboard);
            let store = open_store(&settings).await?;
            watch(&mut dashboard, store).await?;
        }
    }

    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database_url = settings
        .database_url
        .as_deref()
        .context("KPI_DATABASE_URL or DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Falls back to an unavailable store when no connection is configured, so
/// read commands show an empty dashboard and writes fail.
async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn EntryStore>> {
    if settings.database_url.is_none() {
        tracing::warn!("No database configured, entry store is unavailable");
        return Ok(Arc::new(UnavailableStore));
    }

    let pool = connect(settings).await?;
    tracing::info!("Connected to entry store");
    Ok(Arc::new(db::PgEntryStore::new(pool)))
}

async fn load_once(dashboard: &mut Dashboard, settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings).await?;
    let entries = store.list().await.context("failed to load entries")?;
    dashboard.apply_snapshot(Snapshot {
        entries: entries.into(),
        loaded: true,
    });
    Ok(())
}

async fn watch(dashboard: &mut Dashboard, store: Arc<dyn EntryStore>) -> anyhow::Result<()> {
    let mut subscription = feed::subscribe(store);
    render(dashboard);

    loop {
        tokio::select! {
            snapshot = subscription.next() => match snapshot {
                Some(snapshot) => {
                    dashboard.apply_snapshot(snapshot);
                    render(dashboard);
                }
                None => {
                    dashboard.apply_snapshot(subscription.current());
                    render(dashboard);
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    Ok(())
}

fn render(dashboard: &Dashboard) {
    print!("\x1B[2J\x1B[H");
    println!("{}", report::build_report(&dashboard.view(), &dashboard.entries()));
}
