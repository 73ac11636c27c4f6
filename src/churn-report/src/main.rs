//! Churn Report — computes advertiser churn metrics from a JSON export of
//! sponsorship invoices and prints them as JSON.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use listing_churn::{ChurnService, InvoiceLedger};
use listing_core::{AppConfig, ChurnFilter, ChurnResult, SponsorshipType};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "churn-report")]
#[command(about = "Advertiser churn and active-cohort metrics for sponsored listings")]
#[command(version)]
struct Cli {
    /// JSON file holding an array of sponsorship invoices
    #[arg(long, env = "LISTING_CHURN__INVOICES")]
    invoices: PathBuf,

    /// TOML config file (environment variables still apply on top)
    #[arg(long)]
    config: Option<String>,

    /// Bridge gaps up to this many seconds when merging spans (overrides config)
    #[arg(long)]
    merge_gap_tolerance_secs: Option<i64>,

    /// Round churn rates to this many decimal places (overrides config)
    #[arg(long)]
    churn_rate_scale: Option<u32>,

    /// Only count this sponsorship type
    #[arg(long, global = true)]
    sponsorship_type: Option<SponsorshipType>,

    /// Only count sponsorships in this category
    #[arg(long, global = true)]
    category_id: Option<i32>,

    /// Only count sponsorships in this subcategory
    #[arg(long, global = true)]
    subcategory_id: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Metrics for an arbitrary window [start, end)
    Window {
        /// Inclusive window start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Exclusive window end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },

    /// Metrics for the calendar month containing an instant
    Month {
        /// Any instant inside the month (RFC 3339)
        #[arg(long)]
        month: DateTime<Utc>,
    },

    /// One point per calendar month in [start, end)
    Series {
        /// First month start (RFC 3339, e.g. 2025-01-01T00:00:00Z)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Exclusive end month start (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_report=info,listing_churn=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from(Some(path))
            .with_context(|| format!("failed to load config file {path}"))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }),
    };

    // Apply CLI overrides
    if let Some(secs) = cli.merge_gap_tolerance_secs {
        config.churn.merge_gap_tolerance_secs = secs;
    }
    if let Some(scale) = cli.churn_rate_scale {
        config.churn.churn_rate_scale = Some(scale);
    }

    let filter = ChurnFilter {
        sponsorship_type: cli.sponsorship_type,
        category_id: cli.category_id,
        subcategory_id: cli.subcategory_id,
    };

    let ledger = Arc::new(InvoiceLedger::new());
    ledger
        .record_json_file(&cli.invoices)
        .with_context(|| format!("failed to load invoices from {}", cli.invoices.display()))?;

    let service = ChurnService::new(ledger, config.churn)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling report");
            on_interrupt.cancel();
        }
    });

    let command = cli.command;
    let report =
        tokio::task::spawn_blocking(move || run(&service, command, &filter, &cancel)).await??;

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("Churn report complete");

    Ok(())
}

fn run(
    service: &ChurnService,
    command: Command,
    filter: &ChurnFilter,
    cancel: &CancellationToken,
) -> ChurnResult<serde_json::Value> {
    let report = match command {
        Command::Window { start, end } => {
            serde_json::to_value(service.compute_window(start, end, filter)?)?
        }
        Command::Month { month } => serde_json::to_value(service.compute_month(month, filter)?)?,
        Command::Series { start, end } => {
            serde_json::to_value(service.compute_monthly_series(start, end, filter, cancel)?)?
        }
    };
    Ok(report)
}
