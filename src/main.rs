//! Click Feature Store CLI
//!
//! Replays keyed events through a sliding-window store and runs the ad-event
//! batch stages.

use anyhow::{bail, Context};
use chrono::Duration;
use clap::{Parser, Subcommand, ValueEnum};
use click_feature_store::{
    config::Config,
    core::{OrderingPolicy, SlidingWindowStore, StoreError},
    pipeline::{
        clean_ad_events, compute_ad_metrics, parse_timestamp, read_csv, write_csv, write_rows,
        AdEvent, CleanedEvent, KeyedEvent,
    },
    VERSION,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "click-features")]
#[command(version = VERSION)]
#[command(about = "Sliding-window click features and ad-event batch stages", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count events per key within the window ending at an instant
    Count {
        /// CSV with `user_id,timestamp` columns
        #[arg(long)]
        events: PathBuf,

        /// Instant to count as of (`YYYY-MM-DD HH:MM:SS` or RFC 3339)
        #[arg(long)]
        as_of: String,

        /// Only report these keys (default: every key seen)
        #[arg(long)]
        key: Vec<String>,

        /// Window length in days (overrides the config file)
        #[arg(long)]
        window_days: Option<i64>,

        /// Late-event handling (overrides the config file)
        #[arg(long, value_enum)]
        ordering: Option<OrderingArg>,

        /// Print counts as JSON
        #[arg(long)]
        json: bool,

        /// Print store statistics after the counts
        #[arg(long)]
        stats: bool,
    },

    /// Clean a raw ad-event table
    Clean {
        /// Raw CSV with `user_id,ad_id,impression_ts,click_ts,purchase_value`
        #[arg(long, short)]
        input: PathBuf,

        /// Destination for the cleaned table
        #[arg(long, short)]
        output: PathBuf,

        /// Allowed ad ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        valid_ad_ids: Vec<u64>,
    },

    /// Aggregate a cleaned table into per-ad metrics
    Metrics {
        /// Cleaned CSV as written by `clean`
        #[arg(long, short)]
        input: PathBuf,

        /// Destination for the metrics table (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderingArg {
    Reorder,
    Permissive,
    Reject,
}

impl From<OrderingArg> for OrderingPolicy {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::Reorder => OrderingPolicy::Reorder,
            OrderingArg::Permissive => OrderingPolicy::Permissive,
            OrderingArg::Reject => OrderingPolicy::Reject,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Count {
            events,
            as_of,
            key,
            window_days,
            ordering,
            json,
            stats,
        } => cmd_count(events, &as_of, key, window_days, ordering, json, stats),
        Commands::Clean {
            input,
            output,
            valid_ad_ids,
        } => cmd_clean(input, output, valid_ad_ids),
        Commands::Metrics { input, output } => cmd_metrics(input, output),
        Commands::Config { save } => cmd_config(save),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Structured logs go to stderr so table output on stdout stays clean.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

#[allow(clippy::too_many_arguments)]
fn cmd_count(
    events_path: PathBuf,
    as_of: &str,
    keys: Vec<String>,
    window_days: Option<i64>,
    ordering: Option<OrderingArg>,
    json: bool,
    show_stats: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(days) = window_days {
        config.window = match Duration::try_days(days) {
            Some(window) => window,
            None => bail!("--window-days out of range: {days}"),
        };
    }
    if let Some(ordering) = ordering {
        config.ordering = ordering.into();
    }

    let store: SlidingWindowStore = config.build_store().context("Failed to build store")?;
    let as_of = parse_timestamp(as_of).with_context(|| format!("Invalid --as-of {as_of:?}"))?;

    let events: Vec<KeyedEvent> = read_csv(&events_path)
        .with_context(|| format!("Failed to read events from {events_path:?}"))?;

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut future = 0usize;
    let mut rejected = 0usize;
    for event in events {
        if event.timestamp > as_of {
            future += 1;
            continue;
        }
        seen.insert(event.user_id.clone());
        match store.record(event.user_id, event.timestamp) {
            Ok(()) => {}
            Err(e @ StoreError::OutOfOrderEvent { .. }) => {
                tracing::warn!("Skipping event: {e}");
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    if future > 0 {
        tracing::info!(future, "Ignored events after the as-of instant");
    }

    let report_keys: Vec<String> = if keys.is_empty() {
        seen.into_iter().collect()
    } else {
        keys
    };
    let counts: BTreeMap<String, usize> = report_keys
        .into_iter()
        .map(|key| {
            let count = store.query(key.as_str(), as_of);
            (key, count)
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        for (key, count) in &counts {
            println!("{key}\t{count}");
        }
    }

    if rejected > 0 {
        eprintln!("Warning: {rejected} out-of-order events were rejected");
    }
    if show_stats {
        eprintln!();
        eprintln!("{}", store.stats().summary());
    }

    Ok(())
}

fn cmd_clean(input: PathBuf, output: PathBuf, valid_ad_ids: Vec<u64>) -> anyhow::Result<()> {
    let events: Vec<AdEvent> =
        read_csv(&input).with_context(|| format!("Failed to read raw events from {input:?}"))?;
    let valid: HashSet<u64> = valid_ad_ids.into_iter().collect();

    let (cleaned, report) = clean_ad_events(events, &valid);

    write_csv(&output, &cleaned)
        .with_context(|| format!("Failed to write cleaned events to {output:?}"))?;

    println!(
        "Cleaned {} rows into {} ({} dropped)",
        report.input_rows,
        report.output_rows,
        report.dropped()
    );
    println!("  Duplicates: {}", report.duplicates);
    println!(
        "  Click before impression: {}",
        report.click_before_impression
    );
    println!(
        "  Negative purchases clamped: {}",
        report.negative_purchase_clamped
    );
    println!("  Missing impression: {}", report.missing_impression);
    println!("  Purchase without click: {}", report.purchase_without_click);
    println!("  Invalid ad id: {}", report.invalid_ad_id);
    println!("Wrote {output:?}");

    Ok(())
}

fn cmd_metrics(input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let cleaned: Vec<CleanedEvent> = read_csv(&input)
        .with_context(|| format!("Failed to read cleaned events from {input:?}"))?;

    let metrics = compute_ad_metrics(&cleaned);

    match output {
        Some(path) => {
            write_csv(&path, &metrics)
                .with_context(|| format!("Failed to write metrics to {path:?}"))?;
            println!("Wrote metrics for {} ads to {path:?}", metrics.len());
        }
        None => write_rows(std::io::stdout().lock(), &metrics)?,
    }

    Ok(())
}

fn cmd_config(save: bool) -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Click Feature Store Configuration");
    println!("=================================");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save().context("Failed to save configuration")?;
        println!();
        println!("Configuration saved.");
    }

    Ok(())
}
