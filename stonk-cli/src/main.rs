//! Stonk CLI: price ranges, fundamentals, ticker index and inventory commands.
//!
//! Commands:
//! - `range`: resolve a date range for a ticker (cache, archive or Stooq)
//! - `next-day`: first trading day after a date
//! - `fundamentals fetch|remaining`: quota-gated EODHD fundamentals
//! - `tickers build|stats|lookup`: the archive's ticker index
//! - `scan`: write a directory inventory manifest

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stonk_core::data::TickerSource;
use stonk_core::fundamentals::{FundamentalsClient, QuotaTracker};
use stonk_core::inventory::{self, OutputFormat};
use stonk_core::{FundamentalsConfig, Market, Periodicity, StonkConfig, TickerId};
use tracing::info;

#[derive(Parser)]
#[command(name = "stonk", about = "Stonk CLI: stock price series toolkit")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. debug, stonk_core=trace).
    #[arg(long, global = true, default_value = "stonk_core=info,stonk=info")]
    log_level: String,

    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a date range for a ticker and print it.
    Range {
        /// Ticker, e.g. NVDA or NVDA.US.
        ticker: String,

        /// Start date (YYYY-MM-DD).
        start: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        end: Option<String>,

        /// Monthly rows instead of daily.
        #[arg(long, default_value_t = false)]
        monthly: bool,

        /// Write the cached table for this periodicity to a CSV file.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Print the first trading day after a date.
    NextDay {
        ticker: String,

        /// Date (YYYY-MM-DD).
        date: String,
    },
    /// EODHD fundamentals commands.
    Fundamentals {
        #[command(subcommand)]
        action: FundamentalsAction,
    },
    /// Ticker index commands.
    Tickers {
        #[command(subcommand)]
        action: TickersAction,
    },
    /// Write a JSON and/or CSV inventory of a directory tree.
    Scan {
        /// Directory to scan.
        #[arg(default_value = ".")]
        root: PathBuf,

        /// json, csv or both.
        #[arg(long, default_value = "both")]
        format: String,

        /// Directory names to skip (repeatable).
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Where manifests are written.
        #[arg(long, default_value = "logs")]
        logs_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum FundamentalsAction {
    /// Fetch fundamentals for a ticker and print the JSON.
    Fetch { ticker: String },
    /// Print how many calls remain today.
    Remaining,
}

#[derive(Subcommand)]
enum TickersAction {
    /// Build the formatted index from `find .` output run in the archive root.
    Build {
        /// File holding the raw listing.
        listing: PathBuf,
    },
    /// Entries per country and duplicated tickers.
    Stats,
    /// Print the archive path for a ticker.
    Lookup { ticker: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = match &cli.config {
        Some(path) => StonkConfig::from_file(path)?,
        None => StonkConfig::default(),
    };

    match cli.command {
        Commands::Range {
            ticker,
            start,
            end,
            monthly,
            export,
        } => run_range(&config, &ticker, &start, end.as_deref(), monthly, export.as_deref()),
        Commands::NextDay { ticker, date } => run_next_day(&config, &ticker, &date),
        Commands::Fundamentals { action } => match action {
            FundamentalsAction::Fetch { ticker } => run_fundamentals_fetch(&ticker),
            FundamentalsAction::Remaining => run_fundamentals_remaining(),
        },
        Commands::Tickers { action } => match action {
            TickersAction::Build { listing } => run_tickers_build(&config, &listing),
            TickersAction::Stats => run_tickers_stats(&config),
            TickersAction::Lookup { ticker } => run_tickers_lookup(&config, &ticker),
        },
        Commands::Scan {
            root,
            format,
            exclude,
            logs_dir,
        } => run_scan(&root, &format, &exclude, &logs_dir),
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn parse_ticker(s: &str) -> Result<TickerId> {
    s.parse::<TickerId>().map_err(anyhow::Error::msg)
}

fn run_range(
    config: &StonkConfig,
    ticker: &str,
    start: &str,
    end: Option<&str>,
    monthly: bool,
    export: Option<&Path>,
) -> Result<()> {
    let id = parse_ticker(ticker)?;
    let start = parse_date(start)?;
    let end = end
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let periodicity = if monthly {
        Periodicity::Monthly
    } else {
        Periodicity::Daily
    };

    let mut market = Market::from_config(config)?;
    let stonk = market.stonk(&id);
    let resolution = stonk.resolve(
        start.and_time(chrono::NaiveTime::MIN),
        end.and_time(chrono::NaiveTime::MIN),
        periodicity,
        true,
    );

    match resolution.source {
        Some(source) => info!(ticker = %id, ?source, rows = resolution.rows.len(), "range resolved"),
        None => println!("Requested window lies in the future; nothing to show."),
    }
    stonk.print();

    if let Some(path) = export {
        let file = std::fs::File::create(path)
            .with_context(|| format!("create {}", path.display()))?;
        stonk.series().export_csv(periodicity, file)?;
        println!("Exported {periodicity} rows to {}", path.display());
    }
    Ok(())
}

fn run_next_day(config: &StonkConfig, ticker: &str, date: &str) -> Result<()> {
    let id = parse_ticker(ticker)?;
    let date = parse_date(date)?;

    let mut market = Market::from_config(config)?;
    let next = market.stonk(&id).next_trading_day(date)?;
    println!("{next}");
    Ok(())
}

fn run_fundamentals_fetch(ticker: &str) -> Result<()> {
    let id = parse_ticker(ticker)?;
    let config = FundamentalsConfig::from_env()?;
    let mut client = FundamentalsClient::new(config)?;

    let data = client.fetch(&id)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    eprintln!("Remaining calls today: {}", client.remaining_calls());
    Ok(())
}

fn run_fundamentals_remaining() -> Result<()> {
    let config = FundamentalsConfig::from_env()?;
    let quota = QuotaTracker::open(&config.log_directory, config.daily_limit)?;
    println!(
        "{} of {} calls remaining today",
        quota.remaining_calls(),
        quota.daily_limit()
    );
    Ok(())
}

fn run_tickers_build(config: &StonkConfig, listing: &Path) -> Result<()> {
    let text = std::fs::read_to_string(listing)
        .with_context(|| format!("read listing {}", listing.display()))?;
    let index = TickerSource::from_listing(&text, config.archive_root.clone());
    if index.is_empty() {
        bail!("no ticker files found in {}", listing.display());
    }

    index.write_formatted(&config.ticker_index)?;
    println!(
        "Wrote {} entries to {}",
        index.len(),
        config.ticker_index.display()
    );
    Ok(())
}

fn load_index(config: &StonkConfig) -> Result<TickerSource> {
    Ok(TickerSource::load(&config.ticker_index, config.archive_root.clone())?)
}

fn run_tickers_stats(config: &StonkConfig) -> Result<()> {
    let index = load_index(config)?;

    println!("Ticker index: {}", config.ticker_index.display());
    println!("  Entries: {}", index.len());
    println!();
    println!("{:<10} {:>8}", "Country", "Tickers");
    println!("{}", "-".repeat(19));
    for (country, count) in index.country_counts() {
        println!("{country:<10} {count:>8}");
    }

    let dupes = index.duplicate_tickers();
    if !dupes.is_empty() {
        println!();
        println!("Duplicated tickers ({}):", dupes.len());
        for (ticker, count) in dupes {
            println!("  {ticker:<10} x{count}");
        }
    }
    Ok(())
}

fn run_tickers_lookup(config: &StonkConfig, ticker: &str) -> Result<()> {
    let id = parse_ticker(ticker)?;
    let index = load_index(config)?;
    let path = index.lookup(id.symbol(), id.country())?;

    let marker = if path.is_file() { "" } else { " (missing on disk)" };
    println!("{}{marker}", path.display());
    Ok(())
}

fn run_scan(root: &Path, format: &str, exclude: &[String], logs_dir: &Path) -> Result<()> {
    let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
    let items = inventory::scan(root, exclude)?;
    let paths = inventory::write_manifest(&items, root, logs_dir, format)?;

    if let Some(json) = paths.json {
        println!("JSON manifest: {}", json.display());
    }
    if let Some(csv) = paths.csv {
        println!("CSV manifest:  {}", csv.display());
    }
    println!("Total items scanned: {}", items.len());
    Ok(())
}
