use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use portfolio_sync::{
    config::{PipelineConfig, exchange_today},
    db::{connection::StoreSession, migrate::ensure_schema},
    pipeline::{Pipeline, PipelineOptions},
    reference::{clean_reference_rows, read_reference_rows, summarize_companies, validate_reference_rows},
    stats::database_stats,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(version, about = "Vietnamese equities data pipeline")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch everything and load it into the store.
    Run(RunArgs),
    /// Validate and summarize the reference file.
    Inspect {
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// Print the latest close for each symbol.
    LatestPrices {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Create or upgrade the store schema and print its counts.
    Schema {
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Process only the first N symbols of the reference file.
    #[arg(long)]
    max_symbols: Option<usize>,
    #[arg(long)]
    database_url: Option<String>,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(false)).init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available: never interrupt.
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut cfg = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.cmd {
        Cmd::Run(args) => {
            if let Some(input) = args.input {
                cfg.data.input_file = input;
            }
            if let Some(start) = args.start {
                cfg.data.start_date = start;
            }
            if args.end.is_some() {
                cfg.data.end_date = args.end;
            }
            if args.max_symbols.is_some() {
                cfg.data.max_symbols = args.max_symbols;
            }
            if let Some(url) = args.database_url {
                cfg.store.database_url = url;
            }
            cfg.validate()?;
            info!(config = %cfg.redacted_summary(), "starting pipeline");

            let pipeline = Pipeline::new(PipelineOptions::from_config(&cfg), cfg.build_fetcher()?);
            if !pipeline.execute(shutdown_signal()).await {
                std::process::exit(1);
            }
        }
        Cmd::Inspect { input } => {
            let path = input.unwrap_or(cfg.data.input_file);
            let rows = read_reference_rows(&path)?;
            let report = validate_reference_rows(&rows);
            if report.is_valid() {
                println!("reference data is valid");
            } else {
                println!("reference data has problems:");
                for e in report.errors() {
                    println!("  - {e}");
                }
            }
            let (companies, cleaning) = clean_reference_rows(rows);
            let summary = summarize_companies(&companies);
            println!(
                "companies: {} ({} rows read, {} incomplete, {} duplicates)",
                summary.total, cleaning.rows_read, cleaning.incomplete, cleaning.duplicates
            );
            println!("industries: {}", summary.distinct_industries);
            for (exchange, n) in &summary.by_exchange {
                println!("  {exchange}: {n}");
            }
        }
        Cmd::LatestPrices { symbols } => {
            cfg.validate()?;
            let fetcher = cfg.build_fetcher()?;
            let prices = fetcher.fetch_latest_prices(&symbols, exchange_today()).await;
            for symbol in &symbols {
                match prices.get(symbol) {
                    Some(close) => println!("{symbol}\t{close}"),
                    None => println!("{symbol}\t-"),
                }
            }
        }
        Cmd::Schema { database_url } => {
            let url = database_url.unwrap_or(cfg.store.database_url);
            let mut session = StoreSession::open(&url)?;
            ensure_schema(&mut session)?;
            let stats = database_stats(&mut session)?;
            println!("{stats:#?}");
        }
    }

    Ok(())
}
