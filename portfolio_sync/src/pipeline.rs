//! The end-to-end run: reference file → fetch → store → verification.
//!
//! Stages run strictly in order. Empty reference data, zero fetched price series and
//! any store failure end the run; failed symbols and a missing market-index table
//! only reduce what gets loaded.
//!
//! Stopping is cooperative. A shared flag is checked between stages and between
//! symbols, so a stop request lets the current request or per-symbol transaction
//! finish and then ends the run with whatever was committed so far.

use std::{
    fmt,
    future::Future,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use chrono::NaiveDate;
use indexmap::IndexMap;
use market_data_ingestor::{
    MarketDataFetcher,
    fetcher::summarize_series,
    models::{bar_series::PriceSeries, market_index::MarketSnapshot, ratio::MetricSnapshot},
};
use tracing::{error, info, warn};

use crate::{
    config::PipelineConfig,
    db::{connection::StoreSession, migrate::ensure_schema},
    error::PipelineError,
    loader::{self, BatchLoadStats, CompanyLoadStats},
    reference::{Company, load_reference_data},
    stats::{DatabaseStats, database_stats},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadReference,
    FetchPrices,
    FetchMetrics,
    FetchIndices,
    ConnectStore,
    EnsureSchema,
    LoadEntities,
    Verify,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::LoadReference,
        Stage::FetchPrices,
        Stage::FetchMetrics,
        Stage::FetchIndices,
        Stage::ConnectStore,
        Stage::EnsureSchema,
        Stage::LoadEntities,
        Stage::Verify,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::LoadReference => "load reference data",
            Stage::FetchPrices => "fetch prices",
            Stage::FetchMetrics => "fetch financial metrics",
            Stage::FetchIndices => "fetch market indices",
            Stage::ConnectStore => "connect store",
            Stage::EnsureSchema => "ensure schema",
            Stage::LoadEntities => "load entities",
            Stage::Verify => "verify",
        }
    }

    fn number(self) -> usize {
        Stage::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.number(), Stage::ALL.len(), self.name())
    }
}

/// Everything one run needs, resolved from configuration and CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub input_file: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub max_symbols: Option<usize>,
    pub database_url: String,
}

impl PipelineOptions {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            input_file: cfg.data.input_file.clone(),
            start: cfg.data.start_date,
            end: cfg.end_date(),
            max_symbols: cfg.data.max_symbols.filter(|n| *n > 0),
            database_url: cfg.store.database_url.clone(),
        }
    }
}

/// Counts gathered over a run, complete or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub companies_read: usize,
    pub symbols_requested: usize,
    pub price_series: usize,
    pub price_failures: Vec<String>,
    pub metric_snapshots: usize,
    pub metric_failures: Vec<String>,
    pub index_days: usize,
    pub companies: CompanyLoadStats,
    pub prices: BatchLoadStats,
    pub metrics: BatchLoadStats,
    pub market_rows: usize,
    pub verification: DatabaseStats,
}

impl RunReport {
    pub fn log(&self) {
        info!(
            companies_read = self.companies_read,
            inserted = self.companies.inserted,
            updated = self.companies.updated,
            skipped = self.companies.skipped,
            "summary: companies"
        );
        info!(
            fetched = self.price_series,
            requested = self.symbols_requested,
            fetch_failed = self.price_failures.len(),
            rows = self.prices.rows_written,
            load_failed = self.prices.failed_symbols.len(),
            "summary: prices"
        );
        info!(
            fetched = self.metric_snapshots,
            fetch_failed = self.metric_failures.len(),
            rows = self.metrics.rows_written,
            load_failed = self.metrics.failed_symbols.len(),
            "summary: metrics"
        );
        info!(days = self.index_days, rows = self.market_rows, "summary: market indices");
        let v = &self.verification;
        info!(
            companies = v.companies,
            symbols_with_prices = v.symbols_with_prices,
            price_records = v.price_records,
            metric_records = v.metric_records,
            market_records = v.market_records,
            earliest = ?v.earliest_price_date,
            latest = ?v.latest_price_date,
            "summary: store"
        );
    }
}

/// A run that ended early, with the counts gathered up to the failing stage.
#[derive(Debug)]
pub struct RunFailure {
    pub error: PipelineError,
    pub report: RunReport,
}

/// What the store stages write, detached from the fetch stages so it can move onto
/// a blocking thread.
struct StoreBatch {
    database_url: String,
    companies: Vec<Company>,
    prices: IndexMap<String, PriceSeries>,
    metrics: IndexMap<String, MetricSnapshot>,
    indices: Vec<MarketSnapshot>,
}

impl StoreBatch {
    fn load(&self, report: &mut RunReport, cancel: &AtomicBool) -> Result<(), PipelineError> {
        ensure_running(cancel)?;
        info!("{}", Stage::ConnectStore);
        let mut session = StoreSession::open(&self.database_url)?;

        info!("{}", Stage::EnsureSchema);
        ensure_schema(&mut session)?;

        ensure_running(cancel)?;
        info!("{}", Stage::LoadEntities);
        report.companies = loader::load_companies(&mut session, &self.companies)?;
        ensure_running(cancel)?;
        report.prices = loader::load_prices(&mut session, &self.prices, Some(cancel))?;
        ensure_running(cancel)?;
        report.metrics = loader::load_metrics(&mut session, &self.metrics, Some(cancel))?;
        ensure_running(cancel)?;
        report.market_rows = if self.indices.is_empty() {
            warn!("no market data to load");
            0
        } else {
            loader::load_market_summary(&mut session, &self.indices)?
        };

        info!("{}", Stage::Verify);
        report.verification = database_stats(&mut session)?;
        Ok(())
    }
}

fn ensure_running(cancel: &AtomicBool) -> Result<(), PipelineError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(PipelineError::Interrupted);
    }
    Ok(())
}

pub struct Pipeline {
    options: PipelineOptions,
    fetcher: MarketDataFetcher,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions, fetcher: MarketDataFetcher) -> Self {
        Self::with_cancel_flag(options, fetcher, Arc::new(AtomicBool::new(false)))
    }

    /// Builds a pipeline that stops cooperatively once `cancel` is set.
    ///
    /// The flag is shared with the fetcher. Once raised it stays raised: every later
    /// run on this pipeline ends as interrupted.
    pub fn with_cancel_flag(
        options: PipelineOptions,
        fetcher: MarketDataFetcher,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            options,
            fetcher: fetcher.with_cancel(cancel.clone()),
            cancel,
        }
    }

    /// Requests a stop at the next stage or symbol boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Runs every stage once.
    ///
    /// A failure still carries the counts gathered before it.
    pub async fn run(&self) -> Result<RunReport, RunFailure> {
        let mut report = RunReport::default();
        match self.run_stages(&mut report).await {
            Ok(()) => Ok(report),
            Err(error) => Err(RunFailure { error, report }),
        }
    }

    async fn run_stages(&self, report: &mut RunReport) -> Result<(), PipelineError> {
        let opts = &self.options;
        ensure_running(&self.cancel)?;

        info!("{}", Stage::LoadReference);
        let mut companies = load_reference_data(&opts.input_file);
        report.companies_read = companies.len();
        if companies.is_empty() {
            return Err(PipelineError::EmptyReference(opts.input_file.clone()));
        }
        if let Some(cap) = opts.max_symbols {
            companies.truncate(cap);
            warn!(symbols = companies.len(), "symbol cap in effect");
        }
        let symbols: Vec<String> = companies.iter().map(|c| c.symbol.clone()).collect();
        report.symbols_requested = symbols.len();

        info!(source = self.fetcher.source_name(), "{}", Stage::FetchPrices);
        let prices = self
            .fetcher
            .fetch_price_history(&symbols, opts.start, opts.end)
            .await;
        report.price_series = prices.data.len();
        report.price_failures = prices.failed.iter().map(|f| f.symbol.clone()).collect();
        ensure_running(&self.cancel)?;
        if prices.data.is_empty() {
            return Err(PipelineError::NoPriceData {
                attempted: symbols.len(),
            });
        }
        let summary = summarize_series(&prices.data);
        info!(
            series = summary.series,
            records = summary.total_records,
            average = summary.average_records,
            "price history fetched"
        );
        if !prices.failed.is_empty() {
            warn!(failed = ?prices.failed_symbols(), "some price fetches failed");
        }

        info!("{}", Stage::FetchMetrics);
        let metrics = self.fetcher.fetch_financial_metrics(&symbols).await;
        report.metric_snapshots = metrics.data.len();
        report.metric_failures = metrics.failed.iter().map(|f| f.symbol.clone()).collect();
        ensure_running(&self.cancel)?;
        if !metrics.failed.is_empty() {
            warn!(failed = ?metrics.failed_symbols(), "some metric fetches failed");
        }

        info!("{}", Stage::FetchIndices);
        let indices = self.fetcher.fetch_market_indices(opts.start, opts.end).await;
        report.index_days = indices.len();
        ensure_running(&self.cancel)?;

        let batch = StoreBatch {
            database_url: opts.database_url.clone(),
            companies,
            prices: prices.data,
            metrics: metrics.data,
            indices,
        };
        let cancel = self.cancel.clone();
        let mut partial = report.clone();
        let (partial, result) = tokio::task::spawn_blocking(move || {
            let result = batch.load(&mut partial, &cancel);
            (partial, result)
        })
        .await?;
        *report = partial;
        result
    }

    /// Runs the pipeline until it finishes or stops.
    ///
    /// When `shutdown` resolves first, the cancel flag is raised and the run is
    /// awaited to its next stage or symbol boundary, so an in-progress transaction
    /// commits or rolls back before the store session is released. The report is
    /// logged either way. Returns `true` only for a completed run.
    pub async fn execute<F>(&self, shutdown: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let run = self.run();
        tokio::pin!(run);
        tokio::pin!(shutdown);

        let finished = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            result = &mut run => Some(result),
        };
        let result = match finished {
            Some(result) => result,
            None => {
                warn!("shutdown requested, stopping at the next boundary");
                self.cancel();
                run.await
            }
        };
        let elapsed = started.elapsed();

        match result {
            Ok(report) => {
                report.log();
                info!(?elapsed, "pipeline completed");
                true
            }
            Err(RunFailure {
                error: PipelineError::Interrupted,
                report,
            }) => {
                report.log();
                warn!(?elapsed, "pipeline interrupted");
                false
            }
            Err(RunFailure { error, report }) => {
                report.log();
                error!(error = %error, ?elapsed, "pipeline failed");
                false
            }
        }
    }
}
