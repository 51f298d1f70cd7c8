mod common;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{REFERENCE_CSV, TestDb, count, date, fk_check_empty};
use market_data_ingestor::{
    MarketDataFetcher, QuoteSource,
    errors::FetchErrorKind,
    models::{bar::RawBar, ratio::RatioRow, request_params::HistoryRequest},
    pacing::FixedDelay,
    progress::{FetchProgress, SilentProgress},
    providers::{NoDataSnafu, ProviderError, StatusSnafu},
};
use portfolio_sync::{
    PipelineError, StoreError,
    db::connection::connect_sqlite,
    pipeline::{Pipeline, PipelineOptions, RunFailure, RunReport},
};
use tempfile::TempDir;

/// Serves canned history per symbol; anything not listed answers HTTP 500.
#[derive(Default)]
struct CannedSource {
    history: HashMap<String, Vec<RawBar>>,
    ratios: HashMap<String, Vec<RatioRow>>,
}

impl CannedSource {
    fn with_history(mut self, symbol: &str, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| RawBar::full(date(2024, 5, 2 + i as u32), *c, *c + 1.0, *c - 1.0, *c, 1_000.0))
            .collect();
        self.history.insert(symbol.to_string(), bars);
        self
    }

    fn with_ratios(mut self, symbol: &str, year: i32, pe: f64) -> Self {
        self.ratios.insert(
            symbol.to_string(),
            vec![RatioRow {
                ticker: Some(symbol.to_string()),
                year: Some(year),
                price_to_earning: Some(pe),
                ..Default::default()
            }],
        );
        self
    }
}

#[async_trait]
impl QuoteSource for CannedSource {
    fn name(&self) -> &str {
        "canned"
    }

    async fn fetch_history(&self, req: &HistoryRequest) -> Result<Vec<RawBar>, ProviderError> {
        match self.history.get(&req.symbol) {
            Some(bars) => Ok(bars.clone()),
            None => StatusSnafu {
                symbol: req.symbol.as_str(),
                status: 500u16,
                message: "internal error",
            }
            .fail(),
        }
    }

    async fn fetch_ratios(&self, symbol: &str) -> Result<Vec<RatioRow>, ProviderError> {
        match self.ratios.get(symbol) {
            Some(rows) => Ok(rows.clone()),
            None => NoDataSnafu { symbol }.fail(),
        }
    }
}

fn fetcher(source: CannedSource) -> MarketDataFetcher {
    MarketDataFetcher::new(Arc::new(source))
        .with_pacing(Arc::new(FixedDelay::new(Duration::ZERO)))
        .with_progress(Arc::new(SilentProgress))
}

fn workspace() -> (TestDb, PipelineOptions) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.db").to_string_lossy().to_string();
    let db = TestDb { dir, path };
    let input = db.write_file("companies.csv", REFERENCE_CSV);
    let options = PipelineOptions {
        input_file: input,
        start: date(2024, 5, 1),
        end: date(2024, 5, 31),
        max_symbols: None,
        database_url: format!("sqlite://{}", db.path),
    };
    (db, options)
}

fn full_source() -> CannedSource {
    CannedSource::default()
        .with_history("AAA", &[10.0, 10.5, 11.0])
        .with_history("BBB", &[20.0, 19.0])
        .with_history("CCC", &[5.0, 5.5, 6.0, 6.5])
        .with_history("VNINDEX", &[1_200.0, 1_212.0, 1_206.0])
        .with_history("VN30", &[1_250.0, 1_260.0])
        .with_ratios("AAA", 2023, 12.0)
        .with_ratios("CCC", 2022, 8.5)
}

#[tokio::test]
async fn full_run_loads_every_entity() {
    let (db, options) = workspace();
    let pipeline = Pipeline::new(options, fetcher(full_source()));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.companies_read, 3);
    assert_eq!(report.companies.inserted, 3);
    assert_eq!(report.price_series, 3);
    assert!(report.price_failures.is_empty());
    assert_eq!(report.metric_snapshots, 2);
    assert_eq!(report.metric_failures, vec!["BBB".to_string()]);
    assert_eq!(report.index_days, 3);
    assert_eq!(report.market_rows, 3);

    let v = &report.verification;
    assert_eq!(v.companies, 3);
    assert_eq!(v.symbols_with_prices, 3);
    assert_eq!(v.price_records, 9);
    assert_eq!(v.metric_records, 2);
    assert_eq!(v.market_records, 3);
    assert_eq!(v.earliest_price_date, Some(date(2024, 5, 2)));
    assert_eq!(v.latest_price_date, Some(date(2024, 5, 5)));

    let mut conn = connect_sqlite(&db.path).unwrap();
    assert_eq!(count(&mut conn, "market_summary WHERE vn30 IS NULL"), 1);
    assert_eq!(count(&mut conn, "market_summary WHERE hnx30 IS NULL"), 3);
    assert_eq!(count(&mut conn, "v_stock_dashboard"), 3);
    fk_check_empty(&mut conn);
}

#[tokio::test]
async fn second_run_leaves_one_row_per_key() {
    let (db, options) = workspace();
    let pipeline = Pipeline::new(options, fetcher(full_source()));

    let first = pipeline.run().await.unwrap();
    let second = pipeline.run().await.unwrap();
    assert_eq!(second.companies.inserted, 0);
    assert_eq!(second.companies.updated, 3);
    assert_eq!(first.verification, second.verification);

    let mut conn = connect_sqlite(&db.path).unwrap();
    assert_eq!(count(&mut conn, "stock_prices_daily"), 9);
    assert_eq!(count(&mut conn, "exchanges"), 3);
}

#[tokio::test]
async fn failed_symbol_does_not_block_the_rest() {
    let (db, options) = workspace();
    let source = CannedSource::default()
        .with_history("BBB", &[20.0, 19.0])
        .with_history("CCC", &[5.0, 5.5]);
    let pipeline = Pipeline::new(options, fetcher(source));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.price_failures, vec!["AAA".to_string()]);
    assert_eq!(report.price_series, 2);
    assert_eq!(report.index_days, 0);
    assert_eq!(report.market_rows, 0);

    let mut conn = connect_sqlite(&db.path).unwrap();
    assert_eq!(count(&mut conn, "stock_prices_daily WHERE symbol = 'AAA'"), 0);
    assert_eq!(count(&mut conn, "stock_prices_daily WHERE symbol = 'BBB'"), 2);
    assert_eq!(count(&mut conn, "stock_prices_daily WHERE symbol = 'CCC'"), 2);
    assert_eq!(count(&mut conn, "companies"), 3);
}

#[tokio::test]
async fn symbol_cap_limits_fetch_and_load() {
    let (db, mut options) = workspace();
    options.max_symbols = Some(2);
    let pipeline = Pipeline::new(options, fetcher(full_source()));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.symbols_requested, 2);
    assert_eq!(report.verification.companies, 2);

    let mut conn = connect_sqlite(&db.path).unwrap();
    assert_eq!(count(&mut conn, "companies WHERE symbol = 'CCC'"), 0);
}

#[tokio::test]
async fn empty_reference_fails_before_touching_the_store() {
    let (db, mut options) = workspace();
    options.input_file = db.write_file("empty.csv", "symbol,organ_name,icb_name,exchange\n");
    let pipeline = Pipeline::new(options, fetcher(full_source()));

    let failure = pipeline.run().await.unwrap_err();
    assert!(matches!(failure.error, PipelineError::EmptyReference(_)), "{}", failure.error);
    assert_eq!(failure.report, RunReport::default());
    assert!(!std::path::Path::new(&db.path).exists());
}

#[tokio::test]
async fn no_price_data_is_fatal() {
    let (db, options) = workspace();
    let pipeline = Pipeline::new(options, fetcher(CannedSource::default()));

    match pipeline.run().await {
        Err(RunFailure {
            error: PipelineError::NoPriceData { attempted },
            report,
        }) => {
            assert_eq!(attempted, 3);
            assert_eq!(report.companies_read, 3);
            assert_eq!(report.price_failures.len(), 3);
        }
        other => panic!("expected NoPriceData, got {other:?}"),
    }
    assert!(!std::path::Path::new(&db.path).exists());
    assert!(!pipeline.execute(std::future::pending::<()>()).await);
}

#[tokio::test]
async fn shutdown_interrupts_the_run() {
    let (db, options) = workspace();
    let pipeline = Pipeline::new(options, fetcher(full_source()));

    assert!(!pipeline.execute(async {}).await);
    assert!(!std::path::Path::new(&db.path).exists());

    // A stopped pipeline stays stopped; a fresh one runs to completion.
    assert!(!pipeline.execute(std::future::pending::<()>()).await);
    let (db, options) = workspace();
    let pipeline = Pipeline::new(options, fetcher(full_source()));
    assert!(pipeline.execute(std::future::pending::<()>()).await);
    let mut conn = connect_sqlite(&db.path).unwrap();
    assert_eq!(count(&mut conn, "companies"), 3);
}

/// Raises the cancel flag once the named index has been fetched.
struct StopAfterIndex {
    index: &'static str,
    flag: Arc<AtomicBool>,
}

impl FetchProgress for StopAfterIndex {
    fn on_start(&self, _: &str, _: &str, _: usize, _: usize) {}

    fn on_complete(
        &self,
        stage: &str,
        symbol: &str,
        _: usize,
        _: usize,
        _: Result<usize, (FetchErrorKind, &str)>,
    ) {
        if stage == "indices" && symbol == self.index {
            self.flag.store(true, Ordering::Relaxed);
        }
    }

    fn on_batch_complete(&self, _: &str, _: usize, _: usize, _: usize) {}
}

#[tokio::test]
async fn stop_after_fetching_skips_the_store_and_keeps_counts() {
    let (db, options) = workspace();
    let flag = Arc::new(AtomicBool::new(false));
    let fetcher = fetcher(full_source()).with_progress(Arc::new(StopAfterIndex {
        index: "VN30",
        flag: flag.clone(),
    }));
    let pipeline = Pipeline::with_cancel_flag(options, fetcher, flag);

    let failure = pipeline.run().await.unwrap_err();
    assert!(matches!(failure.error, PipelineError::Interrupted), "{}", failure.error);
    assert_eq!(failure.report.price_series, 3);
    assert_eq!(failure.report.metric_snapshots, 2);
    // VNINDEX and VN30 were fetched before the stop; the rest were never requested.
    assert_eq!(failure.report.index_days, 3);
    assert_eq!(failure.report.prices, Default::default());
    assert!(!std::path::Path::new(&db.path).exists());
    assert!(!pipeline.execute(std::future::pending::<()>()).await);
}

#[tokio::test]
async fn unopenable_store_fails_the_run_after_fetching() {
    let (db, mut options) = workspace();
    // A regular file where the database directory should be.
    let blocker = db.write_file("blocker", "not a directory");
    options.database_url = format!("sqlite://{}/nested/run.db", blocker.display());
    let pipeline = Pipeline::new(options, fetcher(full_source()));

    let failure = pipeline.run().await.unwrap_err();
    assert!(
        matches!(failure.error, PipelineError::Store(StoreError::Connection { .. })),
        "{}",
        failure.error
    );
    assert_eq!(failure.report.companies_read, 3);
    assert_eq!(failure.report.price_series, 3);
    assert_eq!(failure.report.metric_snapshots, 2);
    assert_eq!(failure.report.index_days, 3);
    assert_eq!(failure.report.companies, Default::default());
    assert!(!pipeline.execute(std::future::pending::<()>()).await);
}

#[test]
fn options_follow_configuration() {
    let cfg = portfolio_sync::config::PipelineConfig::default();
    let options = PipelineOptions::from_config(&cfg);
    assert_eq!(options.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(options.database_url, "data/portfolio.db");
    assert_eq!(options.max_symbols, None);
}
