//! Sequential, paced fetch loops over a [`QuoteSource`].
//!
//! Every loop has the same shape: request one symbol, classify the outcome, report
//! progress, pause, move on. A failing symbol is recorded with its
//! [`FetchErrorKind`] and never aborts the loop. No pause follows the last symbol.
//! A raised cancel flag ends a loop before its next symbol.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{Datelike, Days, NaiveDate, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    errors::FetchErrorKind,
    models::{
        bar::RawBar,
        bar_series::PriceSeries,
        market_index::{IndexLevel, MarketIndex, MarketSnapshot},
        ratio::MetricSnapshot,
        request_params::HistoryRequest,
    },
    normalize::{clean_price_series, condense_ratios, index_changes},
    pacing::{FixedDelay, RequestPacing},
    progress::{FetchProgress, TracingProgress},
    providers::{ProviderError, QuoteSource},
};

/// Calendar days looked back by [`MarketDataFetcher::fetch_latest_prices`].
pub const LATEST_PRICE_LOOKBACK_DAYS: u64 = 7;

const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// A symbol that produced no usable data.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSymbol {
    pub symbol: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FailedSymbol {
    fn new(symbol: &str, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            message: message.into(),
        }
    }

    fn from_provider(symbol: &str, err: &ProviderError) -> Self {
        Self::new(symbol, err.kind(), err.to_string())
    }
}

/// Per-symbol results of one fetch stage, in input order.
#[derive(Debug, Clone)]
pub struct FetchOutcome<T> {
    pub data: IndexMap<String, T>,
    pub failed: Vec<FailedSymbol>,
}

impl<T> Default for FetchOutcome<T> {
    fn default() -> Self {
        Self {
            data: IndexMap::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> FetchOutcome<T> {
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.symbol.as_str()).collect()
    }
}

/// Record counts over a set of price series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    pub series: usize,
    pub total_records: usize,
    pub average_records: f64,
    pub date_ranges: IndexMap<String, (NaiveDate, NaiveDate)>,
}

pub fn summarize_series(series: &IndexMap<String, PriceSeries>) -> SeriesSummary {
    let total_records: usize = series.values().map(PriceSeries::len).sum();
    let average_records = if series.is_empty() {
        0.0
    } else {
        total_records as f64 / series.len() as f64
    };
    SeriesSummary {
        series: series.len(),
        total_records,
        average_records,
        date_ranges: series
            .iter()
            .filter_map(|(sym, s)| s.date_range().map(|r| (sym.clone(), r)))
            .collect(),
    }
}

/// Fetches prices, ratios and index levels one symbol at a time.
///
/// Each stage has its own pacing policy; by default all three pause 5 seconds between
/// symbols and never retry.
pub struct MarketDataFetcher {
    source: Arc<dyn QuoteSource>,
    price_pacing: Arc<dyn RequestPacing>,
    metric_pacing: Arc<dyn RequestPacing>,
    index_pacing: Arc<dyn RequestPacing>,
    progress: Arc<dyn FetchProgress>,
    cancel: Option<Arc<AtomicBool>>,
}

impl MarketDataFetcher {
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        let pacing: Arc<dyn RequestPacing> = Arc::new(FixedDelay::new(DEFAULT_DELAY));
        Self {
            source,
            price_pacing: pacing.clone(),
            metric_pacing: pacing.clone(),
            index_pacing: pacing,
            progress: Arc::new(TracingProgress),
            cancel: None,
        }
    }

    /// Uses `pacing` for every stage.
    pub fn with_pacing(mut self, pacing: Arc<dyn RequestPacing>) -> Self {
        self.price_pacing = pacing.clone();
        self.metric_pacing = pacing.clone();
        self.index_pacing = pacing;
        self
    }

    pub fn with_metric_pacing(mut self, pacing: Arc<dyn RequestPacing>) -> Self {
        self.metric_pacing = pacing;
        self
    }

    pub fn with_index_pacing(mut self, pacing: Arc<dyn RequestPacing>) -> Self {
        self.index_pacing = pacing;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Stops every loop before its next request once `flag` is set.
    ///
    /// Symbols not yet requested are neither fetched nor reported as failed.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Daily history for each symbol over `[start, end]`, cleaned and enriched.
    ///
    /// A symbol fails when the request fails, returns no rows, or cannot be normalized.
    pub async fn fetch_price_history(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchOutcome<PriceSeries> {
        info!(symbols = symbols.len(), %start, %end, "fetching price history");
        let this = self;
        self.run_stage("prices", this.price_pacing.as_ref(), symbols, move |symbol| async move {
            let series = this.history_series(&symbol, start, end).await?;
            let records = series.len();
            Ok::<_, FailedSymbol>((series, records))
        })
        .await
    }

    /// The most recent yearly ratio snapshot for each symbol.
    pub async fn fetch_financial_metrics(&self, symbols: &[String]) -> FetchOutcome<MetricSnapshot> {
        info!(symbols = symbols.len(), "fetching financial metrics");
        let this = self;
        let fallback_year = Utc::now().year();
        self.run_stage("metrics", this.metric_pacing.as_ref(), symbols, move |symbol| async move {
            let source = this.source.as_ref();
            let sym = symbol.as_str();
            let rows = this
                .with_retry(this.metric_pacing.as_ref(), sym, move || source.fetch_ratios(sym))
                .await
                .map_err(|e| FailedSymbol::from_provider(sym, &e))?;
            let snapshot = condense_ratios(sym, &rows, fallback_year).ok_or_else(|| {
                FailedSymbol::new(sym, FetchErrorKind::NoData, "empty ratio history")
            })?;
            Ok::<_, FailedSymbol>((snapshot, rows.len()))
        })
        .await
    }

    /// Latest close per symbol over a short lookback ending at `today`.
    ///
    /// Symbols without data are left out of the map.
    pub async fn fetch_latest_prices(&self, symbols: &[String], today: NaiveDate) -> IndexMap<String, f64> {
        let start = today
            .checked_sub_days(Days::new(LATEST_PRICE_LOOKBACK_DAYS))
            .unwrap_or(today);
        let this = self;
        let outcome = self
            .run_stage("latest", this.price_pacing.as_ref(), symbols, move |symbol| async move {
                let series = this.history_series(&symbol, start, today).await?;
                let close = series.latest().map(|b| b.close).ok_or_else(|| {
                    FailedSymbol::new(&symbol, FetchErrorKind::NoData, "no bars in lookback")
                })?;
                Ok::<_, FailedSymbol>((close, 1))
            })
            .await;
        outcome.data
    }

    /// Levels and percent changes of the tracked indices, one row per date.
    ///
    /// The first index that returns data defines the dates; later indices are joined
    /// onto those dates and their other rows dropped. Empty when no index has data.
    pub async fn fetch_market_indices(&self, start: NaiveDate, end: NaiveDate) -> Vec<MarketSnapshot> {
        info!(%start, %end, "fetching market indices");
        let source = self.source.as_ref();
        let mut rows: Option<IndexMap<NaiveDate, MarketSnapshot>> = None;
        let total = MarketIndex::ALL.len();

        for (i, index) in MarketIndex::ALL.into_iter().enumerate() {
            if self.is_cancelled() {
                warn!(done = i, total, "index fetch cancelled");
                break;
            }
            let symbol = index.remote_symbol();
            self.progress.on_start("indices", symbol, i, total);
            let req = HistoryRequest::index(symbol, start, end);
            let req = &req;

            match self
                .with_retry(self.index_pacing.as_ref(), symbol, move || source.fetch_history(req))
                .await
            {
                Ok(bars) if !bars.is_empty() => {
                    let levels = index_changes(&bars);
                    self.progress
                        .on_complete("indices", symbol, i, total, Ok(levels.len()));
                    merge_index(&mut rows, index, levels);
                }
                Ok(_) => {
                    let kind = FetchErrorKind::NoData;
                    self.progress
                        .on_complete("indices", symbol, i, total, Err((kind, kind.diagnostic())));
                }
                Err(e) => {
                    let message = e.to_string();
                    self.progress
                        .on_complete("indices", symbol, i, total, Err((e.kind(), message.as_str())));
                }
            }

            if i + 1 < total && !self.is_cancelled() {
                self.index_pacing.pause_between().await;
            }
        }

        let out: Vec<MarketSnapshot> = rows.map(|r| r.into_values().collect()).unwrap_or_default();
        if out.is_empty() {
            warn!("no market index data");
        }
        out
    }

    async fn history_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FailedSymbol> {
        let source = self.source.as_ref();
        let req = HistoryRequest::stock(symbol, start, end);
        let req = &req;
        let bars: Vec<RawBar> = self
            .with_retry(self.price_pacing.as_ref(), symbol, move || source.fetch_history(req))
            .await
            .map_err(|e| FailedSymbol::from_provider(symbol, &e))?;
        if bars.is_empty() {
            return Err(FailedSymbol::new(
                symbol,
                FetchErrorKind::NoData,
                FetchErrorKind::NoData.diagnostic(),
            ));
        }
        clean_price_series(symbol, bars)
            .map_err(|e| FailedSymbol::new(symbol, FetchErrorKind::MalformedResponse, e.to_string()))
    }

    async fn with_retry<T, F, Fut>(
        &self,
        pacing: &dyn RequestPacing,
        symbol: &str,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) => match pacing.retry_delay(attempt, err.kind()) {
                    Some(delay) => {
                        debug!(symbol, attempt, ?delay, error = %err, "retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    async fn run_stage<T, F, Fut>(
        &self,
        stage: &str,
        pacing: &dyn RequestPacing,
        symbols: &[String],
        mut fetch_one: F,
    ) -> FetchOutcome<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<(T, usize), FailedSymbol>>,
    {
        let total = symbols.len();
        let mut outcome = FetchOutcome::default();

        for (i, symbol) in symbols.iter().enumerate() {
            if self.is_cancelled() {
                warn!(stage, done = i, total, "fetch cancelled");
                break;
            }
            self.progress.on_start(stage, symbol, i, total);
            match fetch_one(symbol.clone()).await {
                Ok((value, records)) => {
                    self.progress.on_complete(stage, symbol, i, total, Ok(records));
                    outcome.data.insert(symbol.clone(), value);
                }
                Err(failed) => {
                    self.progress
                        .on_complete(stage, symbol, i, total, Err((failed.kind, failed.message.as_str())));
                    outcome.failed.push(failed);
                }
            }
            if i + 1 < total && !self.is_cancelled() {
                pacing.pause_between().await;
            }
        }

        self.progress
            .on_batch_complete(stage, outcome.data.len(), outcome.failed.len(), total);
        outcome
    }
}

fn merge_index(
    rows: &mut Option<IndexMap<NaiveDate, MarketSnapshot>>,
    index: MarketIndex,
    levels: Vec<(NaiveDate, Option<f64>, Option<f64>)>,
) {
    let table = rows.get_or_insert_with(|| {
        levels
            .iter()
            .map(|(date, _, _)| (*date, MarketSnapshot::new(*date)))
            .collect()
    });
    for (date, level, change_pct) in levels {
        if let Some(row) = table.get_mut(&date) {
            *row.level_mut(index) = IndexLevel { level, change_pct };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Mutex, atomic::AtomicUsize},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::models::ratio::RatioRow;
    use crate::progress::SilentProgress;
    use crate::providers::{MalformedSnafu, StatusSnafu};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[derive(Default)]
    struct FakeSource {
        bars: HashMap<String, Vec<RawBar>>,
        ratios: HashMap<String, Vec<RatioRow>>,
        broken: HashMap<String, u16>,
        flaky_failures: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QuoteSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_history(&self, req: &HistoryRequest) -> Result<Vec<RawBar>, ProviderError> {
            self.calls.lock().unwrap().push(req.symbol.clone());
            if self
                .flaky_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return StatusSnafu {
                    symbol: req.symbol.as_str(),
                    status: 503u16,
                    message: "busy",
                }
                .fail();
            }
            if let Some(status) = self.broken.get(&req.symbol) {
                return StatusSnafu {
                    symbol: req.symbol.as_str(),
                    status: *status,
                    message: "error",
                }
                .fail();
            }
            Ok(self.bars.get(&req.symbol).cloned().unwrap_or_default())
        }

        async fn fetch_ratios(&self, symbol: &str) -> Result<Vec<RatioRow>, ProviderError> {
            match self.ratios.get(symbol) {
                Some(rows) => Ok(rows.clone()),
                None => MalformedSnafu {
                    symbol,
                    message: "not json",
                }
                .fail(),
            }
        }
    }

    #[derive(Default)]
    struct CountingPacing {
        pauses: AtomicUsize,
        retries: Option<u32>,
    }

    #[async_trait]
    impl RequestPacing for CountingPacing {
        async fn pause_between(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }

        fn retry_delay(&self, attempt: u32, kind: FetchErrorKind) -> Option<Duration> {
            match self.retries {
                Some(max) if attempt < max && kind.is_transient() => Some(Duration::ZERO),
                _ => None,
            }
        }
    }

    fn bars(closes: &[f64]) -> Vec<RawBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| RawBar::full(d(5, 1 + i as u32), *c, *c, *c, *c, 100.0))
            .collect()
    }

    fn fetcher(source: FakeSource, pacing: Arc<CountingPacing>) -> MarketDataFetcher {
        MarketDataFetcher::new(Arc::new(source))
            .with_pacing(pacing)
            .with_progress(Arc::new(SilentProgress))
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn failures_are_isolated_and_every_symbol_is_tried() {
        let mut source = FakeSource::default();
        source.bars.insert("YYY".into(), bars(&[10.0, 11.0]));
        source.bars.insert("ZZZ".into(), bars(&[20.0]));
        source.broken.insert("XXX".into(), 500);
        source.bars.insert("EMPTY".into(), vec![]);
        let pacing = Arc::new(CountingPacing::default());
        let f = fetcher(source, pacing.clone());

        let out = f
            .fetch_price_history(&symbols(&["XXX", "YYY", "EMPTY", "ZZZ"]), d(5, 1), d(5, 31))
            .await;

        assert_eq!(out.data.keys().collect::<Vec<_>>(), vec!["YYY", "ZZZ"]);
        assert_eq!(out.failed_symbols(), vec!["XXX", "EMPTY"]);
        assert_eq!(out.failed[0].kind, FetchErrorKind::ConnectionFailure);
        assert_eq!(out.failed[1].kind, FetchErrorKind::NoData);
        // Pauses sit between symbols only.
        assert_eq!(pacing.pauses.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unnormalizable_series_is_malformed() {
        let mut source = FakeSource::default();
        source.bars.insert(
            "BAD".into(),
            vec![RawBar {
                date: d(5, 1),
                open: None,
                high: None,
                low: None,
                close: None,
                volume: None,
            }],
        );
        let f = fetcher(source, Arc::new(CountingPacing::default()));
        let out = f.fetch_price_history(&symbols(&["BAD"]), d(5, 1), d(5, 2)).await;
        assert_eq!(out.failed[0].kind, FetchErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn default_policy_does_not_retry_but_backoff_does() {
        let mut source = FakeSource::default();
        source.bars.insert("AAA".into(), bars(&[10.0]));
        source.flaky_failures = AtomicUsize::new(1);
        let f = fetcher(source, Arc::new(CountingPacing::default()));
        let out = f.fetch_price_history(&symbols(&["AAA"]), d(5, 1), d(5, 2)).await;
        assert_eq!(out.failed_symbols(), vec!["AAA"]);

        let mut source = FakeSource::default();
        source.bars.insert("AAA".into(), bars(&[10.0]));
        source.flaky_failures = AtomicUsize::new(2);
        let pacing = Arc::new(CountingPacing {
            retries: Some(2),
            ..Default::default()
        });
        let f = fetcher(source, pacing);
        let out = f.fetch_price_history(&symbols(&["AAA"]), d(5, 1), d(5, 2)).await;
        assert!(out.failed.is_empty());
        assert_eq!(out.data["AAA"].len(), 1);
    }

    #[tokio::test]
    async fn metrics_condense_and_record_failures() {
        let mut source = FakeSource::default();
        source.ratios.insert(
            "VCB".into(),
            vec![RatioRow {
                year: Some(2023),
                price_to_earning: Some(14.2),
                ..Default::default()
            }],
        );
        source.ratios.insert("EMPTY".into(), vec![]);
        let f = fetcher(source, Arc::new(CountingPacing::default()));
        let out = f
            .fetch_financial_metrics(&symbols(&["VCB", "EMPTY", "NOPE"]))
            .await;
        assert_eq!(out.data["VCB"].pe_ratio, Some(14.2));
        assert_eq!(out.data["VCB"].date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(out.failed[0].kind, FetchErrorKind::NoData);
        assert_eq!(out.failed[1].kind, FetchErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn latest_prices_skip_missing_symbols() {
        let mut source = FakeSource::default();
        source.bars.insert("AAA".into(), bars(&[10.0, 10.5, 11.25]));
        let f = fetcher(source, Arc::new(CountingPacing::default()));
        let prices = f.fetch_latest_prices(&symbols(&["AAA", "BBB"]), d(5, 3)).await;
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["AAA"], 11.25);
    }

    #[tokio::test]
    async fn indices_left_join_on_first_available_index() {
        let mut source = FakeSource::default();
        // VNINDEX has no data, so VN30 anchors the dates.
        source.bars.insert("VN30".into(), bars(&[1000.0, 1010.0]));
        let mut hnx30 = bars(&[200.0, 210.0, 220.0]);
        hnx30.remove(0);
        source.bars.insert("HNX30".into(), hnx30);
        let pacing = Arc::new(CountingPacing::default());
        let f = fetcher(source, pacing.clone());

        let rows = f.fetch_market_indices(d(5, 1), d(5, 31)).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(5, 1));
        assert_eq!(rows[0].vnindex, IndexLevel::default());
        assert_eq!(rows[0].vn30.level, Some(1000.0));
        assert_eq!(rows[0].vn30.change_pct, None);
        assert!((rows[1].vn30.change_pct.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(rows[0].hnx30.level, None);
        assert_eq!(rows[1].hnx30.level, Some(210.0));
        assert!(rows.iter().all(|r| r.advancing.is_none()));
        assert_eq!(pacing.pauses.load(Ordering::SeqCst), 3);
    }

    /// Raises the shared flag during the first pause.
    struct StopAfterFirst(Arc<AtomicBool>);

    #[async_trait]
    impl RequestPacing for StopAfterFirst {
        async fn pause_between(&self) {
            self.0.store(true, Ordering::Relaxed);
        }

        fn retry_delay(&self, _attempt: u32, _kind: FetchErrorKind) -> Option<Duration> {
            None
        }
    }

    #[tokio::test]
    async fn cancel_flag_stops_before_the_next_symbol() {
        let mut source = FakeSource::default();
        for sym in ["AAA", "BBB", "CCC"] {
            source.bars.insert(sym.into(), bars(&[10.0]));
        }
        let source = Arc::new(source);
        let flag = Arc::new(AtomicBool::new(false));
        let f = MarketDataFetcher::new(source.clone())
            .with_pacing(Arc::new(StopAfterFirst(flag.clone())))
            .with_progress(Arc::new(SilentProgress))
            .with_cancel(flag.clone());

        let out = f
            .fetch_price_history(&symbols(&["AAA", "BBB", "CCC"]), d(5, 1), d(5, 2))
            .await;
        assert_eq!(out.data.keys().collect::<Vec<_>>(), vec!["AAA"]);
        assert!(out.failed.is_empty());
        assert_eq!(*source.calls.lock().unwrap(), vec!["AAA"]);

        assert!(f.is_cancelled());
        assert!(f.fetch_market_indices(d(5, 1), d(5, 2)).await.is_empty());
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_index_data_yields_empty_table() {
        let f = fetcher(FakeSource::default(), Arc::new(CountingPacing::default()));
        assert!(f.fetch_market_indices(d(5, 1), d(5, 2)).await.is_empty());
    }

    #[test]
    fn summary_counts_records() {
        let mut map = IndexMap::new();
        map.insert(
            "AAA".to_string(),
            clean_price_series("AAA", bars(&[1.0, 2.0, 3.0])).unwrap(),
        );
        map.insert("BBB".to_string(), clean_price_series("BBB", bars(&[1.0])).unwrap());
        let s = summarize_series(&map);
        assert_eq!(s.series, 2);
        assert_eq!(s.total_records, 4);
        assert_eq!(s.average_records, 2.0);
        assert_eq!(s.date_ranges["AAA"], (d(5, 1), d(5, 3)));
    }
}
