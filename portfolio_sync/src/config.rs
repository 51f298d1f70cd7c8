//! Run configuration: TOML file, then environment overrides, then CLI flags.
//!
//! ```toml
//! [store]
//! database_url = "data/portfolio.db"
//!
//! [source]
//! kind = "tcbs"
//! request_delay_secs = 5.0
//! max_retries = 0
//!
//! [data]
//! input_file = "data/company_info.csv"
//! start_date = "2024-01-01"
//! end_date = "2024-12-31"
//! ```
//!
//! Environment overrides: `DATABASE_URL`, `QUOTE_SOURCE`, `QUOTE_BASE_URL`,
//! `QUOTE_DELAY_SECS`, `DATA_START_DATE`, `DATA_END_DATE`, `CSV_FILE_PATH`.

use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Ho_Chi_Minh;
use market_data_ingestor::{
    MarketDataFetcher,
    pacing::{ExponentialBackoff, FixedDelay, QuotaPacing, RequestPacing},
    providers::{ProviderInitError, SourceKind, SourceSettings, build_source},
};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_opt, get_env_parsed};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Env(#[from] shared_utils::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Source(#[from] ProviderInitError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite path or `sqlite:` URL.
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "data/portfolio.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: String,
    pub base_url: Option<String>,
    /// Pause between symbols while fetching prices.
    pub request_delay_secs: f64,
    pub metric_delay_secs: f64,
    pub index_delay_secs: f64,
    pub timeout_secs: u64,
    /// Retries of transient failures; 0 keeps the fixed-delay policy.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// When set, replaces the fixed delays with a requests-per-minute quota.
    pub requests_per_minute: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: "tcbs".to_string(),
            base_url: None,
            request_delay_secs: 5.0,
            metric_delay_secs: 5.0,
            index_delay_secs: 5.0,
            timeout_secs: 30,
            max_retries: 0,
            retry_base_delay_ms: 1_000,
            requests_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub input_file: PathBuf,
    pub start_date: NaiveDate,
    /// `None` means today in the exchange's time zone.
    pub end_date: Option<NaiveDate>,
    /// Only the first N reference symbols are processed when set.
    pub max_symbols: Option<usize>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("data/company_info.csv"),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end_date: None,
            max_symbols: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    pub source: SourceConfig,
    pub data: DataConfig,
}

/// Today's date on the Vietnamese exchanges.
pub fn exchange_today() -> NaiveDate {
    Utc::now().with_timezone(&Ho_Chi_Minh).date_naive()
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Reads `path` when given (defaults otherwise), then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&raw, p)?
            }
            None => Self::default(),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = get_env_opt("DATABASE_URL") {
            self.store.database_url = url;
        }
        if let Some(kind) = get_env_opt("QUOTE_SOURCE") {
            self.source.kind = kind;
        }
        if let Some(base) = get_env_opt("QUOTE_BASE_URL") {
            self.source.base_url = Some(base);
        }
        if let Some(delay) = get_env_parsed::<f64>("QUOTE_DELAY_SECS")? {
            self.source.request_delay_secs = delay;
            self.source.metric_delay_secs = delay;
            self.source.index_delay_secs = delay;
        }
        if let Some(start) = get_env_parsed::<NaiveDate>("DATA_START_DATE")? {
            self.data.start_date = start;
        }
        if let Some(end) = get_env_parsed::<NaiveDate>("DATA_END_DATE")? {
            self.data.end_date = Some(end);
        }
        if let Some(path) = get_env_opt("CSV_FILE_PATH") {
            self.data.input_file = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn source_kind(&self) -> Result<SourceKind, ConfigError> {
        Ok(self.source.kind.parse::<SourceKind>()?)
    }

    pub fn end_date(&self) -> NaiveDate {
        self.data.end_date.unwrap_or_else(exchange_today)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source_kind()?;
        let end = self.end_date();
        if end < self.data.start_date {
            return Err(ConfigError::Invalid(format!(
                "end date {end} is before start date {}",
                self.data.start_date
            )));
        }
        for (name, secs) in [
            ("request_delay_secs", self.source.request_delay_secs),
            ("metric_delay_secs", self.source.metric_delay_secs),
            ("index_delay_secs", self.source.index_delay_secs),
        ] {
            FixedDelay::try_from_secs_f64(secs).map_err(|e| {
                ConfigError::Invalid(format!("{name} must be a non-negative duration, got {secs}: {e}"))
            })?;
        }
        if self.source.requests_per_minute == Some(0) {
            return Err(ConfigError::Invalid("requests_per_minute must be > 0".into()));
        }
        Ok(())
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            base_url: self.source.base_url.clone(),
            timeout: Duration::from_secs(self.source.timeout_secs),
        }
    }

    /// The pacing policy for a stage whose fixed pause is `delay_secs`.
    pub fn pacing(&self, delay_secs: f64) -> Result<Arc<dyn RequestPacing>, ConfigError> {
        let s = &self.source;
        if let Some(rpm) = s.requests_per_minute.and_then(NonZeroU32::new) {
            return Ok(Arc::new(QuotaPacing::per_minute(rpm)));
        }
        let fixed = FixedDelay::try_from_secs_f64(delay_secs)
            .map_err(|e| ConfigError::Invalid(format!("delay of {delay_secs}s: {e}")))?;
        if s.max_retries > 0 {
            Ok(Arc::new(ExponentialBackoff {
                between: fixed.delay,
                base: Duration::from_millis(s.retry_base_delay_ms),
                max_retries: s.max_retries,
            }))
        } else {
            Ok(Arc::new(fixed))
        }
    }

    /// Builds the configured source and wraps it with the per-stage pacing policies.
    pub fn build_fetcher(&self) -> Result<MarketDataFetcher, ConfigError> {
        let source = build_source(self.source_kind()?, &self.source_settings())?;
        Ok(MarketDataFetcher::new(source)
            .with_pacing(self.pacing(self.source.request_delay_secs)?)
            .with_metric_pacing(self.pacing(self.source.metric_delay_secs)?)
            .with_index_pacing(self.pacing(self.source.index_delay_secs)?))
    }

    /// One-line rendering of the effective configuration with credentials masked.
    pub fn redacted_summary(&self) -> String {
        format!(
            "store={} source={} delay={}s dates={}..{} input={} max_symbols={}",
            redact_url(&self.store.database_url),
            self.source.kind,
            self.source.request_delay_secs,
            self.data.start_date,
            self.end_date(),
            self.data.input_file.display(),
            self.data
                .max_symbols
                .map_or_else(|| "all".to_string(), |n| n.to_string()),
        )
    }
}

fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
