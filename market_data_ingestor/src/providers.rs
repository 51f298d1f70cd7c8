//! Quoting-source abstraction.
//!
//! This module defines the [`QuoteSource`] trait, the unified interface the fetch loops
//! use to talk to an upstream market data vendor. Each concrete source (see
//! [`tcbs_rest`]) implements the vendor-specific HTTP details and classifies its
//! failures into [`ProviderError`].
//!
//! The trait is async and object safe so the pipeline can hold an
//! `Arc<dyn QuoteSource>` selected at runtime from configuration.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{bar::RawBar, ratio::RatioRow, request_params::HistoryRequest};
//! use market_data_ingestor::providers::{ProviderError, QuoteSource};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl QuoteSource for Offline {
//!     fn name(&self) -> &str {
//!         "offline"
//!     }
//!
//!     async fn fetch_history(&self, _req: &HistoryRequest) -> Result<Vec<RawBar>, ProviderError> {
//!         Ok(vec![])
//!     }
//!
//!     async fn fetch_ratios(&self, _symbol: &str) -> Result<Vec<RatioRow>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod tcbs_rest;

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use snafu::{Backtrace, IntoError, Snafu};

use crate::errors::FetchErrorKind;
use crate::models::{bar::RawBar, ratio::RatioRow, request_params::HistoryRequest};

/// Trait for retrieving daily history and ratio tables from a quoting source.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Short identifier used in logs (e.g. `"tcbs"`).
    fn name(&self) -> &str;

    /// Fetches daily bars for one symbol over an inclusive date window.
    ///
    /// An empty vector is a valid answer; the fetch loop turns it into
    /// [`FetchErrorKind::NoData`].
    async fn fetch_history(&self, req: &HistoryRequest) -> Result<Vec<RawBar>, ProviderError>;

    /// Fetches the yearly financial-ratio history for one symbol.
    async fn fetch_ratios(&self, symbol: &str) -> Result<Vec<RatioRow>, ProviderError>;
}

/// Errors that can occur during the creation of a source instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The configured source selector is not implemented.
    #[snafu(display("Unknown quote source '{name}' (supported: tcbs)"))]
    UnknownSource { name: String, backtrace: Backtrace },
}

/// Errors that can occur within a `QuoteSource` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// The request did not finish within the client timeout.
    #[snafu(display("Request for {symbol} timed out"))]
    Timeout {
        symbol: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Network-level failure (DNS, connect, reset).
    #[snafu(display("Connection failed for {symbol}: {source}"))]
    Connection {
        symbol: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The source answered with a non-success HTTP status.
    #[snafu(display("Source returned HTTP {status} for {symbol}: {message}"))]
    Status {
        symbol: String,
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The source answered but had nothing for the request.
    #[snafu(display("No data for {symbol}"))]
    NoData { symbol: String, backtrace: Backtrace },

    /// The body could not be decoded or did not have the expected shape.
    #[snafu(display("Malformed response for {symbol}: {message}"))]
    Malformed {
        symbol: String,
        message: String,
        backtrace: Backtrace,
    },
}

impl ProviderError {
    /// Classifies the error into the closed [`FetchErrorKind`] set.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            ProviderError::Timeout { .. } => FetchErrorKind::Timeout,
            ProviderError::Connection { .. } | ProviderError::Status { .. } => {
                FetchErrorKind::ConnectionFailure
            }
            ProviderError::NoData { .. } => FetchErrorKind::NoData,
            ProviderError::Malformed { .. } => FetchErrorKind::MalformedResponse,
        }
    }

    /// Classifies a reqwest transport error for `symbol`.
    pub fn from_transport(symbol: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            TimeoutSnafu { symbol }.into_error(source)
        } else if source.is_decode() || source.is_body() {
            MalformedSnafu {
                symbol,
                message: source.to_string(),
            }
            .build()
        } else {
            ConnectionSnafu { symbol }.into_error(source)
        }
    }
}

/// Source selector as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Tcbs,
}

impl FromStr for SourceKind {
    type Err = ProviderInitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcbs" => Ok(SourceKind::Tcbs),
            other => UnknownSourceSnafu { name: other }.fail(),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Tcbs => f.write_str("tcbs"),
        }
    }
}

/// Connection settings shared by the REST sources.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Override of the vendor base URL; `None` uses the vendor default.
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Builds the configured source at runtime.
pub fn build_source(
    kind: SourceKind,
    settings: &SourceSettings,
) -> Result<Arc<dyn QuoteSource>, ProviderInitError> {
    match kind {
        SourceKind::Tcbs => Ok(Arc::new(tcbs_rest::provider::TcbsProvider::new(settings)?)),
    }
}
