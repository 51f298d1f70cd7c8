//! Progress reporting for multi-symbol fetch loops.

use tracing::{info, warn};

use crate::errors::FetchErrorKind;

/// Receives per-symbol progress from the fetch loops.
///
/// `index` is 0-based; implementations render it however they like.
pub trait FetchProgress: Send + Sync {
    /// Called before a symbol is requested.
    fn on_start(&self, stage: &str, symbol: &str, index: usize, total: usize);

    /// Called once per symbol with `Ok(records)` or the failure kind and diagnostic.
    fn on_complete(
        &self,
        stage: &str,
        symbol: &str,
        index: usize,
        total: usize,
        result: Result<usize, (FetchErrorKind, &str)>,
    );

    /// Called when every symbol of the stage has been attempted.
    fn on_batch_complete(&self, stage: &str, succeeded: usize, failed: usize, total: usize);
}

/// Reports progress as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, stage: &str, symbol: &str, index: usize, total: usize) {
        info!(stage, symbol, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(
        &self,
        stage: &str,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: Result<usize, (FetchErrorKind, &str)>,
    ) {
        match result {
            Ok(records) => info!(stage, symbol, records, "fetched"),
            Err((kind, message)) => {
                warn!(stage, symbol, ?kind, detail = message, "{}", kind.diagnostic())
            }
        }
    }

    fn on_batch_complete(&self, stage: &str, succeeded: usize, failed: usize, total: usize) {
        info!(stage, succeeded, failed, total, "fetch stage complete");
    }
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _: &str, _: &str, _: usize, _: usize) {}

    fn on_complete(
        &self,
        _: &str,
        _: &str,
        _: usize,
        _: usize,
        _: Result<usize, (FetchErrorKind, &str)>,
    ) {
    }

    fn on_batch_complete(&self, _: &str, _: usize, _: usize, _: usize) {}
}
