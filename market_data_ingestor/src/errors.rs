//! Closed classification of per-symbol fetch failures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of failure recorded for a symbol that produced no usable data.
///
/// Providers classify their own errors into one of these kinds (see
/// [`ProviderError::kind`](crate::providers::ProviderError::kind)); callers branch on the
/// kind, never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchErrorKind {
    /// The request did not complete within the client timeout.
    Timeout,
    /// The source answered but had no rows for the symbol/window.
    NoData,
    /// The response could not be decoded or normalized.
    MalformedResponse,
    /// Network failure or a non-success HTTP status.
    ConnectionFailure,
}

impl FetchErrorKind {
    /// Whether a retry might succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, FetchErrorKind::Timeout | FetchErrorKind::ConnectionFailure)
    }

    /// Coarse diagnostic used in progress logs.
    pub fn diagnostic(self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "request timed out",
            FetchErrorKind::NoData => "no data returned",
            FetchErrorKind::MalformedResponse => "invalid data",
            FetchErrorKind::ConnectionFailure => "cannot reach the quoting server",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.diagnostic())
    }
}
