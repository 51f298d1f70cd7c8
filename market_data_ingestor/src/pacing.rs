//! Request pacing against a rate-limited upstream.
//!
//! The fetch loops ask a [`RequestPacing`] policy two things: how long to wait before
//! the next symbol, and whether (and after how long) to retry a failed call. Swapping
//! the policy never changes the loop itself.
//!
//! - [`FixedDelay`]: one fixed pause between symbols, never retries. This is the default.
//! - [`ExponentialBackoff`]: the same fixed pause, plus doubling-delay retries of
//!   transient failures (timeouts, connection failures).
//! - [`QuotaPacing`]: a `governor` limiter expressing "N requests per minute".

use std::{
    num::NonZeroU32,
    time::{Duration, TryFromFloatSecsError},
};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

use crate::errors::FetchErrorKind;

#[async_trait]
pub trait RequestPacing: Send + Sync {
    /// Waits before the next symbol is requested.
    async fn pause_between(&self);

    /// Delay before retry number `attempt` (0-based) of a call that failed with `kind`,
    /// or `None` to give up.
    fn retry_delay(&self, attempt: u32, kind: FetchErrorKind) -> Option<Duration>;
}

/// Sleep a fixed interval between symbols; no retries.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Fails for negative, non-finite or out-of-range values.
    pub fn try_from_secs_f64(secs: f64) -> Result<Self, TryFromFloatSecsError> {
        Duration::try_from_secs_f64(secs).map(Self::new)
    }
}

#[async_trait]
impl RequestPacing for FixedDelay {
    async fn pause_between(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn retry_delay(&self, _attempt: u32, _kind: FetchErrorKind) -> Option<Duration> {
        None
    }
}

/// Fixed pause between symbols plus bounded retries with doubling delay.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub between: Duration,
    pub base: Duration,
    pub max_retries: u32,
}

#[async_trait]
impl RequestPacing for ExponentialBackoff {
    async fn pause_between(&self) {
        if !self.between.is_zero() {
            tokio::time::sleep(self.between).await;
        }
    }

    fn retry_delay(&self, attempt: u32, kind: FetchErrorKind) -> Option<Duration> {
        if attempt >= self.max_retries || !kind.is_transient() {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor))
    }
}

/// Caps the request rate with a token bucket of burst one.
///
/// The first request passes immediately; every later one waits until the quota
/// replenishes, so time spent on the request itself counts toward the interval.
pub struct QuotaPacing {
    limiter: DefaultDirectRateLimiter,
}

impl QuotaPacing {
    pub fn per_minute(requests: NonZeroU32) -> Self {
        let quota = Quota::per_minute(requests).allow_burst(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

#[async_trait]
impl RequestPacing for QuotaPacing {
    async fn pause_between(&self) {
        self.limiter.until_ready().await;
    }

    fn retry_delay(&self, _attempt: u32, _kind: FetchErrorKind) -> Option<Duration> {
        None
    }
}
