// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for Kubernetes and Cloudflare API calls.
//!
//! This module provides utilities for retrying transient API errors (429, 5xx,
//! connection failures) with exponential backoff, while failing fast on permanent
//! errors (4xx client errors, API envelope failures).

use anyhow::Result;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::errors::CloudflareError;

/// Maximum total time to spend retrying a Kubernetes call (2 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// HTTP retry initial interval (250ms)
const HTTP_INITIAL_INTERVAL_MILLIS: u64 = 250;

/// HTTP retry maximum interval (10 seconds)
const HTTP_MAX_INTERVAL_SECS: u64 = 10;

/// HTTP retry maximum elapsed time (1 minute)
const HTTP_MAX_ELAPSED_TIME_SECS: u64 = 60;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration, restored by [`ExponentialBackoff::restarted`]
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// A fresh copy of this policy with the interval and elapsed clock reset.
    #[must_use]
    pub fn restarted(&self) -> Self {
        Self::new(
            self.initial_interval,
            self.max_interval,
            self.max_elapsed_time,
            self.multiplier,
            self.randomization_factor,
        )
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let jittered = rand::rng().random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Create default exponential backoff configuration for Kubernetes API retries.
///
/// # Configuration
///
/// - **Initial interval**: 100ms
/// - **Max interval**: 30 seconds
/// - **Max elapsed time**: 2 minutes total
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Create exponential backoff configuration for Cloudflare API retries.
///
/// Kept well under a typical sync interval so one stuck call cannot stall the
/// polling loop for long.
///
/// # Configuration
///
/// - **Initial interval**: 250ms
/// - **Max interval**: 10 seconds
/// - **Max elapsed time**: 1 minute total
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
#[must_use]
pub fn http_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(HTTP_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(HTTP_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(HTTP_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// Automatically retries on transient errors (HTTP 429, 5xx, network) and fails
/// immediately on permanent errors.
///
/// # Errors
///
/// Returns error if:
/// - Non-retryable error encountered (4xx client error)
/// - Max elapsed time exceeded
/// - All retries exhausted
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable Kubernetes API error, failing immediately"
                    );
                    return Err(e.into());
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Kubernetes API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(anyhow::anyhow!(
                        "Backoff exhausted after {attempt} attempts: {e}"
                    ));
                }
            }
        }
    }
}

/// Retry a Cloudflare API call with exponential backoff.
///
/// Retries while [`CloudflareError::is_transient`] holds and the backoff has
/// time left; the last error is returned unchanged once the backoff is exhausted.
///
/// # Errors
///
/// Returns the first permanent error, or the last transient error when the
/// backoff is exhausted.
pub async fn retry_cloudflare_call<T, F, Fut>(
    mut backoff: ExponentialBackoff,
    mut operation: F,
    operation_name: &str,
) -> Result<T, CloudflareError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CloudflareError>>,
{
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Cloudflare API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => {
                debug!(
                    operation = operation_name,
                    error = %e,
                    "Non-retryable Cloudflare API error"
                );
                return Err(e);
            }
            Err(e) => {
                let Some(duration) = backoff.next_backoff() else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e);
                };
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?duration,
                    error = %e,
                    "Retryable Cloudflare API error, will retry"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

/// Determine if a Kubernetes error is retryable.
///
/// Rate limiting (429), server errors (5xx) and service/connection errors are
/// retryable; everything else is not.
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
