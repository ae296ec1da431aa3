// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Retry wrapper for remote collaborators.
//!
//! [`RetryLayer`] wraps an [`AbiSource`] or [`BytecodeSource`] and retries
//! calls that fail with a retryable [`FetchError`]. Terminal outcomes such as
//! `NotVerified` are returned immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_chains::Chain;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use tower::Layer;
use tracing::{debug, warn};

use super::{AbiSource, BytecodeSource};
use crate::config::constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::errors::FetchError;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),
    /// `min(base * 2^retry, max)`, where `retry` counts from zero.
    Exponential { base: Duration, max: Duration },
}

/// How many times to call a collaborator, and how long to wait in between.
///
/// The default is 5 attempts with a fixed 1 second delay.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use abiscan::source::{Backoff, RetryPolicy};
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(3)
///     .exponential(Duration::from_millis(200), Duration::from_secs(5))
///     .build();
///
/// assert_eq!(policy.delay_for(2), Duration::from_millis(800));
/// assert_eq!(RetryPolicy::default().backoff, Backoff::Fixed(Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: Backoff::Fixed(DEFAULT_RETRY_DELAY),
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// A policy that calls exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let multiplier = 2u64.saturating_pow(retry);
                let delay_ms = base.as_millis().saturating_mul(multiplier as u128);
                Duration::from_millis(delay_ms.min(max.as_millis()) as u64)
            }
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn fixed(mut self, delay: Duration) -> Self {
        self.policy.backoff = Backoff::Fixed(delay);
        self
    }

    pub fn exponential(mut self, base: Duration, max: Duration) -> Self {
        self.policy.backoff = Backoff::Exponential { base, max };
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// A tower layer producing [`Retrying`] collaborators.
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    policy: Arc<RetryPolicy>,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retrying<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retrying {
            inner,
            policy: Arc::clone(&self.policy),
        }
    }
}

/// A collaborator whose calls are retried per a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    policy: Arc<RetryPolicy>,
}

impl<S> Retrying<S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let attempts = self.policy.attempts();
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) if attempt >= attempts => {
                    warn!(operation, error = %error, attempts, "Retries exhausted");
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.policy.delay_for(attempt - 1);
                    warn!(
                        operation,
                        error = %error,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<S: AbiSource> AbiSource for Retrying<S> {
    async fn fetch_abi(&self, chain: Chain, address: Address) -> Result<String, FetchError> {
        self.retry("fetch_abi", || self.inner.fetch_abi(chain, address))
            .await
    }
}

#[async_trait]
impl<S: BytecodeSource> BytecodeSource for Retrying<S> {
    async fn fetch_runtime_code(
        &self,
        chain: Chain,
        address: Address,
    ) -> Result<Bytes, FetchError> {
        self.retry("fetch_runtime_code", || {
            self.inner.fetch_runtime_code(chain, address)
        })
        .await
    }
}
