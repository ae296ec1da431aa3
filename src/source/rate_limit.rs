// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Token bucket rate limiting for remote collaborators.
//!
//! External registries typically allow a handful of calls per second per API
//! key. [`RateLimitLayer`] spaces calls out so a sweep over many armed
//! records stays under that ceiling. All collaborators produced by one layer
//! share one bucket.

use std::sync::Arc;
use std::time::Duration;

use alloy_chains::Chain;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tower::Layer;
use tracing::trace;

use super::{AbiSource, BytecodeSource};
use crate::errors::FetchError;

/// A tower layer producing [`RateLimited`] collaborators.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use abiscan::source::RateLimitLayer;
///
/// // Etherscan free tier
/// let layer = RateLimitLayer::per_second(5);
///
/// // At most one call every 250ms
/// let layer = RateLimitLayer::with_min_delay(Duration::from_millis(250));
/// ```
#[derive(Clone, Debug)]
pub struct RateLimitLayer {
    state: Arc<Mutex<RateLimitState>>,
}

impl RateLimitLayer {
    /// Allows `requests` calls per `period`, with bursts up to `requests`.
    pub fn new(requests: u32, period: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimitState::new(requests, period))),
        }
    }

    pub fn per_second(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(1))
    }

    /// Allows one call per `delay`.
    pub fn with_min_delay(delay: Duration) -> Self {
        Self::new(1, delay)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimited<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimited {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

#[derive(Debug)]
struct RateLimitState {
    capacity: f64,
    tokens: f64,
    /// Tokens per nanosecond
    refill_rate: f64,
    last_refill: Instant,
}

impl RateLimitState {
    fn new(requests: u32, period: Duration) -> Self {
        let requests = requests.max(1) as f64;
        let period = period.as_nanos().max(1) as f64;
        Self {
            capacity: requests,
            tokens: requests,
            refill_rate: requests / period,
            last_refill: Instant::now(),
        }
    }

    /// Takes a token, or returns how long until one is available.
    fn try_acquire(&mut self) -> Option<Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let needed = 1.0 - self.tokens;
            Some(Duration::from_nanos((needed / self.refill_rate).ceil() as u64))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_nanos() as f64;
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// A collaborator whose calls wait for a token from a shared bucket.
#[derive(Clone, Debug)]
pub struct RateLimited<S> {
    inner: S,
    state: Arc<Mutex<RateLimitState>>,
}

impl<S> RateLimited<S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn acquire(&self) {
        loop {
            let wait = self.state.lock().await.try_acquire();
            match wait {
                None => return,
                Some(duration) => {
                    trace!(wait_ms = duration.as_millis() as u64, "Rate limited, waiting");
                    tokio::time::sleep(duration).await;
                }
            }
        }
    }
}

#[async_trait]
impl<S: AbiSource> AbiSource for RateLimited<S> {
    async fn fetch_abi(&self, chain: Chain, address: Address) -> Result<String, FetchError> {
        self.acquire().await;
        self.inner.fetch_abi(chain, address).await
    }
}

#[async_trait]
impl<S: BytecodeSource> BytecodeSource for RateLimited<S> {
    async fn fetch_runtime_code(
        &self,
        chain: Chain,
        address: Address,
    ) -> Result<Bytes, FetchError> {
        self.acquire().await;
        self.inner.fetch_runtime_code(chain, address).await
    }
}
