//! Configuration for the resolver and its staleness sweep
//!
//! # Example: Using defaults
//!
//! ```rust
//! use abiscan::ResolverConfig;
//!
//! // 1000-entry cache, 48h staleness threshold, 5 retries 1s apart, 60s sweep
//! let config = ResolverConfig::default();
//! assert_eq!(config.cache_capacity, 1000);
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use abiscan::{ResolverConfigBuilder, SweepPolicy};
//! use abiscan::source::RetryPolicy;
//! use chrono::TimeDelta;
//! use std::time::Duration;
//!
//! let config = ResolverConfigBuilder::with_defaults()
//!     .cache_capacity(10_000)
//!     .staleness_threshold(TimeDelta::hours(24))
//!     .sweep_policy(SweepPolicy::SkipAndContinue)
//!     .retry(RetryPolicy::builder().max_attempts(3).build())
//!     .sweep_interval(Duration::from_secs(300))
//!     .build();
//! ```

use std::time::Duration;

use chrono::TimeDelta;

use crate::source::{RetryLayer, RetryPolicy};
use crate::sweep::SweepPolicy;

pub mod constants;

use constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_STALENESS_THRESHOLD_HOURS, DEFAULT_SWEEP_INTERVAL};

/// Settings shared by [`AbiResolver`](crate::AbiResolver) and the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum entries in the in-process cache
    pub cache_capacity: usize,

    /// Age after which a processed address is armed for refresh again.
    /// Compared strictly: exactly this old is not yet stale.
    pub staleness_threshold: TimeDelta,

    /// What a sweep does when a collaborator stays unavailable
    pub sweep_policy: SweepPolicy,

    /// Retry policy applied to collaborators by the scheduler
    pub retry: RetryPolicy,

    /// Period of [`StalenessScheduler`](crate::StalenessScheduler) sweeps
    pub sweep_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            staleness_threshold: TimeDelta::hours(DEFAULT_STALENESS_THRESHOLD_HOURS),
            sweep_policy: SweepPolicy::default(),
            retry: RetryPolicy::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ResolverConfig {
    /// A [`RetryLayer`] carrying this configuration's retry policy.
    pub fn retry_layer(&self) -> RetryLayer {
        RetryLayer::new(self.retry)
    }
}

/// Fluent builder for [`ResolverConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from [`ResolverConfig::default`].
    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn staleness_threshold(mut self, threshold: TimeDelta) -> Self {
        self.config.staleness_threshold = threshold;
        self
    }

    pub fn sweep_policy(mut self, policy: SweepPolicy) -> Self {
        self.config.sweep_policy = policy;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn build(self) -> ResolverConfig {
        self.config
    }
}
