//! Default values for resolver and sweep configuration
//!
//! Centralized so the builder, the docs, and the tests agree on one number.

use std::time::Duration;

/// Maximum number of entries held by the in-process cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Hours after which a resolved address is re-armed for refresh.
pub const DEFAULT_STALENESS_THRESHOLD_HOURS: i64 = 48;

/// Total calls made to a remote collaborator before giving up.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;

/// Fixed delay between collaborator retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Period of the background staleness sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

