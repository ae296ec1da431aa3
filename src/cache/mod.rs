// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-process tier of the resolution cascade.
//!
//! [`BoundedCache`] is a fixed-capacity, recency-ordered map from
//! [`CacheKey`](crate::CacheKey) to [`CacheEntry`]. It has no durability and
//! never touches the store or the network.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use abiscan::{BoundedCache, CacheEntry, CacheKey, ContractDescriptor};
//! use alloy_chains::Chain;
//! use alloy_primitives::Address;
//!
//! let cache = BoundedCache::new(2);
//! let key = CacheKey::contract(Chain::mainnet(), Address::ZERO);
//! let abi = ContractDescriptor::from_json("[]").unwrap();
//!
//! cache.set(key, CacheEntry::with_contract(Arc::new(abi)));
//! assert!(cache.get(&key).is_some());
//! println!("{}", cache.stats());
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{ContractDescriptor, MethodDescriptor};

mod bounded;

pub use bounded::BoundedCache;

/// Cached artifacts for one key.
///
/// Function keys populate `function`, contract keys populate `contract`.
/// Writes merge: a half that is `None` in an incoming entry keeps whatever the
/// cache already holds for that half.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub function: Option<Arc<MethodDescriptor>>,
    pub contract: Option<Arc<ContractDescriptor>>,
}

impl CacheEntry {
    pub fn with_function(function: Arc<MethodDescriptor>) -> Self {
        Self {
            function: Some(function),
            contract: None,
        }
    }

    pub fn with_contract(contract: Arc<ContractDescriptor>) -> Self {
        Self {
            function: None,
            contract: Some(contract),
        }
    }

    /// Overlays the populated halves of `incoming` onto `self`.
    pub fn merge(&mut self, incoming: CacheEntry) {
        if incoming.function.is_some() {
            self.function = incoming.function;
        }
        if incoming.contract.is_some() {
            self.contract = incoming.contract;
        }
    }
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits (successful retrievals)
    pub hits: u64,
    /// Number of cache misses (key not found)
    pub misses: u64,
    /// Number of entries evicted due to capacity pressure
    pub evictions: u64,
    /// Current number of entries in the cache
    pub entries: usize,
    /// Configured capacity
    pub capacity: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={}, misses={}, evictions={}, entries={}/{}, hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.evictions,
            self.entries,
            self.capacity,
            self.hit_rate()
        )
    }
}
