// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! # abiscan
//!
//! Tiered ABI resolution for EVM contracts.
//!
//! Given `(chain, address[, selector])`, abiscan returns the ABI fragment of a
//! single function or the whole-contract ABI. Data comes from three tiers of
//! increasing cost:
//!
//! 1. [`BoundedCache`]: an in-process LRU cache
//! 2. [`AbiStore`]: a durable store ([`SqliteStore`] or [`MemoryStore`])
//! 3. an external registry ([`AbiSource`]) and chain node ([`BytecodeSource`]),
//!    reached only by the background [staleness sweep](AbiResolver::run_staleness_sweep)
//!
//! Lookups never block on the network. A miss arms a staleness record and
//! returns [`ResolveError::NotFoundPending`]; the sweep fills the store, and
//! the next lookup is served from it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use abiscan::{AbiResolver, ResolverConfig, SqliteStore, StalenessScheduler};
//! use abiscan::source::{ProviderBytecodeSource, ProviderConfig};
//! use alloy_chains::Chain;
//!
//! let store = Arc::new(SqliteStore::open("ABIs.db")?);
//! let resolver = Arc::new(AbiResolver::new(store, ResolverConfig::default()));
//!
//! let node = ProviderBytecodeSource::new()
//!     .with_endpoint(Chain::mainnet(), ProviderConfig::public_endpoint(rpc_url))?;
//! let scheduler = StalenessScheduler::new(resolver.clone(), Arc::new(etherscan), Arc::new(node)).spawn();
//!
//! match resolver.resolve_function_abi(Chain::mainnet(), usdt, selector).await {
//!     Ok(method) => println!("{}", method.signature()),
//!     Err(e) if e.is_retryable() => { /* ask again after the next sweep */ }
//!     Err(e) => eprintln!("{e}"),
//! }
//!
//! scheduler.shutdown().await;
//! ```
//!
//! ## Logging
//!
//! abiscan emits `tracing` events and spans (`abiscan.resolve_function_abi`,
//! `abiscan.staleness_sweep`, ...) but installs no subscriber.

pub mod cache;
pub mod config;
pub mod errors;
pub mod resolver;
pub mod source;
mod spans;
pub mod store;
pub mod sweep;
pub mod types;

pub use cache::{BoundedCache, CacheEntry, CacheStats};
pub use config::{ResolverConfig, ResolverConfigBuilder};
pub use errors::{AbiParseError, AbiscanError, FetchError, ResolveError, StoreError, SweepError};
pub use resolver::AbiResolver;
pub use source::{AbiSource, BytecodeSource};
pub use store::{AbiStore, MemoryStore, SqliteStore};
pub use sweep::{SchedulerHandle, StalenessScheduler, SweepPolicy, SweepReport};
pub use types::{
    split_methods, CacheKey, ContractDescriptor, ContractRecord, ContractRecordId,
    DeploymentRecord, FunctionRecord, FunctionRecordId, MethodDescriptor, MethodFragment,
    RefreshStatus, StalenessRecord,
};
