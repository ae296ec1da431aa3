// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The resolution cascade: cache, then store, then arm a refresh.
//!
//! Lookups never reach the network. A key that is neither cached nor stored
//! arms a staleness record and returns [`ResolveError::NotFoundPending`]; the
//! next [staleness sweep](AbiResolver::run_staleness_sweep) fetches it and the
//! following lookup finds it in the store.
//!
//! ```text
//! caller ──▶ cache ──hit──▶ return
//!              │miss
//!              ▼  (coordination lock)
//!            store ──hit──▶ re-check cache ──▶ parse ──▶ cache.set ──▶ return
//!              │miss
//!              ▼
//!        staleness record: absent ⇒ insert armed, due ⇒ re-arm
//!              ▼
//!        NotFoundPending / NotVerified / NotAContract / UnsupportedChain
//! ```
//!
//! A single coarse [`tokio::sync::Mutex`] serialises the miss path, the
//! store-hit repopulation, and whole sweeps, so concurrent callers racing on
//! the same miss arm at most one record. Cache hits never take it.

use std::sync::Arc;

use alloy_chains::Chain;
use alloy_primitives::{Address, Selector};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn, Instrument};

use crate::cache::{BoundedCache, CacheEntry};
use crate::config::ResolverConfig;
use crate::errors::{ResolveError, StoreError};
use crate::spans;
use crate::store::AbiStore;
use crate::types::{
    CacheKey, ContractDescriptor, FunctionRecord, MethodDescriptor, RefreshStatus, StalenessRecord,
};

/// Resolves function and contract ABIs through the cache and durable store.
///
/// Cheap to share: wrap it in an [`Arc`] and call it from any number of tasks.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use abiscan::{AbiResolver, MemoryStore, ResolveError, ResolverConfig};
/// use alloy_chains::Chain;
/// use alloy_primitives::{address, fixed_bytes};
///
/// # #[tokio::main]
/// # async fn main() {
/// let resolver = AbiResolver::new(Arc::new(MemoryStore::new()), ResolverConfig::default());
/// let usdt = address!("dac17f958d2ee523a2206206994597c13d831ec7");
///
/// // Nothing known yet: the address is queued for the next sweep.
/// let err = resolver
///     .resolve_function_abi(Chain::mainnet(), usdt, fixed_bytes!("a9059cbb"))
///     .await
///     .unwrap_err();
/// assert!(matches!(err, ResolveError::NotFoundPending { .. }));
/// # }
/// ```
pub struct AbiResolver {
    pub(crate) cache: BoundedCache,
    pub(crate) store: Arc<dyn AbiStore>,
    pub(crate) config: ResolverConfig,
    pub(crate) coordination: Mutex<()>,
}

impl std::fmt::Debug for AbiResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbiResolver")
            .field("cache", &self.cache.stats())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AbiResolver {
    pub fn new(store: Arc<dyn AbiStore>, config: ResolverConfig) -> Self {
        Self {
            cache: BoundedCache::new(config.cache_capacity),
            store,
            config,
            coordination: Mutex::new(()),
        }
    }

    /// The in-process cache tier.
    pub fn cache(&self) -> &BoundedCache {
        &self.cache
    }

    /// The durable store tier.
    pub fn store(&self) -> &Arc<dyn AbiStore> {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves the ABI fragment of one function.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotFoundPending`] when nothing is known yet; a refresh
    ///   is armed unless the address was processed within the staleness
    ///   threshold
    /// - [`ResolveError::NotVerified`], [`ResolveError::NotAContract`] or
    ///   [`ResolveError::UnsupportedChain`] when the last sweep found the
    ///   address permanently unresolvable
    /// - [`ResolveError::Parse`] when the stored fragment is malformed
    /// - [`ResolveError::Persistence`] when the store fails
    pub async fn resolve_function_abi(
        &self,
        chain: Chain,
        address: Address,
        selector: Selector,
    ) -> Result<Arc<MethodDescriptor>, ResolveError> {
        let key = CacheKey::function(chain, address, selector);
        async move {
            if let Some(method) = self.cached_function(&key) {
                trace!("Function ABI served from cache");
                return Ok(method);
            }

            let _guard = self.coordination.lock().await;
            let Some(record) = self.stored_function(&key, selector).await? else {
                return Err(self.miss(chain, address).await);
            };

            // Another caller may have populated the cache while we waited.
            if let Some(method) = self.cached_function(&key) {
                return Ok(method);
            }

            let method = Arc::new(MethodDescriptor::from_json(&record.function_abi)?);
            self.cache
                .set(key, CacheEntry::with_function(Arc::clone(&method)));
            debug!(signature = %method.signature(), "Function ABI loaded from store");
            Ok(method)
        }
        .instrument(spans::resolve_function_abi(chain, address, selector))
        .await
    }

    /// Resolves the whole-contract ABI deployed at `address`.
    ///
    /// Errors as for [`resolve_function_abi`](Self::resolve_function_abi).
    pub async fn resolve_contract_abi(
        &self,
        chain: Chain,
        address: Address,
    ) -> Result<Arc<ContractDescriptor>, ResolveError> {
        let key = CacheKey::contract(chain, address);
        async move {
            if let Some(contract) = self.cached_contract(&key) {
                trace!("Contract ABI served from cache");
                return Ok(contract);
            }

            let _guard = self.coordination.lock().await;
            let record = match self.store.deployment(chain.id(), address).await? {
                Some(deployment) => self.store.contract(deployment.contract_id).await?,
                None => None,
            };
            let Some(record) = record else {
                return Err(self.miss(chain, address).await);
            };

            if let Some(contract) = self.cached_contract(&key) {
                return Ok(contract);
            }

            let contract = Arc::new(ContractDescriptor::from_json(&record.contract_abi)?);
            self.cache
                .set(key, CacheEntry::with_contract(Arc::clone(&contract)));
            debug!(items = contract.len(), "Contract ABI loaded from store");
            Ok(contract)
        }
        .instrument(spans::resolve_contract_abi(chain, address))
        .await
    }

    fn cached_function(&self, key: &CacheKey) -> Option<Arc<MethodDescriptor>> {
        self.cache.get(key).and_then(|entry| entry.function)
    }

    fn cached_contract(&self, key: &CacheKey) -> Option<Arc<ContractDescriptor>> {
        self.cache.get(key).and_then(|entry| entry.contract)
    }

    /// Loads the function record for `key`, rejecting id collisions.
    ///
    /// A record only counts if it carries the requested selector and belongs
    /// to the contract currently deployed at the key's address.
    async fn stored_function(
        &self,
        key: &CacheKey,
        selector: Selector,
    ) -> Result<Option<FunctionRecord>, StoreError> {
        let Some(record) = self.store.function(key.record_id()).await? else {
            return Ok(None);
        };
        if record.selector != selector {
            warn!(
                record_id = %record.id,
                stored_selector = %record.selector,
                "Function record id collision, treating as a miss"
            );
            return Ok(None);
        }

        let deployment = self
            .store
            .deployment(key.chain().id(), key.address())
            .await?;
        match deployment {
            Some(deployment) if deployment.contract_id == record.contract_id => Ok(Some(record)),
            _ => {
                warn!(
                    record_id = %record.id,
                    contract_id = %record.contract_id,
                    "Function record does not belong to the deployed contract, treating as a miss"
                );
                Ok(None)
            }
        }
    }

    async fn miss(&self, chain: Chain, address: Address) -> ResolveError {
        match self.arm_refresh(chain, address).await {
            Ok(err) => err,
            Err(err) => ResolveError::Persistence(err),
        }
    }

    /// Arms the staleness record for a store miss and picks the error to
    /// report. Must be called with the coordination lock held.
    async fn arm_refresh(&self, chain: Chain, address: Address) -> Result<ResolveError, StoreError> {
        let now = Utc::now();
        let chain_id = chain.id();

        match self.store.staleness(chain_id, address).await? {
            None => {
                self.store
                    .insert_staleness(&StalenessRecord::armed(chain_id, address, now))
                    .await?;
                debug!("Armed refresh for unseen address");
            }
            Some(record) if record.needs_refresh => {
                trace!("Refresh already armed");
            }
            Some(record) if record.is_due(now, self.config.staleness_threshold) => {
                let rearmed = StalenessRecord {
                    needs_refresh: true,
                    ..record
                };
                self.store.update_staleness(&rearmed).await?;
                debug!(last_checked_at = %record.last_checked_at, "Re-armed stale address");
            }
            Some(record) => match record.status {
                RefreshStatus::NotVerified => {
                    return Ok(ResolveError::NotVerified { chain, address })
                }
                RefreshStatus::NotAContract => {
                    return Ok(ResolveError::NotAContract { chain, address })
                }
                RefreshStatus::UnsupportedChain => {
                    return Ok(ResolveError::UnsupportedChain { chain, address })
                }
                _ => {}
            },
        }

        Ok(ResolveError::NotFoundPending { chain, address })
    }
}
