// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Background refresh of stale and missing ABIs.
//!
//! A sweep runs two passes while holding the resolver's coordination lock:
//!
//! 1. **Aging**: every processed record older than the staleness threshold is
//!    armed again.
//! 2. **Drain**: every armed record is fetched from the registry and the node,
//!    validated, persisted, and cleared.
//!
//! Terminal outcomes (not verified, not a contract, unsupported chain,
//! malformed ABI) clear the record with a status instead of failing the
//! sweep. Transient transport failures either abort the sweep ([`SweepPolicy::FailFast`]) or leave the record
//! armed for next time ([`SweepPolicy::SkipAndContinue`]).

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy_chains::Chain;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::Layer;
use tracing::{debug, error, info, warn, Instrument};

use crate::cache::CacheEntry;
use crate::errors::{FetchError, SweepError};
use crate::resolver::AbiResolver;
use crate::source::{AbiSource, BytecodeSource};
use crate::spans;
use crate::types::{
    split_methods, CacheKey, ContractDescriptor, ContractRecord, DeploymentRecord, FunctionRecord,
    RefreshStatus, StalenessRecord,
};

/// What a sweep does when a collaborator stays unavailable after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPolicy {
    /// Abort the sweep and return the error. Records already processed keep
    /// their results; the failing record and the rest stay armed.
    #[default]
    FailFast,
    /// Count the failure, leave the record armed, and move on.
    SkipAndContinue,
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Records re-armed by the aging pass
    pub aged: usize,
    /// Records whose ABI and bytecode were stored
    pub refreshed: usize,
    /// Records the registry reported as unverified
    pub not_verified: usize,
    /// Records with no runtime code
    pub not_a_contract: usize,
    /// Records on a chain a collaborator does not serve
    pub unsupported_chain: usize,
    /// Records whose registry ABI failed validation
    pub malformed: usize,
    /// Records skipped after a collaborator failure (skip-and-continue only)
    pub failed: usize,
    /// Function records written
    pub functions_written: usize,
    /// Function records skipped because their id belonged to another selector
    pub collisions: usize,
    /// Cached functions dropped because the refreshed ABI no longer has them
    pub evicted: usize,
}

impl SweepReport {
    /// Records that left the armed state during this sweep.
    pub fn processed(&self) -> usize {
        self.refreshed
            + self.not_verified
            + self.not_a_contract
            + self.unsupported_chain
            + self.malformed
    }

    fn count(&mut self, status: RefreshStatus) {
        match status {
            RefreshStatus::Resolved => self.refreshed += 1,
            RefreshStatus::NotVerified => self.not_verified += 1,
            RefreshStatus::NotAContract => self.not_a_contract += 1,
            RefreshStatus::Malformed => self.malformed += 1,
            RefreshStatus::UnsupportedChain => self.unsupported_chain += 1,
            RefreshStatus::Pending => {}
        }
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aged={}, refreshed={}, not_verified={}, not_a_contract={}, unsupported_chain={}, malformed={}, failed={}, functions={}, collisions={}, evicted={}",
            self.aged,
            self.refreshed,
            self.not_verified,
            self.not_a_contract,
            self.unsupported_chain,
            self.malformed,
            self.failed,
            self.functions_written,
            self.collisions,
            self.evicted
        )
    }
}

impl AbiResolver {
    /// Runs one aging pass and one drain pass.
    ///
    /// Holds the coordination lock throughout, so lookups that miss the cache
    /// wait for the sweep to finish. Cache hits are unaffected.
    ///
    /// Collaborators are called as given; wrap them in a
    /// [`RetryLayer`](crate::source::RetryLayer) for retries.
    ///
    /// # Errors
    ///
    /// - [`SweepError::Fetch`] when a collaborator fails and the policy is
    ///   [`SweepPolicy::FailFast`]
    /// - [`SweepError::Store`] when the store fails; always aborts
    pub async fn run_staleness_sweep(
        &self,
        registry: &dyn AbiSource,
        node: &dyn BytecodeSource,
    ) -> Result<SweepReport, SweepError> {
        async move {
            let _guard = self.coordination.lock().await;
            let mut report = SweepReport::default();

            let now = Utc::now();
            for record in self.store.staleness_by_flag(false).await? {
                if record.is_due(now, self.config.staleness_threshold) {
                    let rearmed = StalenessRecord {
                        needs_refresh: true,
                        ..record
                    };
                    self.store.update_staleness(&rearmed).await?;
                    report.aged += 1;
                }
            }

            let armed = self.store.staleness_by_flag(true).await?;
            debug!(armed = armed.len(), aged = report.aged, "Draining armed records");

            for record in armed {
                let outcome = self
                    .refresh_contract(registry, node, &record, &mut report)
                    .instrument(spans::refresh_contract(record.chain_id, record.address))
                    .await;
                match outcome {
                    Ok(status) => report.count(status),
                    Err(SweepError::Fetch {
                        chain,
                        address,
                        source,
                    }) if self.config.sweep_policy == SweepPolicy::SkipAndContinue => {
                        warn!(
                            chain_id = %chain,
                            address = %address,
                            error = %source,
                            "Collaborator unavailable, leaving record armed"
                        );
                        report.failed += 1;
                    }
                    Err(err) => {
                        warn!(error = %err, %report, "Staleness sweep aborted");
                        return Err(err);
                    }
                }
            }

            info!(%report, "Staleness sweep finished");
            Ok(report)
        }
        .instrument(spans::staleness_sweep())
        .await
    }

    /// Fetches, validates, and persists one armed address, then clears it.
    async fn refresh_contract(
        &self,
        registry: &dyn AbiSource,
        node: &dyn BytecodeSource,
        record: &StalenessRecord,
        report: &mut SweepReport,
    ) -> Result<RefreshStatus, SweepError> {
        let chain = Chain::from_id(record.chain_id);
        let address = record.address;

        let abi = match registry.fetch_abi(chain, address).await {
            Ok(abi) => abi,
            Err(err) => return self.settle_failure(record, chain, err).await,
        };

        let code = match node.fetch_runtime_code(chain, address).await {
            Ok(code) => code,
            Err(err) => return self.settle_failure(record, chain, err).await,
        };
        if code.is_empty() {
            debug!("No runtime code at address");
            return self.settle(record, RefreshStatus::NotAContract).await;
        }

        let parsed = ContractDescriptor::from_json(&abi).and_then(|contract| {
            split_methods(&abi).map(|fragments| (contract, fragments))
        });
        let (contract, fragments) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "Registry returned a malformed ABI, nothing stored");
                return self.settle(record, RefreshStatus::Malformed).await;
            }
        };

        let contract_record = ContractRecord::new(code, abi);
        let contract_id = contract_record.id;
        let previous = self.store.deployment(record.chain_id, address).await?;
        self.store.put_contract(&contract_record).await?;
        self.store
            .put_deployment(&DeploymentRecord {
                chain_id: record.chain_id,
                address,
                contract_id,
            })
            .await?;

        let selectors: HashSet<_> = fragments
            .iter()
            .map(|fragment| fragment.descriptor.selector())
            .collect();

        for fragment in fragments {
            let selector = fragment.descriptor.selector();
            let key = CacheKey::function(chain, address, selector);
            let id = key.record_id();

            if let Some(existing) = self.store.function(id).await? {
                if existing.selector != selector {
                    warn!(
                        record_id = %id,
                        selector = %selector,
                        stored_selector = %existing.selector,
                        "Function record id collision, skipping"
                    );
                    report.collisions += 1;
                    continue;
                }
            }

            self.store
                .put_function(&FunctionRecord {
                    id,
                    contract_id,
                    selector,
                    function_abi: fragment.json,
                })
                .await?;
            report.functions_written += 1;

            self.cache
                .refresh(&key, CacheEntry::with_function(Arc::new(fragment.descriptor)));
        }

        self.cache.refresh(
            &CacheKey::contract(chain, address),
            CacheEntry::with_contract(Arc::new(contract)),
        );

        if let Some(previous) = previous {
            for stale in self.store.functions_for_contract(previous.contract_id).await? {
                if selectors.contains(&stale.selector) {
                    continue;
                }
                let key = CacheKey::function(chain, address, stale.selector);
                // Records of other addresses sharing the old bytecode are skipped.
                if key.record_id() == stale.id && self.cache.remove(&key) {
                    debug!(selector = %stale.selector, "Evicted function dropped from ABI");
                    report.evicted += 1;
                }
            }
        }

        debug!(contract_id = %contract_id, "Stored contract ABI");
        self.settle(record, RefreshStatus::Resolved).await
    }

    /// Maps a permanent collaborator error to a terminal status. Only
    /// transient errors propagate.
    async fn settle_failure(
        &self,
        record: &StalenessRecord,
        chain: Chain,
        err: FetchError,
    ) -> Result<RefreshStatus, SweepError> {
        match err {
            FetchError::NotVerified { .. } => {
                debug!("Contract is not verified");
                self.settle(record, RefreshStatus::NotVerified).await
            }
            FetchError::NotAContract { .. } => {
                self.settle(record, RefreshStatus::NotAContract).await
            }
            FetchError::UnsupportedChain { collaborator, .. } => {
                warn!(
                    collaborator,
                    "Chain not served by collaborator, giving up on record"
                );
                self.settle(record, RefreshStatus::UnsupportedChain).await
            }
            err @ FetchError::Unavailable { .. } => {
                Err(SweepError::fetch(chain, record.address, err))
            }
        }
    }

    /// Clears the armed flag and records the outcome.
    async fn settle(
        &self,
        record: &StalenessRecord,
        status: RefreshStatus,
    ) -> Result<RefreshStatus, SweepError> {
        let settled = StalenessRecord {
            last_checked_at: Utc::now(),
            needs_refresh: false,
            status,
            ..*record
        };
        self.store.update_staleness(&settled).await?;
        Ok(status)
    }
}

/// Runs [`AbiResolver::run_staleness_sweep`] on a fixed interval.
///
/// Collaborators are wrapped in the resolver's configured
/// [`RetryPolicy`](crate::source::RetryPolicy). The first sweep runs as soon
/// as the scheduler is spawned.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = StalenessScheduler::new(resolver.clone(), registry, node)
///     .with_interval(Duration::from_secs(30))
///     .spawn();
///
/// // ... serve lookups ...
///
/// handle.shutdown().await;
/// ```
pub struct StalenessScheduler {
    resolver: Arc<AbiResolver>,
    registry: Arc<dyn AbiSource>,
    node: Arc<dyn BytecodeSource>,
    interval: Duration,
}

impl fmt::Debug for StalenessScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StalenessScheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl StalenessScheduler {
    pub fn new(
        resolver: Arc<AbiResolver>,
        registry: Arc<dyn AbiSource>,
        node: Arc<dyn BytecodeSource>,
    ) -> Self {
        let retry = resolver.config().retry_layer();
        let interval = resolver.config().sweep_interval;
        Self {
            registry: Arc::new(retry.layer(registry)),
            node: Arc::new(retry.layer(node)),
            resolver,
            interval,
        }
    }

    /// Overrides the configured sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Starts the sweep loop on the current tokio runtime.
    ///
    /// Dropping the returned handle also stops the loop after the sweep in
    /// progress, if any.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, mut stop) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "Staleness scheduler started");

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {
                        match self
                            .resolver
                            .run_staleness_sweep(&*self.registry, &*self.node)
                            .await
                        {
                            Ok(report) => debug!(%report, "Scheduled sweep complete"),
                            Err(err) => error!(error = %err, "Scheduled sweep failed"),
                        }
                    }
                }
            }

            info!("Staleness scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

/// Handle to a running [`StalenessScheduler`].
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop and waits for the sweep in progress to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            error!(error = %err, "Staleness scheduler task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
