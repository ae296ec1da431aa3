// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for abiscan integration tests
//!
//! Provides stub collaborators and an instrumented store so the cascade and
//! the sweep can be exercised without a registry, a node, or a disk.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use abiscan::{
    AbiResolver, AbiSource, AbiStore, BytecodeSource, ContractRecord, ContractRecordId,
    DeploymentRecord, FetchError, FunctionRecord, FunctionRecordId, MemoryStore, ResolverConfig,
    StalenessRecord, StoreError,
};
use alloy_chains::Chain;
use alloy_primitives::{address, bytes, Address, Bytes};
use async_trait::async_trait;

pub const USDT: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");
pub const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
pub const EOA: Address = address!("00000000219ab540356cbb839cbe05303d7705fa");

pub const ERC20_ABI: &str = r#"[
    {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
    {"type":"function","name":"balanceOf","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"approve","inputs":[{"name":"spender","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"event","name":"Transfer","inputs":[{"name":"from","type":"address","indexed":true},{"name":"to","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}],"anonymous":false}
]"#;

pub fn erc20_code() -> Bytes {
    bytes!("608060405234801561001057600080fd5b50")
}

/// Installs a test-friendly subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A resolver over `store` with default configuration.
pub fn resolver_over(store: Arc<dyn AbiStore>) -> AbiResolver {
    AbiResolver::new(store, ResolverConfig::default())
}

#[derive(Debug, Clone)]
enum Reply {
    Abi(String),
    NotVerified,
    Unavailable,
    /// Fails this many more times, then returns the ABI
    FlakyAbi(usize, String),
}

/// Stub ABI registry
///
/// Addresses without a configured reply are reported as not verified.
///
/// # Example
///
/// ```rust,ignore
/// let registry = StubRegistry::new()
///     .with_abi(USDT, ERC20_ABI)
///     .with_unavailable(WETH);
/// ```
#[derive(Debug, Default)]
pub struct StubRegistry {
    replies: Mutex<HashMap<Address, Reply>>,
    calls: AtomicUsize,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abi(self, address: Address, abi: &str) -> Self {
        self.set(address, Reply::Abi(abi.to_string()));
        self
    }

    pub fn with_not_verified(self, address: Address) -> Self {
        self.set(address, Reply::NotVerified);
        self
    }

    pub fn with_unavailable(self, address: Address) -> Self {
        self.set(address, Reply::Unavailable);
        self
    }

    /// Fails `failures` times with `Unavailable`, then serves `abi`.
    pub fn with_flaky_abi(self, address: Address, failures: usize, abi: &str) -> Self {
        self.set(address, Reply::FlakyAbi(failures, abi.to_string()));
        self
    }

    /// Replaces the reply for `address` on a shared registry.
    pub fn set_abi(&self, address: Address, abi: &str) {
        self.set(address, Reply::Abi(abi.to_string()));
    }

    fn set(&self, address: Address, reply: Reply) {
        self.replies.lock().unwrap().insert(address, reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AbiSource for StubRegistry {
    async fn fetch_abi(&self, chain: Chain, address: Address) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(&address) {
            Some(Reply::Abi(abi)) => Ok(abi.clone()),
            Some(Reply::FlakyAbi(remaining, abi)) => {
                if *remaining == 0 {
                    Ok(abi.clone())
                } else {
                    *remaining -= 1;
                    Err(FetchError::unavailable("getabi", "503 Service Unavailable"))
                }
            }
            Some(Reply::Unavailable) => {
                Err(FetchError::unavailable("getabi", "connection refused"))
            }
            Some(Reply::NotVerified) | None => Err(FetchError::NotVerified { chain, address }),
        }
    }
}

/// Stub chain node
///
/// Addresses without configured code have none (externally-owned accounts).
#[derive(Debug, Default)]
pub struct StubNode {
    code: HashMap<Address, Bytes>,
    unavailable: Vec<Address>,
    unsupported: Vec<Chain>,
    calls: AtomicUsize,
}

impl StubNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(mut self, address: Address, code: Bytes) -> Self {
        self.code.insert(address, code);
        self
    }

    pub fn with_unavailable(mut self, address: Address) -> Self {
        self.unavailable.push(address);
        self
    }

    /// Rejects every call on `chain` as unsupported.
    pub fn with_unsupported_chain(mut self, chain: Chain) -> Self {
        self.unsupported.push(chain);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BytecodeSource for StubNode {
    async fn fetch_runtime_code(&self, chain: Chain, address: Address) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unsupported.contains(&chain) {
            return Err(FetchError::UnsupportedChain {
                chain,
                collaborator: "node",
            });
        }
        if self.unavailable.contains(&address) {
            return Err(FetchError::unavailable("eth_getCode", "timeout"));
        }
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }
}

/// Store wrapper that counts calls and can be switched into failure mode
///
/// Delegates to a [`MemoryStore`] unless failing, in which case every call
/// returns a [`StoreError`] without touching the inner store.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
    staleness_inserts: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total calls of any kind so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn staleness_inserts(&self) -> usize {
        self.staleness_inserts.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn enter(&self, operation: &str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Task {
                operation: operation.to_string(),
                details: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AbiStore for CountingStore {
    async fn put_contract(&self, record: &ContractRecord) -> Result<(), StoreError> {
        self.enter("put contract")?;
        self.inner.put_contract(record).await
    }

    async fn contract(&self, id: ContractRecordId) -> Result<Option<ContractRecord>, StoreError> {
        self.enter("get contract")?;
        self.inner.contract(id).await
    }

    async fn put_function(&self, record: &FunctionRecord) -> Result<(), StoreError> {
        self.enter("put function")?;
        self.inner.put_function(record).await
    }

    async fn function(&self, id: FunctionRecordId) -> Result<Option<FunctionRecord>, StoreError> {
        self.enter("get function")?;
        self.inner.function(id).await
    }

    async fn functions_for_contract(
        &self,
        contract_id: ContractRecordId,
    ) -> Result<Vec<FunctionRecord>, StoreError> {
        self.enter("list functions")?;
        self.inner.functions_for_contract(contract_id).await
    }

    async fn put_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.enter("put deployment")?;
        self.inner.put_deployment(record).await
    }

    async fn deployment(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        self.enter("get deployment")?;
        self.inner.deployment(chain_id, address).await
    }

    async fn insert_staleness(&self, record: &StalenessRecord) -> Result<(), StoreError> {
        self.enter("insert staleness")?;
        self.staleness_inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_staleness(record).await
    }

    async fn staleness(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<StalenessRecord>, StoreError> {
        self.enter("get staleness")?;
        self.inner.staleness(chain_id, address).await
    }

    async fn update_staleness(&self, record: &StalenessRecord) -> Result<bool, StoreError> {
        self.enter("update staleness")?;
        self.inner.update_staleness(record).await
    }

    async fn staleness_by_flag(
        &self,
        needs_refresh: bool,
    ) -> Result<Vec<StalenessRecord>, StoreError> {
        self.enter("list staleness")?;
        self.inner.staleness_by_flag(needs_refresh).await
    }
}
