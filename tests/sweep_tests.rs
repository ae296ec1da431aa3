// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Staleness sweep and scheduler behaviour.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use abiscan::{
    AbiResolver, AbiStore, CacheKey, ContractRecord, FunctionRecord, RefreshStatus, ResolveError,
    ResolverConfigBuilder, StalenessRecord, StalenessScheduler, SweepError, SweepPolicy,
    SweepReport,
};
use alloy_chains::Chain;
use alloy_primitives::{bytes, fixed_bytes, Address, Selector};
use chrono::{TimeDelta, Utc};
use helpers::{erc20_code, init_tracing, CountingStore, StubNode, StubRegistry, ERC20_ABI, USDT};

const TRANSFER: Selector = fixed_bytes!("a9059cbb");

/// `transfer` without a return value, as deployed by USDT.
const ERC20_ABI_NO_RETURN: &str = r#"[
    {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"}
]"#;

fn resolver_with(store: Arc<CountingStore>, policy: SweepPolicy) -> AbiResolver {
    init_tracing();
    AbiResolver::new(
        store,
        ResolverConfigBuilder::with_defaults()
            .sweep_policy(policy)
            .build(),
    )
}

async fn settled(store: &CountingStore, address: Address, age: TimeDelta) {
    store
        .insert_staleness(&StalenessRecord {
            needs_refresh: false,
            status: RefreshStatus::Resolved,
            ..StalenessRecord::armed(1, address, Utc::now() - age)
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn aging_pass_rearms_only_records_past_threshold() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::FailFast);
    let old = Address::with_last_byte(1);
    let fresh = Address::with_last_byte(2);
    settled(&store, old, TimeDelta::hours(49)).await;
    settled(&store, fresh, TimeDelta::hours(1)).await;

    let registry = StubRegistry::new()
        .with_abi(old, ERC20_ABI)
        .with_abi(fresh, ERC20_ABI);
    let node = StubNode::new()
        .with_code(old, erc20_code())
        .with_code(fresh, erc20_code());

    let report = resolver.run_staleness_sweep(&registry, &node).await.unwrap();
    assert_eq!(report.aged, 1);
    assert_eq!(report.refreshed, 1);
    assert_eq!(registry.calls(), 1);

    let old_record = store.staleness(1, old).await.unwrap().unwrap();
    assert!(!old_record.needs_refresh);
    assert!(Utc::now() - old_record.last_checked_at < TimeDelta::minutes(1));

    let fresh_record = store.staleness(1, fresh).await.unwrap().unwrap();
    assert!(!fresh_record.needs_refresh);
    assert!(Utc::now() - fresh_record.last_checked_at > TimeDelta::minutes(59));
}

#[tokio::test]
async fn empty_sweep_is_a_no_op() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::FailFast);

    let report = resolver
        .run_staleness_sweep(&StubRegistry::new(), &StubNode::new())
        .await
        .unwrap();
    assert_eq!(report, SweepReport::default());
    assert_eq!(report.processed(), 0);
}

#[tokio::test]
async fn fail_fast_aborts_and_leaves_remaining_records_armed() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::FailFast);
    let down = Address::with_last_byte(1);
    let up = Address::with_last_byte(2);
    let _ = resolver.resolve_contract_abi(Chain::mainnet(), down).await;
    let _ = resolver.resolve_contract_abi(Chain::mainnet(), up).await;

    let registry = StubRegistry::new()
        .with_unavailable(down)
        .with_abi(up, ERC20_ABI);
    let node = StubNode::new().with_code(up, erc20_code());

    let err = resolver
        .run_staleness_sweep(&registry, &node)
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::Fetch { address, .. } if address == down));

    let armed = store.staleness_by_flag(true).await.unwrap();
    assert_eq!(armed.len(), 2);
    assert_eq!(store.deployment(1, up).await.unwrap(), None);
}

#[tokio::test]
async fn skip_and_continue_counts_failures_and_moves_on() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::SkipAndContinue);
    let registry_down = Address::with_last_byte(1);
    let node_down = Address::with_last_byte(2);
    let up = Address::with_last_byte(3);
    for address in [registry_down, node_down, up] {
        let _ = resolver.resolve_contract_abi(Chain::mainnet(), address).await;
    }

    let registry = StubRegistry::new()
        .with_unavailable(registry_down)
        .with_abi(node_down, ERC20_ABI)
        .with_abi(up, ERC20_ABI);
    let node = StubNode::new()
        .with_unavailable(node_down)
        .with_code(up, erc20_code());

    let report = resolver.run_staleness_sweep(&registry, &node).await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.refreshed, 1);

    let armed: Vec<_> = store
        .staleness_by_flag(true)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.address)
        .collect();
    assert_eq!(armed, vec![registry_down, node_down]);
    assert!(resolver
        .resolve_contract_abi(Chain::mainnet(), up)
        .await
        .is_ok());
}

#[tokio::test]
async fn store_failure_aborts_even_when_skipping() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::SkipAndContinue);
    let _ = resolver.resolve_contract_abi(Chain::mainnet(), USDT).await;
    store.set_failing(true);

    let err = resolver
        .run_staleness_sweep(&StubRegistry::new(), &StubNode::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::Store(_)));
}

#[tokio::test]
async fn malformed_registry_abi_stores_nothing() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::FailFast);
    let _ = resolver
        .resolve_function_abi(Chain::mainnet(), USDT, TRANSFER)
        .await;

    let registry = StubRegistry::new().with_abi(
        USDT,
        r#"{"status":"0","result":"Max rate limit reached"}"#,
    );
    let node = StubNode::new().with_code(USDT, erc20_code());

    let report = resolver.run_staleness_sweep(&registry, &node).await.unwrap();
    assert_eq!(report.malformed, 1);
    assert_eq!(report.functions_written, 0);

    let contract_id = ContractRecord::new(erc20_code(), "").id;
    assert_eq!(store.contract(contract_id).await.unwrap(), None);
    assert_eq!(store.deployment(1, USDT).await.unwrap(), None);

    let record = store.staleness(1, USDT).await.unwrap().unwrap();
    assert_eq!(record.status, RefreshStatus::Malformed);
    assert!(!record.needs_refresh);

    let err = resolver
        .resolve_function_abi(Chain::mainnet(), USDT, TRANSFER)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotFoundPending { .. }));
}

#[tokio::test]
async fn colliding_function_record_is_skipped_not_overwritten() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::FailFast);
    let _ = resolver.resolve_contract_abi(Chain::mainnet(), USDT).await;

    // Occupy transfer's id with another selector.
    let id = CacheKey::function(Chain::mainnet(), USDT, TRANSFER).record_id();
    let squatter = FunctionRecord {
        id,
        contract_id: ContractRecord::new(erc20_code(), "[]").id,
        selector: fixed_bytes!("deadbeef"),
        function_abi: "{}".to_string(),
    };
    store.put_function(&squatter).await.unwrap();

    let registry = StubRegistry::new().with_abi(USDT, ERC20_ABI);
    let node = StubNode::new().with_code(USDT, erc20_code());
    let report = resolver.run_staleness_sweep(&registry, &node).await.unwrap();
    assert_eq!(report.collisions, 1);
    assert_eq!(report.functions_written, 3);
    assert_eq!(store.function(id).await.unwrap(), Some(squatter));

    let err = resolver
        .resolve_function_abi(Chain::mainnet(), USDT, TRANSFER)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotFoundPending { .. }));
}

#[tokio::test]
async fn refreshed_abi_replaces_cached_entries_without_promoting_new_ones() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::FailFast);
    let registry = StubRegistry::new().with_abi(USDT, ERC20_ABI);
    let node = StubNode::new().with_code(USDT, erc20_code());

    let _ = resolver
        .resolve_function_abi(Chain::mainnet(), USDT, TRANSFER)
        .await;
    resolver.run_staleness_sweep(&registry, &node).await.unwrap();
    let before = resolver
        .resolve_function_abi(Chain::mainnet(), USDT, TRANSFER)
        .await
        .unwrap();
    assert_eq!(before.output_types(), vec!["bool"]);

    // Age the record and change what the registry serves.
    let mut record = store.staleness(1, USDT).await.unwrap().unwrap();
    record.last_checked_at = Utc::now() - TimeDelta::hours(49);
    store.update_staleness(&record).await.unwrap();
    registry.set_abi(USDT, ERC20_ABI_NO_RETURN);

    let report = resolver.run_staleness_sweep(&registry, &node).await.unwrap();
    assert_eq!(report.aged, 1);
    assert_eq!(report.functions_written, 1);

    let calls = store.calls();
    let after = resolver
        .resolve_function_abi(Chain::mainnet(), USDT, TRANSFER)
        .await
        .unwrap();
    assert!(after.output_types().is_empty());
    assert_eq!(store.calls(), calls);

    assert!(!resolver
        .cache()
        .contains(&CacheKey::contract(Chain::mainnet(), USDT)));
    assert_eq!(resolver.cache().len(), 1);
}

#[tokio::test]
async fn unsupported_chain_settles_without_blocking_later_records() {
    let unserved = Chain::from_id(0);
    for policy in [SweepPolicy::FailFast, SweepPolicy::SkipAndContinue] {
        let store = Arc::new(CountingStore::new());
        let resolver = resolver_with(store.clone(), policy);
        let _ = resolver.resolve_contract_abi(unserved, USDT).await;
        let _ = resolver.resolve_contract_abi(Chain::mainnet(), USDT).await;

        let registry = StubRegistry::new().with_abi(USDT, ERC20_ABI);
        let node = StubNode::new()
            .with_code(USDT, erc20_code())
            .with_unsupported_chain(unserved);

        let report = resolver.run_staleness_sweep(&registry, &node).await.unwrap();
        assert_eq!(report.unsupported_chain, 1, "{policy:?}");
        assert_eq!(report.refreshed, 1, "{policy:?}");
        assert_eq!(report.failed, 0, "{policy:?}");
        assert!(store.staleness_by_flag(true).await.unwrap().is_empty());

        assert!(resolver
            .resolve_contract_abi(Chain::mainnet(), USDT)
            .await
            .is_ok());
        let err = resolver
            .resolve_contract_abi(unserved, USDT)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedChain { .. }));
        assert!(!err.is_retryable());

        // Settled records are not fetched again before they age.
        let calls = registry.calls();
        let report = resolver.run_staleness_sweep(&registry, &node).await.unwrap();
        assert_eq!(report.processed(), 0);
        assert_eq!(registry.calls(), calls);
    }
}

#[tokio::test]
async fn functions_dropped_from_a_redeployed_contract_leave_the_cache() {
    let store = Arc::new(CountingStore::new());
    let resolver = resolver_with(store.clone(), SweepPolicy::FailFast);
    let approve = fixed_bytes!("095ea7b3");
    let registry = StubRegistry::new().with_abi(USDT, ERC20_ABI);

    let _ = resolver.resolve_contract_abi(Chain::mainnet(), USDT).await;
    let node = StubNode::new().with_code(USDT, erc20_code());
    resolver.run_staleness_sweep(&registry, &node).await.unwrap();
    for selector in [TRANSFER, approve] {
        resolver
            .resolve_function_abi(Chain::mainnet(), USDT, selector)
            .await
            .unwrap();
    }
    assert_eq!(resolver.cache().len(), 2);

    // New bytecode whose ABI keeps only `transfer`.
    let mut record = store.staleness(1, USDT).await.unwrap().unwrap();
    record.last_checked_at = Utc::now() - TimeDelta::hours(49);
    store.update_staleness(&record).await.unwrap();
    registry.set_abi(USDT, ERC20_ABI_NO_RETURN);
    let upgraded = StubNode::new().with_code(USDT, bytes!("6080604052348015600f57600080fd5b50"));

    let report = resolver
        .run_staleness_sweep(&registry, &upgraded)
        .await
        .unwrap();
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.evicted, 1);

    let approve_key = CacheKey::function(Chain::mainnet(), USDT, approve);
    assert!(!resolver.cache().contains(&approve_key));
    assert!(resolver
        .cache()
        .contains(&CacheKey::function(Chain::mainnet(), USDT, TRANSFER)));

    // The old record now points at replaced bytecode, so lookups miss.
    let err = resolver
        .resolve_function_abi(Chain::mainnet(), USDT, approve)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotFoundPending { .. }));
}

#[tokio::test(start_paused = true)]
async fn scheduler_retries_flaky_registry_and_shuts_down() {
    init_tracing();
    let store = Arc::new(CountingStore::new());
    let resolver = Arc::new(AbiResolver::new(
        store.clone(),
        ResolverConfigBuilder::with_defaults().build(),
    ));
    let _ = resolver.resolve_contract_abi(Chain::mainnet(), USDT).await;

    let registry = Arc::new(StubRegistry::new().with_flaky_abi(USDT, 2, ERC20_ABI));
    let node = Arc::new(StubNode::new().with_code(USDT, erc20_code()));
    let handle = StalenessScheduler::new(resolver.clone(), registry.clone(), node.clone()).spawn();

    // Two failures, one second apart, then success.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(registry.calls(), 3);
    assert!(!handle.is_finished());

    let contract = resolver
        .resolve_contract_abi(Chain::mainnet(), USDT)
        .await
        .unwrap();
    assert_eq!(contract.methods().count(), 4);

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(registry.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn scheduler_keeps_running_after_a_failed_sweep() {
    init_tracing();
    let store = Arc::new(CountingStore::new());
    let resolver = Arc::new(AbiResolver::new(
        store.clone(),
        ResolverConfigBuilder::with_defaults().build(),
    ));
    let _ = resolver.resolve_contract_abi(Chain::mainnet(), USDT).await;

    let registry = Arc::new(StubRegistry::new().with_unavailable(USDT));
    let node = Arc::new(StubNode::new());
    let handle = StalenessScheduler::new(resolver.clone(), registry.clone(), node)
        .with_interval(Duration::from_secs(30))
        .spawn();

    // Five attempts per sweep, with the default policy.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(registry.calls(), 5);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(registry.calls(), 10);
    assert!(store.staleness(1, USDT).await.unwrap().unwrap().needs_refresh);

    handle.shutdown().await;
}
