// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory store backend.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::Address;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use super::AbiStore;
use crate::errors::StoreError;
use crate::types::{
    ContractRecord, ContractRecordId, DeploymentRecord, FunctionRecord, FunctionRecordId,
    StalenessRecord,
};

#[derive(Debug, Default)]
struct Tables {
    contracts: HashMap<ContractRecordId, ContractRecord>,
    functions: BTreeMap<FunctionRecordId, FunctionRecord>,
    deployments: HashMap<(u64, Address), DeploymentRecord>,
    staleness: BTreeMap<(u64, Address), StalenessRecord>,
}

/// Process-local [`AbiStore`].
///
/// Nothing survives a restart. Useful for tests and for deployments where the
/// registry is cheap enough to re-query after every boot.
///
/// # Examples
///
/// ```rust
/// use abiscan::{AbiStore, MemoryStore, StalenessRecord};
/// use alloy_primitives::Address;
/// use chrono::Utc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store
///     .insert_staleness(&StalenessRecord::armed(1, Address::ZERO, Utc::now()))
///     .await
///     .unwrap();
/// assert_eq!(store.staleness_by_flag(true).await.unwrap().len(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AbiStore for MemoryStore {
    async fn put_contract(&self, record: &ContractRecord) -> Result<(), StoreError> {
        trace!(contract_id = %record.id, "Storing contract record");
        self.tables
            .lock()
            .await
            .contracts
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn contract(&self, id: ContractRecordId) -> Result<Option<ContractRecord>, StoreError> {
        Ok(self.tables.lock().await.contracts.get(&id).cloned())
    }

    async fn put_function(&self, record: &FunctionRecord) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .functions
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn function(&self, id: FunctionRecordId) -> Result<Option<FunctionRecord>, StoreError> {
        Ok(self.tables.lock().await.functions.get(&id).cloned())
    }

    async fn functions_for_contract(
        &self,
        contract_id: ContractRecordId,
    ) -> Result<Vec<FunctionRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .functions
            .values()
            .filter(|record| record.contract_id == contract_id)
            .cloned()
            .collect())
    }

    async fn put_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .deployments
            .insert((record.chain_id, record.address), *record);
        Ok(())
    }

    async fn deployment(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .deployments
            .get(&(chain_id, address))
            .copied())
    }

    async fn insert_staleness(&self, record: &StalenessRecord) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .staleness
            .insert((record.chain_id, record.address), *record);
        Ok(())
    }

    async fn staleness(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<StalenessRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .staleness
            .get(&(chain_id, address))
            .copied())
    }

    async fn update_staleness(&self, record: &StalenessRecord) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.staleness.get_mut(&(record.chain_id, record.address)) {
            Some(existing) => {
                *existing = *record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn staleness_by_flag(
        &self,
        needs_refresh: bool,
    ) -> Result<Vec<StalenessRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .staleness
            .values()
            .filter(|record| record.needs_refresh == needs_refresh)
            .copied()
            .collect())
    }
}
