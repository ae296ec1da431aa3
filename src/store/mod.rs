// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Durable tier of the resolution cascade.
//!
//! The [`AbiStore`] trait is the repository the resolver and the sweep talk
//! to. It holds four record kinds:
//!
//! | Record | Key | Written by |
//! |--------|-----|------------|
//! | [`ContractRecord`] | keccak256 of runtime bytecode | sweep |
//! | [`FunctionRecord`] | [`FunctionRecordId`] | sweep |
//! | [`DeploymentRecord`] | `(chain_id, address)` | sweep |
//! | [`StalenessRecord`] | `(chain_id, address)` | resolver (arm), sweep (clear/age) |
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryStore`]: process-local maps, for tests and ephemeral deployments
//! - [`SqliteStore`]: a SQLite database file, the durable default
//!
//! Records are never deleted through this interface.

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::errors::StoreError;
use crate::types::{
    ContractRecord, ContractRecordId, DeploymentRecord, FunctionRecord, FunctionRecordId,
    StalenessRecord,
};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistent repository of contract, function, deployment, and staleness
/// records.
///
/// Point lookups that match nothing return `Ok(None)`. An `Err` always means
/// the backend failed, and the caller must not assume a write happened.
///
/// Writes named `put_*` are upserts keyed by the record's primary key.
#[async_trait]
pub trait AbiStore: Send + Sync {
    /// Inserts or replaces a contract record.
    async fn put_contract(&self, record: &ContractRecord) -> Result<(), StoreError>;

    async fn contract(&self, id: ContractRecordId) -> Result<Option<ContractRecord>, StoreError>;

    /// Inserts or replaces a function record.
    async fn put_function(&self, record: &FunctionRecord) -> Result<(), StoreError>;

    async fn function(&self, id: FunctionRecordId) -> Result<Option<FunctionRecord>, StoreError>;

    /// All function records linked to `contract_id`, ordered by id.
    async fn functions_for_contract(
        &self,
        contract_id: ContractRecordId,
    ) -> Result<Vec<FunctionRecord>, StoreError>;

    /// Inserts or re-points the deployment at `(chain_id, address)`.
    async fn put_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError>;

    async fn deployment(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<DeploymentRecord>, StoreError>;

    /// Creates the staleness record for `(chain_id, address)`, replacing any
    /// existing one.
    async fn insert_staleness(&self, record: &StalenessRecord) -> Result<(), StoreError>;

    async fn staleness(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<StalenessRecord>, StoreError>;

    /// Overwrites the mutable fields of an existing staleness record.
    ///
    /// Returns `false` when no record exists for `(chain_id, address)`.
    async fn update_staleness(&self, record: &StalenessRecord) -> Result<bool, StoreError>;

    /// All staleness records whose `needs_refresh` equals `needs_refresh`,
    /// ordered by `(chain_id, address)`.
    async fn staleness_by_flag(
        &self,
        needs_refresh: bool,
    ) -> Result<Vec<StalenessRecord>, StoreError>;
}
