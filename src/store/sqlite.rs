// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! SQLite store backend.
//!
//! Four tables, one per record kind. Hashes, addresses, and selectors are
//! stored as raw BLOBs; ABI JSON as TEXT; timestamps as RFC 3339 TEXT with
//! nanosecond precision so they read back unchanged.
//!
//! rusqlite is synchronous, so every statement runs on the blocking pool via
//! [`tokio::task::spawn_blocking`] against a shared connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, Selector, B256};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::AbiStore;
use crate::errors::StoreError;
use crate::types::{
    ContractRecord, ContractRecordId, DeploymentRecord, FunctionRecord, FunctionRecordId,
    RefreshStatus, StalenessRecord,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contracts (
    id BLOB PRIMARY KEY,
    bytecode BLOB NOT NULL,
    contract_abi TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS functions (
    id INTEGER PRIMARY KEY,
    contract_id BLOB NOT NULL,
    selector BLOB NOT NULL,
    function_abi TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_functions_contract ON functions(contract_id);

CREATE TABLE IF NOT EXISTS deployments (
    chain_id INTEGER NOT NULL,
    address BLOB NOT NULL,
    contract_id BLOB NOT NULL,
    PRIMARY KEY (chain_id, address)
);

CREATE TABLE IF NOT EXISTS staleness (
    chain_id INTEGER NOT NULL,
    address BLOB NOT NULL,
    last_checked_at TEXT NOT NULL,
    needs_refresh INTEGER NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (chain_id, address)
);

CREATE INDEX IF NOT EXISTS idx_staleness_flag ON staleness(needs_refresh);
";

type FunctionRow = (i64, Vec<u8>, Vec<u8>, String);
type StalenessRow = (i64, Vec<u8>, String, bool, String);

/// [`AbiStore`] backed by a SQLite database file.
///
/// # Examples
///
/// ```rust,no_run
/// use abiscan::SqliteStore;
///
/// let store = SqliteStore::open("ABIs.db")?;
/// # Ok::<(), abiscan::StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StoreError::sqlite("open database", e))?;

        // WAL keeps readers off the writer's lock while a sweep is persisting.
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| StoreError::sqlite("configure database", e))?;

        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "Opened SQLite ABI store");
        Ok(store)
    }

    /// Opens a private in-memory database. Contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::sqlite("open database", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::sqlite("create schema", e))?;
        debug!("ABI store schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task {
            operation: operation.to_string(),
            details: e.to_string(),
        })?
    }
}

fn fixed<const N: usize>(column: &'static str, blob: &[u8]) -> Result<[u8; N], StoreError> {
    <[u8; N]>::try_from(blob).map_err(|_| {
        StoreError::encoding(column, format!("expected {N} bytes, found {}", blob.len()))
    })
}

fn decode_function(row: FunctionRow) -> Result<FunctionRecord, StoreError> {
    let (id, contract_id, selector, function_abi) = row;
    Ok(FunctionRecord {
        id: FunctionRecordId::new(id),
        contract_id: ContractRecordId::new(B256::from(fixed::<32>("contract_id", &contract_id)?)),
        selector: Selector::from(fixed::<4>("selector", &selector)?),
        function_abi,
    })
}

fn decode_staleness(row: StalenessRow) -> Result<StalenessRecord, StoreError> {
    let (chain_id, address, last_checked_at, needs_refresh, status) = row;
    let last_checked_at = DateTime::parse_from_rfc3339(&last_checked_at)
        .map_err(|e| StoreError::encoding("last_checked_at", e.to_string()))?
        .with_timezone(&Utc);
    let status = status
        .parse::<RefreshStatus>()
        .map_err(|e| StoreError::encoding("status", e))?;
    Ok(StalenessRecord {
        chain_id: chain_id as u64,
        address: Address::from(fixed::<20>("address", &address)?),
        last_checked_at,
        needs_refresh,
        status,
    })
}

fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[async_trait]
impl AbiStore for SqliteStore {
    async fn put_contract(&self, record: &ContractRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.run("put contract", move |conn| {
            let id = record.id.as_b256();
            conn.execute(
                "INSERT INTO contracts (id, bytecode, contract_abi) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     bytecode = excluded.bytecode,
                     contract_abi = excluded.contract_abi",
                params![id.as_slice(), record.bytecode.to_vec(), record.contract_abi],
            )
            .map_err(|e| StoreError::sqlite("put contract", e))?;
            Ok(())
        })
        .await
    }

    async fn contract(&self, id: ContractRecordId) -> Result<Option<ContractRecord>, StoreError> {
        self.run("get contract", move |conn| {
            let key = id.as_b256();
            let row = conn
                .query_row(
                    "SELECT bytecode, contract_abi FROM contracts WHERE id = ?1",
                    params![key.as_slice()],
                    |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .map_err(|e| StoreError::sqlite("get contract", e))?;
            Ok(row.map(|(bytecode, contract_abi)| ContractRecord {
                id,
                bytecode: Bytes::from(bytecode),
                contract_abi,
            }))
        })
        .await
    }

    async fn put_function(&self, record: &FunctionRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.run("put function", move |conn| {
            let contract_id = record.contract_id.as_b256();
            conn.execute(
                "INSERT INTO functions (id, contract_id, selector, function_abi)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     contract_id = excluded.contract_id,
                     selector = excluded.selector,
                     function_abi = excluded.function_abi",
                params![
                    record.id.as_i64(),
                    contract_id.as_slice(),
                    record.selector.as_slice(),
                    record.function_abi
                ],
            )
            .map_err(|e| StoreError::sqlite("put function", e))?;
            Ok(())
        })
        .await
    }

    async fn function(&self, id: FunctionRecordId) -> Result<Option<FunctionRecord>, StoreError> {
        self.run("get function", move |conn| {
            let row: Option<FunctionRow> = conn
                .query_row(
                    "SELECT id, contract_id, selector, function_abi FROM functions WHERE id = ?1",
                    params![id.as_i64()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()
                .map_err(|e| StoreError::sqlite("get function", e))?;
            row.map(decode_function).transpose()
        })
        .await
    }

    async fn functions_for_contract(
        &self,
        contract_id: ContractRecordId,
    ) -> Result<Vec<FunctionRecord>, StoreError> {
        self.run("list functions", move |conn| {
            let key = contract_id.as_b256();
            let mut stmt = conn
                .prepare(
                    "SELECT id, contract_id, selector, function_abi FROM functions
                     WHERE contract_id = ?1 ORDER BY id",
                )
                .map_err(|e| StoreError::sqlite("list functions", e))?;
            let rows = stmt
                .query_map(params![key.as_slice()], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })
                .and_then(|rows| rows.collect::<Result<Vec<FunctionRow>, _>>())
                .map_err(|e| StoreError::sqlite("list functions", e))?;
            rows.into_iter().map(decode_function).collect()
        })
        .await
    }

    async fn put_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let record = *record;
        self.run("put deployment", move |conn| {
            let contract_id = record.contract_id.as_b256();
            conn.execute(
                "INSERT INTO deployments (chain_id, address, contract_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(chain_id, address) DO UPDATE SET contract_id = excluded.contract_id",
                params![
                    record.chain_id as i64,
                    record.address.as_slice(),
                    contract_id.as_slice()
                ],
            )
            .map_err(|e| StoreError::sqlite("put deployment", e))?;
            Ok(())
        })
        .await
    }

    async fn deployment(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        self.run("get deployment", move |conn| {
            let contract_id = conn
                .query_row(
                    "SELECT contract_id FROM deployments WHERE chain_id = ?1 AND address = ?2",
                    params![chain_id as i64, address.as_slice()],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()
                .map_err(|e| StoreError::sqlite("get deployment", e))?;
            contract_id
                .map(|blob| {
                    Ok(DeploymentRecord {
                        chain_id,
                        address,
                        contract_id: ContractRecordId::new(B256::from(fixed::<32>(
                            "contract_id",
                            &blob,
                        )?)),
                    })
                })
                .transpose()
        })
        .await
    }

    async fn insert_staleness(&self, record: &StalenessRecord) -> Result<(), StoreError> {
        let record = *record;
        self.run("insert staleness", move |conn| {
            conn.execute(
                "INSERT INTO staleness (chain_id, address, last_checked_at, needs_refresh, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(chain_id, address) DO UPDATE SET
                     last_checked_at = excluded.last_checked_at,
                     needs_refresh = excluded.needs_refresh,
                     status = excluded.status",
                params![
                    record.chain_id as i64,
                    record.address.as_slice(),
                    encode_time(record.last_checked_at),
                    record.needs_refresh,
                    record.status.as_str()
                ],
            )
            .map_err(|e| StoreError::sqlite("insert staleness", e))?;
            Ok(())
        })
        .await
    }

    async fn staleness(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<Option<StalenessRecord>, StoreError> {
        self.run("get staleness", move |conn| {
            let row: Option<StalenessRow> = conn
                .query_row(
                    "SELECT chain_id, address, last_checked_at, needs_refresh, status
                     FROM staleness WHERE chain_id = ?1 AND address = ?2",
                    params![chain_id as i64, address.as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .optional()
                .map_err(|e| StoreError::sqlite("get staleness", e))?;
            row.map(decode_staleness).transpose()
        })
        .await
    }

    async fn update_staleness(&self, record: &StalenessRecord) -> Result<bool, StoreError> {
        let record = *record;
        self.run("update staleness", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE staleness
                     SET last_checked_at = ?3, needs_refresh = ?4, status = ?5
                     WHERE chain_id = ?1 AND address = ?2",
                    params![
                        record.chain_id as i64,
                        record.address.as_slice(),
                        encode_time(record.last_checked_at),
                        record.needs_refresh,
                        record.status.as_str()
                    ],
                )
                .map_err(|e| StoreError::sqlite("update staleness", e))?;
            Ok(changed > 0)
        })
        .await
    }

    async fn staleness_by_flag(
        &self,
        needs_refresh: bool,
    ) -> Result<Vec<StalenessRecord>, StoreError> {
        self.run("list staleness", move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT chain_id, address, last_checked_at, needs_refresh, status
                     FROM staleness WHERE needs_refresh = ?1 ORDER BY chain_id, address",
                )
                .map_err(|e| StoreError::sqlite("list staleness", e))?;
            let rows = stmt
                .query_map(params![needs_refresh], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })
                .and_then(|rows| rows.collect::<Result<Vec<StalenessRow>, _>>())
                .map_err(|e| StoreError::sqlite("list staleness", e))?;
            rows.into_iter().map(decode_staleness).collect()
        })
        .await
    }
}
