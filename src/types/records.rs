// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Record kinds persisted by the durable store.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, Bytes, Selector, B256};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::key::FunctionRecordId;

/// Primary key of a [`ContractRecord`]: keccak256 of the runtime bytecode.
///
/// Clones and proxies sharing bytecode share one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractRecordId(B256);

impl ContractRecordId {
    pub fn new(raw: B256) -> Self {
        Self(raw)
    }

    /// Content address of `bytecode`.
    pub fn for_bytecode(bytecode: &[u8]) -> Self {
        Self(keccak256(bytecode))
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl fmt::Display for ContractRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bytecode plus whole-contract ABI for one distinct contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRecord {
    pub id: ContractRecordId,
    pub bytecode: Bytes,
    /// Whole-contract ABI as returned by the registry (JSON array text)
    pub contract_abi: String,
}

impl ContractRecord {
    /// Builds a record keyed by the content address of `bytecode`.
    pub fn new(bytecode: Bytes, contract_abi: impl Into<String>) -> Self {
        Self {
            id: ContractRecordId::for_bytecode(&bytecode),
            bytecode,
            contract_abi: contract_abi.into(),
        }
    }
}

/// ABI fragment of one function, one row per selector per contract per chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub id: FunctionRecordId,
    pub contract_id: ContractRecordId,
    pub selector: Selector,
    /// Single method object (JSON object text)
    pub function_abi: String,
}

/// Links an on-chain address to the contract record deployed there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub chain_id: u64,
    pub address: Address,
    pub contract_id: ContractRecordId,
}

/// Outcome of the last sweep that processed an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    /// Never fetched yet
    #[default]
    Pending,
    /// ABI and bytecode were stored
    Resolved,
    /// The registry has no verified ABI for the address
    NotVerified,
    /// The address has no runtime code
    NotAContract,
    /// The registry returned an ABI that failed validation
    Malformed,
    /// A collaborator has no endpoint for the record's chain
    UnsupportedChain,
}

impl RefreshStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshStatus::Pending => "pending",
            RefreshStatus::Resolved => "resolved",
            RefreshStatus::NotVerified => "not_verified",
            RefreshStatus::NotAContract => "not_a_contract",
            RefreshStatus::Malformed => "malformed",
            RefreshStatus::UnsupportedChain => "unsupported_chain",
        }
    }
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefreshStatus::Pending),
            "resolved" => Ok(RefreshStatus::Resolved),
            "not_verified" => Ok(RefreshStatus::NotVerified),
            "not_a_contract" => Ok(RefreshStatus::NotAContract),
            "malformed" => Ok(RefreshStatus::Malformed),
            "unsupported_chain" => Ok(RefreshStatus::UnsupportedChain),
            other => Err(format!("unknown refresh status `{other}`")),
        }
    }
}

/// Staleness bookkeeping for one `(chain_id, address)`.
///
/// Cycles `armed → fresh → armed` for its whole lifetime:
///
/// ```text
/// {none} ──miss──▶ needs_refresh=true ──sweep──▶ needs_refresh=false
///                        ▲                               │
///                        └──────── threshold elapsed ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessRecord {
    pub chain_id: u64,
    pub address: Address,
    pub last_checked_at: DateTime<Utc>,
    pub needs_refresh: bool,
    pub status: RefreshStatus,
}

impl StalenessRecord {
    /// A freshly armed record, as created on the first miss.
    pub fn armed(chain_id: u64, address: Address, now: DateTime<Utc>) -> Self {
        Self {
            chain_id,
            address,
            last_checked_at: now,
            needs_refresh: true,
            status: RefreshStatus::Pending,
        }
    }

    /// Whether more than `threshold` has elapsed since the last check.
    pub fn is_due(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        now.signed_duration_since(self.last_checked_at) > threshold
    }
}
