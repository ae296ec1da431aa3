// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Lookup keys and the identifiers derived from them.

use std::fmt;

use alloy_chains::Chain;
use alloy_primitives::{keccak256, Address, Selector};
use serde::{Deserialize, Serialize};

/// Key of one cache entry: a function of a contract, or the contract itself.
///
/// `selector == None` addresses the whole-contract ABI. The in-memory cache is
/// keyed by this full tuple, so two distinct keys can never share an entry.
///
/// # Examples
///
/// ```rust
/// use abiscan::CacheKey;
/// use alloy_chains::Chain;
/// use alloy_primitives::{address, fixed_bytes};
///
/// let usdt = address!("dac17f958d2ee523a2206206994597c13d831ec7");
/// let transfer = CacheKey::function(Chain::mainnet(), usdt, fixed_bytes!("a9059cbb"));
/// let whole = CacheKey::contract(Chain::mainnet(), usdt);
///
/// assert_ne!(transfer, whole);
/// assert_eq!(transfer.contract_key(), whole);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    chain: Chain,
    address: Address,
    selector: Option<Selector>,
}

impl CacheKey {
    /// Key of a single function of `address`.
    pub fn function(chain: Chain, address: Address, selector: Selector) -> Self {
        Self {
            chain,
            address,
            selector: Some(selector),
        }
    }

    /// Key of the whole-contract ABI of `address`.
    pub fn contract(chain: Chain, address: Address) -> Self {
        Self {
            chain,
            address,
            selector: None,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn selector(&self) -> Option<Selector> {
        self.selector
    }

    /// The whole-contract key for the same chain and address.
    pub fn contract_key(&self) -> Self {
        Self::contract(self.chain, self.address)
    }

    /// Persisted identifier of the function record for this key.
    ///
    /// The first 8 bytes of `keccak256(chain_id_be ‖ address ‖ selector)`,
    /// read as a big-endian `i64`. Deterministic, so repeated writes of the same
    /// function are idempotent. Distinct keys can collide; the store layer
    /// checks the selector and contract link of every record it reads back.
    pub fn record_id(&self) -> FunctionRecordId {
        let mut preimage = [0u8; 8 + 20 + 4];
        preimage[..8].copy_from_slice(&self.chain.id().to_be_bytes());
        preimage[8..28].copy_from_slice(self.address.as_slice());
        let len = match self.selector {
            Some(selector) => {
                preimage[28..].copy_from_slice(selector.as_slice());
                preimage.len()
            }
            None => 28,
        };
        let digest = keccak256(&preimage[..len]);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        FunctionRecordId(i64::from_be_bytes(head))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.selector {
            Some(selector) => write!(f, "{}:{}:{}", self.chain.id(), self.address, selector),
            None => write!(f, "{}:{}", self.chain.id(), self.address),
        }
    }
}

/// Primary key of a [`FunctionRecord`](crate::FunctionRecord).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionRecordId(i64);

impl FunctionRecordId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for FunctionRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, fixed_bytes};

    const TOKEN: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");

    #[test]
    fn record_id_is_deterministic() {
        let a = CacheKey::function(Chain::mainnet(), TOKEN, fixed_bytes!("a9059cbb"));
        let b = CacheKey::function(Chain::mainnet(), TOKEN, fixed_bytes!("a9059cbb"));
        assert_eq!(a.record_id(), b.record_id());
    }

    #[test]
    fn record_id_depends_on_every_component() {
        let base = CacheKey::function(Chain::mainnet(), TOKEN, fixed_bytes!("a9059cbb"));
        let other_selector = CacheKey::function(Chain::mainnet(), TOKEN, fixed_bytes!("095ea7b3"));
        let other_chain = CacheKey::function(Chain::from_id(8453), TOKEN, fixed_bytes!("a9059cbb"));
        let other_address =
            CacheKey::function(Chain::mainnet(), Address::ZERO, fixed_bytes!("a9059cbb"));

        assert_ne!(base.record_id(), other_selector.record_id());
        assert_ne!(base.record_id(), other_chain.record_id());
        assert_ne!(base.record_id(), other_address.record_id());
        assert_ne!(base.record_id(), base.contract_key().record_id());
    }

    #[test]
    fn contract_key_drops_selector() {
        let key = CacheKey::function(Chain::mainnet(), TOKEN, fixed_bytes!("a9059cbb"));
        let contract = key.contract_key();
        assert_eq!(contract.selector(), None);
        assert_eq!(contract.address(), TOKEN);
        assert_eq!(contract.chain(), Chain::mainnet());
    }

    #[test]
    fn display_includes_selector_only_for_functions() {
        let key = CacheKey::function(Chain::mainnet(), TOKEN, fixed_bytes!("a9059cbb"));
        assert!(key.to_string().ends_with(":0xa9059cbb"));
        assert!(key.to_string().starts_with("1:"));
        assert_eq!(key.contract_key().to_string().matches(':').count(), 1);
    }
}
