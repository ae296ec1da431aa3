// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types returned to callers of the resolution cascade.

use alloy_chains::Chain;
use alloy_primitives::Address;

use super::{AbiParseError, StoreError};

/// Errors returned by [`AbiResolver`](crate::AbiResolver) lookups.
///
/// The variants split into three groups:
///
/// - **Poll again**: [`NotFoundPending`](Self::NotFoundPending). The artifact
///   is unknown locally; a future sweep may supply it.
/// - **Give up on this address**: [`NotVerified`](Self::NotVerified),
///   [`NotAContract`](Self::NotAContract) and
///   [`UnsupportedChain`](Self::UnsupportedChain), as reported by the last
///   sweep.
/// - **Local failure**: [`Parse`](Self::Parse) (stored bytes are bad, not
///   stale) and [`Persistence`](Self::Persistence).
///
/// # Examples
///
/// ```rust,ignore
/// match resolver.resolve_function_abi(chain, address, selector).await {
///     Ok(method) => println!("{}", method.signature()),
///     Err(e) if e.is_retryable() => schedule_retry(),
///     Err(e) => eprintln!("giving up: {e}"),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Neither the cache nor the store has the artifact.
    ///
    /// This does not always mean a refresh is armed. A selector missing from
    /// a contract that was already resolved, or an address whose last ABI
    /// failed validation, waits for the staleness threshold before the
    /// address is fetched again.
    #[error("ABI for {address} on chain {chain} is not available yet; a future sweep may provide it")]
    NotFoundPending {
        /// Chain of the lookup
        chain: Chain,
        /// Contract address of the lookup
        address: Address,
    },

    /// The last sweep found no runtime code at the address.
    #[error("Address {address} on chain {chain} is not a contract")]
    NotAContract {
        /// Chain of the lookup
        chain: Chain,
        /// Externally-owned address
        address: Address,
    },

    /// The last sweep found the contract unverified at the registry.
    #[error("Contract {address} on chain {chain} is not verified")]
    NotVerified {
        /// Chain of the lookup
        chain: Chain,
        /// Unverified contract address
        address: Address,
    },

    /// The last sweep found no collaborator endpoint for the chain.
    #[error("Chain {chain} is not supported; cannot resolve {address}")]
    UnsupportedChain {
        /// Chain of the lookup
        chain: Chain,
        /// Address that was looked up
        address: Address,
    },

    /// The stored ABI JSON could not be parsed. Nothing was cached.
    #[error("Stored ABI is malformed: {0}")]
    Parse(#[from] AbiParseError),

    /// The durable store failed. The cache was left untouched.
    #[error("Store failure: {0}")]
    Persistence(#[from] StoreError),
}

impl ResolveError {
    /// Whether polling again later may produce a result.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveError::NotFoundPending { .. } | ResolveError::Persistence(_)
        )
    }
}
