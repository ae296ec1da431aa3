// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the remote ABI registry and bytecode collaborators.

use alloy_chains::Chain;
use alloy_primitives::Address;

/// Errors returned by [`AbiSource`](crate::source::AbiSource) and
/// [`BytecodeSource`](crate::source::BytecodeSource) implementations.
///
/// Only [`FetchError::Unavailable`] is transient. The other variants describe
/// a permanent state of the address (or of the collaborator's configuration)
/// and retrying them cannot succeed.
///
/// # Examples
///
/// ```rust
/// use abiscan::FetchError;
/// use alloy_chains::Chain;
/// use alloy_primitives::Address;
///
/// let err = FetchError::NotVerified {
///     chain: Chain::mainnet(),
///     address: Address::ZERO,
/// };
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The registry knows the address but has no verified source or ABI for it.
    #[error("Contract {address} on chain {chain} is not verified")]
    NotVerified {
        /// Chain the lookup was made on
        chain: Chain,
        /// The unverified address
        address: Address,
    },

    /// The address holds no runtime code: it is an externally-owned account.
    #[error("Address {address} on chain {chain} is not a contract")]
    NotAContract {
        /// Chain the lookup was made on
        chain: Chain,
        /// The externally-owned address
        address: Address,
    },

    /// Transport or timeout failure talking to the collaborator.
    ///
    /// Safe to retry; the retry layer and the next sweep both do.
    #[error("Remote unavailable during {operation}")]
    Unavailable {
        /// Description of the call that failed (e.g. "eth_getCode 0xabc…")
        operation: String,
        /// The underlying transport error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The collaborator has no endpoint configured for this chain.
    #[error("Chain {chain} is not supported by {collaborator}")]
    UnsupportedChain {
        /// The chain that was requested
        chain: Chain,
        /// Name of the collaborator that rejected it
        collaborator: &'static str,
    },
}

impl FetchError {
    /// Creates an `Unavailable` error from any transport error.
    pub fn unavailable(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        FetchError::Unavailable {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Unavailable { .. })
    }
}
