// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the staleness sweep.

use alloy_chains::Chain;
use alloy_primitives::Address;

use super::{FetchError, StoreError};

/// Errors that abort a staleness sweep.
///
/// Per-record outcomes that are not failures (not verified, not a contract,
/// malformed ABI) are recorded on the staleness record and counted in the
/// [`SweepReport`](crate::SweepReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// A remote collaborator failed after its retries were exhausted.
    #[error("Fetch for {address} on chain {chain} failed: {source}")]
    Fetch {
        /// Chain of the record being refreshed
        chain: Chain,
        /// Address of the record being refreshed
        address: Address,
        /// The collaborator error
        #[source]
        source: FetchError,
    },

    /// The durable store failed mid-sweep.
    #[error("Store failure during sweep: {0}")]
    Store(#[from] StoreError),
}

impl SweepError {
    /// Creates a `Fetch` error for the record identified by `chain` and `address`.
    pub fn fetch(chain: Chain, address: Address, source: FetchError) -> Self {
        SweepError::Fetch {
            chain,
            address,
            source,
        }
    }
}
