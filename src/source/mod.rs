// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Remote collaborators consulted by the staleness sweep.
//!
//! The sweep needs two things the local tiers cannot provide:
//!
//! - [`AbiSource`]: the verified whole-contract ABI from an external registry
//! - [`BytecodeSource`]: the runtime bytecode from a chain node
//!
//! Neither is ever called on the lookup path. Implementations resolve their own
//! endpoint per chain and report a missing one as
//! [`FetchError::UnsupportedChain`].
//!
//! Wrappers compose with tower's [`Layer`](tower::Layer):
//!
//! ```rust,ignore
//! use abiscan::source::{RateLimitLayer, RetryLayer};
//! use tower::Layer;
//!
//! let registry = RetryLayer::default().layer(RateLimitLayer::per_second(5).layer(etherscan));
//! ```

use std::sync::Arc;

use alloy_chains::Chain;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

use crate::errors::FetchError;

mod provider;
mod rate_limit;
mod retry;

pub use provider::{ProviderBytecodeSource, ProviderConfig};
pub use rate_limit::{RateLimitLayer, RateLimited};
pub use retry::{Backoff, RetryLayer, RetryPolicy, RetryPolicyBuilder, Retrying};

/// External ABI registry.
///
/// Returns the whole-contract ABI as JSON text exactly as the registry serves
/// it. Validation happens in the sweep, not here.
#[async_trait]
pub trait AbiSource: Send + Sync {
    /// Fetches the verified ABI of `address`.
    ///
    /// [`FetchError::NotVerified`] when the registry has no verified source,
    /// [`FetchError::Unavailable`] on transport failure.
    async fn fetch_abi(&self, chain: Chain, address: Address) -> Result<String, FetchError>;
}

/// Chain node client for runtime bytecode.
#[async_trait]
pub trait BytecodeSource: Send + Sync {
    /// Fetches the runtime bytecode at `address`. Empty bytes mean an
    /// externally-owned account.
    async fn fetch_runtime_code(&self, chain: Chain, address: Address)
        -> Result<Bytes, FetchError>;
}

#[async_trait]
impl<T: AbiSource + ?Sized> AbiSource for Arc<T> {
    async fn fetch_abi(&self, chain: Chain, address: Address) -> Result<String, FetchError> {
        (**self).fetch_abi(chain, address).await
    }
}

#[async_trait]
impl<T: BytecodeSource + ?Sized> BytecodeSource for Arc<T> {
    async fn fetch_runtime_code(
        &self,
        chain: Chain,
        address: Address,
    ) -> Result<Bytes, FetchError> {
        (**self).fetch_runtime_code(chain, address).await
    }
}
