// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the abiscan library.
//!
//! This module follows a hybrid approach:
//!
//! - **Module-specific errors** for fine-grained handling ([`ResolveError`],
//!   [`SweepError`], [`FetchError`], [`StoreError`], [`AbiParseError`])
//! - **Unified error type** ([`AbiscanError`]) for callers that do not need to
//!   distinguish between error sources
//!
//! # Examples
//!
//! ## Fine-grained error handling
//!
//! ```rust,ignore
//! use abiscan::{AbiResolver, ResolveError};
//!
//! match resolver.resolve_contract_abi(chain, address).await {
//!     Ok(abi) => println!("{} functions", abi.len()),
//!     Err(ResolveError::NotFoundPending { .. }) => {
//!         // queued for the next sweep, ask again later
//!     }
//!     Err(ResolveError::NotVerified { address, .. }) => {
//!         eprintln!("{address} has no verified source");
//!     }
//!     Err(e) => eprintln!("lookup failed: {e}"),
//! }
//! ```
//!
//! ## Using the unified error type
//!
//! ```rust,ignore
//! use abiscan::AbiscanError;
//!
//! async fn refresh_and_resolve(resolver: &AbiResolver) -> Result<(), AbiscanError> {
//!     resolver.run_staleness_sweep(&registry, &node).await?;
//!     let abi = resolver.resolve_contract_abi(chain, address).await?;
//!     Ok(())
//! }
//! ```

mod abi;
mod fetch;
mod resolve;
mod store;
mod sweep;

pub use abi::AbiParseError;
pub use fetch::FetchError;
pub use resolve::ResolveError;
pub use store::StoreError;
pub use sweep::SweepError;

/// Unified error type for all abiscan operations.
///
/// All module-specific error types convert into `AbiscanError` via `From`, so
/// `?` propagates them naturally.
#[derive(Debug, thiserror::Error)]
pub enum AbiscanError {
    /// Error from an ABI lookup.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Error from a staleness sweep.
    #[error("Sweep error: {0}")]
    Sweep(#[from] SweepError),

    /// Error from a remote collaborator.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Error from the durable store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from ABI parsing.
    #[error("ABI parse error: {0}")]
    Parse(#[from] AbiParseError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
