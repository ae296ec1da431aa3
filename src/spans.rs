//! Span creation helpers for abiscan operations.
//!
//! Each instrumented operation has a corresponding span helper here, keeping
//! telemetry out of the business logic. Spans are attached to futures with
//! [`tracing::Instrument`] so they stay correct across `.await` points:
//!
//! ```rust,ignore
//! pub async fn my_operation(&self, chain: Chain) -> Result<T> {
//!     async move {
//!         // Business logic here
//!     }
//!     .instrument(spans::my_operation(chain))
//!     .await
//! }
//! ```

use alloy_chains::Chain;
use alloy_primitives::{Address, Selector};
use tracing::{Level, Span};

/// Create span for a single-function lookup.
///
/// Parent: caller's span
/// Children: none (store access is logged, not spanned)
#[inline]
pub(crate) fn resolve_function_abi(chain: Chain, address: Address, selector: Selector) -> Span {
    tracing::debug_span!(
        "abiscan.resolve_function_abi",
        chain_id = %chain,
        address = %address,
        selector = %selector,
    )
}

/// Create span for a whole-contract lookup.
///
/// Parent: caller's span
#[inline]
pub(crate) fn resolve_contract_abi(chain: Chain, address: Address) -> Span {
    tracing::debug_span!(
        "abiscan.resolve_contract_abi",
        chain_id = %chain,
        address = %address,
    )
}

/// Create span for one full staleness sweep (aging pass plus drain pass).
///
/// Parent: None (root span, usually started by the scheduler)
/// Children: refresh_contract spans (one per armed record)
#[inline]
pub(crate) fn staleness_sweep() -> Span {
    tracing::span!(Level::INFO, "abiscan.staleness_sweep")
}

/// Create span for refreshing one armed address.
///
/// Parent: staleness_sweep span
/// Children: collaborator calls
#[inline]
pub(crate) fn refresh_contract(chain_id: u64, address: Address) -> Span {
    tracing::debug_span!(
        "abiscan.refresh_contract",
        chain_id = chain_id,
        address = %address,
    )
}
