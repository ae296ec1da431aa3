// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! [`BytecodeSource`] over alloy HTTP providers, one per chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_chains::Chain;
use alloy_network::AnyNetwork;
use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use async_trait::async_trait;
use tower::Layer;
use tracing::{debug, info, warn};

use super::{BytecodeSource, RateLimitLayer};
use crate::errors::{AbiscanError, FetchError};

/// Endpoint settings for one chain's node.
///
/// # Examples
///
/// ```rust
/// use abiscan::source::ProviderConfig;
///
/// let config = ProviderConfig::new("https://eth.llamarpc.com").with_rate_limit(10);
/// assert!(config.has_rate_limiting());
/// ```
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// HTTP(S) RPC URL
    pub url: String,
    /// Maximum calls per second (token bucket, bursts allowed)
    pub rate_limit_per_second: Option<u32>,
    /// Minimum spacing between calls; ignored when `rate_limit_per_second` is set
    pub min_delay: Option<Duration>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rate_limit_per_second: None,
            min_delay: None,
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limit_per_second = Some(requests_per_second);
        self
    }

    #[must_use]
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn has_rate_limiting(&self) -> bool {
        self.rate_limit_per_second.is_some() || self.min_delay.is_some()
    }

    /// Public endpoint preset: 5 calls per second.
    #[must_use]
    pub fn public_endpoint(url: impl Into<String>) -> Self {
        Self::new(url).with_rate_limit(5)
    }

    fn rate_limit(&self) -> Option<RateLimitLayer> {
        match (self.rate_limit_per_second, self.min_delay) {
            (Some(rps), Some(_)) => {
                warn!("Both rate_limit_per_second and min_delay specified, using rate_limit_per_second");
                Some(RateLimitLayer::per_second(rps))
            }
            (Some(rps), None) => Some(RateLimitLayer::per_second(rps)),
            (None, Some(delay)) => Some(RateLimitLayer::with_min_delay(delay)),
            (None, None) => None,
        }
    }
}

/// A single chain's node.
#[derive(Debug, Clone)]
struct ChainNode {
    chain: Chain,
    provider: RootProvider<AnyNetwork>,
}

#[async_trait]
impl BytecodeSource for ChainNode {
    async fn fetch_runtime_code(
        &self,
        chain: Chain,
        address: Address,
    ) -> Result<Bytes, FetchError> {
        debug_assert_eq!(chain, self.chain);
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| FetchError::unavailable(format!("eth_getCode {address} on {chain}"), e))?;
        debug!(chain_id = %chain, address = %address, bytes = code.len(), "Fetched runtime code");
        Ok(code)
    }
}

/// Fetches runtime bytecode through `eth_getCode`, routing by chain.
///
/// Chains without a registered endpoint fail with
/// [`FetchError::UnsupportedChain`].
///
/// # Examples
///
/// ```rust,no_run
/// use abiscan::source::{ProviderBytecodeSource, ProviderConfig};
/// use alloy_chains::Chain;
///
/// let node = ProviderBytecodeSource::new()
///     .with_endpoint(Chain::mainnet(), ProviderConfig::public_endpoint("https://eth.llamarpc.com"))?
///     .with_endpoint(Chain::from_id(8453), ProviderConfig::new("https://mainnet.base.org"))?;
/// # Ok::<(), abiscan::AbiscanError>(())
/// ```
#[derive(Default, Clone)]
pub struct ProviderBytecodeSource {
    nodes: HashMap<Chain, Arc<dyn BytecodeSource>>,
}

impl std::fmt::Debug for ProviderBytecodeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBytecodeSource")
            .field("chains", &self.chains())
            .finish()
    }
}

impl ProviderBytecodeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the endpoint for `chain`.
    pub fn add_endpoint(&mut self, chain: Chain, config: ProviderConfig) -> Result<(), AbiscanError> {
        let url: url::Url = config
            .url
            .parse()
            .map_err(|e| AbiscanError::Config(format!("invalid RPC URL for chain {chain}: {e}")))?;

        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .network::<AnyNetwork>()
            .connect_http(url);
        let node = ChainNode { chain, provider };

        let node: Arc<dyn BytecodeSource> = match config.rate_limit() {
            Some(layer) => Arc::new(layer.layer(node)),
            None => Arc::new(node),
        };

        info!(
            chain_id = %chain,
            rate_limited = config.has_rate_limiting(),
            "Registered bytecode endpoint"
        );
        self.nodes.insert(chain, node);
        Ok(())
    }

    pub fn with_endpoint(mut self, chain: Chain, config: ProviderConfig) -> Result<Self, AbiscanError> {
        self.add_endpoint(chain, config)?;
        Ok(self)
    }

    pub fn supports(&self, chain: Chain) -> bool {
        self.nodes.contains_key(&chain)
    }

    /// Registered chains, sorted by id.
    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<_> = self.nodes.keys().copied().collect();
        chains.sort_by_key(|chain| chain.id());
        chains
    }
}

#[async_trait]
impl BytecodeSource for ProviderBytecodeSource {
    async fn fetch_runtime_code(
        &self,
        chain: Chain,
        address: Address,
    ) -> Result<Bytes, FetchError> {
        let node = self.nodes.get(&chain).ok_or(FetchError::UnsupportedChain {
            chain,
            collaborator: "ProviderBytecodeSource",
        })?;
        node.fetch_runtime_code(chain, address).await
    }
}
