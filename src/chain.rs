//! Outbound reads against on-chain state.
//!
//! [`ChainClient`] is the one external collaborator the
//! [`crate::cache::LazyStateCache`] talks to. Implementations are expected to
//! be thin wrappers around a JSON-RPC client; this crate only specifies the
//! shape of the reads, not how they're transported or batched.

use core::{fmt, str::FromStr};

use async_trait::async_trait;
use web3::types::{Address, H256, U256};

/// The block height (or finality tag) reads are pinned to, fixed once at
/// [`crate::Watcher`] construction and passed through on every underlying
/// read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateLayer {
    Latest,
    Finalized,
    Number(u64),
}

impl Default for StateLayer {
    fn default() -> Self {
        Self::Latest
    }
}

impl FromStr for StateLayer {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "finalized" => Ok(Self::Finalized),
            number => number.parse().map(Self::Number),
        }
    }
}

impl fmt::Display for StateLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Finalized => write!(f, "finalized"),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Outbound chain reads the watcher's cache reads through.
///
/// Every method is pinned to the [`StateLayer`] passed in; callers (in
/// practice, only [`crate::cache::LazyStateCache`]) are responsible for
/// always passing the same layer for the lifetime of a watcher.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(
        &self,
        token: Address,
        owner: Address,
        layer: StateLayer,
    ) -> anyhow::Result<U256>;

    async fn get_allowance(
        &self,
        token: Address,
        owner: Address,
        layer: StateLayer,
    ) -> anyhow::Result<U256>;

    async fn get_filled(&self, order_hash: H256, layer: StateLayer) -> anyhow::Result<U256>;

    async fn get_cancelled(&self, order_hash: H256, layer: StateLayer) -> anyhow::Result<U256>;

    async fn get_zrx_token_address(&self, layer: StateLayer) -> anyhow::Result<Address>;
}
