//! Pure evaluation of an order's current validity.

use async_trait::async_trait;
use web3::types::{Address, H256, U256};

use crate::orders::{OrderState, SignedOrder};

/// The cache-backed read surface handed to an [`OrderEvaluator`], so most of
/// its reads are served from [`crate::cache::LazyStateCache`] without
/// touching the chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheReader: Send + Sync {
    async fn get_balance(&self, token: Address, owner: Address) -> anyhow::Result<U256>;
    async fn get_allowance(&self, token: Address, owner: Address) -> anyhow::Result<U256>;
    async fn get_filled(&self, order_hash: H256) -> anyhow::Result<U256>;
    async fn get_cancelled(&self, order_hash: H256) -> anyhow::Result<U256>;
    async fn zrx_token_address(&self) -> anyhow::Result<Address>;
}

/// Evaluates a single order's current [`OrderState`] against a state
/// snapshot observed through a [`CacheReader`].
///
/// Pure with respect to that snapshot: given the same cache contents, two
/// calls for the same order return the same result. Signature verification,
/// order-hash computation and schema validation are not this trait's
/// concern — those are handled before an order ever reaches the watcher's
/// watched set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        order: &SignedOrder,
        cache: &(dyn CacheReader + Sync),
    ) -> anyhow::Result<OrderState>;
}
