use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};
use web3::types::{Address, H256, U256};

use crate::{
    chain::{ChainClient, StateLayer},
    evaluator::CacheReader,
};

static CACHE_ACCESS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "watcher_cache_access",
        "LazyStateCache reads by store and hit/miss outcome.",
        &["store", "outcome"]
    )
    .unwrap()
});

/// Read-through, write-invalidated cache over the four partial functions the
/// evaluator reads: balance, allowance, filled and cancelled amounts.
///
/// A cache hit never suspends — it's a synchronous map lookup behind a
/// lock — so evaluating an order against an already-warm cache touches the
/// chain zero times. All reads are pinned to the [`StateLayer`] fixed at
/// construction.
pub struct LazyStateCache {
    chain: Arc<dyn ChainClient>,
    state_layer: StateLayer,
    balances: Mutex<HashMap<(Address, Address), U256>>,
    allowances: Mutex<HashMap<(Address, Address), U256>>,
    filled: Mutex<HashMap<H256, U256>>,
    cancelled: Mutex<HashMap<H256, U256>>,
    zrx_token_address: Mutex<Option<Address>>,
}

impl LazyStateCache {
    pub fn new(chain: Arc<dyn ChainClient>, state_layer: StateLayer) -> Self {
        Self {
            chain,
            state_layer,
            balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            filled: Mutex::new(HashMap::new()),
            cancelled: Mutex::new(HashMap::new()),
            zrx_token_address: Mutex::new(None),
        }
    }

    pub async fn get_balance(&self, token: Address, owner: Address) -> anyhow::Result<U256> {
        if let Some(value) = self.balances.lock().unwrap().get(&(token, owner)) {
            CACHE_ACCESS.with_label_values(&["balance", "hit"]).inc();
            return Ok(*value);
        }
        CACHE_ACCESS.with_label_values(&["balance", "miss"]).inc();
        let value = self
            .chain
            .get_balance(token, owner, self.state_layer)
            .await?;
        self.balances.lock().unwrap().insert((token, owner), value);
        Ok(value)
    }

    pub async fn get_allowance(&self, token: Address, owner: Address) -> anyhow::Result<U256> {
        if let Some(value) = self.allowances.lock().unwrap().get(&(token, owner)) {
            CACHE_ACCESS.with_label_values(&["allowance", "hit"]).inc();
            return Ok(*value);
        }
        CACHE_ACCESS.with_label_values(&["allowance", "miss"]).inc();
        let value = self
            .chain
            .get_allowance(token, owner, self.state_layer)
            .await?;
        self.allowances
            .lock()
            .unwrap()
            .insert((token, owner), value);
        Ok(value)
    }

    pub async fn get_filled(&self, order_hash: H256) -> anyhow::Result<U256> {
        if let Some(value) = self.filled.lock().unwrap().get(&order_hash) {
            CACHE_ACCESS.with_label_values(&["filled", "hit"]).inc();
            return Ok(*value);
        }
        CACHE_ACCESS.with_label_values(&["filled", "miss"]).inc();
        let value = self
            .chain
            .get_filled(order_hash, self.state_layer)
            .await?;
        self.filled.lock().unwrap().insert(order_hash, value);
        Ok(value)
    }

    pub async fn get_cancelled(&self, order_hash: H256) -> anyhow::Result<U256> {
        if let Some(value) = self.cancelled.lock().unwrap().get(&order_hash) {
            CACHE_ACCESS.with_label_values(&["cancelled", "hit"]).inc();
            return Ok(*value);
        }
        CACHE_ACCESS.with_label_values(&["cancelled", "miss"]).inc();
        let value = self
            .chain
            .get_cancelled(order_hash, self.state_layer)
            .await?;
        self.cancelled.lock().unwrap().insert(order_hash, value);
        Ok(value)
    }

    /// Not part of the four invalidated stores — the ZRX fee token address
    /// never changes for the lifetime of a chain, so it's memoized
    /// separately and untouched by [`Self::delete_all`].
    pub async fn zrx_token_address(&self) -> anyhow::Result<Address> {
        if let Some(address) = *self.zrx_token_address.lock().unwrap() {
            return Ok(address);
        }
        let address = self.chain.get_zrx_token_address(self.state_layer).await?;
        *self.zrx_token_address.lock().unwrap() = Some(address);
        Ok(address)
    }

    pub fn delete_balance(&self, token: Address, owner: Address) {
        self.balances.lock().unwrap().remove(&(token, owner));
    }

    pub fn delete_allowance(&self, token: Address, owner: Address) {
        self.allowances.lock().unwrap().remove(&(token, owner));
    }

    pub fn delete_filled(&self, order_hash: H256) {
        self.filled.lock().unwrap().remove(&order_hash);
    }

    pub fn delete_cancelled(&self, order_hash: H256) {
        self.cancelled.lock().unwrap().remove(&order_hash);
    }

    /// Clears all four stores. Called on unsubscribe; cheap compared to the
    /// network round trips it saves re-warming on the next subscribe.
    pub fn delete_all(&self) {
        self.balances.lock().unwrap().clear();
        self.allowances.lock().unwrap().clear();
        self.filled.lock().unwrap().clear();
        self.cancelled.lock().unwrap().clear();
    }
}

#[async_trait]
impl CacheReader for LazyStateCache {
    async fn get_balance(&self, token: Address, owner: Address) -> anyhow::Result<U256> {
        Self::get_balance(self, token, owner).await
    }

    async fn get_allowance(&self, token: Address, owner: Address) -> anyhow::Result<U256> {
        Self::get_allowance(self, token, owner).await
    }

    async fn get_filled(&self, order_hash: H256) -> anyhow::Result<U256> {
        Self::get_filled(self, order_hash).await
    }

    async fn get_cancelled(&self, order_hash: H256) -> anyhow::Result<U256> {
        Self::get_cancelled(self, order_hash).await
    }

    async fn zrx_token_address(&self) -> anyhow::Result<Address> {
        Self::zrx_token_address(self).await
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::chain::MockChainClient;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn test_hit_does_not_call_chain_again() {
        let mut chain = MockChainClient::new();
        chain
            .expect_get_balance()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(U256::from(7)) }));
        let cache = LazyStateCache::new(Arc::new(chain), StateLayer::Latest);

        assert_eq!(cache.get_balance(addr(1), addr(2)).await.unwrap(), U256::from(7));
        assert_eq!(cache.get_balance(addr(1), addr(2)).await.unwrap(), U256::from(7));
    }

    #[tokio::test]
    async fn test_delete_forces_refetch() {
        let mut chain = MockChainClient::new();
        chain
            .expect_get_balance()
            .times(2)
            .returning(|_, _, _| Box::pin(async { Ok(U256::from(7)) }));
        let cache = LazyStateCache::new(Arc::new(chain), StateLayer::Latest);

        cache.get_balance(addr(1), addr(2)).await.unwrap();
        cache.delete_balance(addr(1), addr(2));
        cache.get_balance(addr(1), addr(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_all_clears_every_store() {
        let mut chain = MockChainClient::new();
        chain
            .expect_get_balance()
            .returning(|_, _, _| Box::pin(async { Ok(U256::from(1)) }));
        chain
            .expect_get_allowance()
            .returning(|_, _, _| Box::pin(async { Ok(U256::from(1)) }));
        chain
            .expect_get_filled()
            .returning(|_, _| Box::pin(async { Ok(U256::from(1)) }));
        chain
            .expect_get_cancelled()
            .returning(|_, _| Box::pin(async { Ok(U256::from(1)) }));
        let cache = LazyStateCache::new(Arc::new(chain), StateLayer::Latest);

        cache.get_balance(addr(1), addr(2)).await.unwrap();
        cache.get_allowance(addr(1), addr(2)).await.unwrap();
        cache.get_filled(H256::zero()).await.unwrap();
        cache.get_cancelled(H256::zero()).await.unwrap();
        cache.delete_all();

        assert!(cache.balances.lock().unwrap().is_empty());
        assert!(cache.allowances.lock().unwrap().is_empty());
        assert!(cache.filled.lock().unwrap().is_empty());
        assert!(cache.cancelled.lock().unwrap().is_empty());
    }
}
