//! `StateDiffEmitter` re-evaluates a batch of candidate orders and
//! delivers only the ones whose `OrderState` actually changed.

use std::collections::HashMap;

use web3::types::H256;

use crate::{
    cache::LazyStateCache,
    evaluator::OrderEvaluator,
    orders::{OrderState, SignedOrder},
    watcher::{SubscriptionSlot, WatcherError},
};

pub(crate) struct StateDiffEmitter;

impl StateDiffEmitter {
    /// Walks `order_hashes` in order, stopping early the moment no
    /// subscriber is attached (a concurrent `unsubscribe` may have run
    /// between two hashes, or from inside the callback for the previous
    /// one).
    pub async fn emit(
        order_hashes: &[H256],
        watched: &HashMap<H256, SignedOrder>,
        memo: &mut HashMap<H256, OrderState>,
        cache: &LazyStateCache,
        evaluator: &dyn OrderEvaluator,
        subscription: &SubscriptionSlot,
    ) {
        for &hash in order_hashes {
            let Some(callback) = subscription.callback() else {
                return;
            };
            let Some(order) = watched.get(&hash) else {
                // Removed mid-batch; nothing to re-evaluate.
                continue;
            };
            let state = match evaluator.evaluate(order, cache).await {
                Ok(state) => state,
                Err(error) => {
                    subscription.fail(WatcherError::Evaluation(error));
                    return;
                }
            };
            if memo.get(&hash) == Some(&state) {
                continue;
            }
            memo.insert(hash, state);
            callback(Ok(state));
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use web3::types::U256;

    use super::*;
    use crate::{
        chain::{MockChainClient, StateLayer},
        evaluator::CacheReader,
        orders::{test::example_order, InvalidReason, Signature},
    };

    fn cache() -> LazyStateCache {
        LazyStateCache::new(Arc::new(MockChainClient::new()), StateLayer::Latest)
    }

    fn signed_order() -> SignedOrder {
        SignedOrder {
            order:     example_order(),
            signature: Signature::default(),
        }
    }

    struct ConstantEvaluator(OrderState);

    #[async_trait]
    impl OrderEvaluator for ConstantEvaluator {
        async fn evaluate(&self, _: &SignedOrder, _: &(dyn CacheReader + Sync)) -> anyhow::Result<OrderState> {
            Ok(self.0)
        }
    }

    fn subscribed(calls: Arc<StdMutex<Vec<OrderState>>>) -> SubscriptionSlot {
        let slot = SubscriptionSlot::default();
        slot.install(
            Arc::new(move |result: Result<OrderState, WatcherError>| {
                calls.lock().unwrap().push(result.unwrap());
            }),
            Vec::new,
        )
        .unwrap();
        slot
    }

    #[tokio::test]
    async fn test_no_subscriber_emits_nothing() {
        let order = signed_order();
        let hash = order.hash();
        let watched = HashMap::from([(hash, order)]);
        let mut memo = HashMap::new();
        let evaluator = ConstantEvaluator(OrderState::Valid {
            order_hash: hash,
            remaining_fillable_taker_asset_amount: U256::from(1),
        });
        let slot = SubscriptionSlot::default();

        StateDiffEmitter::emit(&[hash], &watched, &mut memo, &cache(), &evaluator, &slot).await;
        assert!(memo.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_state_suppresses_emission() {
        let order = signed_order();
        let hash = order.hash();
        let watched = HashMap::from([(hash, order)]);
        let state = OrderState::Valid {
            order_hash: hash,
            remaining_fillable_taker_asset_amount: U256::from(1),
        };
        let mut memo = HashMap::from([(hash, state)]);
        let evaluator = ConstantEvaluator(state);
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let slot = subscribed(Arc::clone(&calls));

        StateDiffEmitter::emit(&[hash], &watched, &mut memo, &cache(), &evaluator, &slot).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changed_state_emits_and_updates_memo() {
        let order = signed_order();
        let hash = order.hash();
        let watched = HashMap::from([(hash, order)]);
        let mut memo = HashMap::from([(
            hash,
            OrderState::Valid {
                order_hash: hash,
                remaining_fillable_taker_asset_amount: U256::from(1),
            },
        )]);
        let new_state = OrderState::Invalid {
            order_hash: hash,
            reason:     InvalidReason::FullyFilled,
        };
        let evaluator = ConstantEvaluator(new_state);
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let slot = subscribed(Arc::clone(&calls));

        StateDiffEmitter::emit(&[hash], &watched, &mut memo, &cache(), &evaluator, &slot).await;
        assert_eq!(*calls.lock().unwrap(), vec![new_state]);
        assert_eq!(memo.get(&hash), Some(&new_state));
    }

    #[tokio::test]
    async fn test_removed_order_mid_batch_is_skipped_silently() {
        let watched: HashMap<H256, SignedOrder> = HashMap::new();
        let mut memo = HashMap::new();
        let evaluator = ConstantEvaluator(OrderState::Invalid {
            order_hash: H256::zero(),
            reason:     InvalidReason::Expired,
        });
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let slot = subscribed(Arc::clone(&calls));

        StateDiffEmitter::emit(&[H256::from_low_u64_be(1)], &watched, &mut memo, &cache(), &evaluator, &slot)
            .await;
        assert!(calls.lock().unwrap().is_empty());
    }
}
