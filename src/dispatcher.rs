use std::collections::HashMap;

use tracing::trace;
use web3::types::H256;

use crate::{
    cache::LazyStateCache,
    dependency_index::DependencyIndex,
    events::{DecodedLog, EventKind},
    orders::SignedOrder,
};

/// Turns a decoded log into the cache invalidations it implies and the
/// candidate order hashes that may need re-evaluating.
///
/// Stateless: it only ever touches the [`LazyStateCache`] and
/// [`DependencyIndex`] it's handed, never its own state.
pub(crate) struct EventDispatcher;

impl EventDispatcher {
    pub fn dispatch(
        cache: &LazyStateCache,
        dependencies: &DependencyIndex,
        watched: &HashMap<H256, SignedOrder>,
        log: DecodedLog,
    ) -> Vec<H256> {
        let DecodedLog {
            contract_address,
            kind,
        } = log;
        match kind {
            EventKind::Approval { owner, .. } => {
                cache.delete_allowance(contract_address, owner);
                dependencies.lookup(owner, contract_address)
            }
            EventKind::Transfer { from, to, .. } => {
                cache.delete_balance(contract_address, from);
                cache.delete_balance(contract_address, to);
                // Only `from` fans out to dependent orders: a watched
                // order's maker is only ever impacted by its own balance
                // dropping, not by someone else's balance (`to`) rising.
                dependencies.lookup(from, contract_address)
            }
            EventKind::Deposit { owner, .. } | EventKind::Withdrawal { owner, .. } => {
                cache.delete_balance(contract_address, owner);
                dependencies.lookup(owner, contract_address)
            }
            EventKind::LogFill { order_hash } => {
                cache.delete_filled(order_hash);
                watched_candidate(watched, order_hash)
            }
            EventKind::LogCancel { order_hash } => {
                cache.delete_cancelled(order_hash);
                watched_candidate(watched, order_hash)
            }
            EventKind::LogError => {
                trace!("ignoring LogError event");
                Vec::new()
            }
            EventKind::Unknown => Vec::new(),
        }
    }
}

fn watched_candidate(watched: &HashMap<H256, SignedOrder>, order_hash: H256) -> Vec<H256> {
    if watched.contains_key(&order_hash) {
        vec![order_hash]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use web3::types::{Address, U256};

    use super::*;
    use crate::chain::{MockChainClient, StateLayer};
    use std::sync::Arc;

    fn cache() -> LazyStateCache {
        LazyStateCache::new(Arc::new(MockChainClient::new()), StateLayer::Latest)
    }

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_approval_invalidates_and_looks_up_owner() {
        let c = cache();
        let mut deps = DependencyIndex::new();
        deps.add(addr(1), addr(2), H256::from_low_u64_be(9));
        let log = DecodedLog {
            contract_address: addr(2),
            kind: EventKind::Approval {
                owner: addr(1),
                spender: addr(3),
                value: U256::from(1),
            },
        };
        let candidates = EventDispatcher::dispatch(&c, &deps, &HashMap::new(), log);
        assert_eq!(candidates, vec![H256::from_low_u64_be(9)]);
    }

    #[test]
    fn test_transfer_only_fans_out_on_from() {
        let c = cache();
        let mut deps = DependencyIndex::new();
        deps.add(addr(1), addr(2), H256::from_low_u64_be(9));
        deps.add(addr(5), addr(2), H256::from_low_u64_be(10));
        let log = DecodedLog {
            contract_address: addr(2),
            kind: EventKind::Transfer {
                from: addr(1),
                to: addr(5),
                value: U256::from(1),
            },
        };
        let candidates = EventDispatcher::dispatch(&c, &deps, &HashMap::new(), log);
        assert_eq!(candidates, vec![H256::from_low_u64_be(9)]);
    }

    #[test]
    fn test_log_fill_only_candidate_if_watched() {
        let c = cache();
        let deps = DependencyIndex::new();
        let hash = H256::from_low_u64_be(42);
        let log = DecodedLog {
            contract_address: addr(9),
            kind: EventKind::LogFill { order_hash: hash },
        };
        assert!(EventDispatcher::dispatch(&c, &deps, &HashMap::new(), log).is_empty());
    }

    #[test]
    fn test_log_error_yields_no_candidates() {
        let c = cache();
        let deps = DependencyIndex::new();
        let log = DecodedLog {
            contract_address: addr(9),
            kind: EventKind::LogError,
        };
        assert!(EventDispatcher::dispatch(&c, &deps, &HashMap::new(), log).is_empty());
    }
}
