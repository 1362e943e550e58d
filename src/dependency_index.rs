use std::collections::{HashMap, HashSet};

use web3::types::{Address, H256};

/// Maps `(owner, token) -> {order hashes}` so that an event touching a given
/// owner/token pair can be turned into the set of watched orders it might
/// affect.
///
/// Owned exclusively by [`crate::watcher::Watcher`]'s background actor.
/// Containers are pruned as soon as they become empty: a lookup never
/// returns an entry for a pair with zero associated orders, and internal
/// maps/sets are never left empty after a removal.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    index: HashMap<Address, HashMap<Address, HashSet<H256>>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, owner: Address, token: Address, order_hash: H256) {
        self.index
            .entry(owner)
            .or_default()
            .entry(token)
            .or_default()
            .insert(order_hash);
    }

    pub fn remove(&mut self, owner: Address, token: Address, order_hash: H256) {
        let Some(tokens) = self.index.get_mut(&owner) else {
            return;
        };
        if let Some(hashes) = tokens.get_mut(&token) {
            hashes.remove(&order_hash);
            if hashes.is_empty() {
                tokens.remove(&token);
            }
        }
        if tokens.is_empty() {
            self.index.remove(&owner);
        }
    }

    /// Order hashes registered for this `(owner, token)` pair. Empty if
    /// none.
    pub fn lookup(&self, owner: Address, token: Address) -> Vec<H256> {
        self.index
            .get(&owner)
            .and_then(|tokens| tokens.get(&token))
            .map(|hashes| hashes.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn hash(n: u64) -> H256 {
        H256::from_low_u64_be(n)
    }

    #[test]
    fn test_add_and_lookup() {
        let mut index = DependencyIndex::new();
        index.add(addr(1), addr(2), hash(100));
        index.add(addr(1), addr(2), hash(101));
        index.add(addr(1), addr(3), hash(102));

        let mut found = index.lookup(addr(1), addr(2));
        found.sort();
        assert_eq!(found, vec![hash(100), hash(101)]);
        assert_eq!(index.lookup(addr(1), addr(3)), vec![hash(102)]);
        assert_eq!(index.lookup(addr(9), addr(9)), Vec::<H256>::new());
    }

    #[test]
    fn test_remove_prunes_empty_containers() {
        let mut index = DependencyIndex::new();
        index.add(addr(1), addr(2), hash(100));
        index.remove(addr(1), addr(2), hash(100));
        assert!(index.lookup(addr(1), addr(2)).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut index = DependencyIndex::new();
        index.remove(addr(1), addr(2), hash(100));
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_one_of_two_orders_keeps_container() {
        let mut index = DependencyIndex::new();
        index.add(addr(1), addr(2), hash(100));
        index.add(addr(1), addr(2), hash(101));
        index.remove(addr(1), addr(2), hash(100));
        assert_eq!(index.lookup(addr(1), addr(2)), vec![hash(101)]);
    }
}
