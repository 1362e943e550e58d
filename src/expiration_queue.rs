use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    sync::Mutex,
};

use web3::types::H256;

/// Min-heap of order hashes by expiration time, polled cooperatively by
/// [`crate::watcher::Watcher`]'s actor loop rather than driven by individual
/// per-order timers.
///
/// Re-adding an already-queued hash replaces its expiration (the heap entry
/// for the old expiration becomes stale and is discarded lazily the next
/// time it's popped), so an order's expiration can be updated without a
/// prior remove.
#[derive(Default)]
pub struct ExpirationQueue {
    heap: Mutex<BinaryHeap<Reverse<(u64, H256)>>>,
    current: Mutex<HashMap<H256, u64>>,
}

impl ExpirationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, order_hash: H256, expiration_ms: u64) {
        self.current.lock().unwrap().insert(order_hash, expiration_ms);
        self.heap
            .lock()
            .unwrap()
            .push(Reverse((expiration_ms, order_hash)));
    }

    pub fn remove(&self, order_hash: &H256) {
        self.current.lock().unwrap().remove(order_hash);
    }

    /// Pops every entry whose expiration has passed `now_ms + safety_margin_ms`,
    /// in chronological order. Entries superseded by a later `add` or
    /// dropped by `remove` are silently discarded rather than fired.
    pub fn pop_due(&self, now_ms: u64, safety_margin_ms: u64) -> Vec<H256> {
        let threshold = now_ms.saturating_add(safety_margin_ms);
        let mut due = Vec::new();
        let mut heap = self.heap.lock().unwrap();
        let mut current = self.current.lock().unwrap();
        while let Some(&Reverse((expiration_ms, order_hash))) = heap.peek() {
            if expiration_ms > threshold {
                break;
            }
            heap.pop();
            if current.get(&order_hash) == Some(&expiration_ms) {
                current.remove(&order_hash);
                due.push(order_hash);
            }
        }
        due
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.current.lock().unwrap().len()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn hash(n: u64) -> H256 {
        H256::from_low_u64_be(n)
    }

    #[test]
    fn test_pop_due_in_chronological_order() {
        let queue = ExpirationQueue::new();
        queue.add(hash(1), 300);
        queue.add(hash(2), 100);
        queue.add(hash(3), 200);
        assert_eq!(queue.pop_due(1000, 0), vec![hash(2), hash(3), hash(1)]);
    }

    #[test]
    fn test_pop_due_respects_safety_margin() {
        let queue = ExpirationQueue::new();
        queue.add(hash(1), 1000);
        assert!(queue.pop_due(900, 50).is_empty());
        assert_eq!(queue.pop_due(900, 100), vec![hash(1)]);
    }

    #[test]
    fn test_remove_suppresses_firing() {
        let queue = ExpirationQueue::new();
        queue.add(hash(1), 100);
        queue.remove(&hash(1));
        assert!(queue.pop_due(1000, 0).is_empty());
    }

    #[test]
    fn test_readd_replaces_expiration() {
        let queue = ExpirationQueue::new();
        queue.add(hash(1), 100);
        queue.add(hash(1), 500);
        assert!(queue.pop_due(200, 0).is_empty());
        assert_eq!(queue.pop_due(500, 0), vec![hash(1)]);
        assert_eq!(queue.len(), 0);
    }
}
