//! Pending transactions and the FIFO queue that holds them
//!
//! Deliberate simplification versus a real Bitcoin mempool: no fee rates and
//! no prioritization, transactions are confirmed strictly in arrival order.

use std::collections::VecDeque;

/// A transaction waiting to be recorded in a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Txn {
    /// Simulated creation time in seconds
    pub created_at: f64,

    /// Size in bytes; static for now, carried per-txn to support dynamic
    /// sizing in the future
    pub size_bytes: i64,

    /// Index of the spike that was in effect when this txn was created.
    /// Tagging happens at creation time, not confirmation time: a txn born
    /// in a spike keeps its tag even when it confirms in the next regime,
    /// because spike-induced delay is what is being measured.
    pub spike_index: usize,
}

impl Txn {
    pub fn new(created_at: f64, size_bytes: i64, spike_index: usize) -> Self {
        Self {
            created_at,
            size_bytes,
            spike_index,
        }
    }
}

/// FIFO queue of pending transactions
#[derive(Debug, Default)]
pub struct TxnQueue {
    txns: VecDeque<Txn>,
}

impl TxnQueue {
    pub fn new() -> Self {
        Self {
            txns: VecDeque::new(),
        }
    }

    /// Append a txn at the tail, O(1)
    pub fn push(&mut self, txn: Txn) {
        self.txns.push_back(txn);
    }

    /// Remove and return the head, O(1); `None` when empty
    pub fn pop(&mut self) -> Option<Txn> {
        self.txns.pop_front()
    }

    /// Peek at the head without removing it
    pub fn front(&self) -> Option<&Txn> {
        self.txns.front()
    }

    /// Discard all pending txns; used between repetitions, where unconfirmed
    /// txns fall outside the simulated horizon and are never logged
    pub fn drain(&mut self) {
        self.txns.clear();
    }

    pub fn len(&self) -> usize {
        self.txns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_on_empty_returns_none() {
        let mut queue = TxnQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_fifo_order_preserved() {
        let mut queue = TxnQueue::new();
        for i in 0..10 {
            queue.push(Txn::new(i as f64, 250, 0));
        }

        for i in 0..10 {
            let txn = queue.pop().expect("queue should not be empty");
            assert_eq!(txn.created_at, i as f64);
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_interleaved_push_pop() {
        let mut queue = TxnQueue::new();

        queue.push(Txn::new(1.0, 250, 0));
        queue.push(Txn::new(2.0, 250, 0));
        assert_eq!(queue.pop().unwrap().created_at, 1.0);

        queue.push(Txn::new(3.0, 250, 1));
        assert_eq!(queue.pop().unwrap().created_at, 2.0);
        assert_eq!(queue.pop().unwrap().created_at, 3.0);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_front_does_not_remove() {
        let mut queue = TxnQueue::new();
        queue.push(Txn::new(5.0, 250, 2));

        assert_eq!(queue.front().unwrap().created_at, 5.0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().spike_index, 2);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = TxnQueue::new();
        for i in 0..100 {
            queue.push(Txn::new(i as f64, 250, 0));
        }
        assert_eq!(queue.len(), 100);

        queue.drain();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
