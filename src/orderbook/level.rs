//! A single price level: a strict-FIFO queue of resting orders.

use crate::ids::OrderId;
use crate::num::{Price, Size};
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;

/// All resting orders at one price, in strict arrival order.
///
/// The queue is a skip list keyed by the market's arrival sequence, which
/// gives O(log n) insertion and removal while iteration yields exact
/// price-time priority. The open size is tracked alongside so depth queries
/// never walk the queue.
pub struct PriceLevel {
    /// The price shared by every order at this level.
    price: Price,
    /// Arrival sequence -> order id.
    queue: SkipMap<u64, OrderId>,
    /// Sum of the unfilled sizes of all queued orders.
    open_size: AtomicCell<u128>,
}

impl PriceLevel {
    /// Create an empty level at `price`.
    #[must_use]
    pub fn new(price: Price) -> Self {
        Self {
            price,
            queue: SkipMap::new(),
            open_size: AtomicCell::new(0),
        }
    }

    /// The level's price.
    #[must_use]
    #[inline]
    pub fn price(&self) -> Price {
        self.price
    }

    /// Append an order with `remaining` unfilled size.
    pub fn enqueue(&self, queue_seq: u64, order_id: OrderId, remaining: Size) {
        self.queue.insert(queue_seq, order_id);
        self.open_size.fetch_add(remaining);
    }

    /// Remove a queued order, giving back `remaining` unfilled size.
    ///
    /// Returns `false` when the sequence is not present (already matched
    /// away or cancelled).
    pub fn remove(&self, queue_seq: u64, remaining: Size) -> bool {
        if self.queue.remove(&queue_seq).is_some() {
            self.open_size.fetch_sub(remaining);
            true
        } else {
            false
        }
    }

    /// The oldest queued order, if any.
    #[must_use]
    pub fn front(&self) -> Option<(u64, OrderId)> {
        self.queue.front().map(|e| (*e.key(), *e.value()))
    }

    /// Queued order ids in FIFO order.
    #[must_use]
    pub fn iter_orders(&self) -> Vec<OrderId> {
        self.queue.iter().map(|e| *e.value()).collect()
    }

    /// Reduce the tracked open size after a fill against the head order.
    pub fn reduce_open(&self, quantity: Size) {
        self.open_size.fetch_sub(quantity);
    }

    /// Total unfilled size queued at this level.
    #[must_use]
    #[inline]
    pub fn open_size(&self) -> Size {
        self.open_size.load()
    }

    /// Number of orders queued at this level.
    #[must_use]
    #[inline]
    pub fn order_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether the level holds no orders.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::SIZE_SCALE;

    #[test]
    fn test_fifo_order_is_arrival_order() {
        let level = PriceLevel::new(1_000_000);
        level.enqueue(7, OrderId(70), SIZE_SCALE);
        level.enqueue(3, OrderId(30), SIZE_SCALE);
        level.enqueue(5, OrderId(50), SIZE_SCALE);
        // The lowest arrival sequence is the head regardless of insert order.
        assert_eq!(level.front(), Some((3, OrderId(30))));
        assert_eq!(
            level.iter_orders(),
            vec![OrderId(30), OrderId(50), OrderId(70)]
        );
        assert!(level.remove(3, SIZE_SCALE));
        assert_eq!(level.front(), Some((5, OrderId(50))));
        assert_eq!(level.order_count(), 2);
    }

    #[test]
    fn test_open_size_tracking() {
        let level = PriceLevel::new(1_000_000);
        level.enqueue(1, OrderId(1), 10 * SIZE_SCALE);
        level.enqueue(2, OrderId(2), 5 * SIZE_SCALE);
        assert_eq!(level.open_size(), 15 * SIZE_SCALE);
        level.reduce_open(4 * SIZE_SCALE);
        assert_eq!(level.open_size(), 11 * SIZE_SCALE);
        assert!(level.remove(1, 6 * SIZE_SCALE));
        assert_eq!(level.open_size(), 5 * SIZE_SCALE);
    }

    #[test]
    fn test_remove_unknown_seq_is_noop() {
        let level = PriceLevel::new(1_000_000);
        level.enqueue(1, OrderId(1), SIZE_SCALE);
        assert!(!level.remove(99, SIZE_SCALE));
        assert_eq!(level.open_size(), SIZE_SCALE);
    }
}
