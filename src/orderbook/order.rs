//! Order record and its lifecycle states.

use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an order: buy (bid) or sell (ask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side.
    Buy,
    /// Sell side.
    Sell,
}

impl Side {
    /// The opposite side.
    #[must_use]
    #[inline]
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Sign of the position delta a fill on this side produces for the
    /// order's owner: +1 for buys, -1 for sells.
    #[must_use]
    #[inline]
    pub fn sign(&self) -> i128 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Kind of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Rests in the book at a limit price when not immediately matched.
    Limit,
    /// Sweeps opposite liquidity and never rests; any remainder beyond the
    /// slippage cap is discarded.
    Market,
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Resting in the book, no fills yet.
    Open,
    /// Resting in the book with at least one fill.
    Partial,
    /// Fully filled and removed from the book.
    Filled,
    /// Cancelled (or a market-order remainder discarded) and removed from
    /// the book.
    Cancelled,
}

impl OrderStatus {
    /// Whether the order can still receive fills.
    #[must_use]
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Partial)
    }
}

/// A single order record.
///
/// Created at placement, updated on every match, removed from the book when
/// filled or cancelled. The record itself stays retrievable by id for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Venue-wide monotonic identifier.
    pub id: OrderId,
    /// Owner of the order.
    pub trader: TraderId,
    /// Market the order targets.
    pub market: MarketId,
    /// Buy or sell.
    pub side: Side,
    /// Limit or market.
    pub kind: OrderKind,
    /// Limit price; `None` for market orders.
    pub price: Option<Price>,
    /// Originally requested size.
    pub size: Size,
    /// Cumulative filled size.
    pub filled: Size,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Whether the order trades on margin. All futures orders set this.
    pub is_margin: bool,
    /// Per-unit price at which the vault reserved margin for this order,
    /// when a reservation exists.
    pub reserve_price: Option<Price>,
    /// Placement wall-clock time in milliseconds.
    pub placed_at: u64,
    /// Arrival sequence inside the market, the FIFO key at its price level.
    pub queue_seq: u64,
}

impl Order {
    /// Size still open to be filled.
    #[must_use]
    #[inline]
    pub fn remaining(&self) -> Size {
        self.size - self.filled
    }

    /// Record a fill of `quantity` and transition the status accordingly.
    pub(crate) fn apply_fill(&mut self, quantity: Size) {
        debug_assert!(quantity <= self.remaining());
        self.filled += quantity;
        self.status = if self.filled == self.size {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::SIZE_SCALE;

    fn order(size: Size) -> Order {
        Order {
            id: OrderId(1),
            trader: TraderId::from_name("t"),
            market: MarketId::from_name("m"),
            side: Side::Buy,
            kind: OrderKind::Limit,
            price: Some(1_000_000),
            size,
            filled: 0,
            status: OrderStatus::Open,
            is_margin: true,
            reserve_price: Some(1_000_000),
            placed_at: 0,
            queue_seq: 1,
        }
    }

    #[test]
    fn test_side_opposite_and_sign() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
    }

    #[test]
    fn test_fill_transitions() {
        let mut o = order(10 * SIZE_SCALE);
        o.apply_fill(4 * SIZE_SCALE);
        assert_eq!(o.status, OrderStatus::Partial);
        assert_eq!(o.remaining(), 6 * SIZE_SCALE);
        o.apply_fill(6 * SIZE_SCALE);
        assert_eq!(o.status, OrderStatus::Filled);
        assert_eq!(o.remaining(), 0);
        assert!(!o.status.is_live());
    }
}
