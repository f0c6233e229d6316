//! Core order book: price levels, order records, and best-price tracking.

use super::level::PriceLevel;
use super::order::{Order, OrderStatus, Side};
use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Price, Quote, Size, notional};
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;

/// Result of walking opposite liquidity without mutating the book.
///
/// Used to price hypothetical market orders for margin checks and slippage
/// analysis. Prices in `fills` appear in sweep order.
#[derive(Debug, Clone, Default)]
pub struct SweepPreview {
    /// `(price, quantity)` pairs the sweep would consume against other
    /// traders' orders, in sweep order.
    pub fills: Vec<(Price, Size)>,
    /// Total quantity filled against other traders' orders.
    pub filled: Size,
    /// Total quote cost of `fills`, summing per-fill notionals with the
    /// same truncation real fills use.
    pub cost: Quote,
    /// Quantity the sweep would consume from the taker's own resting
    /// orders. Such fills net to nothing in the vault.
    pub self_filled: Size,
}

/// The order book for one market.
///
/// Bid and ask levels live in skip lists keyed by price, so the best bid is
/// the last bid entry and the best ask the first ask entry with no sorting
/// pass. Order records live in a concurrent map and stay retrievable after
/// they leave the book.
pub struct OrderBook {
    /// The market this book belongs to.
    market: MarketId,
    /// Bid side levels keyed by price.
    bids: SkipMap<Price, Arc<PriceLevel>>,
    /// Ask side levels keyed by price.
    asks: SkipMap<Price, Arc<PriceLevel>>,
    /// Every order ever placed on this book, keyed by id.
    orders: DashMap<OrderId, Order>,
    /// Open-order ids per trader.
    user_orders: DashMap<TraderId, Vec<OrderId>>,
    /// Monotonic arrival sequence; the FIFO key within a level.
    arrival_seq: AtomicU64,
    /// Price of the most recent trade.
    last_trade_price: AtomicCell<u64>,
    /// Whether any trade has happened yet.
    has_traded: AtomicBool,
}

impl OrderBook {
    /// Create an empty book for `market`.
    #[must_use]
    pub fn new(market: MarketId) -> Self {
        Self {
            market,
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            orders: DashMap::new(),
            user_orders: DashMap::new(),
            arrival_seq: AtomicU64::new(1),
            last_trade_price: AtomicCell::new(0),
            has_traded: AtomicBool::new(false),
        }
    }

    /// The market this book serves.
    #[must_use]
    pub fn market(&self) -> MarketId {
        self.market
    }

    /// Next arrival sequence number. Strictly increasing; assigned to every
    /// order at placement so FIFO ties break by placement order.
    pub(crate) fn next_arrival_seq(&self) -> u64 {
        self.arrival_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Store a new order record. The record is kept even after the order
    /// leaves the book.
    pub(crate) fn store(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    /// Attach a stored order to its price level and the owner index.
    ///
    /// The order must be a limit order with remaining size; its record must
    /// already be stored.
    pub(crate) fn insert_resting(&self, order: &Order) {
        let price = order.price.expect("resting orders carry a price");
        let book_side = match order.side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let level = book_side
            .get_or_insert(price, Arc::new(PriceLevel::new(price)))
            .value()
            .clone();
        level.enqueue(order.queue_seq, order.id, order.remaining());
        self.user_orders
            .entry(order.trader)
            .or_default()
            .push(order.id);
        trace!(
            "book {}: rest {} {} {} @ {}",
            self.market,
            order.id,
            order.side,
            order.remaining(),
            price
        );
    }

    /// Remove a live resting order from the book and mark it cancelled.
    ///
    /// Returns the updated record, or `None` when the id is unknown or the
    /// order is no longer live.
    pub(crate) fn remove_resting(&self, order_id: OrderId) -> Option<Order> {
        let mut entry = self.orders.get_mut(&order_id)?;
        if !entry.status.is_live() {
            return None;
        }
        let remaining = entry.remaining();
        let price = entry.price?;
        let (side, seq, trader) = (entry.side, entry.queue_seq, entry.trader);
        entry.status = OrderStatus::Cancelled;
        let snapshot = entry.clone();
        drop(entry);

        let book_side = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        if let Some(level_entry) = book_side.get(&price) {
            let level = level_entry.value();
            level.remove(seq, remaining);
            if level.is_empty() {
                book_side.remove(&price);
            }
        }
        self.untrack_user_order(trader, order_id);
        Some(snapshot)
    }

    /// Apply a fill of `quantity` to a resting (maker) order, maintaining
    /// level totals, the level index, and the owner index.
    ///
    /// Returns the updated record.
    pub(crate) fn fill_resting(&self, order_id: OrderId, quantity: Size) -> Option<Order> {
        let mut entry = self.orders.get_mut(&order_id)?;
        entry.apply_fill(quantity);
        let done = entry.status == OrderStatus::Filled;
        let price = entry.price?;
        let (side, seq, trader) = (entry.side, entry.queue_seq, entry.trader);
        let snapshot = entry.clone();
        drop(entry);

        let book_side = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        if let Some(level_entry) = book_side.get(&price) {
            let level = level_entry.value();
            level.reduce_open(quantity);
            if done {
                level.remove(seq, 0);
            }
            if level.is_empty() {
                book_side.remove(&price);
            }
        }
        if done {
            self.untrack_user_order(trader, order_id);
        }
        Some(snapshot)
    }

    /// Apply a fill of `quantity` to the incoming (taker) order record.
    pub(crate) fn fill_taker(&self, order_id: OrderId, quantity: Size) {
        if let Some(mut entry) = self.orders.get_mut(&order_id) {
            entry.apply_fill(quantity);
        }
    }

    /// Mark the unfilled remainder of an order as discarded (market-order
    /// remainders that hit the slippage cap or exhausted the book).
    pub(crate) fn discard_remainder(&self, order_id: OrderId) {
        if let Some(mut entry) = self.orders.get_mut(&order_id) {
            if entry.remaining() > 0 {
                entry.status = OrderStatus::Cancelled;
            }
        }
    }

    /// The best level on the side opposite to `taker_side`.
    pub(crate) fn best_opposite_level(&self, taker_side: Side) -> Option<Arc<PriceLevel>> {
        match taker_side {
            Side::Buy => self.asks.front().map(|e| e.value().clone()),
            Side::Sell => self.bids.back().map(|e| e.value().clone()),
        }
    }

    /// Drop a level from the index if it holds no orders.
    pub(crate) fn drop_level_if_empty(&self, side: Side, price: Price) {
        let book_side = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        if let Some(entry) = book_side.get(&price) {
            if entry.value().is_empty() {
                book_side.remove(&price);
            }
        }
    }

    /// Best bid price, if any bids rest.
    ///
    /// O(1): the skip list keeps prices sorted, the highest bid is the last
    /// entry.
    #[must_use]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.back().map(|e| *e.key())
    }

    /// Best ask price, if any asks rest.
    ///
    /// O(1): the lowest ask is the first entry.
    #[must_use]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.front().map(|e| *e.key())
    }

    /// Mid price, when both sides are populated.
    #[must_use]
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(((bid as u128 + ask as u128) / 2) as Price),
            _ => None,
        }
    }

    /// Price of the last trade, if any trade has printed.
    #[must_use]
    pub fn last_trade_price(&self) -> Option<Price> {
        if self.has_traded.load(Ordering::Relaxed) {
            Some(self.last_trade_price.load())
        } else {
            None
        }
    }

    /// Record a trade print.
    pub(crate) fn record_trade_price(&self, price: Price) {
        self.last_trade_price.store(price);
        self.has_traded.store(true, Ordering::Relaxed);
    }

    /// Snapshot of an order record by id.
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|e| e.clone())
    }

    /// Ids of a trader's open orders on this book.
    #[must_use]
    pub fn user_orders(&self, trader: TraderId) -> Vec<OrderId> {
        self.user_orders
            .get(&trader)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn untrack_user_order(&self, trader: TraderId, order_id: OrderId) {
        if let Some(mut entry) = self.user_orders.get_mut(&trader) {
            entry.retain(|id| *id != order_id);
            if entry.is_empty() {
                drop(entry);
                self.user_orders.remove(&trader);
            }
        }
    }

    /// Aggregate `(price, open_size)` for up to `depth` levels per side,
    /// best first.
    #[must_use]
    pub fn depth_levels(&self, depth: usize) -> (Vec<(Price, Size)>, Vec<(Price, Size)>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|e| (*e.key(), e.value().open_size()))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(depth)
            .map(|e| (*e.key(), e.value().open_size()))
            .collect();
        (bids, asks)
    }

    /// Walk opposite liquidity for a hypothetical order of `quantity` on
    /// `taker_side` without touching the book.
    ///
    /// This convenience entry point is trader-agnostic and delegates to
    /// [`Self::sweep_preview_for`] with no taker identity. When the placing
    /// trader is known, use that method instead so fills against the
    /// trader's own resting orders are netted out.
    #[must_use]
    pub fn sweep_preview(
        &self,
        taker_side: Side,
        quantity: Size,
        limit: Option<Price>,
        band: Option<(Price, Price)>,
    ) -> SweepPreview {
        self.sweep_preview_for(None, taker_side, quantity, limit, band)
    }

    /// Walk opposite liquidity for a hypothetical order of `quantity` on
    /// `taker_side`, attributing fills per resting order, without touching
    /// the book.
    ///
    /// `limit` bounds acceptable prices the way a limit order would; `band`
    /// additionally bounds them the way a slippage cap would (inclusive min
    /// and max). The walk stops at the first level outside either bound.
    /// Orders within a level are consumed in FIFO order, exactly as a real
    /// sweep would fill them. Orders owned by `taker` consume sweep
    /// quantity but count toward `self_filled` instead of `fills`: a
    /// self-trade nets to nothing in the vault and needs no margin.
    #[must_use]
    pub fn sweep_preview_for(
        &self,
        taker: Option<TraderId>,
        taker_side: Side,
        quantity: Size,
        limit: Option<Price>,
        band: Option<(Price, Price)>,
    ) -> SweepPreview {
        let mut preview = SweepPreview::default();
        if quantity == 0 {
            return preview;
        }
        let levels = match taker_side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };
        // Iterate in price priority: ascending asks for buys, descending
        // bids for sells. The skip list is already sorted.
        let iter: Box<dyn Iterator<Item = _>> = match taker_side {
            Side::Buy => Box::new(levels.iter()),
            Side::Sell => Box::new(levels.iter().rev()),
        };
        let mut remaining = quantity;
        'levels: for entry in iter {
            if remaining == 0 {
                break;
            }
            let price = *entry.key();
            if let Some(limit) = limit {
                match taker_side {
                    Side::Buy if price > limit => break,
                    Side::Sell if price < limit => break,
                    _ => {}
                }
            }
            if let Some((min, max)) = band {
                if price < min || price > max {
                    break;
                }
            }
            for order_id in entry.value().iter_orders() {
                if remaining == 0 {
                    break 'levels;
                }
                let Some(order) = self.order(order_id) else {
                    continue;
                };
                let open = order.remaining();
                if open == 0 {
                    continue;
                }
                let qty = remaining.min(open);
                remaining -= qty;
                if taker == Some(order.trader) {
                    preview.self_filled += qty;
                    continue;
                }
                preview.fills.push((price, qty));
                preview.filled += qty;
                preview.cost += notional(price, qty);
            }
        }
        preview
    }

    /// Total number of live price levels on both sides.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}
