//! Per-market state: configuration, book, mark price, active traders.

use super::fees::FeeSchedule;
use crate::ids::{MarketId, TraderId};
use crate::num::Price;
use crate::orderbook::OrderBook;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static configuration of a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Human-readable symbol, e.g. "BTC-PERP".
    pub symbol: String,
    /// Mark price used before the first quote or trade exists.
    pub seed_mark: Price,
    /// Fee schedule for fills; `None` charges nothing.
    pub fees: Option<FeeSchedule>,
    /// Liquidation penalty in basis points of the liquidated margin.
    pub liquidation_penalty_bps: u32,
}

impl MarketConfig {
    /// A config with the given symbol and seed mark, no fees, and the
    /// standard 5 % liquidation penalty.
    #[must_use]
    pub fn new(symbol: &str, seed_mark: Price) -> Self {
        Self {
            symbol: symbol.to_string(),
            seed_mark,
            fees: None,
            liquidation_penalty_bps: 500,
        }
    }

    /// Attach a fee schedule.
    #[must_use]
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = Some(fees);
        self
    }
}

/// Live state of one market.
///
/// Every public venue operation on the market runs to completion under
/// `op_lock` before the next begins; the structures below are only mutated
/// inside that boundary.
pub struct MarketState {
    /// The market's id.
    pub(crate) id: MarketId,
    /// Static configuration.
    pub(crate) config: MarketConfig,
    /// The market's order book.
    pub(crate) book: OrderBook,
    /// Latest derived mark price.
    pub(crate) mark: AtomicCell<u64>,
    /// Traders with a live position in this market.
    pub(crate) active_traders: DashMap<TraderId, ()>,
    /// Recursion guard: set while a liquidation scan drives synthetic
    /// orders, so their fills cannot start a nested scan.
    pub(crate) liquidating: AtomicBool,
    /// Serialization boundary for public operations.
    pub(crate) op_lock: Mutex<()>,
}

impl MarketState {
    /// Create market state with an empty book and the seed mark.
    #[must_use]
    pub fn new(id: MarketId, config: MarketConfig) -> Self {
        let mark = AtomicCell::new(config.seed_mark);
        Self {
            id,
            config,
            book: OrderBook::new(id),
            mark,
            active_traders: DashMap::new(),
            liquidating: AtomicBool::new(false),
            op_lock: Mutex::new(()),
        }
    }

    /// Current mark price.
    #[must_use]
    pub fn mark(&self) -> Price {
        self.mark.load()
    }

    /// Recompute the mark from the book: book mid when both sides are
    /// populated, else the last trade price, else the configured seed.
    /// Returns the new mark.
    pub(crate) fn refresh_mark(&self) -> Price {
        let mark = self
            .book
            .mid_price()
            .or_else(|| self.book.last_trade_price())
            .unwrap_or(self.config.seed_mark);
        self.mark.store(mark);
        mark
    }

    /// Override the mark directly (replay and administrative paths).
    pub(crate) fn override_mark(&self, mark: Price) {
        self.mark.store(mark);
    }

    /// Mark a trader as holding a position here.
    pub(crate) fn activate_trader(&self, trader: TraderId) {
        self.active_traders.insert(trader, ());
    }

    /// Remove a trader whose position closed.
    pub(crate) fn deactivate_trader(&self, trader: TraderId) {
        self.active_traders.remove(&trader);
    }

    /// Snapshot of the active-trader set.
    #[must_use]
    pub(crate) fn active_traders(&self) -> Vec<TraderId> {
        self.active_traders.iter().map(|e| *e.key()).collect()
    }

    /// Try to set the recursion guard. Returns `false` when a liquidation
    /// scan is already running on this market.
    pub(crate) fn enter_liquidation(&self) -> bool {
        self.liquidating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the recursion guard.
    pub(crate) fn exit_liquidation(&self) {
        self.liquidating.store(false, Ordering::Release);
    }
}
