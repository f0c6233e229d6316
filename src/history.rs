//! Append-only trade and liquidation history.
//!
//! Records are indexed per trader with contiguous, strictly increasing
//! indices, plus a bounded per-market ring of recent trades and global
//! counters for analytics. Emission happens after a fill commits and before
//! any liquidation side effects of that fill, so a record can never be lost
//! to a later stage failing.

use crate::ids::{MarketId, TradeId, TraderId};
use crate::num::{Price, Quote, SignedQuote, Size, notional};
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// How many recent trades each market retains for the quick feed.
const RECENT_TRADES_CAP: usize = 256;

/// An executed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Venue-wide monotonic trade id.
    pub trade_id: TradeId,
    /// Audit tag for this trade.
    pub transaction_id: Uuid,
    /// The market the trade printed in.
    pub market: MarketId,
    /// The buying trader.
    pub buyer: TraderId,
    /// The selling trader.
    pub seller: TraderId,
    /// Execution price (the resting order's price).
    pub price: Price,
    /// Executed size.
    pub size: Size,
    /// Fee charged to the buyer; negative is a rebate.
    pub buyer_fee: SignedQuote,
    /// Fee charged to the seller; negative is a rebate.
    pub seller_fee: SignedQuote,
    /// Whether the buyer traded on margin.
    pub buyer_is_margin: bool,
    /// Whether the seller traded on margin.
    pub seller_is_margin: bool,
    /// Execution wall-clock time in milliseconds.
    pub timestamp: u64,
}

impl TradeRecord {
    /// Quote notional of the trade.
    #[must_use]
    pub fn notional(&self) -> Quote {
        notional(self.price, self.size)
    }
}

/// Outcome of one forced close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationRecord {
    /// The market the position was in.
    pub market: MarketId,
    /// The liquidated trader.
    pub trader: TraderId,
    /// Closed size (base units).
    pub size: Size,
    /// Entry price of the position before the close.
    pub entry_price: Price,
    /// Volume-weighted execution price of the close.
    pub liquidation_price: Price,
    /// Margin that was locked behind the closed portion.
    pub margin_locked: Quote,
    /// Total quote amount the trader lost, penalty included.
    pub margin_lost: Quote,
    /// Loss that had to be socialized to counterparties.
    pub socialized_loss: Quote,
    /// Execution wall-clock time in milliseconds.
    pub timestamp: u64,
    /// Who triggered the liquidation; `None` for the automatic scan.
    pub liquidator: Option<TraderId>,
}

/// Global venue counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryTotals {
    /// Total number of trades.
    pub trades: u64,
    /// Total traded base volume.
    pub volume: Size,
    /// Total traded quote notional.
    pub notional: Quote,
    /// Net fees collected (rebates subtract).
    pub fees: SignedQuote,
}

/// Append-only history store.
pub struct TradeHistory {
    /// Every trade a trader took part in, in execution order.
    by_trader: DashMap<TraderId, Vec<Arc<TradeRecord>>>,
    /// Bounded ring of recent trades per market, newest last.
    recent_by_market: DashMap<MarketId, Mutex<VecDeque<Arc<TradeRecord>>>>,
    /// Liquidations per trader, in execution order.
    liquidations: DashMap<TraderId, Vec<Arc<LiquidationRecord>>>,
    total_trades: AtomicU64,
    total_volume: AtomicCell<u128>,
    total_notional: AtomicCell<u128>,
    total_fees: AtomicCell<i128>,
}

impl Default for TradeHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_trader: DashMap::new(),
            recent_by_market: DashMap::new(),
            liquidations: DashMap::new(),
            total_trades: AtomicU64::new(0),
            total_volume: AtomicCell::new(0),
            total_notional: AtomicCell::new(0),
            total_fees: AtomicCell::new(0),
        }
    }

    /// Append a trade. Indexed under both parties (once under each, or once
    /// total for a self-trade) and counted once in the global totals.
    pub fn record_trade(&self, record: TradeRecord) -> Arc<TradeRecord> {
        let record = Arc::new(record);
        self.by_trader
            .entry(record.buyer)
            .or_default()
            .push(record.clone());
        if record.seller != record.buyer {
            self.by_trader
                .entry(record.seller)
                .or_default()
                .push(record.clone());
        }

        let ring = self
            .recent_by_market
            .entry(record.market)
            .or_insert_with(|| Mutex::new(VecDeque::with_capacity(RECENT_TRADES_CAP)));
        {
            let mut ring = ring.lock().unwrap_or_else(|e| e.into_inner());
            if ring.len() == RECENT_TRADES_CAP {
                ring.pop_front();
            }
            ring.push_back(record.clone());
        }

        self.total_trades.fetch_add(1, Ordering::Relaxed);
        self.total_volume.fetch_add(record.size);
        self.total_notional.fetch_add(record.notional());
        self.total_fees
            .fetch_add(record.buyer_fee + record.seller_fee);
        record
    }

    /// Append a liquidation record.
    pub fn record_liquidation(&self, record: LiquidationRecord) -> Arc<LiquidationRecord> {
        let record = Arc::new(record);
        self.liquidations
            .entry(record.trader)
            .or_default()
            .push(record.clone());
        record
    }

    /// Number of trades a trader took part in.
    #[must_use]
    pub fn trade_count(&self, trader: TraderId) -> usize {
        self.by_trader.get(&trader).map(|v| v.len()).unwrap_or(0)
    }

    /// A paginated slice of a trader's trades, oldest first.
    #[must_use]
    pub fn trades(&self, trader: TraderId, offset: usize, limit: usize) -> Vec<Arc<TradeRecord>> {
        self.by_trader
            .get(&trader)
            .map(|v| v.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Up to `limit` most recent trades in a market, newest last.
    #[must_use]
    pub fn recent_trades(&self, market: MarketId, limit: usize) -> Vec<Arc<TradeRecord>> {
        self.recent_by_market
            .get(&market)
            .map(|ring| {
                let ring = ring.lock().unwrap_or_else(|e| e.into_inner());
                let skip = ring.len().saturating_sub(limit);
                ring.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// All liquidation records of a trader, oldest first.
    #[must_use]
    pub fn liquidations(&self, trader: TraderId) -> Vec<Arc<LiquidationRecord>> {
        self.liquidations
            .get(&trader)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Global counters.
    #[must_use]
    pub fn totals(&self) -> HistoryTotals {
        HistoryTotals {
            trades: self.total_trades.load(Ordering::Relaxed),
            volume: self.total_volume.load(),
            notional: self.total_notional.load(),
            fees: self.total_fees.load(),
        }
    }
}
