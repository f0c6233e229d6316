//! The venue itself: market registry, vault, history, and event fan-out.

use super::events::{EventListener, ExchangeEvent};
use super::liquidation::{InsuranceFund, InsuranceFundSnapshot};
use super::market::{MarketConfig, MarketState};
use super::error::ExchangeError;
use crate::history::{HistoryTotals, LiquidationRecord, TradeHistory, TradeRecord};
use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Price, SignedSize};
use crate::orderbook::{BookDepth, Order};
use crate::vault::{MarginSummary, MarginVault, Position};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// A perpetual-futures venue: order books per market, one shared margin
/// vault, and the liquidation pipeline that couples them.
///
/// Operations on one market serialize through that market's lock; markets
/// proceed in parallel, with each trader's collateral row linearised by the
/// vault.
pub struct Exchange {
    /// Registered markets.
    pub(crate) markets: DashMap<MarketId, Arc<MarketState>>,
    /// The collateral and position vault.
    pub(crate) vault: MarginVault,
    /// Trade and liquidation history.
    pub(crate) history: TradeHistory,
    /// Insurance accounting for penalties and socialization shortfalls.
    pub(crate) insurance: InsuranceFund,
    /// Order id -> market, so order lookups need no market hint.
    pub(crate) order_index: DashMap<OrderId, MarketId>,
    /// Venue-wide order id counter.
    pub(crate) next_order_id: AtomicU64,
    /// Venue-wide trade id counter.
    pub(crate) next_trade_id: AtomicU64,
    /// Synchronous event sink, invoked in commit order.
    pub(crate) event_listener: Option<EventListener>,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    /// Create an empty venue with no markets and no event listener.
    #[must_use]
    pub fn new() -> Self {
        Self {
            markets: DashMap::new(),
            vault: MarginVault::new(),
            history: TradeHistory::new(),
            insurance: InsuranceFund::new(),
            order_index: DashMap::new(),
            next_order_id: AtomicU64::new(1),
            next_trade_id: AtomicU64::new(1),
            event_listener: None,
        }
    }

    /// Create a venue with an event listener attached.
    #[must_use]
    pub fn with_event_listener(listener: EventListener) -> Self {
        let mut exchange = Self::new();
        exchange.event_listener = Some(listener);
        exchange
    }

    /// Attach or replace the event listener.
    pub fn set_event_listener(&mut self, listener: EventListener) {
        self.event_listener = Some(listener);
    }

    /// Remove the event listener.
    pub fn remove_event_listener(&mut self) {
        self.event_listener = None;
    }

    /// Register a new market.
    ///
    /// # Errors
    /// [`ExchangeError::InvalidOrder`] when the id is already registered.
    pub fn register_market(
        &self,
        market: MarketId,
        config: MarketConfig,
    ) -> Result<(), ExchangeError> {
        if self.markets.contains_key(&market) {
            return Err(ExchangeError::InvalidOrder {
                reason: format!("market {market} already registered"),
            });
        }
        info!("registered market {} ({})", market, config.symbol);
        let state = Arc::new(MarketState::new(market, config));
        state.refresh_mark();
        self.vault.set_mark(market, state.mark());
        self.markets.insert(market, state);
        Ok(())
    }

    /// Look up a market's state.
    pub(crate) fn market(&self, market: MarketId) -> Result<Arc<MarketState>, ExchangeError> {
        self.markets
            .get(&market)
            .map(|e| e.value().clone())
            .ok_or(ExchangeError::UnknownMarket(market))
    }

    /// Emit an event to the configured listener.
    pub(crate) fn emit(&self, event: ExchangeEvent) {
        if let Some(listener) = &self.event_listener {
            listener(&event);
        }
    }

    /// Claim the next order id.
    pub(crate) fn claim_order_id(&self) -> OrderId {
        OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Claim the next trade id.
    pub(crate) fn claim_trade_id(&self) -> u64 {
        self.next_trade_id.fetch_add(1, Ordering::Relaxed)
    }

    // ----- queries ---------------------------------------------------------

    /// Best bid in a market.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn best_bid(&self, market: MarketId) -> Result<Option<Price>, ExchangeError> {
        Ok(self.market(market)?.book.best_bid())
    }

    /// Best ask in a market.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn best_ask(&self, market: MarketId) -> Result<Option<Price>, ExchangeError> {
        Ok(self.market(market)?.book.best_ask())
    }

    /// Current mark price of a market.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn mark_price(&self, market: MarketId) -> Result<Price, ExchangeError> {
        Ok(self.market(market)?.mark())
    }

    /// Depth snapshot of a market, up to `depth` levels per side.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn order_book_depth(
        &self,
        market: MarketId,
        depth: usize,
    ) -> Result<BookDepth, ExchangeError> {
        Ok(BookDepth::capture(&self.market(market)?.book, depth))
    }

    /// A trader's open order ids in a market.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn user_orders(
        &self,
        trader: TraderId,
        market: MarketId,
    ) -> Result<Vec<OrderId>, ExchangeError> {
        Ok(self.market(market)?.book.user_orders(trader))
    }

    /// Snapshot of any order ever placed.
    ///
    /// # Errors
    /// [`ExchangeError::OrderNotFound`] when the id was never assigned.
    pub fn get_order(&self, order_id: OrderId) -> Result<Order, ExchangeError> {
        let market = *self
            .order_index
            .get(&order_id)
            .ok_or(ExchangeError::OrderNotFound(order_id))?;
        self.market(market)?
            .book
            .order(order_id)
            .ok_or(ExchangeError::OrderNotFound(order_id))
    }

    /// A trader's position in a market, if one exists.
    #[must_use]
    pub fn position(&self, trader: TraderId, market: MarketId) -> Option<Position> {
        self.vault.position(trader, market)
    }

    /// Aggregated margin view of a trader.
    #[must_use]
    pub fn margin_summary(&self, trader: TraderId) -> MarginSummary {
        self.vault.margin_summary(trader)
    }

    /// Paginated trade history of a trader, oldest first.
    #[must_use]
    pub fn trades(&self, trader: TraderId, offset: usize, limit: usize) -> Vec<Arc<TradeRecord>> {
        self.history.trades(trader, offset, limit)
    }

    /// Number of trades a trader took part in.
    #[must_use]
    pub fn trade_count(&self, trader: TraderId) -> usize {
        self.history.trade_count(trader)
    }

    /// Most recent trades in a market, newest last.
    #[must_use]
    pub fn recent_trades(&self, market: MarketId, limit: usize) -> Vec<Arc<TradeRecord>> {
        self.history.recent_trades(market, limit)
    }

    /// Liquidation records of a trader, oldest first.
    #[must_use]
    pub fn liquidations(&self, trader: TraderId) -> Vec<Arc<LiquidationRecord>> {
        self.history.liquidations(trader)
    }

    /// Global trade counters.
    #[must_use]
    pub fn history_totals(&self) -> HistoryTotals {
        self.history.totals()
    }

    /// Insurance fund counters.
    #[must_use]
    pub fn insurance_fund(&self) -> InsuranceFundSnapshot {
        self.insurance.snapshot()
    }

    /// Sum of signed position sizes in a market; zero on a consistent book.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn net_position_sum(&self, market: MarketId) -> Result<SignedSize, ExchangeError> {
        self.market(market)?;
        Ok(self.vault.net_position_sum(market))
    }

    /// Read access to the vault for audit and analytics.
    #[must_use]
    pub fn vault(&self) -> &MarginVault {
        &self.vault
    }
}
