//! Public venue operations: collateral movement, order placement,
//! cancellation, and administrative triggers.

use super::core::Exchange;
use super::events::ExchangeEvent;
use super::error::ExchangeError;
use crate::history::{LiquidationRecord, TradeRecord};
use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Price, Quote, Size, bps_of, notional};
use crate::orderbook::{Order, OrderKind, OrderStatus, Side};
use crate::utils::current_time_millis;
use std::sync::Arc;
use tracing::trace;

/// Result of placing a limit order.
#[derive(Debug)]
pub struct LimitPlacement {
    /// The new order's id.
    pub order_id: OrderId,
    /// Trades executed immediately on placement, in order.
    pub trades: Vec<Arc<TradeRecord>>,
}

/// Result of placing a market order.
#[derive(Debug)]
pub struct MarketPlacement {
    /// The order id assigned to the sweep (for audit; market orders never
    /// rest).
    pub order_id: OrderId,
    /// Requested size.
    pub requested: Size,
    /// Executed size; the remainder was discarded.
    pub executed: Size,
    /// Trades executed, in order.
    pub trades: Vec<Arc<TradeRecord>>,
}

impl Exchange {
    /// Credit collateral to a trader.
    pub fn deposit(&self, trader: TraderId, amount: Quote) {
        self.vault.deposit(trader, amount);
    }

    /// Withdraw collateral from a trader.
    ///
    /// # Errors
    /// [`ExchangeError::InsufficientMargin`] when available collateral does
    /// not cover `amount`.
    pub fn withdraw(&self, trader: TraderId, amount: Quote) -> Result<(), ExchangeError> {
        self.vault.withdraw(trader, amount)
    }

    /// Place a limit order.
    ///
    /// Margin for the full size is reserved first (buys at the limit
    /// price, sells at the limit or the prevailing mark, whichever is
    /// higher). The order then enters the crossing loop; any unfilled
    /// remainder rests in the book.
    ///
    /// # Errors
    /// - [`ExchangeError::InvalidOrder`] for a zero price or size.
    /// - [`ExchangeError::UnknownMarket`] when the market is not
    ///   registered.
    /// - [`ExchangeError::InsufficientMargin`] when available collateral
    ///   cannot back the reservation; nothing is placed.
    pub fn place_limit_order(
        &self,
        trader: TraderId,
        market: MarketId,
        side: Side,
        price: Price,
        size: Size,
    ) -> Result<LimitPlacement, ExchangeError> {
        if size == 0 {
            return Err(ExchangeError::InvalidOrder {
                reason: "zero size".to_string(),
            });
        }
        if price == 0 {
            return Err(ExchangeError::InvalidOrder {
                reason: "zero price".to_string(),
            });
        }
        let market_state = self.market(market)?;
        let _guard = market_state
            .op_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let order_id = self.claim_order_id();
        let reserve_price = match side {
            Side::Buy => price,
            Side::Sell => price.max(market_state.mark()),
        };
        self.vault
            .reserve(trader, order_id, notional(reserve_price, size))?;

        let order = Order {
            id: order_id,
            trader,
            market,
            side,
            kind: OrderKind::Limit,
            price: Some(price),
            size,
            filled: 0,
            status: OrderStatus::Open,
            is_margin: true,
            reserve_price: Some(reserve_price),
            placed_at: current_time_millis(),
            queue_seq: market_state.book.next_arrival_seq(),
        };
        market_state.book.store(order.clone());
        self.order_index.insert(order_id, market);
        trace!("place limit {} {} {} {} @ {}", order_id, trader, side, size, price);
        self.emit(ExchangeEvent::OrderPlaced {
            order_id,
            trader,
            market,
            side,
            price: Some(price),
            size,
        });

        let outcome = self.execute_crossing(
            &market_state,
            order_id,
            trader,
            side,
            size,
            Some(price),
            None,
            Some(reserve_price),
        )?;
        if outcome.executed < size {
            let snapshot = market_state
                .book
                .order(order_id)
                .ok_or(ExchangeError::OrderNotFound(order_id))?;
            market_state.book.insert_resting(&snapshot);
        }

        let mark = market_state.refresh_mark();
        self.vault.set_mark(market, mark);
        self.run_liquidation_scan(&market_state, None);

        Ok(LimitPlacement {
            order_id,
            trades: outcome.trades,
        })
    }

    /// Place a market order with an optional slippage cap in basis points.
    ///
    /// The sweep reference is the book mid when both sides are populated,
    /// else the best opposite quote; the sweep stops at the first level
    /// deviating more than `max_slippage_bps` from it. The unfilled
    /// remainder is discarded, never queued.
    ///
    /// # Errors
    /// - [`ExchangeError::InvalidOrder`] for a zero size.
    /// - [`ExchangeError::UnknownMarket`] when the market is not
    ///   registered.
    /// - [`ExchangeError::InsufficientMargin`] when available collateral
    ///   cannot cover the sweep the order would perform.
    pub fn place_market_order(
        &self,
        trader: TraderId,
        market: MarketId,
        side: Side,
        size: Size,
        max_slippage_bps: Option<u32>,
    ) -> Result<MarketPlacement, ExchangeError> {
        if size == 0 {
            return Err(ExchangeError::InvalidOrder {
                reason: "zero size".to_string(),
            });
        }
        let market_state = self.market(market)?;
        let _guard = market_state
            .op_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let reference = market_state.book.mid_price().or(match side {
            Side::Buy => market_state.book.best_ask(),
            Side::Sell => market_state.book.best_bid(),
        });
        let band = match (max_slippage_bps, reference) {
            (Some(bps), Some(p0)) => {
                let tolerance = bps_of(p0 as u128, bps).min(u64::MAX as u128) as u64;
                Some((p0.saturating_sub(tolerance), p0.saturating_add(tolerance)))
            }
            _ => None,
        };

        let preview = market_state
            .book
            .sweep_preview_for(Some(trader), side, size, None, band);
        let required = self.required_market_margin(trader, &market_state, side, &preview.fills);
        let available = self.vault.available(trader);
        if available < required as i128 {
            return Err(ExchangeError::InsufficientMargin {
                required,
                available,
            });
        }

        let order_id = self.claim_order_id();
        let order = Order {
            id: order_id,
            trader,
            market,
            side,
            kind: OrderKind::Market,
            price: None,
            size,
            filled: 0,
            status: OrderStatus::Open,
            is_margin: true,
            reserve_price: None,
            placed_at: current_time_millis(),
            queue_seq: market_state.book.next_arrival_seq(),
        };
        market_state.book.store(order);
        self.order_index.insert(order_id, market);
        trace!("place market {} {} {} {}", order_id, trader, side, size);
        self.emit(ExchangeEvent::OrderPlaced {
            order_id,
            trader,
            market,
            side,
            price: None,
            size,
        });

        let outcome =
            self.execute_crossing(&market_state, order_id, trader, side, size, None, band, None)?;
        market_state.book.discard_remainder(order_id);

        let mark = market_state.refresh_mark();
        self.vault.set_mark(market, mark);
        self.run_liquidation_scan(&market_state, None);

        Ok(MarketPlacement {
            order_id,
            requested: size,
            executed: outcome.executed,
            trades: outcome.trades,
        })
    }

    /// Cancel a resting order.
    ///
    /// Releases whatever margin was still reserved behind the unfilled
    /// remainder.
    ///
    /// # Errors
    /// - [`ExchangeError::OrderNotFound`] when the id is unknown or the
    ///   order already left the book (cancelling twice included).
    /// - [`ExchangeError::NotOwner`] when `trader` does not own the order.
    pub fn cancel_order(&self, trader: TraderId, order_id: OrderId) -> Result<(), ExchangeError> {
        let market = *self
            .order_index
            .get(&order_id)
            .ok_or(ExchangeError::OrderNotFound(order_id))?;
        let market_state = self.market(market)?;
        let _guard = market_state
            .op_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let order = market_state
            .book
            .order(order_id)
            .ok_or(ExchangeError::OrderNotFound(order_id))?;
        if order.trader != trader {
            return Err(ExchangeError::NotOwner { order_id, trader });
        }
        market_state
            .book
            .remove_resting(order_id)
            .ok_or(ExchangeError::OrderNotFound(order_id))?;
        self.vault.release(trader, order_id);
        trace!("cancel {} by {}", order_id, trader);
        self.emit(ExchangeEvent::OrderCancelled {
            order_id,
            trader,
            market,
        });
        Ok(())
    }

    /// Run a liquidation scan over a market's active traders.
    ///
    /// Returns the liquidation records executed by this scan. A scan that
    /// re-enters one already running on the market is a no-op.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn trigger_liquidation_scan(
        &self,
        market: MarketId,
        liquidator: Option<TraderId>,
    ) -> Result<Vec<Arc<LiquidationRecord>>, ExchangeError> {
        let market_state = self.market(market)?;
        let _guard = market_state
            .op_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Ok(self.run_liquidation_scan(&market_state, liquidator))
    }

    /// Administrative mark override. Stores the mark and runs the scan the
    /// way a fill-driven mark update would.
    ///
    /// # Errors
    /// [`ExchangeError::UnknownMarket`] when the market is not registered.
    pub fn override_mark_price(&self, market: MarketId, mark: Price) -> Result<(), ExchangeError> {
        let market_state = self.market(market)?;
        let _guard = market_state
            .op_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        market_state.override_mark(mark);
        self.vault.set_mark(market, mark);
        self.run_liquidation_scan(&market_state, None);
        Ok(())
    }
}
