//! The crossing loop: price-time-priority matching against resting levels.

use super::core::Exchange;
use super::events::ExchangeEvent;
use super::market::MarketState;
use super::error::ExchangeError;
use crate::history::TradeRecord;
use crate::ids::{OrderId, TraderId};
use crate::num::{Price, Size, notional};
use crate::orderbook::Side;
use crate::utils::current_time_millis;
use crate::vault::{FillParty, Position, PositionDelta};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// What the crossing loop produced for one incoming order.
#[derive(Debug, Default)]
pub(crate) struct CrossingOutcome {
    /// Total size executed.
    pub executed: Size,
    /// Trade records in execution order.
    pub trades: Vec<Arc<TradeRecord>>,
}

impl Exchange {
    /// Match an incoming order against the opposite side of the book.
    ///
    /// Pops the head of the best crossable level, fills at the resting
    /// order's price (the maker price wins), and repeats across levels
    /// until the incoming size is exhausted or no level crosses. `limit`
    /// bounds prices for limit orders; `band` bounds them for
    /// slippage-capped market orders. Every fill settles through the vault
    /// and emits its trade and position events before the next fill runs.
    ///
    /// The caller holds the market's operation lock, so the book observed
    /// here cannot change under the loop.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn execute_crossing(
        &self,
        market: &Arc<MarketState>,
        taker_order: OrderId,
        taker: TraderId,
        taker_side: Side,
        size: Size,
        limit: Option<Price>,
        band: Option<(Price, Price)>,
        taker_reserve: Option<Price>,
    ) -> Result<CrossingOutcome, ExchangeError> {
        let mut outcome = CrossingOutcome::default();
        let mut remaining = size;

        while remaining > 0 {
            let Some(level) = market.book.best_opposite_level(taker_side) else {
                break;
            };
            let price = level.price();
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
            let Some((seq, maker_order)) = level.front() else {
                market.book.drop_level_if_empty(taker_side.opposite(), price);
                continue;
            };
            let Some(maker) = market.book.order(maker_order) else {
                level.remove(seq, 0);
                continue;
            };
            let maker_remaining = maker.remaining();
            if maker_remaining == 0 {
                level.remove(seq, 0);
                continue;
            }

            let quantity = remaining.min(maker_remaining);
            let taker_party = FillParty {
                trader: taker,
                order_id: taker_reserve.map(|_| taker_order),
                reserve_price: taker_reserve,
                order_done: quantity == remaining,
            };
            let maker_party = FillParty {
                trader: maker.trader,
                order_id: Some(maker_order),
                reserve_price: maker.reserve_price,
                order_done: quantity == maker_remaining,
            };
            let (buyer_party, seller_party) = match taker_side {
                Side::Buy => (&taker_party, &maker_party),
                Side::Sell => (&maker_party, &taker_party),
            };

            let (buyer_delta, seller_delta) = self.vault.apply_fill(
                market.id,
                price,
                quantity,
                buyer_party,
                seller_party,
            )?;

            market.book.fill_resting(maker_order, quantity);
            market.book.fill_taker(taker_order, quantity);
            market.book.record_trade_price(price);
            remaining -= quantity;

            let fill_notional = notional(price, quantity);
            let fees = market.config.fees.unwrap_or_default();
            let (buyer_fee, seller_fee) = match taker_side {
                Side::Buy => (
                    fees.calculate_fee(fill_notional, false),
                    fees.calculate_fee(fill_notional, true),
                ),
                Side::Sell => (
                    fees.calculate_fee(fill_notional, true),
                    fees.calculate_fee(fill_notional, false),
                ),
            };

            let record = TradeRecord {
                trade_id: self.claim_trade_id(),
                transaction_id: Uuid::new_v4(),
                market: market.id,
                buyer: buyer_party.trader,
                seller: seller_party.trader,
                price,
                size: quantity,
                buyer_fee,
                seller_fee,
                buyer_is_margin: true,
                seller_is_margin: true,
                timestamp: current_time_millis(),
            };
            trace!(
                "match in {}: {} x {} @ {} (maker {}, taker {})",
                market.id, quantity, taker_side, price, maker_order, taker_order
            );
            let record = self.history.record_trade(record);
            outcome.trades.push(record.clone());
            self.emit(ExchangeEvent::TradeExecuted {
                record: (*record).clone(),
            });

            self.track_position_delta(market, &buyer_delta);
            if buyer_party.trader != seller_party.trader {
                self.track_position_delta(market, &seller_delta);
            }
        }

        outcome.executed = size - remaining;
        Ok(outcome)
    }

    /// Emit a position event and keep the market's active-trader set in
    /// step with position lifecycles.
    fn track_position_delta(&self, market: &Arc<MarketState>, delta: &PositionDelta) {
        self.emit(ExchangeEvent::PositionUpdated { delta: *delta });
        if delta.size == 0 {
            market.deactivate_trader(delta.trader);
        } else {
            market.activate_trader(delta.trader);
        }
    }

    /// Margin a market order needs before it may run, computed from an
    /// exact preview of the sweep it would perform.
    ///
    /// `preview_fills` must come from a sweep preview that carries the
    /// placing trader's identity: fills against the trader's own resting
    /// orders net to nothing in the vault and must already be excluded.
    /// The remaining fills replay through the same netting arithmetic the
    /// vault applies: the closing portion releases margin and realizes
    /// P&L, the opening portion locks new margin at its fill prices. The
    /// requirement is the net draw on available collateral, floored at
    /// zero. Under the market's operation lock the preview matches the
    /// actual fills exactly.
    pub(crate) fn required_market_margin(
        &self,
        trader: TraderId,
        market: &Arc<MarketState>,
        side: Side,
        preview_fills: &[(Price, Size)],
    ) -> u128 {
        let mut scratch = self.vault.position(trader, market.id);
        let mut margin_delta: i128 = 0;
        let mut realized: i128 = 0;
        for &(price, quantity) in preview_fills {
            let delta = side.sign() * quantity as i128;
            match scratch.as_mut() {
                Some(position) => {
                    let outcome = position.net_fill(delta, price);
                    margin_delta += outcome.margin_delta;
                    realized += outcome.realized_pnl;
                    if outcome.closed {
                        scratch = None;
                    }
                }
                None => {
                    let position = Position::open(delta, price, 0, 0);
                    margin_delta += position.margin_locked as i128;
                    scratch = Some(position);
                }
            }
        }
        (margin_delta - realized).max(0) as u128
    }
}
