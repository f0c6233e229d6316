//! Forced closes: eligibility scanning, the synthetic close order, the
//! three-tier loss waterfall, and socialized-loss distribution.

use super::core::Exchange;
use super::events::ExchangeEvent;
use super::market::MarketState;
use crate::history::LiquidationRecord;
use crate::ids::TraderId;
use crate::num::{Price, Quote, bps_of};
use crate::orderbook::{Order, OrderKind, OrderStatus, Side};
use crate::utils::current_time_millis;
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{trace, warn};

/// Venue-level insurance accounting.
///
/// Collects liquidation penalties that have no liquidator to pay, and
/// records the system shortfall whenever socialized losses exhaust every
/// donor. The shortfall is a counter, not a balance: it measures bad debt
/// the venue could not attribute to anyone.
pub struct InsuranceFund {
    balance: AtomicCell<u128>,
    contributions: AtomicCell<u128>,
    payouts: AtomicCell<u128>,
    shortfall: AtomicCell<u128>,
}

/// Point-in-time counters of the insurance fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceFundSnapshot {
    /// Current fund balance.
    pub balance: Quote,
    /// Lifetime credits into the fund.
    pub total_contributions: Quote,
    /// Lifetime amounts the fund paid to cover residual losses.
    pub total_payouts: Quote,
    /// Residual losses nobody could cover.
    pub shortfall: Quote,
}

impl InsuranceFund {
    /// An empty fund.
    #[must_use]
    pub fn new() -> Self {
        Self {
            balance: AtomicCell::new(0),
            contributions: AtomicCell::new(0),
            payouts: AtomicCell::new(0),
            shortfall: AtomicCell::new(0),
        }
    }

    /// Credit the fund (unclaimed liquidation penalties).
    pub fn credit(&self, amount: Quote) {
        self.balance.fetch_add(amount);
        self.contributions.fetch_add(amount);
    }

    /// Cover up to `amount` of residual loss from the fund balance and
    /// record whatever is left as shortfall. Returns the covered amount.
    pub fn absorb(&self, amount: Quote) -> Quote {
        let covered = loop {
            let balance = self.balance.load();
            let take = balance.min(amount);
            if self
                .balance
                .compare_exchange(balance, balance - take)
                .is_ok()
            {
                break take;
            }
        };
        if covered > 0 {
            self.payouts.fetch_add(covered);
        }
        let uncovered = amount - covered;
        if uncovered > 0 {
            self.shortfall.fetch_add(uncovered);
        }
        covered
    }

    /// Current counters.
    #[must_use]
    pub fn snapshot(&self) -> InsuranceFundSnapshot {
        InsuranceFundSnapshot {
            balance: self.balance.load(),
            total_contributions: self.contributions.load(),
            total_payouts: self.payouts.load(),
            shortfall: self.shortfall.load(),
        }
    }
}

impl Default for InsuranceFund {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    /// Scan a market's active traders and liquidate every eligible
    /// position, newly eligible ones included, until none remain or every
    /// remaining candidate deferred.
    ///
    /// The caller holds the market's operation lock. The per-market guard
    /// makes re-entrant scans (from the fills of a synthetic close) no-ops,
    /// so the loop here is the single driver of the whole cascade.
    pub(crate) fn run_liquidation_scan(
        &self,
        market: &Arc<MarketState>,
        liquidator: Option<TraderId>,
    ) -> Vec<Arc<LiquidationRecord>> {
        if !market.enter_liquidation() {
            return Vec::new();
        }
        let mut records = Vec::new();
        let mut attempted: HashSet<TraderId> = HashSet::new();
        loop {
            let mark = market.mark();
            let mut candidates = market.active_traders();
            candidates.sort();
            let next = candidates.into_iter().find(|trader| {
                !attempted.contains(trader) && self.vault.is_liquidatable(*trader, market.id, mark)
            });
            let Some(trader) = next else {
                break;
            };
            attempted.insert(trader);
            if let Some(record) = self.execute_liquidation(market, trader, liquidator) {
                records.push(record);
            }
        }
        market.exit_liquidation();
        records
    }

    /// Force-close one trader's position via a synthetic market order.
    ///
    /// Returns `None` when the position is gone, no longer eligible, or the
    /// book has no opposite depth (the close is deferred and retried on the
    /// next trigger).
    fn execute_liquidation(
        &self,
        market: &Arc<MarketState>,
        trader: TraderId,
        liquidator: Option<TraderId>,
    ) -> Option<Arc<LiquidationRecord>> {
        let position = self.vault.position(trader, market.id)?;
        let mark = market.mark();
        if !self.vault.is_liquidatable(trader, market.id, mark) {
            return None;
        }
        let close_side = if position.is_long() {
            Side::Sell
        } else {
            Side::Buy
        };
        let size = position.abs_size();
        let entry_price = position.entry_price;
        let margin_before = position.margin_locked;
        let equity_before = self.vault.account(trader).equity();

        // Pull the trader's own quotes first: the reserved margin joins the
        // waterfall's second tier, and the forced close cannot cross them.
        for open_order in market.book.user_orders(trader) {
            if market.book.remove_resting(open_order).is_some() {
                self.vault.release(trader, open_order);
                self.emit(ExchangeEvent::OrderCancelled {
                    order_id: open_order,
                    trader,
                    market: market.id,
                });
            }
        }

        let order_id = self.claim_order_id();
        let order = Order {
            id: order_id,
            trader,
            market: market.id,
            side: close_side,
            kind: OrderKind::Market,
            price: None,
            size,
            filled: 0,
            status: OrderStatus::Open,
            is_margin: true,
            reserve_price: None,
            placed_at: current_time_millis(),
            queue_seq: market.book.next_arrival_seq(),
        };
        market.book.store(order);
        self.order_index.insert(order_id, market.id);

        let outcome = match self.execute_crossing(
            market, order_id, trader, close_side, size, None, None, None,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("liquidation close failed in {}: {}", market.id, e);
                market.book.discard_remainder(order_id);
                return None;
            }
        };
        market.book.discard_remainder(order_id);

        if outcome.executed == 0 {
            trace!(
                "liquidation deferred in {}: no depth for {} of {}",
                market.id, close_side, size
            );
            self.emit(ExchangeEvent::LiquidationDeferred {
                market: market.id,
                trader,
                side: close_side,
                requested: size,
            });
            return None;
        }

        let new_mark = market.refresh_mark();
        self.vault.set_mark(market.id, new_mark);

        // Volume-weighted execution price of the close.
        let swept: u128 = outcome
            .trades
            .iter()
            .map(|t| t.price as u128 * t.size)
            .sum();
        let exec_price = (swept / outcome.executed) as Price;

        // Tier 1 and 2 ran implicitly: the realized loss consumed the
        // position's margin and then whatever collateral remained. The
        // penalty comes out of anything still left, then the residual (if
        // the account went under) is socialized.
        let margin_closed = margin_before
            - self
                .vault
                .position(trader, market.id)
                .map(|p| p.margin_locked)
                .unwrap_or(0);
        let penalty = bps_of(margin_closed, market.config.liquidation_penalty_bps);
        let payable = self.vault.available(trader).max(0) as u128;
        let penalty_charged = penalty.min(payable);
        if penalty_charged > 0 {
            self.vault.debit_realized(trader, penalty_charged);
            match liquidator {
                Some(l) => self.vault.credit_realized(l, penalty_charged),
                None => self.insurance.credit(penalty_charged),
            }
        }

        let shortage = self.vault.available(trader);
        let socialized = if shortage < 0 {
            let residual = shortage.unsigned_abs();
            self.vault.credit_realized(trader, residual);
            self.socialize_loss(market, trader, residual, new_mark);
            residual
        } else {
            0
        };

        let equity_after = self.vault.account(trader).equity();
        let margin_lost = (equity_before - equity_after).max(0) as Quote;

        let record = LiquidationRecord {
            market: market.id,
            trader,
            size: outcome.executed,
            entry_price,
            liquidation_price: exec_price,
            margin_locked: margin_closed,
            margin_lost,
            socialized_loss: socialized,
            timestamp: current_time_millis(),
            liquidator,
        };
        trace!(
            "liquidated {} in {}: {} @ {} (lost {}, socialized {})",
            trader, market.id, outcome.executed, exec_price, margin_lost, socialized
        );
        let record = self.history.record_liquidation(record);
        self.emit(ExchangeEvent::LiquidationExecuted {
            record: (*record).clone(),
        });
        Some(record)
    }

    /// Distribute a residual loss across the market's profitable
    /// counterparties, most profitable first, each capped at its own
    /// positive unrealized P&L; whatever nobody covers goes to the
    /// insurance fund and, past its balance, the shortfall counter.
    fn socialize_loss(
        &self,
        market: &Arc<MarketState>,
        liquidated: TraderId,
        residual: Quote,
        mark: Price,
    ) {
        self.emit(ExchangeEvent::SocializedLossApplied {
            market: market.id,
            trader: liquidated,
            amount: residual,
        });

        let mut donors: Vec<(TraderId, Quote, u64)> = self
            .vault
            .positions_in_market(market.id)
            .into_iter()
            .filter(|(trader, _)| *trader != liquidated)
            .filter_map(|(trader, position)| {
                let upnl = position.unrealized_pnl(mark);
                (upnl > 0).then_some((trader, upnl as Quote, position.opened_seq))
            })
            .collect();
        // Most profitable first; earlier positions win ties.
        donors.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)).then(a.0.cmp(&b.0)));

        let mut remaining = residual;
        for (donor, cap, _) in donors {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(cap);
            self.vault.debit_realized(donor, take);
            self.emit(ExchangeEvent::UserLossSocialized {
                market: market.id,
                donor,
                amount: take,
            });
            trace!("socialized {} from {} in {}", take, donor, market.id);
            remaining -= take;
        }
        if remaining > 0 {
            self.insurance.absorb(remaining);
        }
    }
}
