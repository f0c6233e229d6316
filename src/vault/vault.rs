//! The centralized margin vault: collateral, reservations, and position
//! netting for every trader across every market.

use super::account::CollateralAccount;
use super::position::{NettingOutcome, Position};
use crate::exchange::ExchangeError;
use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Price, Quote, SignedQuote, SignedSize, Size, margin_per_unit, notional};
use crate::utils::current_time_millis;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// One side of a fill as the vault sees it.
#[derive(Debug, Clone, Copy)]
pub struct FillParty {
    /// The trader on this side.
    pub trader: TraderId,
    /// The order being filled, when it exists in the book (liquidation
    /// closes synthesize fills without reservations).
    pub order_id: Option<OrderId>,
    /// Per-unit price backing the order's reservation, if one was taken.
    pub reserve_price: Option<Price>,
    /// Whether this fill completes the order.
    pub order_done: bool,
}

impl FillParty {
    /// A party with no order bookkeeping (synthetic fills).
    #[must_use]
    pub fn bare(trader: TraderId) -> Self {
        Self {
            trader,
            order_id: None,
            reserve_price: None,
            order_done: true,
        }
    }
}

/// Post-fill state of one party's position, for event emission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionDelta {
    /// The trader whose position changed.
    pub trader: TraderId,
    /// The market of the position.
    pub market: MarketId,
    /// Signed size after the fill.
    pub size: SignedSize,
    /// Entry price after the fill.
    pub entry_price: Price,
    /// Locked margin after the fill.
    pub margin_locked: Quote,
    /// P&L realized by this fill.
    pub realized_pnl: SignedQuote,
    /// Whether the fill closed the position.
    pub closed: bool,
    /// Whether the fill created the position.
    pub opened: bool,
}

/// Aggregated margin view of one trader.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarginSummary {
    /// Total deposited collateral.
    pub total_collateral: Quote,
    /// Margin locked behind positions.
    pub margin_locked: Quote,
    /// Margin reserved for open orders.
    pub margin_reserved: Quote,
    /// Derived available collateral.
    pub available_collateral: SignedQuote,
    /// Cumulative realized P&L.
    pub realized_pnl: SignedQuote,
    /// Unrealized P&L across positions at current marks.
    pub unrealized_pnl: SignedQuote,
    /// `deposited + realized + unrealized`.
    pub portfolio_value: SignedQuote,
}

/// The margin vault.
///
/// Exclusively owns collateral accounts and positions. The book never
/// touches these rows and the vault never touches book structures; fills
/// cross the boundary only through [`MarginVault::apply_fill`].
pub struct MarginVault {
    /// Collateral account per trader.
    accounts: DashMap<TraderId, CollateralAccount>,
    /// Net position per (trader, market).
    positions: DashMap<(TraderId, MarketId), Position>,
    /// Latest mark price per market.
    marks: DashMap<MarketId, Price>,
    /// Monotonic sequence for position opens (deleveraging tie-break).
    position_seq: AtomicU64,
}

impl Default for MarginVault {
    fn default() -> Self {
        Self::new()
    }
}

impl MarginVault {
    /// Create an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            positions: DashMap::new(),
            marks: DashMap::new(),
            position_seq: AtomicU64::new(1),
        }
    }

    /// Credit deposited collateral.
    pub fn deposit(&self, trader: TraderId, amount: Quote) {
        self.accounts.entry(trader).or_default().deposit(amount);
        trace!("vault: deposit {} by {}", amount, trader);
    }

    /// Withdraw deposited collateral.
    ///
    /// # Errors
    /// [`ExchangeError::InsufficientMargin`] when available collateral does
    /// not cover `amount`; the account is unchanged.
    pub fn withdraw(&self, trader: TraderId, amount: Quote) -> Result<(), ExchangeError> {
        let mut account = self.accounts.entry(trader).or_default();
        if account.try_withdraw(amount) {
            trace!("vault: withdraw {} by {}", amount, trader);
            Ok(())
        } else {
            Err(ExchangeError::InsufficientMargin {
                required: amount,
                available: account.available(),
            })
        }
    }

    /// Reserve `amount` of margin behind an open order.
    ///
    /// # Errors
    /// [`ExchangeError::InsufficientMargin`] when available collateral does
    /// not cover `amount`.
    pub fn reserve(
        &self,
        trader: TraderId,
        order_id: OrderId,
        amount: Quote,
    ) -> Result<(), ExchangeError> {
        let mut account = self.accounts.entry(trader).or_default();
        if account.try_reserve(order_id, amount) {
            trace!("vault: reserve {} behind {} for {}", amount, order_id, trader);
            Ok(())
        } else {
            Err(ExchangeError::InsufficientMargin {
                required: amount,
                available: account.available(),
            })
        }
    }

    /// Release whatever remains of an order's reservation (cancel, or a
    /// discarded market remainder). Returns the released amount.
    pub fn release(&self, trader: TraderId, order_id: OrderId) -> Quote {
        let released = self
            .accounts
            .get_mut(&trader)
            .map(|mut a| a.release_reservation(order_id))
            .unwrap_or(0);
        if released > 0 {
            trace!("vault: release {} from {} for {}", released, order_id, trader);
        }
        released
    }

    /// Apply one fill to both parties: reservation settlement, position
    /// netting, margin movement, and realized P&L.
    ///
    /// A self-trade (same trader on both sides) nets to nothing: the
    /// position and P&L are untouched while both orders' reservations
    /// settle normally.
    ///
    /// # Errors
    /// [`ExchangeError::InvariantViolation`] when margin accounting would
    /// underflow; this indicates corrupted state and must abort the caller.
    pub fn apply_fill(
        &self,
        market: MarketId,
        price: Price,
        size: Size,
        buyer: &FillParty,
        seller: &FillParty,
    ) -> Result<(PositionDelta, PositionDelta), ExchangeError> {
        if buyer.trader == seller.trader {
            self.settle_reservation(size, buyer);
            self.settle_reservation(size, seller);
            let unchanged = self.unchanged_delta(buyer.trader, market);
            return Ok((unchanged, unchanged));
        }
        let buyer_delta = self.apply_party(market, price, size, buyer, size as i128)?;
        let seller_delta = self.apply_party(market, price, size, seller, -(size as i128))?;
        Ok((buyer_delta, seller_delta))
    }

    fn settle_reservation(&self, size: Size, party: &FillParty) {
        if let (Some(order_id), Some(reserve_price)) = (party.order_id, party.reserve_price) {
            let consume = notional(reserve_price, size);
            self.accounts
                .entry(party.trader)
                .or_default()
                .consume_reservation(order_id, consume, party.order_done);
        }
    }

    fn unchanged_delta(&self, trader: TraderId, market: MarketId) -> PositionDelta {
        let position = self.positions.get(&(trader, market)).map(|p| *p);
        PositionDelta {
            trader,
            market,
            size: position.map(|p| p.size).unwrap_or(0),
            entry_price: position.map(|p| p.entry_price).unwrap_or(0),
            margin_locked: position.map(|p| p.margin_locked).unwrap_or(0),
            realized_pnl: 0,
            closed: false,
            opened: false,
        }
    }

    fn apply_party(
        &self,
        market: MarketId,
        price: Price,
        size: Size,
        party: &FillParty,
        delta: SignedSize,
    ) -> Result<PositionDelta, ExchangeError> {
        self.settle_reservation(size, party);

        let mut opened = false;
        let (outcome, position) = match self.positions.entry((party.trader, market)) {
            Entry::Occupied(mut entry) => {
                let outcome = entry.get_mut().net_fill(delta, price);
                let position = *entry.get();
                if outcome.closed {
                    entry.remove();
                }
                (outcome, position)
            }
            Entry::Vacant(entry) => {
                opened = true;
                let seq = self.position_seq.fetch_add(1, Ordering::Relaxed);
                let position = Position::open(delta, price, seq, current_time_millis());
                let outcome = NettingOutcome {
                    margin_delta: position.margin_locked as i128,
                    ..NettingOutcome::default()
                };
                entry.insert(position);
                (outcome, position)
            }
        };

        let mut account = self.accounts.entry(party.trader).or_default();
        account.realized_pnl += outcome.realized_pnl;
        if !account.adjust_margin_locked(outcome.margin_delta) {
            return Err(ExchangeError::InvariantViolation {
                message: format!(
                    "margin underflow applying fill for {} in {}",
                    party.trader, market
                ),
            });
        }

        Ok(PositionDelta {
            trader: party.trader,
            market,
            size: position.size,
            entry_price: position.entry_price,
            margin_locked: position.margin_locked,
            realized_pnl: outcome.realized_pnl,
            closed: outcome.closed,
            opened,
        })
    }

    /// Store the latest mark for a market. Unrealized P&L is computed on
    /// demand from positions and this mark; nothing is recomputed here.
    pub fn set_mark(&self, market: MarketId, mark: Price) {
        self.marks.insert(market, mark);
    }

    /// Latest stored mark for a market.
    #[must_use]
    pub fn mark(&self, market: MarketId) -> Option<Price> {
        self.marks.get(&market).map(|m| *m)
    }

    /// Snapshot of a trader's position in one market.
    #[must_use]
    pub fn position(&self, trader: TraderId, market: MarketId) -> Option<Position> {
        self.positions.get(&(trader, market)).map(|p| *p)
    }

    /// All positions of a trader.
    #[must_use]
    pub fn positions_of(&self, trader: TraderId) -> Vec<(MarketId, Position)> {
        self.positions
            .iter()
            .filter(|entry| entry.key().0 == trader)
            .map(|entry| (entry.key().1, *entry.value()))
            .collect()
    }

    /// All positions in a market.
    #[must_use]
    pub fn positions_in_market(&self, market: MarketId) -> Vec<(TraderId, Position)> {
        self.positions
            .iter()
            .filter(|entry| entry.key().1 == market)
            .map(|entry| (entry.key().0, *entry.value()))
            .collect()
    }

    /// Sum of signed position sizes in a market. Zero whenever the vault is
    /// consistent: every fill adds and subtracts the same quantity.
    #[must_use]
    pub fn net_position_sum(&self, market: MarketId) -> SignedSize {
        self.positions_in_market(market)
            .iter()
            .map(|(_, p)| p.size)
            .sum()
    }

    /// Derived available collateral of a trader.
    #[must_use]
    pub fn available(&self, trader: TraderId) -> SignedQuote {
        self.accounts
            .get(&trader)
            .map(|a| a.available())
            .unwrap_or(0)
    }

    /// Snapshot of a trader's raw account row.
    #[must_use]
    pub fn account(&self, trader: TraderId) -> CollateralAccount {
        self.accounts
            .get(&trader)
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    /// Unrealized P&L of a trader across all positions at current marks.
    /// Markets without a stored mark contribute nothing.
    #[must_use]
    pub fn unrealized_pnl(&self, trader: TraderId) -> SignedQuote {
        self.positions_of(trader)
            .iter()
            .map(|(market, position)| match self.mark(*market) {
                Some(mark) => position.unrealized_pnl(mark),
                None => 0,
            })
            .sum()
    }

    /// Aggregated margin view of a trader.
    #[must_use]
    pub fn margin_summary(&self, trader: TraderId) -> MarginSummary {
        let account = self.account(trader);
        let unrealized = self.unrealized_pnl(trader);
        MarginSummary {
            total_collateral: account.deposited,
            margin_locked: account.margin_locked,
            margin_reserved: account.margin_reserved,
            available_collateral: account.available(),
            realized_pnl: account.realized_pnl,
            unrealized_pnl: unrealized,
            portfolio_value: account.equity() + unrealized,
        }
    }

    /// Whether a trader's position in `market` is liquidatable at `mark`.
    ///
    /// The locked margin expressed as a per-unit price is the distance the
    /// mark may move against the entry before the margin is exhausted; the
    /// threshold itself liquidates:
    /// longs at `mark <= entry - margin/|size|`, shorts at
    /// `mark >= entry + margin/|size|`.
    #[must_use]
    pub fn is_liquidatable(&self, trader: TraderId, market: MarketId, mark: Price) -> bool {
        let Some(position) = self.position(trader, market) else {
            return false;
        };
        if position.size == 0 {
            return false;
        }
        let buffer = margin_per_unit(position.margin_locked, position.abs_size());
        if position.is_long() {
            mark <= position.entry_price.saturating_sub(buffer)
        } else {
            mark >= position.entry_price.saturating_add(buffer)
        }
    }

    /// Adjust a trader's realized P&L upward (waterfall restitution,
    /// liquidator rewards).
    pub fn credit_realized(&self, trader: TraderId, amount: Quote) {
        self.accounts.entry(trader).or_default().realized_pnl += amount as i128;
    }

    /// Adjust a trader's realized P&L downward (deleveraging donations,
    /// liquidation penalties).
    pub fn debit_realized(&self, trader: TraderId, amount: Quote) {
        self.accounts.entry(trader).or_default().realized_pnl -= amount as i128;
    }
}
