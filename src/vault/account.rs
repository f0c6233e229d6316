//! Per-trader collateral account.

use crate::ids::OrderId;
use crate::num::{Quote, SignedQuote};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Collateral bookkeeping for one trader across all markets.
///
/// Available collateral is derived, never stored:
/// `deposited + realized_pnl - margin_locked - margin_reserved`.
/// Placement-time margin checks keep it non-negative for every voluntary
/// operation; liquidation flows may drive it negative transiently, which is
/// exactly the residual the loss waterfall socializes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralAccount {
    /// Total collateral ever deposited minus withdrawals.
    pub deposited: Quote,
    /// Cumulative realized P&L, signed.
    pub realized_pnl: SignedQuote,
    /// Margin locked behind open positions, summed over markets.
    pub margin_locked: Quote,
    /// Margin reserved for open orders, summed over orders.
    pub margin_reserved: Quote,
    /// Remaining reservation per open order.
    pub reservations: HashMap<OrderId, Quote>,
}

impl CollateralAccount {
    /// Derived available collateral, signed.
    #[must_use]
    pub fn available(&self) -> SignedQuote {
        self.deposited as i128 + self.realized_pnl
            - self.margin_locked as i128
            - self.margin_reserved as i128
    }

    /// Account equity ignoring open-order reservations.
    #[must_use]
    pub fn equity(&self) -> SignedQuote {
        self.deposited as i128 + self.realized_pnl
    }

    /// Add deposited collateral.
    pub fn deposit(&mut self, amount: Quote) {
        self.deposited = self.deposited.saturating_add(amount);
    }

    /// Remove deposited collateral if available covers it.
    ///
    /// Returns `false` (leaving the account untouched) when it does not.
    pub fn try_withdraw(&mut self, amount: Quote) -> bool {
        if self.available() < amount as i128 {
            return false;
        }
        self.deposited -= amount;
        true
    }

    /// Reserve `amount` behind `order_id` if available covers it.
    pub fn try_reserve(&mut self, order_id: OrderId, amount: Quote) -> bool {
        if self.available() < amount as i128 {
            return false;
        }
        self.margin_reserved += amount;
        self.reservations.insert(order_id, amount);
        true
    }

    /// Consume up to `amount` of the reservation behind `order_id` (a fill
    /// settling part of the order). When `release_rest` is set the whole
    /// remaining reservation is dropped afterwards, returning any
    /// truncation dust to available collateral.
    ///
    /// Returns the amount actually consumed.
    pub fn consume_reservation(
        &mut self,
        order_id: OrderId,
        amount: Quote,
        release_rest: bool,
    ) -> Quote {
        let Some(remaining) = self.reservations.get_mut(&order_id) else {
            return 0;
        };
        let consumed = amount.min(*remaining);
        *remaining -= consumed;
        self.margin_reserved -= consumed;
        if release_rest {
            let rest = *remaining;
            self.margin_reserved -= rest;
            self.reservations.remove(&order_id);
        }
        consumed
    }

    /// Drop the reservation behind `order_id` entirely (cancel or discard).
    ///
    /// Returns the released amount.
    pub fn release_reservation(&mut self, order_id: OrderId) -> Quote {
        match self.reservations.remove(&order_id) {
            Some(remaining) => {
                self.margin_reserved -= remaining;
                remaining
            }
            None => 0,
        }
    }

    /// Apply a signed change to locked margin.
    ///
    /// Returns `false` on underflow, which means the caller's accounting is
    /// broken.
    #[must_use]
    pub fn adjust_margin_locked(&mut self, delta: i128) -> bool {
        if delta >= 0 {
            self.margin_locked = self.margin_locked.saturating_add(delta as u128);
            true
        } else {
            match self.margin_locked.checked_sub(delta.unsigned_abs()) {
                Some(v) => {
                    self.margin_locked = v;
                    true
                }
                None => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: u128 = 1_000_000; // 1.0 quote

    #[test]
    fn test_available_is_derived() {
        let mut acc = CollateralAccount::default();
        acc.deposit(100 * Q);
        assert_eq!(acc.available(), 100 * Q as i128);
        acc.realized_pnl = -30 * Q as i128;
        acc.margin_locked = 20 * Q;
        acc.margin_reserved = 10 * Q;
        assert_eq!(acc.available(), 40 * Q as i128);
    }

    #[test]
    fn test_withdraw_bounded_by_available() {
        let mut acc = CollateralAccount::default();
        acc.deposit(50 * Q);
        acc.margin_reserved = 20 * Q;
        assert!(!acc.try_withdraw(31 * Q));
        assert_eq!(acc.deposited, 50 * Q);
        assert!(acc.try_withdraw(30 * Q));
        assert_eq!(acc.deposited, 20 * Q);
        assert_eq!(acc.available(), 0);
    }

    #[test]
    fn test_reserve_and_release_round_trip() {
        let mut acc = CollateralAccount::default();
        acc.deposit(100 * Q);
        assert!(acc.try_reserve(OrderId(1), 60 * Q));
        assert!(!acc.try_reserve(OrderId(2), 50 * Q));
        assert_eq!(acc.available(), 40 * Q as i128);
        assert_eq!(acc.release_reservation(OrderId(1)), 60 * Q);
        assert_eq!(acc.available(), 100 * Q as i128);
        assert_eq!(acc.release_reservation(OrderId(1)), 0);
    }

    #[test]
    fn test_consume_reservation_partial_then_rest() {
        let mut acc = CollateralAccount::default();
        acc.deposit(100 * Q);
        assert!(acc.try_reserve(OrderId(1), 60 * Q));
        assert_eq!(acc.consume_reservation(OrderId(1), 25 * Q, false), 25 * Q);
        assert_eq!(acc.margin_reserved, 35 * Q);
        // Final fill consumes what it needs and releases the dust.
        assert_eq!(acc.consume_reservation(OrderId(1), 30 * Q, true), 30 * Q);
        assert_eq!(acc.margin_reserved, 0);
        assert!(acc.reservations.is_empty());
    }

    #[test]
    fn test_consume_caps_at_remaining() {
        let mut acc = CollateralAccount::default();
        acc.deposit(100 * Q);
        assert!(acc.try_reserve(OrderId(1), 10 * Q));
        assert_eq!(acc.consume_reservation(OrderId(1), 25 * Q, false), 10 * Q);
        assert_eq!(acc.margin_reserved, 0);
    }

    #[test]
    fn test_adjust_margin_locked_guards_underflow() {
        let mut acc = CollateralAccount::default();
        assert!(acc.adjust_margin_locked(50));
        assert!(acc.adjust_margin_locked(-20));
        assert_eq!(acc.margin_locked, 30);
        assert!(!acc.adjust_margin_locked(-31));
        assert_eq!(acc.margin_locked, 30);
    }
}
