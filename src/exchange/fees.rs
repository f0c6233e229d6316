//! Maker/taker fee schedule applied to fill notionals.

use crate::num::{Quote, SignedQuote};
use serde::{Deserialize, Serialize};

/// Configurable fee schedule for maker and taker fees.
///
/// Fees are expressed in basis points (1 bps = 0.01 %). Negative values are
/// rebates, common for maker fees to attract resting liquidity. Fees are
/// computed per fill from the quote notional and recorded on the trade; the
/// vault does not move fee amounts (fee settlement is an edge concern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Maker fee in basis points (negative = rebate).
    pub maker_fee_bps: i32,
    /// Taker fee in basis points.
    pub taker_fee_bps: i32,
}

impl FeeSchedule {
    /// Create a new fee schedule.
    #[must_use]
    pub fn new(maker_fee_bps: i32, taker_fee_bps: i32) -> Self {
        Self {
            maker_fee_bps,
            taker_fee_bps,
        }
    }

    /// A schedule that charges nothing.
    #[must_use]
    pub fn zero_fee() -> Self {
        Self::new(0, 0)
    }

    /// Whether both rates are zero.
    #[must_use]
    #[inline]
    pub fn is_zero_fee(&self) -> bool {
        self.maker_fee_bps == 0 && self.taker_fee_bps == 0
    }

    /// Fee for one side of a fill with the given quote `notional`.
    ///
    /// Positive results are charges, negative results are rebates.
    #[must_use]
    #[inline]
    pub fn calculate_fee(&self, notional: Quote, is_maker: bool) -> SignedQuote {
        let bps = if is_maker {
            self.maker_fee_bps
        } else {
            self.taker_fee_bps
        };
        (notional as i128)
            .checked_mul(bps as i128)
            .map(|product| product / 10_000)
            .unwrap_or(i128::MAX)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::zero_fee()
    }
}
