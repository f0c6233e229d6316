//! Net position per (trader, market) and the fill-netting rules.

use crate::num::{Price, Quote, SignedQuote, SignedSize, Size, pnl, required_margin, vwap_entry};
use serde::{Deserialize, Serialize};

/// A trader's net position in one market.
///
/// The sign of `size` encodes direction: positive is long, negative is
/// short. `margin_locked` always equals the full notional at the entry
/// price, so the structural invariant `margin = |size| * entry / SIZE_SCALE`
/// holds at every rest point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Signed size in base units (18 decimals).
    pub size: SignedSize,
    /// Volume-weighted entry price of the contracts still held.
    pub entry_price: Price,
    /// Margin backing the position, 100 % of entry notional.
    pub margin_locked: Quote,
    /// Venue-wide monotonic sequence assigned when the position opened.
    /// Earlier positions win deleveraging ties.
    pub opened_seq: u64,
    /// Wall-clock open time in milliseconds.
    pub opened_at: u64,
}

/// Effect of netting one fill into a position.
#[derive(Debug, Clone, Copy, Default)]
pub struct NettingOutcome {
    /// P&L realized by the closing portion of the fill, if any.
    pub realized_pnl: SignedQuote,
    /// Change in locked margin (new minus old), signed.
    pub margin_delta: i128,
    /// Whether the position returned to zero size.
    pub closed: bool,
    /// Whether the fill flipped the position through zero.
    pub flipped: bool,
}

impl Position {
    /// Open a fresh position from a fill.
    #[must_use]
    pub fn open(delta: SignedSize, fill_price: Price, opened_seq: u64, opened_at: u64) -> Self {
        Self {
            size: delta,
            entry_price: fill_price,
            margin_locked: required_margin(fill_price, delta.unsigned_abs()),
            opened_seq,
            opened_at,
        }
    }

    /// Unsigned size of the position.
    #[must_use]
    #[inline]
    pub fn abs_size(&self) -> Size {
        self.size.unsigned_abs()
    }

    /// Whether the position is long.
    #[must_use]
    #[inline]
    pub fn is_long(&self) -> bool {
        self.size > 0
    }

    /// Unrealized P&L at `mark`.
    #[must_use]
    #[inline]
    pub fn unrealized_pnl(&self, mark: Price) -> SignedQuote {
        pnl(self.entry_price, mark, self.size)
    }

    /// Net a fill of signed `delta` at `fill_price` into the position.
    ///
    /// Four cases, depending on the relative signs of the existing size and
    /// the delta:
    /// 1. same sign: the position grows, the entry becomes the volume
    ///    weighted average of old and new;
    /// 2. opposite sign, `|delta| < |size|`: the closed portion realizes
    ///    P&L at the fill price, entry unchanged;
    /// 3. opposite sign, `|delta| == |size|`: full close;
    /// 4. opposite sign, `|delta| > |size|`: full close plus a fresh
    ///    position of the overshoot entered at the fill price.
    ///
    /// Locked margin is recomputed from the margin formula after every
    /// mutation so the structural invariant stays exact under integer
    /// truncation.
    pub fn net_fill(&mut self, delta: SignedSize, fill_price: Price) -> NettingOutcome {
        debug_assert!(delta != 0);
        debug_assert!(self.size != 0);
        let old_margin = self.margin_locked;
        let mut outcome = NettingOutcome::default();

        if (self.size > 0) == (delta > 0) {
            // Same direction: grow at the volume-weighted entry.
            self.entry_price = vwap_entry(
                self.abs_size(),
                self.entry_price,
                delta.unsigned_abs(),
                fill_price,
            );
            self.size += delta;
        } else {
            let closing = delta.unsigned_abs().min(self.abs_size());
            let closing_signed = if self.size > 0 {
                closing as i128
            } else {
                -(closing as i128)
            };
            outcome.realized_pnl = pnl(self.entry_price, fill_price, closing_signed);
            self.size += delta;
            if self.size == 0 {
                outcome.closed = true;
            } else if (self.size > 0) != (closing_signed > 0) && delta.unsigned_abs() > closing {
                // Flip: the overshoot opens fresh at the fill price.
                outcome.flipped = true;
                self.entry_price = fill_price;
            }
        }

        self.margin_locked = required_margin(self.entry_price, self.abs_size());
        outcome.margin_delta = self.margin_locked as i128 - old_margin as i128;
        outcome
    }
}
