//! Fixed-point numeric kernel for prices, sizes, and quote amounts.
//!
//! Prices carry 6 decimal places and sizes carry 18. Every formula here
//! pre-multiplies before dividing so the mixed scales never lose precision:
//! a notional is `price * size / SIZE_SCALE` (the product is at 24 decimals,
//! the division brings it back to quote-6), and P&L follows the same shape
//! with a signed size. All divisions are integer and truncate toward zero.

/// A price in quote units at 6 decimal places. `1_000_000` is 1.0 quote.
pub type Price = u64;

/// An unsigned size in base units at 18 decimal places.
pub type Size = u128;

/// A signed size. Positive is long, negative is short.
pub type SignedSize = i128;

/// An unsigned quote-denominated amount (collateral, margin, notional) at
/// 6 decimal places.
pub type Quote = u128;

/// A signed quote-denominated amount (realized or unrealized P&L).
pub type SignedQuote = i128;

/// Scale factor for prices: 6 decimal places.
pub const PRICE_SCALE: u64 = 1_000_000;

/// Scale factor for sizes: 18 decimal places.
pub const SIZE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Basis-points denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Notional value of `size` at `price`, in quote-6.
///
/// The multiplication is performed in u128 (6 + 18 = 24 decimals) before
/// dividing by [`SIZE_SCALE`].
#[must_use]
#[inline]
pub fn notional(price: Price, size: Size) -> Quote {
    (price as u128).saturating_mul(size) / SIZE_SCALE
}

/// Profit and loss of a signed position at `mark`, in quote-6.
///
/// `pnl = (mark - entry) * size / SIZE_SCALE` with the long convention:
/// a positive `size` gains when the mark rises, a negative `size` gains
/// when it falls.
///
/// # Examples
/// ```
/// use perpbook_rs::num::{pnl, PRICE_SCALE, SIZE_SCALE};
///
/// // Long 50 base units, entry 10.0, mark 12.0 => +100.0 quote.
/// let gain = pnl(10 * PRICE_SCALE, 12 * PRICE_SCALE, 50 * SIZE_SCALE as i128);
/// assert_eq!(gain, 100 * PRICE_SCALE as i128);
/// ```
#[must_use]
#[inline]
pub fn pnl(entry: Price, mark: Price, size: SignedSize) -> SignedQuote {
    let diff = mark as i128 - entry as i128;
    diff.saturating_mul(size) / SIZE_SCALE as i128
}

/// Volume-weighted entry price after adding `add_size` at `fill_price` to
/// an existing position of `old_size` at `old_entry`.
///
/// Both notionals are formed at 24 decimals before the single division, so
/// the rounding error is at most one price tick.
#[must_use]
#[inline]
pub fn vwap_entry(old_size: Size, old_entry: Price, add_size: Size, fill_price: Price) -> Price {
    let total = old_size + add_size;
    if total == 0 {
        return fill_price;
    }
    let weighted = old_size
        .saturating_mul(old_entry as u128)
        .saturating_add(add_size.saturating_mul(fill_price as u128));
    (weighted / total) as Price
}

/// Initial margin required to hold `size` base units entered at `entry`:
/// 100 % of the notional.
#[must_use]
#[inline]
pub fn required_margin(entry: Price, size: Size) -> Quote {
    notional(entry, size)
}

/// `bps` basis points of `amount`, truncating.
#[must_use]
#[inline]
pub fn bps_of(amount: Quote, bps: u32) -> Quote {
    amount.saturating_mul(bps as u128) / BPS_DENOMINATOR
}

/// Margin per base unit expressed as a price: `margin * SIZE_SCALE / size`.
///
/// Used by the liquidation threshold, where the per-unit margin is the
/// price distance a position can move against its entry before its locked
/// margin is exhausted. Returns 0 for a zero size.
#[must_use]
#[inline]
pub fn margin_per_unit(margin: Quote, size: Size) -> Price {
    if size == 0 {
        return 0;
    }
    (margin.saturating_mul(SIZE_SCALE) / size).min(u64::MAX as u128) as Price
}
