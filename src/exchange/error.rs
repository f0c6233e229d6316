//! Venue error types.

use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Quote, SignedQuote, Size};
use crate::orderbook::Side;
use std::fmt;

/// Errors surfaced by venue operations.
///
/// All variants except [`ExchangeError::InvariantViolation`] are transient:
/// the operation is rejected and state is unchanged. An invariant violation
/// means the venue's accounting can no longer be trusted and the whole
/// transaction must abort.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExchangeError {
    /// A reservation or withdrawal would drive available collateral below
    /// zero.
    InsufficientMargin {
        /// Amount the operation needed.
        required: Quote,
        /// Available collateral at the time of the check.
        available: SignedQuote,
    },

    /// A cancel was attempted by someone other than the order's owner.
    NotOwner {
        /// The order in question.
        order_id: OrderId,
        /// The caller that was rejected.
        trader: TraderId,
    },

    /// The order id is unknown or the order is no longer live.
    OrderNotFound(OrderId),

    /// No position exists for the trader in the market.
    PositionNotFound {
        /// The trader queried.
        trader: TraderId,
        /// The market queried.
        market: MarketId,
    },

    /// The market has not been registered.
    UnknownMarket(MarketId),

    /// A liquidation close found zero opposite depth; the liquidation is
    /// deferred and the position remains open.
    NoLiquidity {
        /// The market swept.
        market: MarketId,
        /// The side of the synthetic order.
        side: Side,
        /// The size that found no depth.
        requested: Size,
    },

    /// The order parameters are malformed (zero size, zero price on a
    /// limit, ...).
    InvalidOrder {
        /// Human-readable reason.
        reason: String,
    },

    /// Internal accounting reached a state that violates a structural
    /// invariant. Fatal: callers must abort, not recover.
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::InsufficientMargin {
                required,
                available,
            } => {
                write!(
                    f,
                    "insufficient margin: required {required}, available {available}"
                )
            }
            ExchangeError::NotOwner { order_id, trader } => {
                write!(f, "order {order_id} is not owned by {trader}")
            }
            ExchangeError::OrderNotFound(order_id) => {
                write!(f, "order not found: {order_id}")
            }
            ExchangeError::PositionNotFound { trader, market } => {
                write!(f, "no position for {trader} in market {market}")
            }
            ExchangeError::UnknownMarket(market) => {
                write!(f, "unknown market: {market}")
            }
            ExchangeError::NoLiquidity {
                market,
                side,
                requested,
            } => {
                write!(
                    f,
                    "no liquidity in market {market} for {side} of {requested}"
                )
            }
            ExchangeError::InvalidOrder { reason } => {
                write!(f, "invalid order: {reason}")
            }
            ExchangeError::InvariantViolation { message } => {
                write!(f, "invariant violation: {message}")
            }
        }
    }
}

impl std::error::Error for ExchangeError {}
