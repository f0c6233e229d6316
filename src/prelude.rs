//! Convenience re-exports for venue consumers.
//!
//! ```
//! use perpbook_rs::prelude::*;
//!
//! let exchange = Exchange::new();
//! let market = MarketId::from_name("ETH-PERP");
//! exchange
//!     .register_market(market, MarketConfig::new("ETH-PERP", 3_000 * PRICE_SCALE))
//!     .unwrap();
//! assert_eq!(exchange.mark_price(market).unwrap(), 3_000 * PRICE_SCALE);
//! ```

pub use crate::exchange::{
    EventListener, EventRouterStd, EventRouterTokio, Exchange, ExchangeError, ExchangeEvent,
    FeeSchedule, InsuranceFundSnapshot, LimitPlacement, MarketConfig, MarketPlacement,
};
pub use crate::history::{HistoryTotals, LiquidationRecord, TradeRecord};
pub use crate::ids::{MarketId, OrderId, TradeId, TraderId};
pub use crate::num::{
    PRICE_SCALE, Price, Quote, SIZE_SCALE, SignedQuote, SignedSize, Size, notional, pnl,
};
pub use crate::orderbook::{BookDepth, DepthLevel, Order, OrderKind, OrderStatus, Side};
pub use crate::replay::{ReplayCommand, ReplayOutcome, apply, apply_all};
pub use crate::vault::{MarginSummary, Position, PositionDelta};
