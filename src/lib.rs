//! # Perpetual-Futures Matching and Clearing Core
//!
//! A trading venue core for perpetual futures, built from three tightly
//! coupled subsystems:
//!
//! - **Order books** ([`orderbook`]): one price-time-priority limit order
//!   book per market, with limit, market, and slippage-capped market
//!   orders. Price levels live in skip lists; order records in concurrent
//!   maps; FIFO within a level is strict arrival order.
//! - **Margin vault** ([`vault`]): a single vault holding every trader's
//!   collateral, netting positions per (trader, market), computing realized
//!   and unrealized P&L in fixed point, and enforcing 100 % initial margin
//!   through pending-order reservations.
//! - **Liquidation pipeline** ([`exchange`]): under-margined positions are
//!   detected on every mark update and force-closed against the book via
//!   synthetic market orders, with a recursion guard, a three-tier loss
//!   waterfall (position margin, then remaining collateral, then
//!   socialized loss across profitable counterparties), a liquidation
//!   penalty, and insurance-fund accounting for anything left over.
//!
//! The mark price feeds liquidation and unrealized P&L: book mid when both
//! sides are quoted, else the last trade, else a configured seed.
//!
//! ## Units
//!
//! Everything is bit-exact integer arithmetic ([`num`]): prices and quote
//! amounts carry 6 decimal places, sizes carry 18. There is no floating
//! point anywhere in the core.
//!
//! ## Concurrency model
//!
//! Operations serialize per market and run to completion before the next
//! begins; different markets proceed in parallel, and a trader acting on
//! several markets is linearised through their collateral row in the
//! vault. The only cross-operation state is the pair of monotonic
//! order/trade counters.
//!
//! ## Example
//!
//! ```
//! use perpbook_rs::prelude::*;
//!
//! let exchange = Exchange::new();
//! let market = MarketId::from_name("BTC-PERP");
//! exchange
//!     .register_market(market, MarketConfig::new("BTC-PERP", 50_000 * PRICE_SCALE))
//!     .unwrap();
//!
//! let (alice, bob) = (TraderId::from_name("alice"), TraderId::from_name("bob"));
//! exchange.deposit(alice, 1_000_000 * PRICE_SCALE as u128);
//! exchange.deposit(bob, 1_000_000 * PRICE_SCALE as u128);
//!
//! // Bob quotes, Alice lifts the offer.
//! exchange
//!     .place_limit_order(bob, market, Side::Sell, 50_000 * PRICE_SCALE, 2 * SIZE_SCALE)
//!     .unwrap();
//! let placement = exchange
//!     .place_limit_order(alice, market, Side::Buy, 50_000 * PRICE_SCALE, 2 * SIZE_SCALE)
//!     .unwrap();
//!
//! assert_eq!(placement.trades.len(), 1);
//! let position = exchange.position(alice, market).unwrap();
//! assert_eq!(position.size, 2 * SIZE_SCALE as i128);
//! ```
//!
//! ## Events and replay
//!
//! Every transition emits an [`exchange::ExchangeEvent`] in commit order to
//! a synchronous listener; [`exchange::EventRouterStd`] and
//! [`exchange::EventRouterTokio`] forward them into channels. The venue has
//! no on-disk format: persisting the [`replay::ReplayCommand`] stream and
//! replaying it reconstructs all state deterministically.

pub mod exchange;
pub mod history;
pub mod ids;
pub mod num;
pub mod orderbook;
pub mod prelude;
pub mod replay;
pub mod vault;

mod utils;

pub use exchange::{
    EventListener, EventRouterStd, EventRouterTokio, Exchange, ExchangeError, ExchangeEvent,
    FeeSchedule, InsuranceFundSnapshot, LimitPlacement, MarketConfig, MarketPlacement,
};
pub use history::{HistoryTotals, LiquidationRecord, TradeHistory, TradeRecord};
pub use ids::{MarketId, OrderId, TradeId, TraderId};
pub use orderbook::{BookDepth, DepthLevel, Order, OrderBook, OrderKind, OrderStatus, Side};
pub use utils::current_time_millis;
pub use vault::{CollateralAccount, MarginSummary, MarginVault, Position, PositionDelta};
