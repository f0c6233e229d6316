//! Shared fixtures for venue tests.

use crate::exchange::{Exchange, MarketConfig};
use crate::ids::{MarketId, TraderId};
use crate::num::{PRICE_SCALE, Price, Quote, SIZE_SCALE, Size};

/// Price helper: `n` whole quote units.
pub fn px(n: u64) -> Price {
    n * PRICE_SCALE
}

/// Size helper: `n` whole base units.
pub fn base(n: u64) -> Size {
    n as u128 * SIZE_SCALE
}

/// Quote helper: `n` whole quote units.
pub fn quote(n: u64) -> Quote {
    n as u128 * PRICE_SCALE as u128
}

/// A venue with one market seeded at the given mark.
pub fn venue(seed_mark: Price) -> (Exchange, MarketId) {
    let exchange = Exchange::new();
    let market = MarketId::from_name("TEST-PERP");
    exchange
        .register_market(market, MarketConfig::new("TEST-PERP", seed_mark))
        .unwrap();
    (exchange, market)
}

/// A funded trader.
pub fn fund(exchange: &Exchange, name: &str, amount: Quote) -> TraderId {
    let trader = TraderId::from_name(name);
    exchange.deposit(trader, amount);
    trader
}
