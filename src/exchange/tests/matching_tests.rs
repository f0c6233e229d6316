//! Crossing-loop behaviour: maker price, FIFO, partial fills, sweeps,
//! slippage caps, and cancellation.

use super::helpers::{base, fund, px, quote, venue};
use crate::ExchangeError;
use crate::ids::OrderId;
use crate::orderbook::{OrderStatus, Side};

#[test]
fn test_basic_cross_fills_both_sides() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));

    exchange
        .place_limit_order(a, market, Side::Buy, px(1), base(10))
        .unwrap();
    let placement = exchange
        .place_limit_order(b, market, Side::Sell, px(1), base(10))
        .unwrap();

    assert_eq!(placement.trades.len(), 1);
    let trade = &placement.trades[0];
    assert_eq!(trade.price, px(1));
    assert_eq!(trade.size, base(10));
    assert_eq!(trade.buyer, a);
    assert_eq!(trade.seller, b);
    // Both orders left the book.
    assert_eq!(exchange.best_bid(market).unwrap(), None);
    assert_eq!(exchange.best_ask(market).unwrap(), None);
}

#[test]
fn test_maker_price_wins() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));

    // Ask rests at 1.0; an aggressive buy at 1.5 fills at the resting
    // price.
    exchange
        .place_limit_order(b, market, Side::Sell, px(1), base(10))
        .unwrap();
    let placement = exchange
        .place_limit_order(a, market, Side::Buy, px(1) + 500_000, base(10))
        .unwrap();

    assert_eq!(placement.trades[0].price, px(1));
}

#[test]
fn test_partial_fill_rests_remainder() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));

    let buy = exchange
        .place_limit_order(a, market, Side::Buy, px(1), base(10))
        .unwrap();
    let sell = exchange
        .place_limit_order(b, market, Side::Sell, px(1), base(7))
        .unwrap();

    assert_eq!(sell.trades[0].size, base(7));
    let order = exchange.get_order(buy.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Partial);
    assert_eq!(order.remaining(), base(3));
    assert_eq!(exchange.best_bid(market).unwrap(), Some(px(1)));
    assert_eq!(exchange.position(a, market).unwrap().size, base(7) as i128);
}

#[test]
fn test_fifo_within_level() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));
    let c = fund(&exchange, "c", quote(100));

    let first = exchange
        .place_limit_order(a, market, Side::Sell, px(1), base(5))
        .unwrap();
    let second = exchange
        .place_limit_order(b, market, Side::Sell, px(1), base(5))
        .unwrap();

    let taker = exchange
        .place_limit_order(c, market, Side::Buy, px(1), base(5))
        .unwrap();

    // The earlier ask filled, the later one still rests whole.
    assert_eq!(taker.trades[0].seller, a);
    assert_eq!(
        exchange.get_order(first.order_id).unwrap().status,
        OrderStatus::Filled
    );
    assert_eq!(
        exchange.get_order(second.order_id).unwrap().remaining(),
        base(5)
    );
}

#[test]
fn test_multi_level_sweep() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));
    let c = fund(&exchange, "c", quote(100));

    exchange
        .place_limit_order(a, market, Side::Sell, px(1), base(5))
        .unwrap();
    exchange
        .place_limit_order(b, market, Side::Sell, px(2), base(5))
        .unwrap();

    let placement = exchange
        .place_limit_order(c, market, Side::Buy, px(2), base(8))
        .unwrap();

    assert_eq!(placement.trades.len(), 2);
    assert_eq!(placement.trades[0].price, px(1));
    assert_eq!(placement.trades[0].size, base(5));
    assert_eq!(placement.trades[1].price, px(2));
    assert_eq!(placement.trades[1].size, base(3));
    assert_eq!(exchange.position(c, market).unwrap().size, base(8) as i128);
}

#[test]
fn test_market_order_discards_remainder() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));

    exchange
        .place_limit_order(a, market, Side::Sell, px(1), base(5))
        .unwrap();
    let placement = exchange
        .place_market_order(b, market, Side::Buy, base(8), None)
        .unwrap();

    assert_eq!(placement.executed, base(5));
    assert_eq!(placement.requested, base(8));
    // Nothing rests, the remainder was discarded.
    assert_eq!(exchange.best_bid(market).unwrap(), None);
    let order = exchange.get_order(placement.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.filled, base(5));
}

#[test]
fn test_market_order_on_empty_book_executes_nothing() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));

    let placement = exchange
        .place_market_order(a, market, Side::Buy, base(5), None)
        .unwrap();
    assert_eq!(placement.executed, 0);
    assert!(placement.trades.is_empty());
    assert!(exchange.position(a, market).is_none());
}

#[test]
fn test_slippage_cap_stops_sweep() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));
    let c = fund(&exchange, "c", quote(100));

    exchange
        .place_limit_order(a, market, Side::Sell, px(1), base(5))
        .unwrap();
    exchange
        .place_limit_order(b, market, Side::Sell, px(1) + 200_000, base(5))
        .unwrap();

    // Reference is the best ask (no bids); 10 % tolerance admits 1.10 but
    // not 1.20.
    let placement = exchange
        .place_market_order(c, market, Side::Buy, base(10), Some(1_000))
        .unwrap();

    assert_eq!(placement.executed, base(5));
    assert_eq!(placement.trades.len(), 1);
    assert_eq!(placement.trades[0].price, px(1));
    // The second level survived untouched.
    assert_eq!(exchange.best_ask(market).unwrap(), Some(px(1) + 200_000));
}

#[test]
fn test_cancel_removes_order_and_releases_reservation() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));

    let placement = exchange
        .place_limit_order(a, market, Side::Buy, px(1), base(10))
        .unwrap();
    assert_eq!(
        exchange.margin_summary(a).available_collateral,
        quote(90) as i128
    );

    exchange.cancel_order(a, placement.order_id).unwrap();
    let summary = exchange.margin_summary(a);
    assert_eq!(summary.available_collateral, quote(100) as i128);
    assert_eq!(summary.margin_reserved, 0);
    assert_eq!(
        exchange.get_order(placement.order_id).unwrap().status,
        OrderStatus::Cancelled
    );
    assert!(exchange.user_orders(a, market).unwrap().is_empty());
}

#[test]
fn test_cancel_is_owner_only_and_not_idempotent() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));

    let placement = exchange
        .place_limit_order(a, market, Side::Buy, px(1), base(10))
        .unwrap();

    assert!(matches!(
        exchange.cancel_order(b, placement.order_id),
        Err(ExchangeError::NotOwner { .. })
    ));
    exchange.cancel_order(a, placement.order_id).unwrap();
    // Cancelling a cancelled order is NOT_FOUND and changes nothing.
    assert!(matches!(
        exchange.cancel_order(a, placement.order_id),
        Err(ExchangeError::OrderNotFound(_))
    ));
    assert!(matches!(
        exchange.cancel_order(a, OrderId(9_999)),
        Err(ExchangeError::OrderNotFound(_))
    ));
}

#[test]
fn test_zero_size_and_zero_price_rejected() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));

    assert!(matches!(
        exchange.place_limit_order(a, market, Side::Buy, px(1), 0),
        Err(ExchangeError::InvalidOrder { .. })
    ));
    assert!(matches!(
        exchange.place_limit_order(a, market, Side::Buy, 0, base(1)),
        Err(ExchangeError::InvalidOrder { .. })
    ));
    assert!(matches!(
        exchange.place_market_order(a, market, Side::Sell, 0, None),
        Err(ExchangeError::InvalidOrder { .. })
    ));
}

#[test]
fn test_unknown_market_rejected() {
    let (exchange, _) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let ghost = crate::ids::MarketId::from_name("GHOST");
    assert!(matches!(
        exchange.place_limit_order(a, ghost, Side::Buy, px(1), base(1)),
        Err(ExchangeError::UnknownMarket(_))
    ));
}

#[test]
fn test_self_trade_nets_out_with_zero_pnl() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));

    exchange
        .place_limit_order(a, market, Side::Buy, px(1), base(10))
        .unwrap();
    let placement = exchange
        .place_limit_order(a, market, Side::Sell, px(1), base(10))
        .unwrap();

    // The trade printed, but the position netted out with no P&L.
    assert_eq!(placement.trades.len(), 1);
    assert!(exchange.position(a, market).is_none());
    let summary = exchange.margin_summary(a);
    assert_eq!(summary.realized_pnl, 0);
    assert_eq!(summary.available_collateral, quote(100) as i128);
    assert_eq!(exchange.trade_count(a), 1);
}

#[test]
fn test_book_never_rests_crossed() {
    let (exchange, market) = venue(px(1));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));

    exchange
        .place_limit_order(a, market, Side::Buy, px(2), base(5))
        .unwrap();
    exchange
        .place_limit_order(b, market, Side::Sell, px(3), base(5))
        .unwrap();
    exchange
        .place_limit_order(b, market, Side::Sell, px(1), base(2))
        .unwrap();

    // The crossing portion traded; whatever rests satisfies bid < ask.
    let bid = exchange.best_bid(market).unwrap();
    let ask = exchange.best_ask(market).unwrap();
    if let (Some(bid), Some(ask)) = (bid, ask) {
        assert!(bid < ask);
    }
}

#[test]
fn test_mark_price_follows_book() {
    let (exchange, market) = venue(px(5));
    let a = fund(&exchange, "a", quote(100));
    let b = fund(&exchange, "b", quote(100));

    // Seed mark before any quotes.
    assert_eq!(exchange.mark_price(market).unwrap(), px(5));

    exchange
        .place_limit_order(a, market, Side::Buy, px(4), base(1))
        .unwrap();
    exchange
        .place_limit_order(b, market, Side::Sell, px(6), base(1))
        .unwrap();
    // Both sides quoted: mid.
    assert_eq!(exchange.mark_price(market).unwrap(), px(5));

    // Trade through the ask; the ask side empties, mark falls back to the
    // last trade.
    exchange
        .place_limit_order(a, market, Side::Buy, px(6), base(1))
        .unwrap();
    assert_eq!(exchange.mark_price(market).unwrap(), px(6));
}
