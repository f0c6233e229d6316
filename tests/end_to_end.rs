//! Full venue flows over the public API.

use perpbook_rs::prelude::*;

fn px(n: u64) -> Price {
    n * PRICE_SCALE
}

fn base(n: u64) -> Size {
    n as u128 * SIZE_SCALE
}

fn quote(n: u64) -> Quote {
    n as u128 * PRICE_SCALE as u128
}

#[test]
fn test_two_market_session() {
    let exchange = Exchange::new();
    let btc = MarketId::from_name("BTC-PERP");
    let eth = MarketId::from_name("ETH-PERP");
    exchange
        .register_market(btc, MarketConfig::new("BTC-PERP", px(100)))
        .unwrap();
    exchange
        .register_market(eth, MarketConfig::new("ETH-PERP", px(10)))
        .unwrap();

    let alice = TraderId::from_name("alice");
    let bob = TraderId::from_name("bob");
    exchange.deposit(alice, quote(100_000));
    exchange.deposit(bob, quote(100_000));

    // Alice longs BTC and shorts ETH; Bob takes the other side of both.
    exchange
        .place_limit_order(bob, btc, Side::Sell, px(100), base(10))
        .unwrap();
    exchange
        .place_limit_order(alice, btc, Side::Buy, px(100), base(10))
        .unwrap();
    exchange
        .place_limit_order(bob, eth, Side::Buy, px(10), base(50))
        .unwrap();
    exchange
        .place_limit_order(alice, eth, Side::Sell, px(10), base(50))
        .unwrap();

    // One collateral row spans both markets.
    let summary = exchange.margin_summary(alice);
    assert_eq!(summary.margin_locked, quote(1_000) + quote(500));
    assert_eq!(
        summary.available_collateral,
        quote(100_000 - 1_500) as i128
    );
    assert_eq!(exchange.net_position_sum(btc).unwrap(), 0);
    assert_eq!(exchange.net_position_sum(eth).unwrap(), 0);

    // Each market tracks its own mark.
    assert_eq!(exchange.mark_price(btc).unwrap(), px(100));
    assert_eq!(exchange.mark_price(eth).unwrap(), px(10));
}

#[test]
fn test_fee_schedule_lands_on_trade_records() {
    let exchange = Exchange::new();
    let market = MarketId::from_name("FEE-PERP");
    exchange
        .register_market(
            market,
            MarketConfig::new("FEE-PERP", px(1)).with_fees(FeeSchedule::new(-2, 5)),
        )
        .unwrap();

    let maker = TraderId::from_name("maker");
    let taker = TraderId::from_name("taker");
    exchange.deposit(maker, quote(1_000));
    exchange.deposit(taker, quote(1_000));

    exchange
        .place_limit_order(maker, market, Side::Sell, px(100), base(1))
        .unwrap();
    let placement = exchange
        .place_limit_order(taker, market, Side::Buy, px(100), base(1))
        .unwrap();

    let trade = &placement.trades[0];
    // Notional 100.0: taker (buyer) pays 5 bps, maker (seller) rebates 2.
    assert_eq!(trade.buyer_fee, 50_000);
    assert_eq!(trade.seller_fee, -20_000);
    assert_eq!(exchange.history_totals().fees, 30_000);
}

#[test]
fn test_event_stream_in_commit_order() {
    let mut router = EventRouterStd::new();
    let receiver = router.take_receiver();
    let exchange = Exchange::with_event_listener(router.listener());

    let market = MarketId::from_name("EVT-PERP");
    exchange
        .register_market(market, MarketConfig::new("EVT-PERP", px(1)))
        .unwrap();
    let a = TraderId::from_name("a");
    let b = TraderId::from_name("b");
    exchange.deposit(a, quote(100));
    exchange.deposit(b, quote(100));

    exchange
        .place_limit_order(a, market, Side::Buy, px(1), base(10))
        .unwrap();
    exchange
        .place_limit_order(b, market, Side::Sell, px(1), base(10))
        .unwrap();

    let events: Vec<ExchangeEvent> = receiver.try_iter().collect();
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            ExchangeEvent::OrderPlaced { .. } => "placed",
            ExchangeEvent::TradeExecuted { .. } => "trade",
            ExchangeEvent::PositionUpdated { .. } => "position",
            _ => "other",
        })
        .collect();
    // First placement rests; the second crosses: its placement event comes
    // before the trade, which precedes both position updates.
    assert_eq!(
        kinds,
        vec!["placed", "placed", "trade", "position", "position"]
    );
}

#[test]
fn test_replay_stream_rebuilds_identical_state() {
    let commands = vec![
        ReplayCommand::RegisterMarket {
            market: MarketId::from_name("R"),
            config: MarketConfig::new("R", px(10)),
        },
        ReplayCommand::Deposit {
            trader: TraderId::from_name("a"),
            amount: quote(10_000),
        },
        ReplayCommand::Deposit {
            trader: TraderId::from_name("b"),
            amount: quote(10_000),
        },
        ReplayCommand::PlaceLimit {
            trader: TraderId::from_name("a"),
            market: MarketId::from_name("R"),
            side: Side::Buy,
            price: px(10),
            size: base(30),
        },
        ReplayCommand::PlaceLimit {
            trader: TraderId::from_name("b"),
            market: MarketId::from_name("R"),
            side: Side::Sell,
            price: px(10),
            size: base(12),
        },
        ReplayCommand::PlaceMarket {
            trader: TraderId::from_name("b"),
            market: MarketId::from_name("R"),
            side: Side::Sell,
            size: base(6),
            max_slippage_bps: Some(500),
        },
        ReplayCommand::MarkPriceOverride {
            market: MarketId::from_name("R"),
            mark: px(11),
        },
    ];

    let first = Exchange::new();
    apply_all(&first, &commands).unwrap();
    let second = Exchange::new();
    apply_all(&second, &commands).unwrap();

    let a = TraderId::from_name("a");
    let market = MarketId::from_name("R");
    assert_eq!(
        first.position(a, market).map(|p| (p.size, p.entry_price)),
        second.position(a, market).map(|p| (p.size, p.entry_price))
    );
    assert_eq!(
        first.margin_summary(a).available_collateral,
        second.margin_summary(a).available_collateral
    );
    assert_eq!(
        first.history_totals().notional,
        second.history_totals().notional
    );
    assert_eq!(first.mark_price(market).unwrap(), px(11));
    assert_eq!(second.mark_price(market).unwrap(), px(11));
}

#[test]
fn test_depth_and_recent_trades_queries() {
    let exchange = Exchange::new();
    let market = MarketId::from_name("Q-PERP");
    exchange
        .register_market(market, MarketConfig::new("Q-PERP", px(1)))
        .unwrap();
    let a = TraderId::from_name("a");
    let b = TraderId::from_name("b");
    exchange.deposit(a, quote(1_000));
    exchange.deposit(b, quote(1_000));

    exchange
        .place_limit_order(a, market, Side::Buy, px(9), base(3))
        .unwrap();
    exchange
        .place_limit_order(a, market, Side::Buy, px(8), base(2))
        .unwrap();
    exchange
        .place_limit_order(b, market, Side::Sell, px(11), base(4))
        .unwrap();

    let depth = exchange.order_book_depth(market, 2).unwrap();
    assert_eq!(depth.bids.len(), 2);
    assert_eq!(depth.bids[0].price, px(9));
    assert_eq!(depth.asks[0].price, px(11));
    assert!(depth.verify_checksum());
    assert_eq!(exchange.best_bid(market).unwrap(), Some(px(9)));
    assert_eq!(exchange.best_ask(market).unwrap(), Some(px(11)));

    exchange
        .place_limit_order(b, market, Side::Sell, px(9), base(1))
        .unwrap();
    let recent = exchange.recent_trades(market, 10);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].price, px(9));
}

#[test]
fn test_market_order_audit_trail() {
    let exchange = Exchange::new();
    let market = MarketId::from_name("A-PERP");
    exchange
        .register_market(market, MarketConfig::new("A-PERP", px(1)))
        .unwrap();
    let a = TraderId::from_name("a");
    let b = TraderId::from_name("b");
    exchange.deposit(a, quote(100));
    exchange.deposit(b, quote(100));

    exchange
        .place_limit_order(a, market, Side::Sell, px(1), base(4))
        .unwrap();
    let placement = exchange
        .place_market_order(b, market, Side::Buy, base(10), None)
        .unwrap();

    // The sweep's order record is retrievable with its fill state.
    let order = exchange.get_order(placement.order_id).unwrap();
    assert_eq!(order.kind, OrderKind::Market);
    assert_eq!(order.price, None);
    assert_eq!(order.filled, base(4));
    assert_eq!(order.status, OrderStatus::Cancelled);
}
