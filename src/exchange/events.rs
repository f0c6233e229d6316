//! Venue events and event routing.
//!
//! Every state transition emits an [`ExchangeEvent`] to the configured
//! listener, synchronously and in commit order: a trade event always
//! precedes any liquidation side effects of its fill. The routers forward
//! events into std or tokio channels for edges that consume them off the
//! hot path.

use crate::history::{LiquidationRecord, TradeRecord};
use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Price, Quote, Size};
use crate::orderbook::Side;
use crate::vault::PositionDelta;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// A state transition visible to the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExchangeEvent {
    /// An order was accepted (before any matching).
    OrderPlaced {
        /// The new order's id.
        order_id: OrderId,
        /// The owner.
        trader: TraderId,
        /// The market.
        market: MarketId,
        /// Buy or sell.
        side: Side,
        /// Limit price, `None` for market orders.
        price: Option<Price>,
        /// Requested size.
        size: Size,
    },
    /// A trade printed.
    TradeExecuted {
        /// The full trade record.
        record: TradeRecord,
    },
    /// An order was cancelled by its owner.
    OrderCancelled {
        /// The cancelled order's id.
        order_id: OrderId,
        /// The owner.
        trader: TraderId,
        /// The market.
        market: MarketId,
    },
    /// A position changed after a fill.
    PositionUpdated {
        /// Post-fill position state.
        delta: PositionDelta,
    },
    /// A position was force-closed.
    LiquidationExecuted {
        /// The liquidation record.
        record: LiquidationRecord,
    },
    /// A liquidation left a residual loss that was socialized.
    SocializedLossApplied {
        /// The market of the liquidation.
        market: MarketId,
        /// The liquidated trader whose loss is being covered.
        trader: TraderId,
        /// Total residual loss distributed (or recorded as shortfall).
        amount: Quote,
    },
    /// One counterparty's realized P&L was reduced to cover socialized
    /// loss.
    UserLossSocialized {
        /// The market of the liquidation.
        market: MarketId,
        /// The donor whose realized P&L was reduced.
        donor: TraderId,
        /// The donated amount.
        amount: Quote,
    },
    /// A liquidation could not execute (no opposite depth); it stays
    /// pending and will be retried on the next trigger.
    LiquidationDeferred {
        /// The market of the position.
        market: MarketId,
        /// The trader whose close found no liquidity.
        trader: TraderId,
        /// The side the synthetic close needed.
        side: Side,
        /// The size that found no depth.
        requested: Size,
    },
}

/// Listener invoked synchronously for every event, in commit order.
pub type EventListener = Arc<dyn Fn(&ExchangeEvent) + Send + Sync>;

/// Routes venue events into a std mpsc channel and drains them on a
/// processor thread.
pub struct EventRouterStd {
    sender: std::sync::mpsc::Sender<ExchangeEvent>,
    receiver: Option<std::sync::mpsc::Receiver<ExchangeEvent>>,
}

impl EventRouterStd {
    /// Create a router with an unbounded std channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = std::sync::mpsc::channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }

    /// A listener that forwards every event into the router's channel.
    #[must_use]
    pub fn listener(&self) -> EventListener {
        let sender = self.sender.clone();
        Arc::new(move |event: &ExchangeEvent| {
            if let Err(e) = sender.send(event.clone()) {
                error!("failed to forward exchange event: {}", e);
            }
        })
    }

    /// Take the receiving end for custom consumption.
    ///
    /// # Panics
    /// Panics if the receiver was already taken.
    pub fn take_receiver(&mut self) -> std::sync::mpsc::Receiver<ExchangeEvent> {
        self.receiver.take().expect("event receiver already taken")
    }

    /// Drain events on a background thread, logging each one.
    ///
    /// # Panics
    /// Panics if the receiver was already taken.
    pub fn start_processor(&mut self) -> std::thread::JoinHandle<()> {
        let receiver = self.take_receiver();
        std::thread::spawn(move || {
            info!("event processor started");
            while let Ok(event) = receiver.recv() {
                Self::process(&event);
            }
            info!("event processor stopped");
        })
    }

    fn process(event: &ExchangeEvent) {
        match event {
            ExchangeEvent::TradeExecuted { record } => {
                info!(
                    "trade {} in {}: {} @ {}",
                    record.trade_id, record.market, record.size, record.price
                );
            }
            ExchangeEvent::LiquidationExecuted { record } => {
                info!(
                    "liquidation in {}: {} closed {} @ {}",
                    record.market, record.trader, record.size, record.liquidation_price
                );
            }
            other => info!("event: {:?}", other),
        }
    }
}

impl Default for EventRouterStd {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes venue events into a tokio unbounded channel for async edges.
pub struct EventRouterTokio {
    sender: tokio::sync::mpsc::UnboundedSender<ExchangeEvent>,
    receiver: Option<tokio::sync::mpsc::UnboundedReceiver<ExchangeEvent>>,
}

impl EventRouterTokio {
    /// Create a router with an unbounded tokio channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }

    /// A listener that forwards every event into the router's channel.
    #[must_use]
    pub fn listener(&self) -> EventListener {
        let sender = self.sender.clone();
        Arc::new(move |event: &ExchangeEvent| {
            if let Err(e) = sender.send(event.clone()) {
                error!("failed to forward exchange event: {}", e);
            }
        })
    }

    /// Take the receiving end for async consumption.
    ///
    /// # Panics
    /// Panics if the receiver was already taken.
    pub fn take_receiver(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<ExchangeEvent> {
        self.receiver.take().expect("event receiver already taken")
    }
}

impl Default for EventRouterTokio {
    fn default() -> Self {
        Self::new()
    }
}
