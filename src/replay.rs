//! Deterministic command replay.
//!
//! Every state-changing entry point of the venue has a serializable
//! command. Persisting the command stream (an edge concern) and replaying
//! it through [`apply`] reconstructs all venue state: books, positions,
//! collateral, history, and marks. Commands are applied strictly in order;
//! ids assigned during replay match the original run because every counter
//! is driven by the same command sequence.

use crate::exchange::{Exchange, ExchangeError, MarketConfig};
use crate::ids::{MarketId, OrderId, TraderId};
use crate::num::{Price, Quote, Size};
use crate::orderbook::Side;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single state-changing venue command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplayCommand {
    /// Register a market.
    RegisterMarket {
        /// The market id.
        market: MarketId,
        /// The market configuration.
        config: MarketConfig,
    },
    /// Credit collateral.
    Deposit {
        /// The trader.
        trader: TraderId,
        /// The amount in quote-6.
        amount: Quote,
    },
    /// Withdraw collateral.
    Withdraw {
        /// The trader.
        trader: TraderId,
        /// The amount in quote-6.
        amount: Quote,
    },
    /// Place a limit order.
    PlaceLimit {
        /// The trader.
        trader: TraderId,
        /// The market.
        market: MarketId,
        /// Buy or sell.
        side: Side,
        /// Limit price.
        price: Price,
        /// Order size.
        size: Size,
    },
    /// Place a market order.
    PlaceMarket {
        /// The trader.
        trader: TraderId,
        /// The market.
        market: MarketId,
        /// Buy or sell.
        side: Side,
        /// Order size.
        size: Size,
        /// Optional slippage cap in basis points.
        max_slippage_bps: Option<u32>,
    },
    /// Cancel a resting order.
    Cancel {
        /// The owner.
        trader: TraderId,
        /// The order to cancel.
        order_id: OrderId,
    },
    /// Administrative mark override.
    MarkPriceOverride {
        /// The market.
        market: MarketId,
        /// The new mark.
        mark: Price,
    },
    /// Explicit liquidation scan.
    LiquidationScan {
        /// The market to scan.
        market: MarketId,
        /// Optional liquidator identity receiving penalties.
        liquidator: Option<TraderId>,
    },
}

/// Outcome of applying one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplayOutcome {
    /// The command applied cleanly.
    Applied,
    /// An order placement applied; carries the assigned id.
    OrderPlaced {
        /// The id the venue assigned.
        order_id: OrderId,
    },
    /// A liquidation scan applied; carries how many positions were closed.
    Liquidations {
        /// Number of executed liquidations.
        executed: usize,
    },
}

/// Errors from the replay layer.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The underlying venue rejected the command.
    #[error("command {index} rejected: {source}")]
    Rejected {
        /// Zero-based index of the failing command.
        index: usize,
        /// The venue error.
        source: ExchangeError,
    },
    /// The command stream could not be decoded.
    #[error("malformed command stream: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Apply a single command to a venue.
///
/// # Errors
/// Propagates the venue's rejection unchanged.
pub fn apply(exchange: &Exchange, command: &ReplayCommand) -> Result<ReplayOutcome, ExchangeError> {
    match command {
        ReplayCommand::RegisterMarket { market, config } => {
            exchange.register_market(*market, config.clone())?;
            Ok(ReplayOutcome::Applied)
        }
        ReplayCommand::Deposit { trader, amount } => {
            exchange.deposit(*trader, *amount);
            Ok(ReplayOutcome::Applied)
        }
        ReplayCommand::Withdraw { trader, amount } => {
            exchange.withdraw(*trader, *amount)?;
            Ok(ReplayOutcome::Applied)
        }
        ReplayCommand::PlaceLimit {
            trader,
            market,
            side,
            price,
            size,
        } => {
            let placement = exchange.place_limit_order(*trader, *market, *side, *price, *size)?;
            Ok(ReplayOutcome::OrderPlaced {
                order_id: placement.order_id,
            })
        }
        ReplayCommand::PlaceMarket {
            trader,
            market,
            side,
            size,
            max_slippage_bps,
        } => {
            let placement =
                exchange.place_market_order(*trader, *market, *side, *size, *max_slippage_bps)?;
            Ok(ReplayOutcome::OrderPlaced {
                order_id: placement.order_id,
            })
        }
        ReplayCommand::Cancel { trader, order_id } => {
            exchange.cancel_order(*trader, *order_id)?;
            Ok(ReplayOutcome::Applied)
        }
        ReplayCommand::MarkPriceOverride { market, mark } => {
            exchange.override_mark_price(*market, *mark)?;
            Ok(ReplayOutcome::Applied)
        }
        ReplayCommand::LiquidationScan { market, liquidator } => {
            let records = exchange.trigger_liquidation_scan(*market, *liquidator)?;
            Ok(ReplayOutcome::Liquidations {
                executed: records.len(),
            })
        }
    }
}

/// Apply a whole command stream in order, stopping at the first rejection.
///
/// # Errors
/// [`ReplayError::Rejected`] carrying the index of the failing command.
pub fn apply_all(
    exchange: &Exchange,
    commands: &[ReplayCommand],
) -> Result<Vec<ReplayOutcome>, ReplayError> {
    let mut outcomes = Vec::with_capacity(commands.len());
    for (index, command) in commands.iter().enumerate() {
        let outcome =
            apply(exchange, command).map_err(|source| ReplayError::Rejected { index, source })?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Decode a JSON-lines command stream and apply it.
///
/// # Errors
/// [`ReplayError::Malformed`] for undecodable lines,
/// [`ReplayError::Rejected`] for rejected commands.
pub fn apply_json_lines(exchange: &Exchange, stream: &str) -> Result<Vec<ReplayOutcome>, ReplayError> {
    let commands: Vec<ReplayCommand> = stream
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    apply_all(exchange, &commands)
}
