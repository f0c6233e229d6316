//! Depth snapshots of an order book.

use super::book::OrderBook;
use crate::ids::MarketId;
use crate::num::{Price, Size};
use crate::utils::current_time_millis;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One aggregated price level in a depth snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Level price.
    pub price: Price,
    /// Total unfilled size resting at the level.
    pub open_size: Size,
}

/// A point-in-time view of the top of an order book.
///
/// Levels are ordered best first on both sides. The checksum covers the
/// level data so an edge consumer can verify a relayed snapshot was not
/// truncated or reordered in transit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDepth {
    /// The market the snapshot belongs to.
    pub market: MarketId,
    /// Capture wall-clock time in milliseconds.
    pub timestamp: u64,
    /// Bid levels, highest price first.
    pub bids: Vec<DepthLevel>,
    /// Ask levels, lowest price first.
    pub asks: Vec<DepthLevel>,
    /// SHA-256 over the ordered level data, hex encoded.
    pub checksum: String,
}

impl BookDepth {
    /// Capture up to `depth` levels per side from `book`.
    #[must_use]
    pub fn capture(book: &OrderBook, depth: usize) -> Self {
        let (bids, asks) = book.depth_levels(depth);
        let bids: Vec<DepthLevel> = bids
            .into_iter()
            .map(|(price, open_size)| DepthLevel { price, open_size })
            .collect();
        let asks: Vec<DepthLevel> = asks
            .into_iter()
            .map(|(price, open_size)| DepthLevel { price, open_size })
            .collect();
        let checksum = Self::compute_checksum(book.market(), &bids, &asks);
        Self {
            market: book.market(),
            timestamp: current_time_millis(),
            bids,
            asks,
            checksum,
        }
    }

    /// Verify the stored checksum against the level data.
    #[must_use]
    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(self.market, &self.bids, &self.asks) == self.checksum
    }

    fn compute_checksum(market: MarketId, bids: &[DepthLevel], asks: &[DepthLevel]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(market.as_bytes());
        for level in bids.iter().chain(asks.iter()) {
            hasher.update(level.price.to_le_bytes());
            hasher.update(level.open_size.to_le_bytes());
        }
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Best bid level, if present.
    #[must_use]
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    /// Best ask level, if present.
    #[must_use]
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }
}
