//! Opaque identifiers for traders, markets, orders, and trades.
//!
//! Traders and markets are addressed by 32-byte keys so the core stays
//! agnostic about whatever identity scheme the edge uses (an address, a
//! public key, a hash of an account name). Order and trade ids are
//! venue-wide monotonic counters assigned at placement time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

macro_rules! key32 {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// The all-zero key, used as an anonymous placeholder.
            #[must_use]
            pub const fn zero() -> Self {
                Self([0u8; 32])
            }

            /// Build a key from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Derive a key from a human-readable label by hashing it with
            /// SHA-256. Handy in tests and demo tooling; production edges
            /// will usually carry real 32-byte identities.
            #[must_use]
            pub fn from_name(name: &str) -> Self {
                let mut hasher = Sha256::new();
                hasher.update(name.as_bytes());
                Self(hasher.finalize().into())
            }

            /// Raw bytes of the key.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Print a short hex prefix; full keys are noisy in logs.
                for byte in &self.0[..8] {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "..")
            }
        }
    };
}

key32!(
    /// Identity of a trader. Owns one collateral account in the vault and
    /// at most one position per market.
    TraderId
);

key32!(
    /// Identity of a market. Each market owns an independent order book,
    /// mark price, and active-trader set.
    MarketId
);

/// Identifier of an order, unique and monotonically increasing across the
/// whole venue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a trade, unique and monotonically increasing across the
/// whole venue.
pub type TradeId = u64;
