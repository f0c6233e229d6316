//! Margin vault: collateral accounts, pending-order reservations, and net
//! positions with realized/unrealized P&L.

mod account;
mod position;
#[allow(clippy::module_inception)]
mod vault;

pub use account::CollateralAccount;
pub use position::{NettingOutcome, Position};
pub use vault::{FillParty, MarginSummary, MarginVault, PositionDelta};
