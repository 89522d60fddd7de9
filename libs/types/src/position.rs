//! Position snapshot types
//!
//! The ledger owns mutable position state; the rest of the system sees
//! read-only snapshots. Pre-trade risk checks consume snapshots so
//! validation stays side-effect free.

use crate::ids::TraderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Read-only view of a trader's ledger entry.
///
/// `cash` is the cumulative execution notional only (starts at zero; no
/// margin hold and no starting-capital baseline). `avg_entry_price` is
/// zero exactly when `position` is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub trader_id: TraderId,
    pub position: i64,
    pub cash: Decimal,
    pub avg_entry_price: Decimal,
    pub realized_pnl: Decimal,
    pub last_trade_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
}

impl PositionSnapshot {
    /// An empty snapshot for a trader the ledger has never seen.
    pub fn flat(trader_id: TraderId) -> Self {
        Self {
            trader_id,
            position: 0,
            cash: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            last_trade_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            total_pnl: Decimal::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position == 0
    }
}
