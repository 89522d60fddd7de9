//! Deterministic liquidation sizing
//!
//! When a trader breaches maintenance margin, the close quantity is
//! sized so the remaining position fits back inside initial margin:
//! `target_abs = floor(equity / (mark * initial_margin_rate))`. Sizing
//! against the initial rate (not the maintenance rate) leaves headroom,
//! so a successful partial close does not immediately re-breach.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use types::order::{OrderType, Side};
use types::position::PositionSnapshot;

use crate::margin::RiskEngine;

/// An internally generated forced-close order.
///
/// Always a market order: liquidation takes whatever liquidity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationOrder {
    pub side: Side,
    pub order_type: OrderType,
    pub qty: i64,
}

impl RiskEngine {
    /// Quantity that must be closed to restore margin health.
    ///
    /// Returns 0 when the trader is flat or not in breach. Returns the
    /// full position when equity or the mark is non-positive (nothing
    /// can be supported). Otherwise the result is clamped into
    /// `[1, |position|]`, with at least one unit of progress even when
    /// rounding says the target position is not below the current one.
    pub fn required_liquidation_qty(&self, snapshot: &PositionSnapshot, mark: Decimal) -> i64 {
        let abs_pos = snapshot.position.abs();
        if abs_pos == 0 || !self.maintenance_breached(snapshot, mark) {
            return 0;
        }

        let equity = self.account_equity(snapshot, mark);
        if equity <= Decimal::ZERO || mark <= Decimal::ZERO {
            return abs_pos;
        }

        let denominator = mark * self.config().initial_margin_rate;
        if denominator <= Decimal::ZERO {
            return abs_pos;
        }

        let target_abs = (equity / denominator)
            .floor()
            .to_i64()
            .unwrap_or(0)
            .max(0);
        if target_abs >= abs_pos {
            // Breached but rounding found no smaller target: still make
            // one unit of progress.
            return 1;
        }

        (abs_pos - target_abs).clamp(1, abs_pos)
    }

    /// Build the forced-close order for a breached trader.
    ///
    /// Returns None when no liquidation is required.
    pub fn build_liquidation_order(
        &self,
        snapshot: &PositionSnapshot,
        mark: Decimal,
    ) -> Option<LiquidationOrder> {
        let qty = self.required_liquidation_qty(snapshot, mark);
        if qty == 0 {
            return None;
        }
        let side = if snapshot.position > 0 {
            Side::Sell
        } else {
            Side::Buy
        };
        Some(LiquidationOrder {
            side,
            order_type: OrderType::Market,
            qty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::TraderId;

    fn snapshot(position: i64, cash: i64, avg_entry: u64) -> PositionSnapshot {
        PositionSnapshot {
            position,
            cash: Decimal::from(cash),
            avg_entry_price: Decimal::from(avg_entry),
            ..PositionSnapshot::flat(TraderId::from("trader_1"))
        }
    }

    #[test]
    fn test_no_liquidation_when_healthy() {
        let risk = RiskEngine::default();
        let snapshot = snapshot(10, -1_000, 100);
        assert_eq!(risk.required_liquidation_qty(&snapshot, Decimal::from(100)), 0);
        assert!(risk
            .build_liquidation_order(&snapshot, Decimal::from(100))
            .is_none());
    }

    #[test]
    fn test_progressive_quantity_restores_initial_margin() {
        let risk = RiskEngine::default();
        // Long 90 @ 100, mark 95: equity 550, requirement 855.
        // target_abs = floor(550 / (95 * 0.20)) = 28, qty = 90 - 28 = 62.
        let snapshot = snapshot(90, -9_000, 100);
        let mark = Decimal::from(95);
        assert_eq!(risk.required_liquidation_qty(&snapshot, mark), 62);

        let order = risk.build_liquidation_order(&snapshot, mark).unwrap();
        assert_eq!(
            order,
            LiquidationOrder {
                side: Side::Sell,
                order_type: OrderType::Market,
                qty: 62,
            }
        );
    }

    #[test]
    fn test_short_position_liquidates_with_buy() {
        let risk = RiskEngine::default();
        let snapshot = snapshot(-90, 9_000, 100);

        // Mark 205: equity = 10000 + 9000 - 9450 = 9550, requirement
        // 90 * 205 * 0.10 = 1845 -> still healthy.
        assert!(!risk.maintenance_breached(&snapshot, Decimal::from(205)));

        // Mark 300: equity = 19000 - 18000 = 1000, requirement 2700 -> breach.
        let mark = Decimal::from(300);
        assert!(risk.maintenance_breached(&snapshot, mark));
        let order = risk.build_liquidation_order(&snapshot, mark).unwrap();
        assert_eq!(order.side, Side::Buy);
        // target_abs = floor(1000 / (300 * 0.20)) = 16, qty = 90 - 16 = 74.
        assert_eq!(order.qty, 74);
    }

    #[test]
    fn test_negative_equity_closes_everything() {
        let risk = RiskEngine::default();
        // Long 90 @ 100 with the mark collapsed to 80:
        // equity = 10000 - 9000 - 1800 = -800.
        let snapshot = snapshot(90, -9_000, 100);
        let mark = Decimal::from(80);
        assert_eq!(risk.required_liquidation_qty(&snapshot, mark), 90);
    }

    #[test]
    fn test_minimum_one_unit_of_progress() {
        let risk = RiskEngine::default();
        // A one-unit position just under its requirement of 10:
        // equity = 10000 - 9991 = 9, target_abs floors to 0, qty = 1.
        let snapshot = snapshot(1, -9_991, 100);
        let mark = Decimal::from(100);
        assert!(risk.maintenance_breached(&snapshot, mark));
        assert_eq!(risk.required_liquidation_qty(&snapshot, mark), 1);
    }

    #[test]
    fn test_quantity_clamped_to_position() {
        let risk = RiskEngine::default();
        let snapshot = snapshot(5, -9_999, 100);
        let mark = Decimal::from(100);
        let qty = risk.required_liquidation_qty(&snapshot, mark);
        assert!(qty >= 1 && qty <= 5);
    }
}
