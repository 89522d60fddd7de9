//! Deterministic position and PnL accounting
//!
//! Fill application covers three regimes: adding in the same direction
//! (weighted-average entry), reducing or closing (realizes PnL against
//! the average entry), and crossing through zero (the residual reopens
//! at the trade price). Cash tracks execution notionals only; there is
//! no margin hold and no starting-capital baseline at this layer.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::ids::TraderId;
use types::numeric::{round4, Price};
use types::order::Side;
use types::position::PositionSnapshot;
use types::trade::Trade;

#[derive(Debug, Clone)]
struct Position {
    position: i64,
    cash: Decimal,
    avg_entry_price: Decimal,
    realized_pnl: Decimal,
    last_trade_price: Decimal,
}

impl Position {
    fn flat() -> Self {
        Self {
            position: 0,
            cash: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            last_trade_price: Decimal::ZERO,
        }
    }
}

/// Per-trader accounting over executed trades.
///
/// Iteration over traders is always in sorted id order.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: BTreeMap<TraderId, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
        }
    }

    /// Apply one execution to both counterparties.
    pub fn apply_trade(&mut self, trade: &Trade) {
        let buyer = trade.buyer().clone();
        let seller = trade.seller().clone();
        self.apply_fill(&buyer, Side::Buy, trade.price, trade.qty);
        self.apply_fill(&seller, Side::Sell, trade.price, trade.qty);
    }

    /// Apply a single fill to one trader.
    pub fn apply_fill(&mut self, trader_id: &TraderId, side: Side, price: Price, qty: i64) {
        debug_assert!(qty >= 1, "fill quantity must be >= 1");
        let price = price.as_decimal();
        let state = self
            .positions
            .entry(trader_id.clone())
            .or_insert_with(Position::flat);

        let old_pos = state.position;
        let delta = side.sign() * qty;
        let new_pos = old_pos + delta;

        // Cash always moves by the execution notional.
        let notional = price * Decimal::from(qty);
        state.cash = round4(match side {
            Side::Buy => state.cash - notional,
            Side::Sell => state.cash + notional,
        });
        state.last_trade_price = round4(price);

        if old_pos == 0 {
            state.position = new_pos;
            state.avg_entry_price = if new_pos != 0 { round4(price) } else { Decimal::ZERO };
            return;
        }

        if old_pos.signum() == delta.signum() {
            // Same-direction add: weighted average entry price.
            let old_abs = Decimal::from(old_pos.abs());
            let add_abs = Decimal::from(qty);
            let weighted =
                (state.avg_entry_price * old_abs + price * add_abs) / (old_abs + add_abs);
            state.position = new_pos;
            state.avg_entry_price = round4(weighted);
            return;
        }

        // Reduce, close, or cross through zero: realize against avg entry.
        let close_qty = Decimal::from(old_pos.abs().min(qty));
        let realized_delta = if old_pos > 0 {
            (price - state.avg_entry_price) * close_qty
        } else {
            (state.avg_entry_price - price) * close_qty
        };
        state.realized_pnl = round4(state.realized_pnl + realized_delta);

        state.position = new_pos;
        if new_pos == 0 {
            state.avg_entry_price = Decimal::ZERO;
        } else if old_pos.signum() != new_pos.signum() {
            // Crossed zero: the residual opens at this trade price.
            state.avg_entry_price = round4(price);
        }
        // Still same sign after a reduction: avg entry unchanged.
    }

    /// Non-mutating snapshot; unknown traders read as flat.
    pub fn snapshot(&self, trader_id: &TraderId) -> PositionSnapshot {
        match self.positions.get(trader_id) {
            None => PositionSnapshot::flat(trader_id.clone()),
            Some(state) => {
                let unrealized = Self::unrealized_at(state, state.last_trade_price);
                PositionSnapshot {
                    trader_id: trader_id.clone(),
                    position: state.position,
                    cash: state.cash,
                    avg_entry_price: state.avg_entry_price,
                    realized_pnl: state.realized_pnl,
                    last_trade_price: state.last_trade_price,
                    unrealized_pnl: unrealized,
                    total_pnl: round4(state.realized_pnl + unrealized),
                }
            }
        }
    }

    /// Unrealized PnL at an explicit mark price.
    pub fn unrealized_pnl(&self, trader_id: &TraderId, mark: Price) -> Decimal {
        match self.positions.get(trader_id) {
            None => Decimal::ZERO,
            Some(state) => Self::unrealized_at(state, mark.as_decimal()),
        }
    }

    /// Ledger equity at a mark: cash plus unrealized PnL.
    ///
    /// Account equity (with the starting-capital baseline) is the risk
    /// layer's concern, not the ledger's.
    pub fn equity(&self, trader_id: &TraderId, mark: Price) -> Decimal {
        let snapshot = self.snapshot(trader_id);
        round4(snapshot.cash + self.unrealized_pnl(trader_id, mark))
    }

    /// Flatten every non-zero position at `mark`, in sorted trader order,
    /// through the regular fill path so realized PnL and cash stay
    /// consistent. Returns the traders that were flattened.
    pub fn force_flatten(&mut self, mark: Price) -> Vec<TraderId> {
        let to_close: Vec<(TraderId, i64)> = self
            .positions
            .iter()
            .filter(|(_, state)| state.position != 0)
            .map(|(id, state)| (id.clone(), state.position))
            .collect();

        for (trader_id, position) in &to_close {
            let close_side = if *position > 0 { Side::Sell } else { Side::Buy };
            self.apply_fill(trader_id, close_side, mark, position.abs());
        }

        to_close.into_iter().map(|(id, _)| id).collect()
    }

    /// Every known trader id, sorted.
    pub fn trader_ids(&self) -> Vec<TraderId> {
        self.positions.keys().cloned().collect()
    }

    /// Snapshots for every known trader, sorted by trader id.
    pub fn all_snapshots(&self) -> Vec<PositionSnapshot> {
        self.positions
            .keys()
            .map(|id| self.snapshot(id))
            .collect()
    }

    pub fn reset(&mut self) {
        self.positions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn unrealized_at(state: &Position, mark: Decimal) -> Decimal {
        if state.position == 0 {
            return Decimal::ZERO;
        }
        round4(Decimal::from(state.position) * (mark - state.avg_entry_price))
    }
}
