//! Margin configuration and pre-trade validation
//!
//! Account equity is the ledger view plus the starting-capital
//! baseline: `starting_capital + cash + unrealized(mark)`. Comparisons
//! carry a small epsilon so a trader at exactly the requirement is not
//! rejected on representation noise.

use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use types::errors::RejectReason;
use types::numeric::round4;
use types::order::{OrderRequest, OrderType};
use types::position::PositionSnapshot;

/// Margin parameters, immutable after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginConfig {
    pub starting_capital: Decimal,
    pub initial_margin_rate: Decimal,
    pub maintenance_margin_rate: Decimal,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            starting_capital: Decimal::from(10_000),
            initial_margin_rate: Decimal::new(20, 2),
            maintenance_margin_rate: Decimal::new(10, 2),
        }
    }
}

/// Pre-trade margin rejections.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarginError {
    #[error("reference price must be positive (mark={mark_price})")]
    InvalidPriceReference { mark_price: Decimal },

    #[error("initial margin insufficient: equity {equity} < required {required_margin}")]
    InitialMarginInsufficient {
        equity: Decimal,
        required_margin: Decimal,
    },
}

impl MarginError {
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            MarginError::InvalidPriceReference { .. } => RejectReason::InvalidPriceReference,
            MarginError::InitialMarginInsufficient { .. } => {
                RejectReason::InitialMarginInsufficient
            }
        }
    }

    /// Structured details for the rejection payload.
    pub fn details(&self) -> serde_json::Value {
        match self {
            MarginError::InvalidPriceReference { mark_price } => {
                json!({ "mark_price": mark_price })
            }
            MarginError::InitialMarginInsufficient {
                equity,
                required_margin,
            } => json!({ "equity": equity, "required_margin": required_margin }),
        }
    }
}

/// Pure margin checks and liquidation sizing over position snapshots.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    config: MarginConfig,
}

impl RiskEngine {
    pub fn new(config: MarginConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarginConfig {
        &self.config
    }

    /// Tolerance for margin comparisons.
    pub(crate) fn epsilon() -> Decimal {
        Decimal::new(1, 9)
    }

    /// Account equity at a mark: starting capital + ledger cash +
    /// unrealized PnL.
    pub fn account_equity(&self, snapshot: &PositionSnapshot, mark: Decimal) -> Decimal {
        round4(self.config.starting_capital + snapshot.cash + unrealized_at(snapshot, mark))
    }

    /// Pre-trade initial margin check.
    ///
    /// The reference price is the order's limit price, or the mark for
    /// market orders. Required margin is taken on the projected
    /// position, so reducing orders need less margin than extending
    /// ones.
    pub fn validate_initial_margin(
        &self,
        order: &OrderRequest,
        snapshot: &PositionSnapshot,
        mark: Decimal,
    ) -> Result<(), MarginError> {
        let reference_price = match order.order_type {
            OrderType::Limit => order
                .price
                .map(|p| p.as_decimal())
                .unwrap_or(Decimal::ZERO),
            OrderType::Market => mark,
        };
        if reference_price <= Decimal::ZERO {
            return Err(MarginError::InvalidPriceReference { mark_price: mark });
        }

        let projected = snapshot.position + order.side.sign() * order.qty;
        let required_margin = round4(
            (Decimal::from(projected) * reference_price).abs() * self.config.initial_margin_rate,
        );
        let equity = self.account_equity(snapshot, mark);

        if equity + Self::epsilon() < required_margin {
            return Err(MarginError::InitialMarginInsufficient {
                equity,
                required_margin,
            });
        }
        Ok(())
    }

    /// Maintenance margin requirement at a mark. Zero when flat.
    pub fn maintenance_requirement(&self, snapshot: &PositionSnapshot, mark: Decimal) -> Decimal {
        round4(
            (Decimal::from(snapshot.position) * mark).abs() * self.config.maintenance_margin_rate,
        )
    }

    /// Whether the trader has breached maintenance margin at `mark`.
    pub fn maintenance_breached(&self, snapshot: &PositionSnapshot, mark: Decimal) -> bool {
        if snapshot.position == 0 {
            return false;
        }
        let equity = self.account_equity(snapshot, mark);
        equity + Self::epsilon() < self.maintenance_requirement(snapshot, mark)
    }
}

pub(crate) fn unrealized_at(snapshot: &PositionSnapshot, mark: Decimal) -> Decimal {
    if snapshot.position == 0 {
        return Decimal::ZERO;
    }
    round4(Decimal::from(snapshot.position) * (mark - snapshot.avg_entry_price))
}
