//! Risk engine service
//!
//! Pure margin mathematics over position snapshots: pre-trade initial
//! margin validation, maintenance breach detection, and deterministic
//! liquidation sizing. Nothing here mutates exchange state or touches
//! matching internals; the orchestrator feeds snapshots in and acts on
//! the verdicts.

pub mod liquidation;
pub mod margin;

pub use liquidation::LiquidationOrder;
pub use margin::{MarginConfig, MarginError, RiskEngine};
