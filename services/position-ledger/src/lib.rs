//! Position ledger service
//!
//! Consumes executions emitted by the matching engine and keeps the
//! per-trader accounting: net position, cash, weighted-average entry
//! price, and realized PnL. Accounting happens strictly after matching;
//! the ledger never feeds back into order placement.

pub mod ledger;

pub use ledger::PositionLedger;
