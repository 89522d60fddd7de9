//! Matching engine service
//!
//! A deterministic FIFO matcher over a two-sided price ladder with
//! self-match prevention. Single-threaded by design: the exchange core
//! task is the only caller, all ids come from monotonic counters, and
//! the price indexes are ordered structures, so identical input
//! sequences replay to identical outputs.

pub mod book;
pub mod engine;

pub use book::{BookSnapshot, OrderBook, RestingOrder};
pub use engine::{ExecutionResult, MatchingEngine};
