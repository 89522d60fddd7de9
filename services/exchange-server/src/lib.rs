//! Exchange server library
//!
//! Wires the matching engine, position ledger, and risk engine into a
//! single-writer exchange core, adds the round/tournament lifecycle,
//! and exposes two WebSocket endpoints: an order gateway (request ->
//! response) and a broadcast event stream.
//!
//! Concurrency model: exactly one task owns all mutable exchange state.
//! Every mutating entry point (order ingress, round expiry, interrupt)
//! is a command on one channel; processing commands one at a time is
//! the state guard. Subscribers hang off a bounded event queue drained
//! by a separate dispatcher task, so slow consumers never stall
//! matching.

pub mod actor;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod gateway;
pub mod session;
pub mod stream;
