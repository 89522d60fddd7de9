//! Outbound event messages
//!
//! Tagged variants for everything the exchange emits: per-order
//! responses on the gateway plus the broadcast feed on the event stream.
//! Serialization shapes are part of the wire contract, so the tests pin
//! exact JSON field names.

use crate::errors::RejectReason;
use crate::ids::{OrderId, TradeId, TraderId};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reasons attached to `liquidation` notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationReason {
    MaintenanceMarginBreach,
    MaintenanceMarginBreachForceFlatten,
    Bankruptcy,
}

/// One row of a `session_end` / `tournament_complete` leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub rank: u32,
    pub trader_id: TraderId,
    pub pnl: Decimal,
}

/// Every message the exchange can emit.
///
/// `OrderAccepted`/`OrderRejected` go to the submitting connection only;
/// the rest are broadcast on the event stream. Monetary fields are
/// rounded to 4 decimal places before an event is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeEvent {
    OrderAccepted {
        order_id: OrderId,
        trader_id: TraderId,
        client_order_id: Option<String>,
        timestamp: u64,
    },
    OrderRejected {
        reason: RejectReason,
        details: serde_json::Value,
        trader_id: Option<TraderId>,
        client_order_id: Option<String>,
        timestamp: u64,
    },
    Trade {
        trade_id: TradeId,
        price: Decimal,
        qty: i64,
        buy_trader_id: TraderId,
        sell_trader_id: TraderId,
        timestamp: u64,
    },
    BookUpdate {
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
        bids: Vec<(Decimal, i64)>,
        asks: Vec<(Decimal, i64)>,
        timestamp: u64,
    },
    PositionUpdate {
        trader_id: TraderId,
        position: i64,
        cash: Decimal,
        avg_entry_price: Decimal,
        realized_pnl: Decimal,
        unrealized_pnl: Decimal,
        total_equity: Decimal,
        mark_price: Decimal,
        timestamp: u64,
    },
    Liquidation {
        trader_id: TraderId,
        reason: LiquidationReason,
        qty: i64,
        side: Side,
        timestamp: u64,
    },
    SessionStart {
        round: u64,
        duration_seconds: u64,
    },
    SessionEnd {
        round: u64,
        mark_price: Decimal,
        rankings: Vec<RankingRow>,
    },
    TournamentComplete {
        rounds_completed: u32,
        total_rounds: u32,
        rankings: Vec<RankingRow>,
    },
    Welcome {
        trader_id: TraderId,
        symbol: String,
        session_round: u64,
        session_active: bool,
        session_duration_seconds: u64,
        session_remaining_seconds: Decimal,
    },
}

impl ExchangeEvent {
    /// Stable tag string, mirrors the serialized `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeEvent::OrderAccepted { .. } => "order_accepted",
            ExchangeEvent::OrderRejected { .. } => "order_rejected",
            ExchangeEvent::Trade { .. } => "trade",
            ExchangeEvent::BookUpdate { .. } => "book_update",
            ExchangeEvent::PositionUpdate { .. } => "position_update",
            ExchangeEvent::Liquidation { .. } => "liquidation",
            ExchangeEvent::SessionStart { .. } => "session_start",
            ExchangeEvent::SessionEnd { .. } => "session_end",
            ExchangeEvent::TournamentComplete { .. } => "tournament_complete",
            ExchangeEvent::Welcome { .. } => "welcome",
        }
    }
}
