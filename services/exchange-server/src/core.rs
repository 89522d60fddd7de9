//! Exchange core: the single-writer state machine
//!
//! Owns the matching engine, position ledger, risk engine, per-trader
//! account flags, and the session/tournament state. Every method here
//! runs to completion without suspension; the actor task calls them one
//! command at a time, which is what makes the whole exchange
//! deterministic for a given command order.

use matching_engine::MatchingEngine;
use position_ledger::PositionLedger;
use risk_engine::{MarginConfig, RiskEngine};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{info, warn};
use types::errors::RejectReason;
use types::events::{ExchangeEvent, LiquidationReason, RankingRow};
use types::ids::TraderId;
use types::numeric::{round4, Price};
use types::order::{OrderRequest, OrderType, Side};
use types::time::utc_ms;
use types::trade::Trade;
use types::SYMBOL;

use crate::config::ExchangeConfig;
use crate::session::{SessionState, TournamentState};

/// Result of one order submission: the reply for the submitter plus the
/// broadcast burst for subscribers, in emission order.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub accepted: bool,
    pub response: ExchangeEvent,
    pub events: Vec<ExchangeEvent>,
}

/// Per-trader account flags, owned by the core.
#[derive(Debug, Clone, Default)]
struct AccountState {
    frozen_until_ms: u64,
    in_liquidation: bool,
    bankrupt: bool,
}

/// The exchange state machine.
pub struct ExchangeCore {
    config: ExchangeConfig,
    engine: MatchingEngine,
    ledger: PositionLedger,
    risk: RiskEngine,
    session: SessionState,
    tournament: TournamentState,
    accounts: BTreeMap<TraderId, AccountState>,
    last_trade_mark: Option<Price>,
    next_trader_seq: u64,
    shutting_down: bool,
}

impl ExchangeCore {
    pub fn new(config: ExchangeConfig) -> Self {
        let margin = MarginConfig {
            starting_capital: config.starting_capital,
            initial_margin_rate: config.initial_margin_rate,
            maintenance_margin_rate: config.maintenance_margin_rate,
        };
        let session = SessionState::new(std::time::Duration::from_secs(config.round_duration_secs));
        let tournament = TournamentState::new(config.total_rounds);
        Self {
            config,
            engine: MatchingEngine::new(),
            ledger: PositionLedger::new(),
            risk: RiskEngine::new(margin),
            session,
            tournament,
            accounts: BTreeMap::new(),
            last_trade_mark: None,
            next_trader_seq: 0,
            shutting_down: false,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn tournament(&self) -> &TournamentState {
        &self.tournament
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn is_bankrupt(&self, trader_id: &TraderId) -> bool {
        self.accounts
            .get(trader_id)
            .is_some_and(|account| account.bankrupt)
    }

    // ── Connections ──────────────────────────────────────────────────

    /// Assign a trader id to a new gateway connection and describe the
    /// live round state to it.
    pub fn connect_trader(&mut self) -> ExchangeEvent {
        self.next_trader_seq += 1;
        let trader_id = TraderId::new(format!("trader_{}", self.next_trader_seq));
        info!(trader = %trader_id, "trader connected");
        ExchangeEvent::Welcome {
            trader_id,
            symbol: SYMBOL.to_string(),
            session_round: self.session.round_id(),
            session_active: self.session.is_active(),
            session_duration_seconds: self.session.duration_seconds(),
            session_remaining_seconds: self.session.remaining_seconds(Instant::now()),
        }
    }

    // ── Mark price resolution ────────────────────────────────────────

    /// Mark for margin checks and position marking: the midpoint when
    /// both sides quote, else the last trade, else a one-sided book,
    /// else the configured fallback.
    pub fn mark_price(&self) -> Price {
        let fallback = self.config.mark_fallback_price;
        match (self.engine.best_bid(), self.engine.best_ask()) {
            (Some(bid), Some(ask)) => {
                let mid = round4((bid.as_decimal() + ask.as_decimal()) / Decimal::from(2));
                Price::try_new(mid).unwrap_or(fallback)
            }
            (bid, ask) => self.last_trade_mark.or(bid).or(ask).unwrap_or(fallback),
        }
    }

    /// Settlement mark at round end: midpoint, else the available side,
    /// else the last trade, else the configured fallback.
    fn session_mark(&self) -> Price {
        let fallback = self.config.mark_fallback_price;
        match (self.engine.best_bid(), self.engine.best_ask()) {
            (Some(bid), Some(ask)) => {
                let mid = round4((bid.as_decimal() + ask.as_decimal()) / Decimal::from(2));
                Price::try_new(mid).unwrap_or(fallback)
            }
            (Some(bid), None) => bid,
            (None, Some(ask)) => ask,
            (None, None) => self.last_trade_mark.unwrap_or(fallback),
        }
    }

    // ── Order pipeline ───────────────────────────────────────────────

    /// Full per-order pipeline: policy gates, margin precheck, matching,
    /// ledger application, event construction, maintenance scan, and
    /// any progressive liquidations it triggers.
    pub fn submit_order(&mut self, order: &OrderRequest) -> OrderOutcome {
        let now_ms = utc_ms();
        let now = Instant::now();

        if self.shutting_down {
            return self.reject(
                order,
                RejectReason::ExchangeShuttingDown,
                json!({"message": "exchange is shutting down"}),
                now_ms,
            );
        }
        if !self.session.is_order_window_open(now) {
            return self.reject(
                order,
                RejectReason::SessionInactive,
                json!({"message": "order window is closed"}),
                now_ms,
            );
        }
        if let Some(account) = self.accounts.get(&order.trader_id) {
            if account.bankrupt {
                return self.reject(
                    order,
                    RejectReason::AccountBankrupt,
                    json!({"message": "trader is bankrupt and cannot submit orders"}),
                    now_ms,
                );
            }
            if account.in_liquidation || now_ms < account.frozen_until_ms {
                return self.reject(
                    order,
                    RejectReason::AccountFrozen,
                    json!({"message": "trader temporarily frozen during liquidation"}),
                    now_ms,
                );
            }
        }

        let mark = self.mark_price();
        let snapshot = self.ledger.snapshot(&order.trader_id);
        if let Err(err) = self
            .risk
            .validate_initial_margin(order, &snapshot, mark.as_decimal())
        {
            return self.reject(order, err.reject_reason(), err.details(), now_ms);
        }

        let result = match order.order_type {
            OrderType::Limit => match order.price {
                Some(price) => self
                    .engine
                    .execute_limit(&order.trader_id, order.side, price, order.qty),
                // Unreachable for validated requests; rejected rather
                // than trusted.
                None => {
                    return self.reject(
                        order,
                        RejectReason::InvalidMessage,
                        json!({"message": "'price' is required for limit orders"}),
                        now_ms,
                    )
                }
            },
            OrderType::Market => self
                .engine
                .execute_market(&order.trader_id, order.side, order.qty),
        };

        if order.order_type == OrderType::Market && result.trades.is_empty() {
            return self.reject(
                order,
                RejectReason::NoLiquidity,
                json!({"message": "market order could not be filled"}),
                now_ms,
            );
        }

        let mut events = Vec::new();
        let mut touched = BTreeSet::new();
        self.apply_trades(&result.trades, now_ms, &mut events, &mut touched);

        if result.book_changed || !result.trades.is_empty() {
            events.push(self.book_event(now_ms));
        }
        for trader in &touched {
            events.push(self.position_event(trader, now_ms));
        }

        // Maintenance scan: this cycle's trade participants, in sorted
        // order, excluding anyone already frozen, liquidating, or gone.
        let mut breached = Vec::new();
        if !result.trades.is_empty() {
            let mark = self.mark_price().as_decimal();
            for trader in &touched {
                if let Some(account) = self.accounts.get(trader) {
                    if account.bankrupt
                        || account.in_liquidation
                        || now_ms < account.frozen_until_ms
                    {
                        continue;
                    }
                }
                let snapshot = self.ledger.snapshot(trader);
                if self.risk.maintenance_breached(&snapshot, mark) {
                    breached.push(trader.clone());
                }
            }
        }
        for trader in breached {
            let liquidation_events = self.run_liquidation(&trader, now_ms);
            events.extend(liquidation_events);
        }

        let response = ExchangeEvent::OrderAccepted {
            order_id: result.order_id,
            trader_id: order.trader_id.clone(),
            client_order_id: order.client_order_id.clone(),
            timestamp: now_ms,
        };
        OrderOutcome {
            accepted: true,
            response,
            events,
        }
    }

    // ── Liquidation ──────────────────────────────────────────────────

    /// Progressive liquidation for one breached trader.
    ///
    /// Sets the in-liquidation flag and cooldown for the whole run; the
    /// flag is cleared on every exit path.
    pub fn run_liquidation(&mut self, trader_id: &TraderId, now_ms: u64) -> Vec<ExchangeEvent> {
        if self
            .accounts
            .get(trader_id)
            .is_some_and(|account| account.in_liquidation)
        {
            return Vec::new();
        }
        {
            let account = self.accounts.entry(trader_id.clone()).or_default();
            account.in_liquidation = true;
            account.frozen_until_ms = now_ms + self.config.liquidation_cooldown_ms;
        }

        let events = self.liquidation_cycle(trader_id, now_ms);

        if let Some(account) = self.accounts.get_mut(trader_id) {
            account.in_liquidation = false;
        }
        events
    }

    fn liquidation_cycle(&mut self, trader_id: &TraderId, now_ms: u64) -> Vec<ExchangeEvent> {
        let mut events = Vec::new();
        let mut touched = BTreeSet::new();
        let mut any_activity = false;

        let starting_abs = self.ledger.snapshot(trader_id).position.abs();
        if starting_abs == 0 {
            return events;
        }
        // Hard bound against pathological loops; each productive step
        // closes at least one unit.
        let step_bound = 2 * starting_abs;
        let mut steps = 0;

        while steps < step_bound {
            let mark = self.mark_price();
            let snapshot = self.ledger.snapshot(trader_id);
            if snapshot.position == 0
                || !self.risk.maintenance_breached(&snapshot, mark.as_decimal())
            {
                break;
            }
            let Some(liquidation) = self
                .risk
                .build_liquidation_order(&snapshot, mark.as_decimal())
            else {
                break;
            };

            warn!(
                trader = %trader_id,
                qty = liquidation.qty,
                position = snapshot.position,
                "maintenance margin breach: forced close"
            );
            events.push(ExchangeEvent::Liquidation {
                trader_id: trader_id.clone(),
                reason: LiquidationReason::MaintenanceMarginBreach,
                qty: liquidation.qty,
                side: liquidation.side,
                timestamp: now_ms,
            });

            // The trader's own resting liquidity goes first.
            if self.engine.cancel_trader_orders(trader_id) {
                any_activity = true;
                events.push(self.book_event(now_ms));
            }

            let result = self
                .engine
                .execute_market(trader_id, liquidation.side, liquidation.qty);
            if result.trades.is_empty() {
                // No opposing liquidity; the flatten fallback decides.
                break;
            }
            any_activity = true;
            self.apply_trades(&result.trades, now_ms, &mut events, &mut touched);
            steps += 1;
        }

        // Still underwater after the progressive pass: one full-flatten
        // attempt, then the terminal bankruptcy determination.
        let mark = self.mark_price();
        let snapshot = self.ledger.snapshot(trader_id);
        if snapshot.position != 0 && self.risk.maintenance_breached(&snapshot, mark.as_decimal()) {
            let side = if snapshot.position > 0 {
                Side::Sell
            } else {
                Side::Buy
            };
            let qty = snapshot.position.abs();
            events.push(ExchangeEvent::Liquidation {
                trader_id: trader_id.clone(),
                reason: LiquidationReason::MaintenanceMarginBreachForceFlatten,
                qty,
                side,
                timestamp: now_ms,
            });

            let result = self.engine.execute_market(trader_id, side, qty);
            if !result.trades.is_empty() {
                any_activity = true;
                self.apply_trades(&result.trades, now_ms, &mut events, &mut touched);
            }

            let mark = self.mark_price();
            let snapshot = self.ledger.snapshot(trader_id);
            let equity = self.risk.account_equity(&snapshot, mark.as_decimal());
            if snapshot.position == 0 && equity < Decimal::ZERO {
                self.mark_bankrupt(trader_id);
                events.push(ExchangeEvent::Liquidation {
                    trader_id: trader_id.clone(),
                    reason: LiquidationReason::Bankruptcy,
                    qty: 0,
                    side: Side::Sell,
                    timestamp: now_ms,
                });
            } else if snapshot.position != 0
                && self.risk.maintenance_breached(&snapshot, mark.as_decimal())
            {
                self.mark_bankrupt(trader_id);
                events.push(ExchangeEvent::Liquidation {
                    trader_id: trader_id.clone(),
                    reason: LiquidationReason::Bankruptcy,
                    qty: snapshot.position.abs(),
                    side: if snapshot.position > 0 {
                        Side::Sell
                    } else {
                        Side::Buy
                    },
                    timestamp: now_ms,
                });
            }
        }

        if any_activity {
            events.push(self.book_event(now_ms));
            touched.insert(trader_id.clone());
            for trader in &touched {
                events.push(self.position_event(trader, now_ms));
            }
        }
        events
    }

    fn mark_bankrupt(&mut self, trader_id: &TraderId) {
        warn!(trader = %trader_id, "trader is bankrupt");
        self.accounts.entry(trader_id.clone()).or_default().bankrupt = true;
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Begin the next round: fresh window, fresh (already reset) book.
    pub fn start_round(&mut self) -> Vec<ExchangeEvent> {
        let round = self.session.start(Instant::now());
        info!(round, "session started");
        vec![
            ExchangeEvent::SessionStart {
                round,
                duration_seconds: self.session.duration_seconds(),
            },
            self.book_event(utc_ms()),
        ]
    }

    /// React to the round timer. Stale or duplicate expirations (an
    /// interrupt may already have finalized the round) are ignored.
    pub fn handle_round_expiry(&mut self, round_id: u64) -> Vec<ExchangeEvent> {
        if !self.session.is_active() || self.session.round_id() != round_id {
            return Vec::new();
        }
        let mut events = self.end_round();
        if self.tournament.is_complete() {
            events.push(self.tournament_complete_event());
        } else if !self.shutting_down {
            events.extend(self.start_round());
        }
        events
    }

    /// End-of-round settlement: clear the book, flatten every position
    /// at the session mark, rank, emit, reset.
    fn end_round(&mut self) -> Vec<ExchangeEvent> {
        let now_ms = utc_ms();
        let round = self.session.round_id();
        let mark = self.session_mark();
        self.session.end();
        info!(round, mark = %mark, "session ended");

        // Resting liquidity is dropped wholesale; no per-order cancels.
        self.engine.clear_book();
        // Force-flatten settles at the mark, so the mark becomes the
        // last trade price.
        let flattened = self.ledger.force_flatten(mark);
        self.last_trade_mark = Some(mark);

        let mut events = Vec::new();
        for trader in &flattened {
            events.push(self.position_event(trader, now_ms));
        }

        let rankings = self.round_rankings();
        self.tournament.record_round(round, &rankings);
        events.push(ExchangeEvent::SessionEnd {
            round,
            mark_price: mark.as_decimal(),
            rankings,
        });

        self.ledger.reset();
        self.engine.reset();
        self.last_trade_mark = None;
        events
    }

    /// Orderly shutdown: reject-all first, then at most one partial
    /// round finalization, then the final cumulative standings.
    pub fn interrupt(&mut self) -> Vec<ExchangeEvent> {
        info!("interrupt: entering shutdown mode");
        self.shutting_down = true;
        let mut events = Vec::new();
        if self.session.is_active() {
            events.extend(self.end_round());
        }
        events.push(self.tournament_complete_event());
        events
    }

    fn tournament_complete_event(&self) -> ExchangeEvent {
        ExchangeEvent::TournamentComplete {
            rounds_completed: self.tournament.rounds_completed(),
            total_rounds: self.tournament.total_rounds(),
            rankings: self.tournament.cumulative_rankings(),
        }
    }

    /// Round leaderboard: total PnL descending, trader id ascending.
    fn round_rankings(&self) -> Vec<RankingRow> {
        let mut snapshots = self.ledger.all_snapshots();
        snapshots.sort_by(|a, b| {
            b.total_pnl
                .cmp(&a.total_pnl)
                .then_with(|| a.trader_id.cmp(&b.trader_id))
        });
        snapshots
            .into_iter()
            .enumerate()
            .map(|(idx, snapshot)| RankingRow {
                rank: idx as u32 + 1,
                trader_id: snapshot.trader_id,
                pnl: round4(snapshot.total_pnl),
            })
            .collect()
    }

    // ── Event construction ───────────────────────────────────────────

    fn apply_trades(
        &mut self,
        trades: &[Trade],
        now_ms: u64,
        events: &mut Vec<ExchangeEvent>,
        touched: &mut BTreeSet<TraderId>,
    ) {
        for trade in trades {
            self.ledger.apply_trade(trade);
            self.last_trade_mark = Some(trade.price);
            touched.insert(trade.buyer().clone());
            touched.insert(trade.seller().clone());
            events.push(ExchangeEvent::Trade {
                trade_id: trade.trade_id,
                price: trade.price.as_decimal(),
                qty: trade.qty,
                buy_trader_id: trade.buyer().clone(),
                sell_trader_id: trade.seller().clone(),
                timestamp: now_ms,
            });
        }
    }

    fn book_event(&self, now_ms: u64) -> ExchangeEvent {
        let snapshot = self.engine.book_snapshot(self.config.book_depth);
        ExchangeEvent::BookUpdate {
            best_bid: self.engine.best_bid().map(|p| p.as_decimal()),
            best_ask: self.engine.best_ask().map(|p| p.as_decimal()),
            bids: snapshot.bids,
            asks: snapshot.asks,
            timestamp: now_ms,
        }
    }

    fn position_event(&self, trader_id: &TraderId, now_ms: u64) -> ExchangeEvent {
        let snapshot = self.ledger.snapshot(trader_id);
        let mark = self.mark_price();
        let unrealized = self.ledger.unrealized_pnl(trader_id, mark);
        let total_equity = self.risk.account_equity(&snapshot, mark.as_decimal());
        ExchangeEvent::PositionUpdate {
            trader_id: trader_id.clone(),
            position: snapshot.position,
            cash: round4(snapshot.cash),
            avg_entry_price: round4(snapshot.avg_entry_price),
            realized_pnl: round4(snapshot.realized_pnl),
            unrealized_pnl: unrealized,
            total_equity,
            mark_price: mark.as_decimal(),
            timestamp: now_ms,
        }
    }

    fn reject(
        &self,
        order: &OrderRequest,
        reason: RejectReason,
        details: serde_json::Value,
        now_ms: u64,
    ) -> OrderOutcome {
        OrderOutcome {
            accepted: false,
            response: ExchangeEvent::OrderRejected {
                reason,
                details,
                trader_id: Some(order.trader_id.clone()),
                client_order_id: order.client_order_id.clone(),
                timestamp: now_ms,
            },
            events: Vec::new(),
        }
    }
}
