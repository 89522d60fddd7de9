//! Round and tournament lifecycle state
//!
//! A session is one timed trading window; a tournament is a fixed
//! number of sessions with cumulative scoring. Round deadlines live on
//! the monotonic clock so wall-clock adjustments cannot stretch or
//! shrink a round.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use types::events::RankingRow;
use types::ids::TraderId;
use types::numeric::round4;

/// Timed round state.
#[derive(Debug, Clone)]
pub struct SessionState {
    round_id: u64,
    duration: Duration,
    active: bool,
    ends_at: Instant,
}

impl SessionState {
    pub fn new(duration: Duration) -> Self {
        Self {
            round_id: 0,
            duration,
            active: false,
            ends_at: Instant::now(),
        }
    }

    /// Begin the next round. Returns the new round id.
    pub fn start(&mut self, now: Instant) -> u64 {
        self.round_id += 1;
        self.active = true;
        self.ends_at = now + self.duration;
        self.round_id
    }

    /// Close the current round.
    pub fn end(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration.as_secs()
    }

    pub fn ends_at(&self) -> Instant {
        self.ends_at
    }

    /// Orders are accepted only while the round is active and the
    /// deadline has not passed.
    pub fn is_order_window_open(&self, now: Instant) -> bool {
        self.active && now < self.ends_at
    }

    /// Seconds until the round deadline, rounded to 4 decimals; zero
    /// when idle or past the deadline.
    pub fn remaining_seconds(&self, now: Instant) -> Decimal {
        if !self.active || now >= self.ends_at {
            return Decimal::ZERO;
        }
        let remaining = self.ends_at - now;
        round4(Decimal::from(remaining.as_millis() as u64) / Decimal::from(1000))
    }
}

/// Cumulative tournament scoring across rounds.
///
/// Recording is idempotent per round id: replaying a round's results
/// changes neither the history length nor the cumulative score.
#[derive(Debug, Clone)]
pub struct TournamentState {
    total_rounds: u32,
    recorded_rounds: BTreeSet<u64>,
    cumulative_pnl: BTreeMap<TraderId, Decimal>,
}

impl TournamentState {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            total_rounds,
            recorded_rounds: BTreeSet::new(),
            cumulative_pnl: BTreeMap::new(),
        }
    }

    /// Fold one round's rankings into the cumulative score.
    ///
    /// Returns false (and changes nothing) for a duplicate round id.
    pub fn record_round(&mut self, round_id: u64, rankings: &[RankingRow]) -> bool {
        if round_id == 0 || !self.recorded_rounds.insert(round_id) {
            return false;
        }
        for row in rankings {
            let entry = self
                .cumulative_pnl
                .entry(row.trader_id.clone())
                .or_insert(Decimal::ZERO);
            *entry = round4(*entry + row.pnl);
        }
        true
    }

    pub fn rounds_completed(&self) -> u32 {
        self.recorded_rounds.len() as u32
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn is_complete(&self) -> bool {
        self.rounds_completed() >= self.total_rounds
    }

    /// Cumulative standings: PnL descending, trader id ascending.
    pub fn cumulative_rankings(&self) -> Vec<RankingRow> {
        let mut rows: Vec<(&TraderId, &Decimal)> = self.cumulative_pnl.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        rows.into_iter()
            .enumerate()
            .map(|(idx, (trader_id, pnl))| RankingRow {
                rank: idx as u32 + 1,
                trader_id: trader_id.clone(),
                pnl: round4(*pnl),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(trader: &str, pnl: i64) -> RankingRow {
        RankingRow {
            rank: 0,
            trader_id: TraderId::from(trader),
            pnl: Decimal::from(pnl),
        }
    }

    #[test]
    fn test_session_round_ids_are_monotonic() {
        let mut session = SessionState::new(Duration::from_secs(60));
        assert!(!session.is_active());

        let now = Instant::now();
        assert_eq!(session.start(now), 1);
        assert!(session.is_active());
        session.end();
        assert_eq!(session.start(now), 2);
    }

    #[test]
    fn test_order_window() {
        let mut session = SessionState::new(Duration::from_secs(60));
        let now = Instant::now();
        assert!(!session.is_order_window_open(now));

        session.start(now);
        assert!(session.is_order_window_open(now));
        assert!(session.is_order_window_open(now + Duration::from_secs(59)));
        assert!(!session.is_order_window_open(now + Duration::from_secs(60)));

        session.end();
        assert!(!session.is_order_window_open(now));
    }

    #[test]
    fn test_remaining_seconds() {
        let mut session = SessionState::new(Duration::from_secs(60));
        let now = Instant::now();
        session.start(now);

        let remaining = session.remaining_seconds(now + Duration::from_millis(30_500));
        assert_eq!(remaining, Decimal::new(295, 1));
        assert_eq!(
            session.remaining_seconds(now + Duration::from_secs(61)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_tournament_accumulates_rounds() {
        let mut tournament = TournamentState::new(3);
        assert!(tournament.record_round(1, &[row("b", 10), row("a", -10)]));
        assert!(tournament.record_round(2, &[row("a", 25), row("b", -5)]));

        assert_eq!(tournament.rounds_completed(), 2);
        assert!(!tournament.is_complete());

        let rankings = tournament.cumulative_rankings();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].trader_id, TraderId::from("a"));
        assert_eq!(rankings[0].pnl, Decimal::from(15));
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[1].trader_id, TraderId::from("b"));
        assert_eq!(rankings[1].pnl, Decimal::from(5));
    }

    #[test]
    fn test_duplicate_round_is_idempotent() {
        let mut tournament = TournamentState::new(2);
        assert!(tournament.record_round(1, &[row("a", 7)]));
        assert!(!tournament.record_round(1, &[row("a", 7)]));

        assert_eq!(tournament.rounds_completed(), 1);
        assert_eq!(
            tournament.cumulative_rankings()[0].pnl,
            Decimal::from(7)
        );
    }

    #[test]
    fn test_ties_break_by_trader_id() {
        let mut tournament = TournamentState::new(1);
        tournament.record_round(1, &[row("zed", 5), row("abe", 5)]);

        let rankings = tournament.cumulative_rankings();
        assert_eq!(rankings[0].trader_id, TraderId::from("abe"));
        assert_eq!(rankings[1].trader_id, TraderId::from("zed"));
    }

    #[test]
    fn test_completion() {
        let mut tournament = TournamentState::new(2);
        tournament.record_round(1, &[]);
        assert!(!tournament.is_complete());
        tournament.record_round(2, &[]);
        assert!(tournament.is_complete());
    }
}
