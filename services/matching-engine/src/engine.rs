//! Matching engine core
//!
//! FIFO matcher over the order book. One instance per symbol; the
//! exchange core task is the only caller, so there is no interior
//! locking. Order ids, trade ids, and sequence numbers come from
//! monotonic counters that reset with the book between rounds.

use types::ids::{OrderId, TradeId, TraderId};
use types::numeric::Price;
use types::order::Side;
use types::trade::Trade;

use crate::book::{BookSnapshot, OrderBook, RestingOrder};

/// Result of executing one incoming order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub order_id: OrderId,
    pub trades: Vec<Trade>,
    /// True when an unmatched limit remainder was rested on the book.
    pub rested: bool,
    /// True when the visible book changed (fills or resting).
    pub book_changed: bool,
}

/// Deterministic single-symbol matching engine.
#[derive(Debug)]
pub struct MatchingEngine {
    book: OrderBook,
    next_order_id: u64,
    next_trade_id: u64,
    next_sequence: u64,
    debug: bool,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            book: OrderBook::new(),
            next_order_id: 1,
            next_trade_id: 1,
            next_sequence: 1,
            debug: false,
        }
    }

    /// Engine with per-operation structural validation enabled.
    pub fn with_debug_checks() -> Self {
        Self {
            debug: true,
            ..Self::new()
        }
    }

    /// Execute a limit order: match against crossing opposite liquidity,
    /// then rest any remainder (unless resting would cross the book,
    /// which only happens when all crossing liquidity was self-owned and
    /// skipped by self-match prevention).
    pub fn execute_limit(
        &mut self,
        trader_id: &TraderId,
        side: Side,
        price: Price,
        qty: i64,
    ) -> ExecutionResult {
        self.execute(trader_id, side, Some(price), qty)
    }

    /// Execute a market order: same loop with no price guard. Remainders
    /// are never rested; the caller rejects zero-trade market orders.
    pub fn execute_market(&mut self, trader_id: &TraderId, side: Side, qty: i64) -> ExecutionResult {
        self.execute(trader_id, side, None, qty)
    }

    fn execute(
        &mut self,
        trader_id: &TraderId,
        side: Side,
        limit: Option<Price>,
        qty: i64,
    ) -> ExecutionResult {
        debug_assert!(qty >= 1, "order quantity must be >= 1");
        let order_id = self.allocate_order_id();
        let order_sequence = self.allocate_sequence();

        let mut remaining = qty;
        let mut trades = Vec::new();
        let mut book_changed = false;

        while remaining > 0 {
            let Some(maker) = self.book.next_matchable_opposite(side, limit, trader_id) else {
                break;
            };
            debug_assert_ne!(&maker.trader_id, trader_id, "SMP returned a self-owned maker");

            let fill = remaining.min(maker.remaining_qty);
            self.book.fill_maker(side, &maker, fill);
            remaining -= fill;
            book_changed = true;

            trades.push(Trade {
                trade_id: self.allocate_trade_id(),
                price: maker.price,
                qty: fill,
                maker_order_id: maker.order_id,
                taker_order_id: order_id,
                maker_trader_id: maker.trader_id,
                taker_trader_id: trader_id.clone(),
                aggressor_side: side,
                sequence: self.allocate_sequence(),
            });

            if self.debug {
                self.book.validate();
            }
        }

        // No stale zero-qty levels may survive into best-price checks.
        self.book.compact();

        let mut rested = false;
        if remaining > 0 {
            if let Some(limit_price) = limit {
                if !self.book.has_crossing_opposite(side, limit_price) {
                    self.book.add_resting(
                        side,
                        limit_price,
                        RestingOrder {
                            order_id,
                            trader_id: trader_id.clone(),
                            remaining_qty: remaining,
                            sequence: order_sequence,
                        },
                    );
                    rested = true;
                    book_changed = true;
                }
            }
        }

        self.book.compact();
        self.assert_uncrossed();
        if self.debug {
            self.book.validate();
        }

        ExecutionResult {
            order_id,
            trades,
            rested,
            book_changed,
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.book.best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.book.best_ask()
    }

    pub fn book_snapshot(&self, depth: usize) -> BookSnapshot {
        self.book.snapshot(depth)
    }

    /// Cancel every resting order owned by `trader_id`.
    ///
    /// Returns true when the visible book changed.
    pub fn cancel_trader_orders(&mut self, trader_id: &TraderId) -> bool {
        let changed = self.book.cancel_by_trader(trader_id);
        if self.debug {
            self.book.validate();
        }
        changed
    }

    /// Remove all resting orders without touching the id counters.
    pub fn clear_book(&mut self) {
        self.book.clear();
    }

    /// Clear the book and restart all three id counters.
    pub fn reset(&mut self) {
        self.book.clear();
        self.next_order_id = 1;
        self.next_trade_id = 1;
        self.next_sequence = 1;
    }

    /// Counter values, exposed for determinism checks.
    pub fn counters(&self) -> (u64, u64, u64) {
        (self.next_order_id, self.next_trade_id, self.next_sequence)
    }

    fn assert_uncrossed(&self) {
        if let (Some(bid), Some(ask)) = (self.book.best_bid(), self.book.best_ask()) {
            assert!(
                bid < ask,
                "crossed book invariant violated: best_bid={bid}, best_ask={ask}"
            );
        }
    }

    fn allocate_order_id(&mut self) -> OrderId {
        let id = self.next_order_id;
        self.next_order_id += 1;
        OrderId::new(id)
    }

    fn allocate_trade_id(&mut self) -> TradeId {
        let id = self.next_trade_id;
        self.next_trade_id += 1;
        TradeId::new(id)
    }

    fn allocate_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn trader(id: &str) -> TraderId {
        TraderId::from(id)
    }

    #[test]
    fn test_resting_order_no_match() {
        let mut engine = MatchingEngine::with_debug_checks();
        let result = engine.execute_limit(&trader("a"), Side::Buy, Price::from_u64(100), 5);

        assert!(result.trades.is_empty());
        assert!(result.rested);
        assert_eq!(engine.best_bid(), Some(Price::from_u64(100)));
    }

    #[test]
    fn test_full_match_at_maker_price() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("maker"), Side::Sell, Price::from_u64(100), 5);

        // Taker crosses at a better limit; execution stays at the maker's price.
        let result = engine.execute_limit(&trader("taker"), Side::Buy, Price::from_u64(102), 5);
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.price, Price::from_u64(100));
        assert_eq!(trade.qty, 5);
        assert_eq!(trade.aggressor_side, Side::Buy);
        assert_eq!(trade.buyer(), &trader("taker"));
        assert_eq!(trade.seller(), &trader("maker"));
        assert!(!result.rested);
        assert!(engine.best_ask().is_none());
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("maker"), Side::Sell, Price::from_u64(100), 3);

        let result = engine.execute_limit(&trader("taker"), Side::Buy, Price::from_u64(100), 8);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].qty, 3);
        assert!(result.rested);
        assert_eq!(engine.best_bid(), Some(Price::from_u64(100)));
        assert_eq!(engine.book_snapshot(5).bids, vec![(Decimal::from(100), 5)]);
    }

    #[test]
    fn test_price_time_priority_within_level() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("first"), Side::Sell, Price::from_u64(100), 2);
        engine.execute_limit(&trader("second"), Side::Sell, Price::from_u64(100), 2);

        let result = engine.execute_limit(&trader("taker"), Side::Buy, Price::from_u64(100), 2);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].maker_trader_id, trader("first"));
    }

    #[test]
    fn test_sweep_walks_price_levels_in_order() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("s1"), Side::Sell, Price::from_u64(101), 2);
        engine.execute_limit(&trader("s2"), Side::Sell, Price::from_u64(102), 2);
        engine.execute_limit(&trader("s3"), Side::Sell, Price::from_u64(103), 2);

        let result = engine.execute_limit(&trader("taker"), Side::Buy, Price::from_u64(102), 5);
        let prices: Vec<Price> = result.trades.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![Price::from_u64(101), Price::from_u64(102)]);
        // Remainder rests at the taker's limit.
        assert!(result.rested);
        assert_eq!(engine.best_bid(), Some(Price::from_u64(102)));
        assert_eq!(engine.best_ask(), Some(Price::from_u64(103)));
    }

    #[test]
    fn test_smp_crossing_remainder_not_rested() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("a"), Side::Sell, Price::from_u64(100), 2);
        engine.execute_limit(&trader("a"), Side::Sell, Price::from_u64(100), 3);

        // Same trader sends a crossing buy: SMP skips both asks, nothing
        // trades, and the remainder must not rest (it would cross).
        let result = engine.execute_limit(&trader("a"), Side::Buy, Price::from_u64(101), 4);
        assert!(result.trades.is_empty());
        assert!(!result.rested);

        let snapshot = engine.book_snapshot(5);
        assert_eq!(snapshot.asks, vec![(Decimal::from(100), 5)]);
        assert!(snapshot.bids.is_empty());
    }

    #[test]
    fn test_smp_matches_other_traders_behind_self_orders() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("a"), Side::Sell, Price::from_u64(100), 2);
        engine.execute_limit(&trader("b"), Side::Sell, Price::from_u64(100), 3);

        let result = engine.execute_limit(&trader("a"), Side::Buy, Price::from_u64(100), 3);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].maker_trader_id, trader("b"));
        assert_eq!(result.trades[0].qty, 3);
        // A's own ask is still resting, untouched.
        assert_eq!(engine.book_snapshot(5).asks, vec![(Decimal::from(100), 2)]);
    }

    #[test]
    fn test_market_order_ignores_price_levels() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("s1"), Side::Sell, Price::from_u64(101), 1);
        engine.execute_limit(&trader("s2"), Side::Sell, Price::from_u64(150), 1);

        let result = engine.execute_market(&trader("taker"), Side::Buy, 2);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[1].price, Price::from_u64(150));
    }

    #[test]
    fn test_market_remainder_never_rests() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("s1"), Side::Sell, Price::from_u64(101), 1);

        let result = engine.execute_market(&trader("taker"), Side::Buy, 5);
        assert_eq!(result.trades.len(), 1);
        assert!(!result.rested);
        assert!(engine.best_bid().is_none());
    }

    #[test]
    fn test_market_order_on_empty_book_trades_nothing() {
        let mut engine = MatchingEngine::with_debug_checks();
        let result = engine.execute_market(&trader("taker"), Side::Sell, 5);
        assert!(result.trades.is_empty());
        assert!(!result.rested);
        assert!(!result.book_changed);
    }

    #[test]
    fn test_ids_and_sequences_are_monotonic() {
        let mut engine = MatchingEngine::new();
        let r1 = engine.execute_limit(&trader("a"), Side::Sell, Price::from_u64(100), 1);
        let r2 = engine.execute_limit(&trader("b"), Side::Buy, Price::from_u64(100), 1);

        assert_eq!(r1.order_id, OrderId::new(1));
        assert_eq!(r2.order_id, OrderId::new(2));
        assert_eq!(r2.trades[0].trade_id, TradeId::new(1));
        assert!(r2.trades[0].sequence > 0);
    }

    #[test]
    fn test_reset_restarts_counters_and_clears_book() {
        let mut engine = MatchingEngine::new();
        engine.execute_limit(&trader("a"), Side::Sell, Price::from_u64(100), 1);
        engine.execute_limit(&trader("b"), Side::Buy, Price::from_u64(100), 1);

        engine.reset();
        assert!(engine.best_bid().is_none());
        assert!(engine.best_ask().is_none());
        assert_eq!(engine.counters(), (1, 1, 1));

        let result = engine.execute_limit(&trader("c"), Side::Sell, Price::from_u64(100), 1);
        assert_eq!(result.order_id, OrderId::new(1));
        let result = engine.execute_limit(&trader("d"), Side::Buy, Price::from_u64(100), 1);
        assert_eq!(result.trades[0].trade_id, TradeId::new(1));
    }

    #[test]
    fn test_cancel_trader_orders() {
        let mut engine = MatchingEngine::with_debug_checks();
        engine.execute_limit(&trader("a"), Side::Buy, Price::from_u64(99), 2);
        engine.execute_limit(&trader("a"), Side::Sell, Price::from_u64(103), 2);
        engine.execute_limit(&trader("b"), Side::Sell, Price::from_u64(104), 2);

        assert!(engine.cancel_trader_orders(&trader("a")));
        assert!(engine.best_bid().is_none());
        assert_eq!(engine.best_ask(), Some(Price::from_u64(104)));
        assert!(!engine.cancel_trader_orders(&trader("a")));
    }

    proptest! {
        /// The book never crosses and never exposes zero-qty residue, for
        /// arbitrary interleavings of limit orders from a small trader set.
        #[test]
        fn prop_book_stays_uncrossed(orders in proptest::collection::vec(
            (0u8..4, prop_oneof![Just(Side::Buy), Just(Side::Sell)], 95u64..105, 1i64..10),
            1..60,
        )) {
            let mut engine = MatchingEngine::with_debug_checks();
            for (trader_idx, side, price, qty) in orders {
                let id = TraderId::new(format!("trader_{trader_idx}"));
                let result = engine.execute_limit(&id, side, Price::from_u64(price), qty);
                // SMP: no trade may have the same trader on both sides.
                for trade in &result.trades {
                    prop_assert_ne!(&trade.maker_trader_id, &trade.taker_trader_id);
                }
                if let (Some(bid), Some(ask)) = (engine.best_bid(), engine.best_ask()) {
                    prop_assert!(bid < ask);
                }
                let snapshot = engine.book_snapshot(100);
                for (_, qty) in snapshot.bids.iter().chain(snapshot.asks.iter()) {
                    prop_assert!(*qty > 0);
                }
            }
        }
    }
}
