//! Two-sided order book with price-time priority
//!
//! Combines the bid and ask ladders behind side-generic operations: the
//! matcher always works on the side opposite the incoming order.

mod ask_book;
mod bid_book;
mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::{PriceLevel, RestingOrder};

use rust_decimal::Decimal;
use serde::Serialize;
use types::ids::{OrderId, TraderId};
use types::numeric::Price;
use types::order::Side;

/// A matchable resting order located by an SMP-aware scan.
///
/// The location stays valid until the next book mutation, which in the
/// matching loop is always the fill against this maker.
#[derive(Debug, Clone, PartialEq)]
pub struct MakerMatch {
    pub price: Price,
    pub order_id: OrderId,
    pub trader_id: TraderId,
    pub remaining_qty: i64,
    index: usize,
}

/// Aggregated depth snapshot: (price, total remaining qty) per level,
/// bids descending and asks ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct BookSnapshot {
    pub bids: Vec<(Decimal, i64)>,
    pub asks: Vec<(Decimal, i64)>,
}

/// Single-symbol order book.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: BidBook,
    asks: AskBook,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BidBook::new(),
            asks: AskBook::new(),
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Rest a limit remainder on its own side.
    pub fn add_resting(&mut self, side: Side, price: Price, order: RestingOrder) {
        match side {
            Side::Buy => self.bids.insert(price, order),
            Side::Sell => self.asks.insert(price, order),
        }
    }

    /// Head order of the best level opposite `incoming_side`.
    pub fn peek_opposite_best(&self, incoming_side: Side) -> Option<&RestingOrder> {
        match incoming_side {
            Side::Buy => self.asks.peek_best(),
            Side::Sell => self.bids.peek_best(),
        }
    }

    /// Pop the head order of the best level opposite `incoming_side`.
    pub fn pop_opposite_best(&mut self, incoming_side: Side) -> Option<RestingOrder> {
        match incoming_side {
            Side::Buy => self.asks.pop_best(),
            Side::Sell => self.bids.pop_best(),
        }
    }

    /// Next matchable maker opposite `incoming_side`, in strict priority
    /// order, skipping orders owned by the taker (self-match prevention).
    /// `limit` is None for market orders.
    pub fn next_matchable_opposite(
        &self,
        incoming_side: Side,
        limit: Option<Price>,
        taker: &TraderId,
    ) -> Option<MakerMatch> {
        let (price, index) = match incoming_side {
            Side::Buy => self.asks.find_matchable(limit, taker)?,
            Side::Sell => self.bids.find_matchable(limit, taker)?,
        };
        let order = match incoming_side {
            Side::Buy => self.asks.order_at(price, index)?,
            Side::Sell => self.bids.order_at(price, index)?,
        };
        Some(MakerMatch {
            price,
            order_id: order.order_id,
            trader_id: order.trader_id.clone(),
            remaining_qty: order.remaining_qty,
            index,
        })
    }

    /// Fill `qty` against a maker located by `next_matchable_opposite`.
    /// Exhausted orders and emptied levels are removed immediately.
    pub fn fill_maker(&mut self, incoming_side: Side, maker: &MakerMatch, qty: i64) {
        match incoming_side {
            Side::Buy => self.asks.reduce_at(maker.price, maker.index, qty),
            Side::Sell => self.bids.reduce_at(maker.price, maker.index, qty),
        }
    }

    /// Remove a specific resting order. Returns true when found.
    pub fn remove_order(&mut self, side: Side, price: Price, order_id: OrderId) -> bool {
        match side {
            Side::Buy => self.bids.remove_order(price, order_id),
            Side::Sell => self.asks.remove_order(price, order_id),
        }
    }

    /// Drop every resting order owned by `trader_id` on both sides.
    ///
    /// Returns true when the visible book changed.
    pub fn cancel_by_trader(&mut self, trader_id: &TraderId) -> bool {
        let bids_changed = self.bids.cancel_trader(trader_id);
        let asks_changed = self.asks.cancel_trader(trader_id);
        bids_changed || asks_changed
    }

    /// Whether opposite-side liquidity still crosses `limit`.
    ///
    /// Used after matching to detect the SMP-blocked case: crossing
    /// liquidity that survived the loop is necessarily self-owned, and
    /// resting the remainder would cross the book.
    pub fn has_crossing_opposite(&self, incoming_side: Side, limit: Price) -> bool {
        match incoming_side {
            Side::Buy => self.asks.crosses(limit),
            Side::Sell => self.bids.crosses(limit),
        }
    }

    /// Aggregated top-`depth` snapshot of both sides.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids.depth_snapshot(depth),
            asks: self.asks.depth_snapshot(depth),
        }
    }

    /// Drop zero-quantity orders and empty levels on both sides.
    pub fn compact(&mut self) {
        self.bids.compact();
        self.asks.compact();
    }

    /// Remove all resting orders and price levels.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Structural invariant checks (debug mode).
    pub fn validate(&self) {
        self.bids.validate();
        self.asks.validate();
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            assert!(bid < ask, "crossed book: best_bid={bid} best_ask={ask}");
        }
    }
}
