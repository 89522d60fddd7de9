//! Bid (buy-side) price ladder
//!
//! Buy orders keyed by price with the best bid being the highest price.
//! BTreeMap keeps the index ordered, so matching and snapshots never
//! iterate in hash order.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::ids::{OrderId, TraderId};
use types::numeric::Price;

use super::price_level::{PriceLevel, RestingOrder};

/// Buy side of the book, best price = highest.
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, price: Price, order: RestingOrder) {
        self.levels.entry(price).or_default().push_back(order);
    }

    /// Highest live bid price.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    /// Head order of the best level.
    pub fn peek_best(&self) -> Option<&RestingOrder> {
        self.levels.values().next_back().and_then(PriceLevel::front)
    }

    /// Pop the head order of the best level, dropping the level if emptied.
    pub fn pop_best(&mut self) -> Option<RestingOrder> {
        let price = self.best_price()?;
        let level = self.levels.get_mut(&price)?;
        let order = level.pop_front();
        if level.is_empty() {
            self.levels.remove(&price);
        }
        order
    }

    /// Locate the first matchable maker for a SELL taker.
    ///
    /// Walks prices from the best bid down to `limit` (every price when
    /// `limit` is None, the market-order case), scanning each queue from
    /// the head and skipping orders owned by the taker. Skipped orders
    /// are neither removed nor reordered.
    pub fn find_matchable(&self, limit: Option<Price>, taker: &TraderId) -> Option<(Price, usize)> {
        for (price, level) in self.levels.iter().rev() {
            if let Some(limit) = limit {
                if *price < limit {
                    break;
                }
            }
            if let Some(index) = level.first_not_owned_by(taker) {
                return Some((*price, index));
            }
        }
        None
    }

    pub fn order_at(&self, price: Price, index: usize) -> Option<&RestingOrder> {
        self.levels.get(&price).and_then(|level| level.get(index))
    }

    /// Fill `qty` against the order at (`price`, `index`).
    pub fn reduce_at(&mut self, price: Price, index: usize, qty: i64) {
        let level = self
            .levels
            .get_mut(&price)
            .expect("fill against missing bid level");
        level.reduce(index, qty);
        if level.is_empty() {
            self.levels.remove(&price);
        }
    }

    pub fn remove_order(&mut self, price: Price, order_id: OrderId) -> bool {
        let Some(level) = self.levels.get_mut(&price) else {
            return false;
        };
        let removed = level.remove_order(order_id);
        if level.is_empty() {
            self.levels.remove(&price);
        }
        removed
    }

    /// Drop every resting order owned by `trader_id`.
    ///
    /// Returns true when the visible book changed.
    pub fn cancel_trader(&mut self, trader_id: &TraderId) -> bool {
        let mut changed = false;
        self.levels.retain(|_, level| {
            if level.remove_trader(trader_id) > 0 {
                changed = true;
            }
            !level.is_empty()
        });
        changed
    }

    /// Top `depth` levels aggregated as (price, total qty), best first.
    pub fn depth_snapshot(&self, depth: usize) -> Vec<(Decimal, i64)> {
        self.levels
            .iter()
            .rev()
            .take(depth)
            .map(|(price, level)| (price.as_decimal(), level.total_qty()))
            .collect()
    }

    /// Whether resting bids still cross a SELL taker's limit.
    pub fn crosses(&self, limit: Price) -> bool {
        self.best_price().is_some_and(|best| best >= limit)
    }

    /// Drop zero-quantity orders and empty levels.
    pub fn compact(&mut self) {
        self.levels.retain(|_, level| {
            level.drop_exhausted();
            !level.is_empty()
        });
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Debug-mode structural checks for the whole side.
    pub fn validate(&self) {
        for level in self.levels.values() {
            level.validate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: u64, trader: &str, qty: i64, sequence: u64) -> RestingOrder {
        RestingOrder {
            order_id: OrderId::new(id),
            trader_id: TraderId::from(trader),
            remaining_qty: qty,
            sequence,
        }
    }

    #[test]
    fn test_best_bid_is_highest_price() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(99), order(1, "a", 1, 1));
        book.insert(Price::from_u64(101), order(2, "b", 2, 2));
        book.insert(Price::from_u64(100), order(3, "c", 3, 3));

        assert_eq!(book.best_price(), Some(Price::from_u64(101)));
        assert_eq!(book.peek_best().unwrap().order_id, OrderId::new(2));
    }

    #[test]
    fn test_depth_snapshot_descends() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(99), order(1, "a", 2, 1));
        book.insert(Price::from_u64(99), order(2, "b", 3, 2));
        book.insert(Price::from_u64(98), order(3, "c", 4, 3));
        book.insert(Price::from_u64(97), order(4, "d", 5, 4));

        let depth = book.depth_snapshot(2);
        assert_eq!(
            depth,
            vec![(Decimal::from(99), 5), (Decimal::from(98), 4)]
        );
    }

    #[test]
    fn test_find_matchable_respects_limit() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(100), order(1, "a", 1, 1));
        book.insert(Price::from_u64(98), order(2, "b", 1, 2));

        // SELL limit 99: only the 100 level crosses.
        let hit = book.find_matchable(Some(Price::from_u64(99)), &TraderId::from("t"));
        assert_eq!(hit, Some((Price::from_u64(100), 0)));

        // SELL limit 101: nothing crosses.
        assert!(book
            .find_matchable(Some(Price::from_u64(101)), &TraderId::from("t"))
            .is_none());

        // Market taker reaches every level.
        let hit = book.find_matchable(None, &TraderId::from("a"));
        assert_eq!(hit, Some((Price::from_u64(98), 0)));
    }

    #[test]
    fn test_empty_level_removed_on_fill() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(100), order(1, "a", 2, 1));

        book.reduce_at(Price::from_u64(100), 0, 2);
        assert!(book.is_empty());
    }

    #[test]
    fn test_cancel_trader_reports_change() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(100), order(1, "a", 2, 1));
        book.insert(Price::from_u64(100), order(2, "b", 3, 2));
        book.insert(Price::from_u64(99), order(3, "a", 1, 3));

        assert!(book.cancel_trader(&TraderId::from("a")));
        assert_eq!(book.level_count(), 1);
        assert!(!book.cancel_trader(&TraderId::from("a")));
    }

    #[test]
    fn test_pop_best_drains_level_then_price() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(100), order(1, "a", 2, 1));
        book.insert(Price::from_u64(100), order(2, "b", 3, 2));
        book.insert(Price::from_u64(99), order(3, "c", 4, 3));

        assert_eq!(book.pop_best().unwrap().order_id, OrderId::new(1));
        assert_eq!(book.pop_best().unwrap().order_id, OrderId::new(2));
        assert_eq!(book.best_price(), Some(Price::from_u64(99)));
    }
}
