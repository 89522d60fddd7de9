//! Ask (sell-side) price ladder
//!
//! Sell orders keyed by price with the best ask being the lowest price.
//! Mirror image of the bid book.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::ids::{OrderId, TraderId};
use types::numeric::Price;

use super::price_level::{PriceLevel, RestingOrder};

/// Sell side of the book, best price = lowest.
#[derive(Debug, Clone, Default)]
pub struct AskBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, price: Price, order: RestingOrder) {
        self.levels.entry(price).or_default().push_back(order);
    }

    /// Lowest live ask price.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
    }

    /// Head order of the best level.
    pub fn peek_best(&self) -> Option<&RestingOrder> {
        self.levels.values().next().and_then(PriceLevel::front)
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

    /// Locate the first matchable maker for a BUY taker.
    ///
    /// Walks prices from the best ask up to `limit` (every price when
    /// `limit` is None, the market-order case), scanning each queue from
    /// the head and skipping orders owned by the taker. Skipped orders
    /// are neither removed nor reordered.
    pub fn find_matchable(&self, limit: Option<Price>, taker: &TraderId) -> Option<(Price, usize)> {
        for (price, level) in self.levels.iter() {
            if let Some(limit) = limit {
                if *price > limit {
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
            .expect("fill against missing ask level");
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
            .take(depth)
            .map(|(price, level)| (price.as_decimal(), level.total_qty()))
            .collect()
    }

    /// Whether resting asks still cross a BUY taker's limit.
    pub fn crosses(&self, limit: Price) -> bool {
        self.best_price().is_some_and(|best| best <= limit)
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
