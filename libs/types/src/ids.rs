//! Identifier types for exchange entities
//!
//! Order and trade ids come from monotonic counters owned by the matching
//! engine, so replaying the same ordered input produces the same ids.
//! Trader ids are short strings assigned by the order gateway at connect
//! time (`trader_1`, `trader_2`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an order, allocated from a monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trade, allocated from a monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(u64);

impl TradeId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a trader account.
///
/// Ordered and hashable so trader scans can iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraderId(String);

impl TraderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TraderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_ordering() {
        assert!(OrderId::new(1) < OrderId::new(2));
        assert_eq!(OrderId::new(7).value(), 7);
    }

    #[test]
    fn test_trader_id_sort_order_is_lexicographic() {
        let mut ids = vec![
            TraderId::from("trader_2"),
            TraderId::from("trader_1"),
            TraderId::from("maker"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                TraderId::from("maker"),
                TraderId::from("trader_1"),
                TraderId::from("trader_2"),
            ]
        );
    }

    #[test]
    fn test_id_serialization_is_transparent() {
        let json = serde_json::to_string(&TradeId::new(42)).unwrap();
        assert_eq!(json, "42");

        let json = serde_json::to_string(&TraderId::from("trader_1")).unwrap();
        assert_eq!(json, "\"trader_1\"");
    }
}
