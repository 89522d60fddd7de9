//! Trade execution types
//!
//! A trade records a single fill between a resting maker and an
//! aggressing taker. The execution price is always the maker's price.

use crate::ids::{OrderId, TradeId, TraderId};
use crate::numeric::Price;
use crate::order::Side;
use serde::{Deserialize, Serialize};

/// A single execution produced by the matching engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub price: Price,
    pub qty: i64,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_trader_id: TraderId,
    pub taker_trader_id: TraderId,
    pub aggressor_side: Side,
    pub sequence: u64,
}

impl Trade {
    /// Buyer and seller of this trade, derived from the aggressor side.
    pub fn counterparties(&self) -> (&TraderId, &TraderId) {
        match self.aggressor_side {
            Side::Buy => (&self.taker_trader_id, &self.maker_trader_id),
            Side::Sell => (&self.maker_trader_id, &self.taker_trader_id),
        }
    }

    pub fn buyer(&self) -> &TraderId {
        self.counterparties().0
    }

    pub fn seller(&self) -> &TraderId {
        self.counterparties().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade(aggressor_side: Side) -> Trade {
        Trade {
            trade_id: TradeId::new(1),
            price: Price::from_u64(100),
            qty: 5,
            maker_order_id: OrderId::new(10),
            taker_order_id: OrderId::new(11),
            maker_trader_id: TraderId::from("maker"),
            taker_trader_id: TraderId::from("taker"),
            aggressor_side,
            sequence: 2,
        }
    }

    #[test]
    fn test_buy_aggressor_counterparties() {
        let trade = make_trade(Side::Buy);
        assert_eq!(trade.buyer(), &TraderId::from("taker"));
        assert_eq!(trade.seller(), &TraderId::from("maker"));
    }

    #[test]
    fn test_sell_aggressor_counterparties() {
        let trade = make_trade(Side::Sell);
        assert_eq!(trade.buyer(), &TraderId::from("maker"));
        assert_eq!(trade.seller(), &TraderId::from("taker"));
    }
}
