//! Inbound order messages
//!
//! One JSON object per frame. Validation happens here, at the boundary:
//! everything past `OrderRequest::from_frame` is well-formed by
//! construction and the core never inspects raw JSON again.

use crate::errors::ProtocolError;
use crate::ids::TraderId;
use crate::numeric::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Signed direction of a fill on this side: +1 for buys, -1 for sells.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

/// Order type for the two supported execution styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Validated inbound order.
///
/// Invariants held by construction: `qty >= 1`; limit orders carry a
/// strictly positive price; market orders carry no price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub trader_id: TraderId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub qty: i64,
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// Parse and validate a raw text frame.
    ///
    /// Distinguishes malformed JSON (`invalid_json`) from schema
    /// violations (`invalid_message`) so the gateway can report the
    /// right rejection reason.
    pub fn from_frame(raw: &str) -> Result<Self, ProtocolError> {
        let payload: Value = serde_json::from_str(raw)?;
        Self::from_payload(&payload)
    }

    /// Validate an already-parsed JSON payload.
    pub fn from_payload(payload: &Value) -> Result<Self, ProtocolError> {
        let object = payload
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_message("payload must be a JSON object"))?;

        match object.get("type").and_then(Value::as_str) {
            Some("order") => {}
            _ => return Err(ProtocolError::invalid_message("'type' must be 'order'")),
        }

        let trader_id = require_string(object, "trader_id")?;
        let side = match require_string(object, "side")?.to_lowercase().as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            _ => return Err(ProtocolError::invalid_message("'side' must be 'buy' or 'sell'")),
        };

        let order_type = match object.get("order_type") {
            None | Some(Value::Null) => OrderType::Limit,
            Some(Value::String(s)) => match s.to_lowercase().as_str() {
                "limit" => OrderType::Limit,
                "market" => OrderType::Market,
                _ => {
                    return Err(ProtocolError::invalid_message(
                        "'order_type' must be 'limit' or 'market'",
                    ))
                }
            },
            Some(_) => {
                return Err(ProtocolError::invalid_message(
                    "'order_type' must be 'limit' or 'market'",
                ))
            }
        };

        let qty = require_int(object, "qty", 1)?;
        let price = optional_price(object, "price")?;

        let client_order_id = match object.get("client_order_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(ProtocolError::invalid_message(
                    "'client_order_id' must be a string when provided",
                ))
            }
        };

        if order_type == OrderType::Limit && price.is_none() {
            return Err(ProtocolError::invalid_message(
                "'price' is required for limit orders",
            ));
        }
        if order_type == OrderType::Market && price.is_some() {
            return Err(ProtocolError::invalid_message(
                "'price' must be null/omitted for market orders",
            ));
        }

        Ok(Self {
            trader_id: TraderId::new(trader_id),
            side,
            order_type,
            price,
            qty,
            client_order_id,
        })
    }
}

fn require_string(
    object: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<String, ProtocolError> {
    match object.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ProtocolError::invalid_message(format!(
            "'{key}' must be a non-empty string"
        ))),
    }
}

fn require_int(
    object: &serde_json::Map<String, Value>,
    key: &str,
    min_value: i64,
) -> Result<i64, ProtocolError> {
    let value = object
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ProtocolError::invalid_message(format!("'{key}' must be an integer")))?;
    if value < min_value {
        return Err(ProtocolError::invalid_message(format!(
            "'{key}' must be >= {min_value}"
        )));
    }
    Ok(value)
}

fn optional_price(
    object: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<Price>, ProtocolError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let raw = n
                .as_f64()
                .and_then(Decimal::from_f64_retain)
                .ok_or_else(|| {
                    ProtocolError::invalid_message(format!("'{key}' must be numeric when provided"))
                })?;
            let price = Price::try_new(raw)
                .ok_or_else(|| ProtocolError::invalid_message(format!("'{key}' must be > 0")))?;
            Ok(Some(price))
        }
        Some(_) => Err(ProtocolError::invalid_message(format!(
            "'{key}' must be numeric when provided"
        ))),
    }
}
