//! Protocol error taxonomy
//!
//! Protocol failures are per-connection and local: the offending frame is
//! answered with an `order_rejected` and the connection stays open. The
//! reject reason distinguishes malformed JSON from schema violations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons carried on `order_rejected` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidJson,
    InvalidMessage,
    InvalidPriceReference,
    InitialMarginInsufficient,
    NoLiquidity,
    AccountFrozen,
    AccountBankrupt,
    ExchangeShuttingDown,
    SessionInactive,
}

/// Error raised when an inbound frame violates the message schema.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("message must be valid JSON")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage(message.into())
    }

    /// Reject reason to report back on the offending connection.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            ProtocolError::InvalidJson(_) => RejectReason::InvalidJson,
            ProtocolError::InvalidMessage(_) => RejectReason::InvalidMessage,
        }
    }

    /// Human-readable detail string for the rejection payload.
    pub fn detail(&self) -> String {
        match self {
            ProtocolError::InvalidJson(_) => "message must be valid JSON".to_string(),
            ProtocolError::InvalidMessage(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&RejectReason::InitialMarginInsufficient).unwrap(),
            "\"initial_margin_insufficient\""
        );
        assert_eq!(
            serde_json::to_string(&RejectReason::ExchangeShuttingDown).unwrap(),
            "\"exchange_shutting_down\""
        );
    }

    #[test]
    fn test_protocol_error_reasons() {
        let err = ProtocolError::invalid_message("'qty' must be >= 1");
        assert_eq!(err.reject_reason(), RejectReason::InvalidMessage);
        assert_eq!(err.detail(), "'qty' must be >= 1");

        let err: ProtocolError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.reject_reason(), RejectReason::InvalidJson);
    }
}
