//! Fixed-decimal numeric model for prices and monetary values
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point
//! errors). Every monetary scalar observable at a protocol boundary is
//! rounded to 4 decimal places, and negative zero is normalized to
//! positive zero so snapshots compare byte-identical across runs.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places carried by every monetary scalar.
pub const MONEY_SCALE: u32 = 4;

/// Round a monetary value to 4 decimal places.
///
/// Negative zero is collapsed to positive zero.
pub fn round4(value: Decimal) -> Decimal {
    let rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven);
    if rounded.is_zero() {
        Decimal::ZERO
    } else {
        rounded
    }
}

/// Strictly positive price.
///
/// Prices key the book's price ladders, so the type is totally ordered.
/// Construction rounds to 4 decimal places and rejects non-positive
/// values, which keeps invalid prices out of the core entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Build a price from a decimal value, rejecting values <= 0.
    pub fn try_new(value: Decimal) -> Option<Self> {
        let rounded = round4(value);
        if rounded > Decimal::ZERO {
            Some(Self(rounded))
        } else {
            None
        }
    }

    /// Convenience constructor for whole-number prices.
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
