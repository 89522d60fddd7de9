//! Exchange configuration
//!
//! Loaded once from the environment at startup and immutable after.
//! Every knob has a validated default, so a bare `exchange-server`
//! starts a 3-round arena on localhost.

use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;
use types::numeric::Price;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be > 0")]
    NotPositive { key: &'static str },
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub round_duration_secs: u64,
    pub total_rounds: u32,
    pub starting_capital: Decimal,
    pub initial_margin_rate: Decimal,
    pub maintenance_margin_rate: Decimal,
    pub liquidation_cooldown_ms: u64,
    pub book_depth: usize,
    pub mark_fallback_price: Price,
    pub gateway_addr: SocketAddr,
    pub stream_addr: SocketAddr,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 60,
            total_rounds: 3,
            starting_capital: Decimal::from(10_000),
            initial_margin_rate: Decimal::new(20, 2),
            maintenance_margin_rate: Decimal::new(10, 2),
            liquidation_cooldown_ms: 500,
            book_depth: 10,
            mark_fallback_price: Price::from_u64(100),
            gateway_addr: "127.0.0.1:9001".parse().expect("static address"),
            stream_addr: "127.0.0.1:9002".parse().expect("static address"),
        }
    }
}

impl ExchangeConfig {
    /// Read configuration from `ARENA_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            round_duration_secs: env_parse("ARENA_ROUND_DURATION_SECS", defaults.round_duration_secs)?,
            total_rounds: env_parse("ARENA_TOTAL_ROUNDS", defaults.total_rounds)?,
            starting_capital: env_parse("ARENA_STARTING_CAPITAL", defaults.starting_capital)?,
            initial_margin_rate: env_parse("ARENA_INITIAL_MARGIN_RATE", defaults.initial_margin_rate)?,
            maintenance_margin_rate: env_parse(
                "ARENA_MAINTENANCE_MARGIN_RATE",
                defaults.maintenance_margin_rate,
            )?,
            liquidation_cooldown_ms: env_parse(
                "ARENA_LIQUIDATION_COOLDOWN_MS",
                defaults.liquidation_cooldown_ms,
            )?,
            book_depth: env_parse("ARENA_BOOK_DEPTH", defaults.book_depth)?,
            mark_fallback_price: env_price("ARENA_MARK_FALLBACK_PRICE", defaults.mark_fallback_price)?,
            gateway_addr: env_parse("ARENA_GATEWAY_ADDR", defaults.gateway_addr)?,
            stream_addr: env_parse("ARENA_STREAM_ADDR", defaults.stream_addr)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round_duration_secs == 0 {
            return Err(ConfigError::NotPositive {
                key: "ARENA_ROUND_DURATION_SECS",
            });
        }
        if self.total_rounds == 0 {
            return Err(ConfigError::NotPositive {
                key: "ARENA_TOTAL_ROUNDS",
            });
        }
        if self.starting_capital <= Decimal::ZERO {
            return Err(ConfigError::NotPositive {
                key: "ARENA_STARTING_CAPITAL",
            });
        }
        if self.initial_margin_rate <= Decimal::ZERO {
            return Err(ConfigError::NotPositive {
                key: "ARENA_INITIAL_MARGIN_RATE",
            });
        }
        if self.maintenance_margin_rate <= Decimal::ZERO {
            return Err(ConfigError::NotPositive {
                key: "ARENA_MAINTENANCE_MARGIN_RATE",
            });
        }
        if self.book_depth == 0 {
            return Err(ConfigError::NotPositive {
                key: "ARENA_BOOK_DEPTH",
            });
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
        }),
    }
}

fn env_price(key: &'static str, default: Price) -> Result<Price, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<Decimal>()
            .ok()
            .and_then(Price::try_new)
            .ok_or(ConfigError::Invalid { key, value: raw }),
    }
}
