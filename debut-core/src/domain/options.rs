//! Strategy options — the configuration of one strategy instance and the
//! genome the optimizer searches over.
//!
//! The struct is fully serializable and JSON-patchable: the optimizer builds
//! candidate configurations by patching the serialized form field-by-field,
//! so strategy-specific parameters live in the flattened `extra` map and are
//! indistinguishable from built-in fields on the wire.

use super::candle::Timeframe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Supported broker backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Broker {
    Binance,
    Tinkoff,
    Alpaca,
}

/// Execution environment a runtime instance is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingEnv {
    /// Fitness evaluation inside the genetic optimizer.
    Genetic,
    /// Historical replay / manual backtesting.
    Tester,
    /// Live trading.
    Production,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_equity_level() -> f64 {
    1.0
}

/// Configuration of one strategy instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOptions {
    pub broker: Broker,
    pub ticker: String,
    pub currency: String,
    pub interval: Timeframe,
    /// Position size in the quote currency.
    pub amount: f64,
    /// Commission percent charged by the broker, e.g. `0.1` for 0.1%.
    #[serde(default)]
    pub fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default = "default_multiplier")]
    pub lots_multiplier: f64,
    #[serde(default = "default_equity_level")]
    pub equity_level: f64,
    /// Cross-margin trading (spot brokers).
    #[serde(default)]
    pub margin: bool,
    /// Futures trading.
    #[serde(default)]
    pub futures: bool,
    /// Strategy-specific parameters, flattened into the serialized form so
    /// the optimizer can vary them like any built-in field.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StrategyOptions {
    pub fn new(
        broker: Broker,
        ticker: impl Into<String>,
        currency: impl Into<String>,
        interval: Timeframe,
        amount: f64,
    ) -> Self {
        Self {
            broker,
            ticker: ticker.into(),
            currency: currency.into(),
            interval,
            amount,
            fee: 0.0,
            id: None,
            sandbox: false,
            lots_multiplier: 1.0,
            equity_level: 1.0,
            margin: false,
            futures: false,
            extra: BTreeMap::new(),
        }
    }

    /// Structural validation, run before any runtime starts.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.ticker.trim().is_empty() {
            return Err(OptionsError::EmptyTicker);
        }
        if !(self.amount > 0.0) {
            return Err(OptionsError::NonPositiveAmount(self.amount));
        }
        if self.fee < 0.0 {
            return Err(OptionsError::NegativeFee(self.fee));
        }
        if !(self.lots_multiplier > 0.0) {
            return Err(OptionsError::NonPositiveMultiplier(self.lots_multiplier));
        }
        if self.margin && self.futures {
            return Err(OptionsError::MarginAndFutures);
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("ticker must not be empty")]
    EmptyTicker,
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(f64),
    #[error("fee must not be negative, got {0}")]
    NegativeFee(f64),
    #[error("lots multiplier must be positive, got {0}")]
    NonPositiveMultiplier(f64),
    #[error("margin and futures modes are mutually exclusive")]
    MarginAndFutures,
}
