//! Instrument metadata — lot sizing, minimums and instrument kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument market segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    Spot,
    Futures,
    Margin,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Spot => "SPOT",
            Self::Futures => "FUTURES",
            Self::Margin => "MARGIN",
        };
        f.write_str(s)
    }
}

/// Static metadata for a tradable symbol.
///
/// Owned by the strategy runtime for the lifetime of one instance; refreshed
/// only by re-querying the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    /// Broker-side instrument id, when the broker has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figi: Option<String>,
    /// One lot size.
    pub lot: f64,
    /// Number of decimal digits in a lot count.
    pub lot_precision: u32,
    /// Minimal lots quantity per trade.
    pub min_quantity: f64,
    /// Minimal order notional in the quote currency.
    pub min_notional: f64,
    pub kind: InstrumentKind,
    /// Runtime-generated identifier, `"{ticker}:{kind}"`.
    pub id: String,
}

impl Instrument {
    pub fn new(
        ticker: impl Into<String>,
        kind: InstrumentKind,
        lot: f64,
        lot_precision: u32,
        min_quantity: f64,
        min_notional: f64,
    ) -> Self {
        let ticker = ticker.into();
        let id = format!("{ticker}:{kind}");
        Self {
            ticker,
            figi: None,
            lot,
            lot_precision,
            min_quantity,
            min_notional,
            kind,
            id,
        }
    }

    /// Round a raw lot count down to this instrument's tradeable precision.
    pub fn round_lots(&self, lots: f64) -> f64 {
        let factor = 10f64.powi(self.lot_precision as i32);
        (lots * factor).floor() / factor
    }

    /// Whether an order of `lots` at `price` clears the minimal notional.
    pub fn meets_notional(&self, lots: f64, price: f64) -> bool {
        lots * price >= self.min_notional
    }
}
