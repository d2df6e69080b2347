//! Candle — the fundamental market data unit.
//!
//! A candle is an immutable OHLCV sample for one timeframe period. A raw tick
//! is represented as a candle whose OHLC fields collapse toward the latest
//! price, so the whole runtime pipeline works on a single sample type.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// OHLCV sample with an epoch-millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Period start (or tick arrival) time, epoch milliseconds UTC.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Build a tick sample: OHLC collapsed to a single price.
    pub fn tick(time: i64, price: f64, volume: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high bounds open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Fold a newer tick into this forming candle: extend extremes, advance the
    /// close, accumulate volume. The candle's own `time` is unchanged.
    pub fn absorb(&mut self, tick: &Candle) {
        self.high = self.high.max(tick.high);
        self.low = self.low.min(tick.low);
        self.close = tick.close;
        self.volume += tick.volume;
    }
}

/// Candle aggregation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Day1,
}

impl Timeframe {
    pub fn duration(&self) -> Duration {
        match self {
            Self::Min1 => Duration::minutes(1),
            Self::Min5 => Duration::minutes(5),
            Self::Min15 => Duration::minutes(15),
            Self::Min30 => Duration::minutes(30),
            Self::Hour1 => Duration::hours(1),
            Self::Hour4 => Duration::hours(4),
            Self::Day1 => Duration::days(1),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }

    /// Floor a timestamp to the start of its containing period.
    pub fn start_of_period(&self, time_ms: i64) -> i64 {
        time_ms - time_ms.rem_euclid(self.duration_ms())
    }

    /// Whether two timestamps fall in the same period.
    pub fn same_period(&self, a: i64, b: i64) -> bool {
        self.start_of_period(a) == self.start_of_period(b)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Min1 => "1min",
            Self::Min5 => "5min",
            Self::Min15 => "15min",
            Self::Min30 => "30min",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "day",
        }
    }
}
