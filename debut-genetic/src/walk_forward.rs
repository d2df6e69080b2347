//! Walk-forward window planning — train/forward splits over the shared
//! candle history.
//!
//! Each generation evaluates candidates on a training window and, under
//! walk-forward validation, re-evaluates survivors on the disjoint forward
//! window that follows it:
//! - **Rolling** slides a fixed-size training window forward by the forward
//!   size each generation.
//! - **Anchored** keeps the training start fixed and grows the window by the
//!   forward size each generation.
//!
//! Windows are half-open candle index ranges into the shared history buffer;
//! forward windows are contiguous and non-overlapping across generations.

use chrono::Duration;
use debut_core::Candle;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkForwardMode {
    Rolling,
    Anchored,
}

/// Candle index ranges for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub generation: usize,
    pub train: Range<usize>,
    pub forward: Range<usize>,
}

#[derive(Debug, Error, PartialEq)]
pub enum WalkForwardError {
    #[error("history is empty")]
    EmptyHistory,
    #[error("history candles are not sorted by time")]
    UnsortedHistory,
    #[error("gap_days must be positive for walk-forward validation")]
    ZeroGap,
    #[error("insufficient history: need {need_days} days, have {have_days}")]
    InsufficientHistory { need_days: i64, have_days: i64 },
}

fn index_at(candles: &[Candle], time: i64) -> usize {
    candles.partition_point(|c| c.time < time)
}

/// Plan one window per generation.
///
/// Without a mode, every generation trains on the full history and has no
/// forward window. With a mode, the history must span at least
/// `days + generations * gap_days` days.
pub fn build_windows(
    candles: &[Candle],
    mode: Option<WalkForwardMode>,
    generations: usize,
    days: u32,
    gap_days: u32,
) -> Result<Vec<WindowSpec>, WalkForwardError> {
    let (first, last) = match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => (first.time, last.time),
        _ => return Err(WalkForwardError::EmptyHistory),
    };
    if candles.windows(2).any(|w| w[0].time > w[1].time) {
        return Err(WalkForwardError::UnsortedHistory);
    }

    let mode = match mode {
        None => {
            return Ok((0..generations)
                .map(|generation| WindowSpec {
                    generation,
                    train: 0..candles.len(),
                    forward: 0..0,
                })
                .collect());
        }
        Some(mode) => mode,
    };

    if gap_days == 0 {
        return Err(WalkForwardError::ZeroGap);
    }

    let day = Duration::days(1).num_milliseconds();
    let have_days = (last - first) / day + 1;
    let need_days = days as i64 + generations as i64 * gap_days as i64;
    if have_days < need_days {
        return Err(WalkForwardError::InsufficientHistory {
            need_days,
            have_days,
        });
    }

    let train_ms = days as i64 * day;
    let gap_ms = gap_days as i64 * day;

    let windows = (0..generations)
        .map(|generation| {
            let g = generation as i64;
            let (t0, t1) = match mode {
                WalkForwardMode::Rolling => {
                    let t0 = first + g * gap_ms;
                    (t0, t0 + train_ms)
                }
                WalkForwardMode::Anchored => (first, first + train_ms + g * gap_ms),
            };
            let t2 = t1 + gap_ms;
            WindowSpec {
                generation,
                train: index_at(candles, t0)..index_at(candles, t1),
                forward: index_at(candles, t1)..index_at(candles, t2),
            }
        })
        .collect();
    Ok(windows)
}
