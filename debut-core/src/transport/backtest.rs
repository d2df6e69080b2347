//! Backtest transport — deterministic market emulation over a shared
//! read-only candle buffer.
//!
//! The buffer is an `Arc<[Candle]>` so concurrent optimizer evaluations share
//! one allocation; a transport instance only ever narrows its view with an
//! index window, it never copies or mutates the data. Orders fill fully at
//! the requested price; commission is the options' fee percent of notional.

use super::{TickStream, Transport, TransportError};
use crate::domain::{
    Candle, Commission, ExecutedOrder, Instrument, PendingOrder, StrategyOptions,
};
use chrono::Duration;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Iterator over a window of a shared candle buffer. Yields copies of the
/// candles; the buffer itself is never cloned.
struct WindowIter {
    buf: Arc<[Candle]>,
    next: usize,
    end: usize,
}

impl Iterator for WindowIter {
    type Item = Candle;

    fn next(&mut self) -> Option<Candle> {
        if self.next >= self.end {
            return None;
        }
        let candle = self.buf[self.next];
        self.next += 1;
        Some(candle)
    }
}

/// In-memory transport for historical replay and tests.
pub struct BacktestTransport {
    instrument: Instrument,
    history: Arc<[Candle]>,
    window: Range<usize>,
    retry_budget: u32,
    /// Number of upcoming placements to fail (test fault injection).
    fail_next: AtomicU32,
    order_seq: AtomicU64,
    /// Orders recorded since `start_transaction`, if one is active.
    transaction: Mutex<Option<Vec<ExecutedOrder>>>,
}

impl BacktestTransport {
    pub fn new(instrument: Instrument, history: Arc<[Candle]>) -> Self {
        let window = 0..history.len();
        Self {
            instrument,
            history,
            window,
            retry_budget: 3,
            fail_next: AtomicU32::new(0),
            order_seq: AtomicU64::new(0),
            transaction: Mutex::new(None),
        }
    }

    /// Narrow the transport's view to a candle index range. The range is
    /// clamped to the buffer; the buffer stays shared.
    pub fn with_window(mut self, window: Range<usize>) -> Self {
        let end = window.end.min(self.history.len());
        self.window = window.start.min(end)..end;
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Fail the next `n` placements with a network error.
    pub fn inject_failures(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn window_candles(&self) -> &[Candle] {
        &self.history[self.window.clone()]
    }
}

impl Transport for BacktestTransport {
    fn subscribe_to_tick(&self, _opts: &StrategyOptions) -> Result<TickStream, TransportError> {
        Ok(Box::new(WindowIter {
            buf: Arc::clone(&self.history),
            next: self.window.start,
            end: self.window.end,
        }))
    }

    fn place_order(
        &self,
        order: &PendingOrder,
        opts: &StrategyOptions,
    ) -> Result<ExecutedOrder, TransportError> {
        if self.take_failure() {
            return Err(TransportError::Network("injected failure".into()));
        }

        let executed_lots = self.prepare_lots(order.lots, &self.instrument.id);
        if executed_lots < self.instrument.min_quantity {
            return Err(TransportError::Rejected(format!(
                "lots {executed_lots} below minimum {}",
                self.instrument.min_quantity
            )));
        }

        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst);
        let executed = ExecutedOrder {
            pending: order.clone(),
            order_id: format!("bt-{seq}"),
            executed_lots,
            commission: Commission {
                currency: opts.currency.clone(),
                value: order.price * executed_lots * opts.fee / 100.0,
            },
        };

        if let Some(batch) = self.transaction.lock().unwrap().as_mut() {
            batch.push(executed.clone());
        }
        Ok(executed)
    }

    fn get_instrument(&self, _opts: &StrategyOptions) -> Result<Instrument, TransportError> {
        Ok(self.instrument.clone())
    }

    fn prepare_lots(&self, lots: f64, _instrument_id: &str) -> f64 {
        self.instrument.round_lots(lots)
    }

    fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    fn history(&self, _opts: &StrategyOptions, days: u32) -> Result<TickStream, TransportError> {
        let candles = self.window_candles();
        let start = match candles.last() {
            None => self.window.start,
            Some(last) => {
                let cutoff = last.time - Duration::days(days as i64).num_milliseconds();
                let offset = candles.partition_point(|c| c.time < cutoff);
                self.window.start + offset
            }
        };
        Ok(Box::new(WindowIter {
            buf: Arc::clone(&self.history),
            next: start,
            end: self.window.end,
        }))
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn start_transaction(&self, _opts: &StrategyOptions) -> Result<(), TransportError> {
        let mut txn = self.transaction.lock().unwrap();
        *txn = Some(Vec::new());
        Ok(())
    }

    fn end_transaction(
        &self,
        _opts: &StrategyOptions,
    ) -> Result<Vec<ExecutedOrder>, TransportError> {
        self.transaction
            .lock()
            .unwrap()
            .take()
            .ok_or(TransportError::NoActiveTransaction)
    }
}
