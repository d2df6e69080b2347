//! Transport — the broker/exchange boundary.
//!
//! Everything behind this trait is an external collaborator: market-data
//! subscription, order placement, instrument metadata. The crate ships one
//! implementation, [`BacktestTransport`], which replays a shared read-only
//! candle buffer; live broker transports are provided by the embedding
//! application.
//!
//! Feeds are pull streams: `subscribe_to_tick` hands back an iterator and
//! dropping it unsubscribes, which is the ownership-safe inversion of a push
//! handler plus unsubscribe closure.

mod backtest;

pub use backtest::BacktestTransport;

use crate::domain::{
    Candle, Depth, ExecutedOrder, Instrument, OrderErrorCode, PendingOrder, StrategyOptions,
};
use thiserror::Error;

/// Stream of market samples; exhausts at end of feed.
pub type TickStream = Box<dyn Iterator<Item = Candle> + Send>;

/// Stream of order-book snapshots.
pub type DepthStream = Box<dyn Iterator<Item = Depth> + Send>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("insufficient funds for {lots} lots at {price}")]
    InsufficientFunds { lots: f64, price: f64 },
    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),
    #[error("{0} is not supported by this transport")]
    Unsupported(&'static str),
    #[error("transactions are not supported by this transport")]
    TransactionsUnsupported,
    #[error("no transaction is active")]
    NoActiveTransaction,
}

impl TransportError {
    /// The error code recorded on an order after the retry budget is spent.
    pub fn order_error_code(&self) -> OrderErrorCode {
        match self {
            Self::Network(_) => OrderErrorCode::TransportTimeout,
            Self::Rejected(_) => OrderErrorCode::Rejected,
            Self::InsufficientFunds { .. } => OrderErrorCode::InsufficientFunds,
            _ => OrderErrorCode::Unknown,
        }
    }
}

/// Broker abstraction the strategy runtime drives.
pub trait Transport: Send + Sync {
    /// Subscribe to the live tick feed. Dropping the stream unsubscribes.
    fn subscribe_to_tick(&self, opts: &StrategyOptions) -> Result<TickStream, TransportError>;

    /// Subscribe to order-book snapshots. Optional.
    fn subscribe_order_book(
        &self,
        _opts: &StrategyOptions,
    ) -> Result<DepthStream, TransportError> {
        Err(TransportError::Unsupported("order book subscription"))
    }

    /// Submit an order; returns the executed order or a transport error.
    /// Sandbox placement is selected by the order's `sandbox` marker.
    fn place_order(
        &self,
        order: &PendingOrder,
        opts: &StrategyOptions,
    ) -> Result<ExecutedOrder, TransportError>;

    /// Fetch instrument metadata for the configured ticker.
    fn get_instrument(&self, opts: &StrategyOptions) -> Result<Instrument, TransportError>;

    /// Round a raw lot count to the instrument's tradeable precision.
    fn prepare_lots(&self, lots: f64, instrument_id: &str) -> f64;

    /// How many times a failed placement may be retried before the order is
    /// surfaced with an error code.
    fn retry_budget(&self) -> u32 {
        3
    }

    /// Historical candles covering the last `days` days of the feed, oldest
    /// first. Used by the runtime's `learn`.
    fn history(&self, opts: &StrategyOptions, days: u32) -> Result<TickStream, TransportError>;

    // ── Optional atomic batched settlement ──

    fn supports_transactions(&self) -> bool {
        false
    }

    fn start_transaction(&self, _opts: &StrategyOptions) -> Result<(), TransportError> {
        Err(TransportError::TransactionsUnsupported)
    }

    /// Finalize the active transaction, returning the orders settled in it.
    fn end_transaction(
        &self,
        _opts: &StrategyOptions,
    ) -> Result<Vec<ExecutedOrder>, TransportError> {
        Err(TransportError::TransactionsUnsupported)
    }
}
