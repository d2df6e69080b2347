//! Debut Core — strategy runtime, plugin hook driver, order ledger,
//! transport boundary.
//!
//! This crate contains the execution half of the system:
//! - Domain types (candles, orders, instruments, depth, strategy options)
//! - Genetic schema descriptors and the options validator
//! - Plugin driver with three dispatch disciplines (sync, gated, ordered)
//! - Order ledger with partial reduction and atomic transactions
//! - The strategy runtime state machine (`Created → Initialized → Running →
//!   Disposed`) with the gated tick pipeline and `learn` replay
//! - The transport trait plus a deterministic backtest implementation
//!
//! The search half — population evolution, walk-forward validation, island
//! topology — lives in `debut-genetic` and drives this crate through the
//! [`strategy::StrategyMeta`] contract.

pub mod domain;
pub mod orders;
pub mod plugin;
pub mod runtime;
pub mod schema;
pub mod strategy;
pub mod transport;

pub use domain::{
    Broker, Candle, Commission, Depth, DepthOrder, ExecutedOrder, Instrument, InstrumentKind,
    OptionsError, OrderErrorCode, OrderSide, PendingOrder, StrategyOptions, Timeframe, WorkingEnv,
};
pub use orders::{LedgerError, OrderLedger, Transaction};
pub use plugin::{
    DriverError, Gate, HookError, Plugin, PluginContext, PluginDriver, PluginSnapshot,
};
pub use runtime::{
    CoreError, OrderOutcome, RuntimeSnapshot, RuntimeState, StrategyRuntime, Subscription,
};
pub use schema::{GeneticSchema, SchemaDescriptor, SchemaValue, validate_schema};
pub use strategy::StrategyMeta;
pub use transport::{
    BacktestTransport, DepthStream, TickStream, Transport, TransportError,
};
