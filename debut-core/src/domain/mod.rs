//! Domain types: candles, orders, instruments, depth, strategy options.

mod candle;
mod depth;
mod instrument;
mod options;
mod order;

pub use candle::{Candle, Timeframe};
pub use depth::{Depth, DepthOrder};
pub use instrument::{Instrument, InstrumentKind};
pub use options::{Broker, OptionsError, StrategyOptions, WorkingEnv};
pub use order::{Commission, ExecutedOrder, OrderErrorCode, OrderSide, PendingOrder};
