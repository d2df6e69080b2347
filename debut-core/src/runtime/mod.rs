//! Strategy runtime — the per-instance state machine driving plugins, orders
//! and market data.
//!
//! One runtime instance is single-threaded cooperative: tick processing and
//! hook dispatch never overlap, so the driver's ordering guarantees hold
//! without locks. Parallelism lives one level up, in the optimizer, which
//! runs independent instances on a capped worker pool.
//!
//! Lifecycle: `Created → Initialized → Running → Disposed`. `on_init` is
//! sync-dispatched once, lazily, at the first `start` or `learn`; `on_start`
//! fires before the first tick; `on_dispose` is terminal and `dispose` is
//! idempotent.

use crate::domain::{
    Candle, Depth, ExecutedOrder, Instrument, OrderErrorCode, OrderSide, OptionsError,
    PendingOrder, StrategyOptions, Timeframe, WorkingEnv,
};
use crate::orders::{LedgerError, OrderLedger, Transaction};
use crate::plugin::{DriverError, Plugin, PluginContext, PluginDriver, PluginSnapshot};
use crate::transport::{TickStream, Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid options: {0}")]
    Options(#[from] OptionsError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("operation '{op}' is invalid in state {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },
    #[error("no market data received yet")]
    NoMarketData,
    #[error("reduce fraction {0} must be inside (0, 1)")]
    InvalidReduceFraction(f64),
}

/// Runtime lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeState {
    Created,
    Initialized,
    Running,
    Disposed,
}

impl RuntimeState {
    fn name(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Initialized => "Initialized",
            Self::Running => "Running",
            Self::Disposed => "Disposed",
        }
    }
}

/// Handle returned by `start`; cancelling (or disposing the runtime) stops
/// tick processing. Cloneable so the embedding host can keep one side.
#[derive(Debug, Clone)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Result of one order operation. Failures surface here, not as errors: a
/// rejected order carries its error code and the runtime keeps processing.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Placed(ExecutedOrder),
    /// A gated hook skipped the action; the transport was never called.
    Skipped,
    /// The transport failed past its retry budget; the pending order carries
    /// the error code.
    Rejected(PendingOrder),
}

impl OrderOutcome {
    pub fn executed(self) -> Option<ExecutedOrder> {
        match self {
            Self::Placed(order) => Some(order),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Serialized progress of a running strategy: open orders, options, and each
/// stateful plugin's blob. Opaque to the core beyond round-trip fidelity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub orders: Vec<ExecutedOrder>,
    pub options: StrategyOptions,
    pub plugins_data: PluginSnapshot,
}

/// Build the immutable hook context from disjoint runtime fields, leaving
/// `self.driver` free for the mutable dispatch borrow.
macro_rules! hook_ctx {
    ($self:ident) => {
        PluginContext {
            opts: &$self.opts,
            instrument: &$self.instrument,
            prev_candle: $self.prev_candle.as_ref(),
            current_candle: $self.current_candle.as_ref(),
            orders: $self.ledger.orders(),
            learning: $self.learning,
        }
    };
}

/// The Debut core: consumes market samples, dispatches lifecycle hooks and
/// mediates every order through the plugin pipeline.
pub struct StrategyRuntime<T: Transport> {
    transport: T,
    opts: StrategyOptions,
    env: WorkingEnv,
    instrument: Instrument,
    driver: PluginDriver,
    ledger: OrderLedger,
    state: RuntimeState,
    prev_candle: Option<Candle>,
    current_candle: Option<Candle>,
    learning: bool,
    tick_stream: Option<TickStream>,
    subscription: Option<Subscription>,
    name: String,
}

impl<T: Transport> StrategyRuntime<T> {
    pub fn new(transport: T, opts: StrategyOptions, env: WorkingEnv) -> Result<Self, CoreError> {
        opts.validate()?;
        let instrument = transport.get_instrument(&opts)?;
        let name = format!("{}@{}", opts.ticker, opts.interval.label());
        Ok(Self {
            transport,
            opts,
            env,
            instrument,
            driver: PluginDriver::new(),
            ledger: OrderLedger::new(),
            state: RuntimeState::Created,
            prev_candle: None,
            current_candle: None,
            learning: false,
            tick_stream: None,
            subscription: None,
            name,
        })
    }

    // ── Accessors ──

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn opts(&self) -> &StrategyOptions {
        &self.opts
    }

    pub fn env(&self) -> WorkingEnv {
        self.env
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn orders(&self) -> &[ExecutedOrder] {
        self.ledger.orders()
    }

    pub fn prev_candle(&self) -> Option<&Candle> {
        self.prev_candle.as_ref()
    }

    pub fn current_candle(&self) -> Option<&Candle> {
        self.current_candle.as_ref()
    }

    // ── Lifecycle ──

    /// Append plugins to the dispatch order. Only allowed before the first
    /// `start`/`learn` (`on_init` has not fired yet).
    pub fn register_plugins(&mut self, plugins: Vec<Box<dyn Plugin>>) -> Result<(), CoreError> {
        if self.state != RuntimeState::Created {
            return Err(CoreError::InvalidState {
                op: "register_plugins",
                state: self.state.name(),
            });
        }
        self.driver.register(plugins)?;
        Ok(())
    }

    fn ensure_initialized(&mut self) {
        if self.state == RuntimeState::Created {
            let ctx = hook_ctx!(self);
            self.driver.on_init(&ctx);
            self.state = RuntimeState::Initialized;
        }
    }

    /// Subscribe to the transport tick feed. Dispatches `on_start` once
    /// before any tick is processed and returns the cancellation handle.
    pub fn start(&mut self) -> Result<Subscription, CoreError> {
        if matches!(self.state, RuntimeState::Running | RuntimeState::Disposed) {
            return Err(CoreError::InvalidState {
                op: "start",
                state: self.state.name(),
            });
        }
        self.ensure_initialized();
        {
            let ctx = hook_ctx!(self);
            self.driver.on_start(&ctx)?;
        }
        self.tick_stream = Some(self.transport.subscribe_to_tick(&self.opts)?);
        let subscription = Subscription::new();
        self.subscription = Some(subscription.clone());
        self.state = RuntimeState::Running;
        Ok(subscription)
    }

    /// Drain the subscribed tick stream until it ends, the subscription is
    /// cancelled, or the runtime is disposed mid-hook.
    pub fn run(&mut self) -> Result<(), CoreError> {
        loop {
            if self.state != RuntimeState::Running || !self.subscription_active() {
                return Ok(());
            }
            let tick = match self.tick_stream.as_mut() {
                Some(stream) => stream.next(),
                None => None,
            };
            match tick {
                Some(tick) => self.feed_tick(tick)?,
                None => return Ok(()),
            }
        }
    }

    /// Feed one externally delivered tick. A tick arriving after the
    /// subscription was cancelled is dropped silently.
    pub fn process_tick(&mut self, tick: Candle) -> Result<(), CoreError> {
        if self.state != RuntimeState::Running {
            return Err(CoreError::InvalidState {
                op: "process_tick",
                state: self.state.name(),
            });
        }
        if !self.subscription_active() {
            return Ok(());
        }
        self.feed_tick(tick)
    }

    /// Feed one order-book snapshot to the `on_depth` pipeline.
    pub fn process_depth(&mut self, depth: &Depth) -> Result<(), CoreError> {
        if self.state != RuntimeState::Running {
            return Err(CoreError::InvalidState {
                op: "process_depth",
                state: self.state.name(),
            });
        }
        if !self.subscription_active() {
            return Ok(());
        }
        let ctx = hook_ctx!(self);
        self.driver.on_depth(&ctx, depth)?;
        Ok(())
    }

    /// Replay `days` of history through the tick pipeline in learning mode.
    /// Orders created during the replay carry the `learning` marker. The
    /// runtime stays Initialized, ready to `start` live afterwards.
    pub fn learn(&mut self, days: u32) -> Result<(), CoreError> {
        if matches!(self.state, RuntimeState::Running | RuntimeState::Disposed) {
            return Err(CoreError::InvalidState {
                op: "learn",
                state: self.state.name(),
            });
        }
        self.ensure_initialized();
        self.learning = true;
        let stream = match self.transport.history(&self.opts, days) {
            Ok(stream) => stream,
            Err(err) => {
                self.learning = false;
                return Err(err.into());
            }
        };
        for tick in stream {
            if let Err(err) = self.feed_tick(tick) {
                self.learning = false;
                return Err(err);
            }
        }
        self.learning = false;
        Ok(())
    }

    /// Dispatch `on_dispose`, unsubscribe and transition to the terminal
    /// state. Calling twice is a no-op.
    pub fn dispose(&mut self) -> Result<(), CoreError> {
        if self.state == RuntimeState::Disposed {
            return Ok(());
        }
        {
            let ctx = hook_ctx!(self);
            self.driver.on_dispose(&ctx)?;
        }
        if let Some(subscription) = &self.subscription {
            subscription.cancel();
        }
        self.tick_stream = None;
        self.state = RuntimeState::Disposed;
        Ok(())
    }

    fn subscription_active(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// The shared tick pipeline: gated `before_tick`, candle-boundary roll
    /// with `on_candle`/`on_after_candle`, then ordered `on_tick`.
    fn feed_tick(&mut self, tick: Candle) -> Result<(), CoreError> {
        let skip = {
            let ctx = hook_ctx!(self);
            self.driver.before_tick(&ctx, &tick).is_skip()
        };
        if skip {
            return Ok(());
        }

        let interval = self.opts.interval;
        match self.current_candle {
            None => {
                self.current_candle = Some(period_candle(&tick, interval));
            }
            Some(mut current) if interval.same_period(current.time, tick.time) => {
                current.absorb(&tick);
                self.current_candle = Some(current);
            }
            Some(closed) => {
                // The tick opens a new period: the forming candle is final.
                self.prev_candle = Some(closed);
                self.current_candle = Some(period_candle(&tick, interval));
                {
                    let ctx = hook_ctx!(self);
                    self.driver.on_candle(&ctx, &closed)?;
                }
                {
                    let ctx = hook_ctx!(self);
                    self.driver.on_after_candle(&ctx, &closed)?;
                }
            }
        }

        let ctx = hook_ctx!(self);
        self.driver.on_tick(&ctx, &tick)?;
        Ok(())
    }

    // ── Order operations ──

    /// Open a position at the current price. The gated `before_open` hook
    /// may skip the order, in which case the transport is never called.
    pub fn create_order(&mut self, side: OrderSide) -> Result<OrderOutcome, CoreError> {
        if self.state == RuntimeState::Disposed {
            return Err(CoreError::InvalidState {
                op: "create_order",
                state: self.state.name(),
            });
        }
        let candle = self.current_candle.ok_or(CoreError::NoMarketData)?;
        let price = candle.close;
        let raw_lots = self.opts.amount * self.opts.lots_multiplier / price;
        let lots = self
            .transport
            .prepare_lots(raw_lots, &self.instrument.id)
            .max(self.instrument.min_quantity);

        let cid = self.ledger.next_cid();
        let mut pending = PendingOrder {
            cid,
            side,
            author: self.name.clone(),
            time: candle.time,
            price,
            lots,
            close: false,
            open_price: None,
            open_id: None,
            sandbox: self.opts.sandbox,
            learning: self.learning,
            retries: 0,
            reduce: None,
            error: None,
        };

        if !self.instrument.meets_notional(lots, price) {
            pending.error = Some(OrderErrorCode::Rejected);
            return Ok(OrderOutcome::Rejected(pending));
        }

        let skip = {
            let ctx = hook_ctx!(self);
            self.driver.before_open(&ctx, &pending).is_skip()
        };
        if skip {
            return Ok(OrderOutcome::Skipped);
        }

        match place_with_retry(&self.transport, &mut pending, &self.opts) {
            Ok(executed) => {
                self.ledger.add(executed.clone());
                {
                    let ctx = hook_ctx!(self);
                    self.driver.on_open(&ctx, &executed)?;
                }
                Ok(OrderOutcome::Placed(executed))
            }
            Err(code) => {
                pending.error = Some(code);
                Ok(OrderOutcome::Rejected(pending))
            }
        }
    }

    /// Fully unwind an open position, linking the close back to the original
    /// order's id and price.
    pub fn close_order(&mut self, closing: &ExecutedOrder) -> Result<OrderOutcome, CoreError> {
        if self.state == RuntimeState::Disposed {
            return Err(CoreError::InvalidState {
                op: "close_order",
                state: self.state.name(),
            });
        }
        if self.ledger.get(closing.cid()).is_none() {
            return Err(LedgerError::UnknownOrder(closing.cid()).into());
        }
        let mut pending = self.build_close_pending(closing, closing.executed_lots, None)?;

        let skip = {
            let ctx = hook_ctx!(self);
            self.driver.before_close(&ctx, &pending, closing).is_skip()
        };
        if skip {
            return Ok(OrderOutcome::Skipped);
        }

        match place_with_retry(&self.transport, &mut pending, &self.opts) {
            Ok(executed) => {
                self.ledger.remove(closing.cid());
                {
                    let ctx = hook_ctx!(self);
                    self.driver.on_close(&ctx, &executed, closing)?;
                }
                Ok(OrderOutcome::Placed(executed))
            }
            Err(code) => {
                pending.error = Some(code);
                Ok(OrderOutcome::Rejected(pending))
            }
        }
    }

    /// Partially unwind an open position. The partial lot size is
    /// `executed_lots * fraction` prepared to instrument precision, clamped
    /// to the instrument minimum and never exceeding the open position; if
    /// clamping consumes the whole position the call degrades to a full
    /// close.
    pub fn reduce_order(
        &mut self,
        closing: &ExecutedOrder,
        fraction: f64,
    ) -> Result<OrderOutcome, CoreError> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(CoreError::InvalidReduceFraction(fraction));
        }
        if self.ledger.get(closing.cid()).is_none() {
            return Err(LedgerError::UnknownOrder(closing.cid()).into());
        }

        let partial = self
            .transport
            .prepare_lots(closing.executed_lots * fraction, &self.instrument.id)
            .max(self.instrument.min_quantity)
            .min(closing.executed_lots);
        if partial >= closing.executed_lots {
            return self.close_order(closing);
        }

        let mut pending = self.build_close_pending(closing, partial, Some(fraction))?;

        let skip = {
            let ctx = hook_ctx!(self);
            self.driver.before_close(&ctx, &pending, closing).is_skip()
        };
        if skip {
            return Ok(OrderOutcome::Skipped);
        }

        match place_with_retry(&self.transport, &mut pending, &self.opts) {
            Ok(executed) => {
                let updated = self
                    .ledger
                    .reduce_position(closing.cid(), executed.executed_lots)?
                    .clone();
                {
                    let ctx = hook_ctx!(self);
                    self.driver.on_order_updated(&ctx, &updated);
                }
                Ok(OrderOutcome::Placed(executed))
            }
            Err(code) => {
                pending.error = Some(code);
                Ok(OrderOutcome::Rejected(pending))
            }
        }
    }

    /// Close every open order matching the optional predicate. With
    /// `collapse` set and a transaction-capable transport the closes settle
    /// as one externally visible execution. Returns only the resulting
    /// executed orders.
    pub fn close_all(
        &mut self,
        collapse: bool,
        filter: Option<&dyn Fn(&ExecutedOrder) -> bool>,
    ) -> Result<Vec<ExecutedOrder>, CoreError> {
        if self.state == RuntimeState::Disposed {
            return Err(CoreError::InvalidState {
                op: "close_all",
                state: self.state.name(),
            });
        }
        let targets = self.ledger.matching(filter);
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        if collapse && self.transport.supports_transactions() {
            return self.close_all_collapsed(targets);
        }

        let mut closed = Vec::with_capacity(targets.len());
        for target in &targets {
            if let OrderOutcome::Placed(executed) = self.close_order(target)? {
                closed.push(executed);
            }
        }
        Ok(closed)
    }

    fn close_all_collapsed(
        &mut self,
        targets: Vec<ExecutedOrder>,
    ) -> Result<Vec<ExecutedOrder>, CoreError> {
        let mut txn = Transaction::new();
        let mut accepted = Vec::new();
        for target in targets {
            let pending = self.build_close_pending(&target, target.executed_lots, None)?;
            let skip = {
                let ctx = hook_ctx!(self);
                self.driver.before_close(&ctx, &pending, &target).is_skip()
            };
            if skip {
                continue;
            }
            txn.add(pending);
            accepted.push(target);
        }
        if txn.is_empty() {
            return Ok(Vec::new());
        }

        self.transport.start_transaction(&self.opts)?;
        let placed = {
            let transport = &self.transport;
            let opts = &self.opts;
            txn.execute(|order| {
                let budget = transport.retry_budget();
                loop {
                    match transport.place_order(order, opts) {
                        Ok(executed) => return Ok(executed),
                        Err(err) => {
                            order.retries += 1;
                            if order.retries > budget {
                                return Err(err);
                            }
                        }
                    }
                }
            })
        };
        let placed = match placed {
            Ok(placed) => placed,
            Err(err) => {
                // Release the half-open transaction before surfacing.
                let _ = self.transport.end_transaction(&self.opts);
                return Err(err.into());
            }
        };
        self.transport.end_transaction(&self.opts)?;

        for (target, executed) in accepted.iter().zip(placed.iter()) {
            self.ledger.remove(target.cid());
            {
                let ctx = hook_ctx!(self);
                self.driver.on_close(&ctx, executed, target)?;
            }
        }
        Ok(placed)
    }

    fn build_close_pending(
        &mut self,
        closing: &ExecutedOrder,
        lots: f64,
        reduce: Option<f64>,
    ) -> Result<PendingOrder, CoreError> {
        let candle = self.current_candle.ok_or(CoreError::NoMarketData)?;
        Ok(PendingOrder {
            cid: self.ledger.next_cid(),
            side: closing.side().flip(),
            author: self.name.clone(),
            time: candle.time,
            price: candle.close,
            lots,
            close: true,
            open_price: Some(closing.price()),
            open_id: Some(closing.order_id.clone()),
            sandbox: self.opts.sandbox,
            learning: self.learning,
            retries: 0,
            reduce,
            error: None,
        })
    }

    // ── Snapshot persistence ──

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            orders: self.ledger.orders().to_vec(),
            options: self.opts.clone(),
            plugins_data: self.driver.snapshot(),
        }
    }

    pub fn restore(&mut self, snapshot: &RuntimeSnapshot) {
        self.ledger.replace_all(snapshot.orders.clone());
        self.driver.restore(&snapshot.plugins_data);
    }

    pub fn plugins_snapshot(&self) -> PluginSnapshot {
        self.driver.snapshot()
    }

    pub fn restore_plugins_snapshot(&mut self, snapshot: &PluginSnapshot) {
        self.driver.restore(snapshot);
    }
}

/// Align a tick to the start of its timeframe period.
fn period_candle(tick: &Candle, interval: Timeframe) -> Candle {
    Candle {
        time: interval.start_of_period(tick.time),
        ..*tick
    }
}

/// Submit an order, retrying transport failures up to the transport's
/// budget. Past the budget the last failure class becomes the order's error
/// code.
fn place_with_retry<T: Transport>(
    transport: &T,
    pending: &mut PendingOrder,
    opts: &StrategyOptions,
) -> Result<ExecutedOrder, OrderErrorCode> {
    let budget = transport.retry_budget();
    loop {
        match transport.place_order(pending, opts) {
            Ok(executed) => return Ok(executed),
            Err(err) => {
                pending.retries += 1;
                if pending.retries > budget {
                    return Err(err.order_error_code());
                }
            }
        }
    }
}
