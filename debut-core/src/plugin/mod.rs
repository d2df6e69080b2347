//! Plugin contract — the closed set of lifecycle hooks a strategy extension
//! may handle.
//!
//! A plugin is a named value implementing any subset of the hooks; hooks it
//! does not override keep their identity defaults, which cannot alter
//! dispatch semantics. Every hook receives an explicit [`PluginContext`]
//! assembled by the runtime — plugins never hold a reference back into the
//! runtime.
//!
//! Hooks fall into three disciplines, dispatched by [`PluginDriver`]:
//! - sync bookkeeping (`on_init`, `on_order_updated`) — all handlers run;
//! - gated (`before_tick`, `before_open`, `before_close`) — the first
//!   [`Gate::Skip`] aborts the pending action;
//! - ordered side-effecting (`on_start`, `on_dispose`, `on_tick`,
//!   `on_candle`, `on_after_candle`, `on_open`, `on_close`, `on_depth`) —
//!   strictly sequential in registration order, the first error aborts
//!   dispatch of that event.

mod driver;

pub use driver::{DriverError, PluginDriver};

use crate::domain::{Candle, Depth, ExecutedOrder, Instrument, PendingOrder, StrategyOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Verdict of a gated hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gate {
    Proceed,
    Skip,
}

impl Gate {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Error raised by a plugin hook handler. Aborts dispatch of that event only;
/// driver registration and the order ledger stay intact.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Snapshot of every stateful plugin, keyed by unique plugin name.
pub type PluginSnapshot = BTreeMap<String, serde_json::Value>;

/// Immutable view of runtime state passed to every hook call.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    pub opts: &'a StrategyOptions,
    pub instrument: &'a Instrument,
    pub prev_candle: Option<&'a Candle>,
    pub current_candle: Option<&'a Candle>,
    /// Open positions of this strategy instance, in creation order.
    pub orders: &'a [ExecutedOrder],
    /// True while replaying history through `learn`.
    pub learning: bool,
}

/// A strategy extension. Implement any subset of the hooks.
#[allow(unused_variables)]
pub trait Plugin: Send {
    /// Unique name; the driver rejects duplicate registrations and the
    /// snapshot map is keyed by it.
    fn name(&self) -> &str;

    // ── Sync bookkeeping hooks ──

    fn on_init(&mut self, ctx: &PluginContext<'_>) {}

    /// An executed order changed in place (partial reduce).
    fn on_order_updated(&mut self, ctx: &PluginContext<'_>, order: &ExecutedOrder) {}

    // ── Gated hooks ──

    fn before_tick(&mut self, ctx: &PluginContext<'_>, tick: &Candle) -> Gate {
        Gate::Proceed
    }

    fn before_open(&mut self, ctx: &PluginContext<'_>, order: &PendingOrder) -> Gate {
        Gate::Proceed
    }

    fn before_close(
        &mut self,
        ctx: &PluginContext<'_>,
        order: &PendingOrder,
        closing: &ExecutedOrder,
    ) -> Gate {
        Gate::Proceed
    }

    // ── Ordered side-effecting hooks ──

    fn on_start(&mut self, ctx: &PluginContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    fn on_dispose(&mut self, ctx: &PluginContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    fn on_tick(&mut self, ctx: &PluginContext<'_>, tick: &Candle) -> Result<(), HookError> {
        Ok(())
    }

    /// A timeframe period completed; `candle` is the closed candle.
    fn on_candle(&mut self, ctx: &PluginContext<'_>, candle: &Candle) -> Result<(), HookError> {
        Ok(())
    }

    fn on_after_candle(
        &mut self,
        ctx: &PluginContext<'_>,
        candle: &Candle,
    ) -> Result<(), HookError> {
        Ok(())
    }

    fn on_depth(&mut self, ctx: &PluginContext<'_>, depth: &Depth) -> Result<(), HookError> {
        Ok(())
    }

    fn on_open(&mut self, ctx: &PluginContext<'_>, order: &ExecutedOrder) -> Result<(), HookError> {
        Ok(())
    }

    fn on_close(
        &mut self,
        ctx: &PluginContext<'_>,
        order: &ExecutedOrder,
        closing: &ExecutedOrder,
    ) -> Result<(), HookError> {
        Ok(())
    }

    // ── Snapshot pair ──

    /// Serialize internal progress. `None` means the plugin is stateless and
    /// is omitted from the driver snapshot entirely.
    fn snapshot(&self) -> Option<serde_json::Value> {
        None
    }

    /// Restore internal progress from a blob previously produced by
    /// [`Plugin::snapshot`]. Must be idempotent.
    fn hydrate(&mut self, state: &serde_json::Value) {}
}
