//! Plugin driver — ordered hook dispatch in three disciplines.

use super::{Gate, HookError, Plugin, PluginContext, PluginSnapshot};
use crate::domain::{Candle, Depth, ExecutedOrder, PendingOrder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("duplicate plugin name '{0}'")]
    DuplicatePlugin(String),
    #[error("plugin '{plugin}' failed in {hook}: {source}")]
    Hook {
        plugin: String,
        hook: &'static str,
        #[source]
        source: HookError,
    },
}

/// Owns the ordered plugin list and dispatches lifecycle events.
///
/// Registration order is dispatch order for every discipline; that ordering
/// is a hard guarantee — a later-registered plugin's handler observes all
/// side effects of earlier handlers for the same event, never the reverse.
#[derive(Default)]
pub struct PluginDriver {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append plugins in order. Names must be unique across all
    /// registrations; on a duplicate nothing from the batch is registered.
    pub fn register(&mut self, plugins: Vec<Box<dyn Plugin>>) -> Result<(), DriverError> {
        for (i, plugin) in plugins.iter().enumerate() {
            let name = plugin.name();
            let dup_existing = self.plugins.iter().any(|p| p.name() == name);
            let dup_batch = plugins[..i].iter().any(|p| p.name() == name);
            if dup_existing || dup_batch {
                return Err(DriverError::DuplicatePlugin(name.to_string()));
            }
        }
        self.plugins.extend(plugins);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    // ── Dispatch disciplines ──

    /// Sync: every handler runs in registration order, no short-circuit.
    fn reduce_sync(&mut self, mut call: impl FnMut(&mut dyn Plugin)) {
        for plugin in &mut self.plugins {
            call(plugin.as_mut());
        }
    }

    /// Gated: handlers run in order until one skips; the skip aborts the
    /// pending action and later handlers never run.
    fn reduce_gated(&mut self, mut call: impl FnMut(&mut dyn Plugin) -> Gate) -> Gate {
        for plugin in &mut self.plugins {
            if call(plugin.as_mut()).is_skip() {
                return Gate::Skip;
            }
        }
        Gate::Proceed
    }

    /// Ordered: strictly sequential; the first error aborts dispatch of this
    /// event and propagates with the offending plugin's name attached.
    fn reduce_ordered(
        &mut self,
        hook: &'static str,
        mut call: impl FnMut(&mut dyn Plugin) -> Result<(), HookError>,
    ) -> Result<(), DriverError> {
        for plugin in &mut self.plugins {
            let name = plugin.name().to_string();
            call(plugin.as_mut()).map_err(|source| DriverError::Hook {
                plugin: name,
                hook,
                source,
            })?;
        }
        Ok(())
    }

    // ── Typed hook entry points ──

    pub fn on_init(&mut self, ctx: &PluginContext<'_>) {
        self.reduce_sync(|p| p.on_init(ctx));
    }

    pub fn on_order_updated(&mut self, ctx: &PluginContext<'_>, order: &ExecutedOrder) {
        self.reduce_sync(|p| p.on_order_updated(ctx, order));
    }

    pub fn before_tick(&mut self, ctx: &PluginContext<'_>, tick: &Candle) -> Gate {
        self.reduce_gated(|p| p.before_tick(ctx, tick))
    }

    pub fn before_open(&mut self, ctx: &PluginContext<'_>, order: &PendingOrder) -> Gate {
        self.reduce_gated(|p| p.before_open(ctx, order))
    }

    pub fn before_close(
        &mut self,
        ctx: &PluginContext<'_>,
        order: &PendingOrder,
        closing: &ExecutedOrder,
    ) -> Gate {
        self.reduce_gated(|p| p.before_close(ctx, order, closing))
    }

    pub fn on_start(&mut self, ctx: &PluginContext<'_>) -> Result<(), DriverError> {
        self.reduce_ordered("on_start", |p| p.on_start(ctx))
    }

    pub fn on_dispose(&mut self, ctx: &PluginContext<'_>) -> Result<(), DriverError> {
        self.reduce_ordered("on_dispose", |p| p.on_dispose(ctx))
    }

    pub fn on_tick(&mut self, ctx: &PluginContext<'_>, tick: &Candle) -> Result<(), DriverError> {
        self.reduce_ordered("on_tick", |p| p.on_tick(ctx, tick))
    }

    pub fn on_candle(
        &mut self,
        ctx: &PluginContext<'_>,
        candle: &Candle,
    ) -> Result<(), DriverError> {
        self.reduce_ordered("on_candle", |p| p.on_candle(ctx, candle))
    }

    pub fn on_after_candle(
        &mut self,
        ctx: &PluginContext<'_>,
        candle: &Candle,
    ) -> Result<(), DriverError> {
        self.reduce_ordered("on_after_candle", |p| p.on_after_candle(ctx, candle))
    }

    pub fn on_depth(&mut self, ctx: &PluginContext<'_>, depth: &Depth) -> Result<(), DriverError> {
        self.reduce_ordered("on_depth", |p| p.on_depth(ctx, depth))
    }

    pub fn on_open(
        &mut self,
        ctx: &PluginContext<'_>,
        order: &ExecutedOrder,
    ) -> Result<(), DriverError> {
        self.reduce_ordered("on_open", |p| p.on_open(ctx, order))
    }

    pub fn on_close(
        &mut self,
        ctx: &PluginContext<'_>,
        order: &ExecutedOrder,
        closing: &ExecutedOrder,
    ) -> Result<(), DriverError> {
        self.reduce_ordered("on_close", |p| p.on_close(ctx, order, closing))
    }

    // ── Snapshot round-trip ──

    /// Collect each stateful plugin's snapshot. Plugins returning `None` are
    /// omitted, not replaced with an empty entry.
    pub fn snapshot(&self) -> PluginSnapshot {
        self.plugins
            .iter()
            .filter_map(|p| p.snapshot().map(|state| (p.name().to_string(), state)))
            .collect()
    }

    /// Hydrate plugins from a previously collected snapshot. Plugins without
    /// an entry are untouched; hydration is idempotent by contract.
    pub fn restore(&mut self, snapshot: &PluginSnapshot) {
        for plugin in &mut self.plugins {
            if let Some(state) = snapshot.get(plugin.name()) {
                plugin.hydrate(state);
            }
        }
    }
}
