//! Order types — two lifecycle stages modeled as pending and executed records.
//!
//! A `PendingOrder` is an intent to trade; an `ExecutedOrder` refines it with
//! the server-assigned id, the actually filled lot size and the commission.
//! The transition happens exactly once per trade action; a failed action
//! leaves a pending order carrying an error code instead of throwing.

use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn flip(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Why a pending order never reached the executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderErrorCode {
    TransportTimeout,
    Rejected,
    InsufficientFunds,
    Unknown,
}

/// Intent to trade, not yet acknowledged by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Client-side identifier, unique within one strategy instance.
    pub cid: u64,
    pub side: OrderSide,
    /// Strategy instance that authored the order.
    pub author: String,
    /// Current candle time at creation, epoch ms.
    pub time: i64,
    /// Requested price.
    pub price: f64,
    /// Requested lots.
    pub lots: f64,
    /// True when this order closes (or reduces) a previous order.
    #[serde(default)]
    pub close: bool,
    /// Open price of the order being closed (close orders only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_price: Option<f64>,
    /// Server id of the order being closed (close orders only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_id: Option<String>,
    #[serde(default)]
    pub sandbox: bool,
    /// Set on orders created while replaying history in learning mode.
    #[serde(default)]
    pub learning: bool,
    /// Transport submission attempts so far.
    #[serde(default)]
    pub retries: u32,
    /// Fraction in [0, 1] when this order partially unwinds a position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OrderErrorCode>,
}

/// Fee charged by the transport for one executed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub currency: String,
    pub value: f64,
}

/// A pending order acknowledged and (possibly partially) filled by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedOrder {
    #[serde(flatten)]
    pub pending: PendingOrder,
    /// Placed order identifier assigned by the server.
    pub order_id: String,
    /// Filled lots; may be less than `pending.lots` on a partial fill.
    pub executed_lots: f64,
    pub commission: Commission,
}

impl ExecutedOrder {
    pub fn cid(&self) -> u64 {
        self.pending.cid
    }

    pub fn side(&self) -> OrderSide {
        self.pending.side
    }

    pub fn price(&self) -> f64 {
        self.pending.price
    }

    pub fn is_close(&self) -> bool {
        self.pending.close
    }
}
