//! Order-book depth snapshot.

use serde::{Deserialize, Serialize};

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthOrder {
    pub price: f64,
    pub qty: f64,
}

/// Bid/ask snapshot delivered to the `on_depth` hook.
///
/// Bids are expected best-first (descending price), asks best-first
/// (ascending price); the transport is responsible for the ordering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Depth {
    pub bids: Vec<DepthOrder>,
    pub asks: Vec<DepthOrder>,
}

impl Depth {
    pub fn best_bid(&self) -> Option<&DepthOrder> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthOrder> {
        self.asks.first()
    }

    /// Mid price of the top of the book, when both sides are present.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }
}
