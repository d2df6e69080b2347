//! Transaction — a batch of pending orders submitted as one atomic unit.

use crate::domain::{ExecutedOrder, PendingOrder};
use crate::transport::TransportError;

/// Owns its member orders until `execute` completes, then yields the
/// resulting executed orders and releases ownership.
#[derive(Debug, Default)]
pub struct Transaction {
    orders: Vec<PendingOrder>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, order: PendingOrder) {
        self.orders.push(order);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Submit every member strictly in insertion order. A member failure
    /// aborts the remainder and surfaces the error; nothing is retried here —
    /// the placement closure owns retry policy.
    pub fn execute(
        self,
        mut place: impl FnMut(&mut PendingOrder) -> Result<ExecutedOrder, TransportError>,
    ) -> Result<Vec<ExecutedOrder>, TransportError> {
        let mut executed = Vec::with_capacity(self.orders.len());
        for mut order in self.orders {
            executed.push(place(&mut order)?);
        }
        Ok(executed)
    }
}
