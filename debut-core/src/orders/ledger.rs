//! Order ledger — authoritative record of one strategy instance's open
//! positions.

use crate::domain::{ExecutedOrder, OrderSide};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("unknown order cid {0}")]
    UnknownOrder(u64),
    #[error("reducing order cid {cid} by {requested} lots exceeds remaining {remaining}")]
    ExcessiveReduction {
        cid: u64,
        remaining: f64,
        requested: f64,
    },
}

/// Open executed orders in creation order, plus the client-id sequence.
#[derive(Debug, Default)]
pub struct OrderLedger {
    orders: Vec<ExecutedOrder>,
    next_cid: u64,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next client order id.
    pub fn next_cid(&mut self) -> u64 {
        self.next_cid += 1;
        self.next_cid
    }

    pub fn add(&mut self, order: ExecutedOrder) {
        self.orders.push(order);
    }

    pub fn remove(&mut self, cid: u64) -> Option<ExecutedOrder> {
        let idx = self.orders.iter().position(|o| o.cid() == cid)?;
        Some(self.orders.remove(idx))
    }

    pub fn get(&self, cid: u64) -> Option<&ExecutedOrder> {
        self.orders.iter().find(|o| o.cid() == cid)
    }

    pub fn orders(&self) -> &[ExecutedOrder] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Snapshot of orders matching an optional predicate, in ledger order.
    pub fn matching(&self, filter: Option<&dyn Fn(&ExecutedOrder) -> bool>) -> Vec<ExecutedOrder> {
        self.orders
            .iter()
            .filter(|o| filter.map_or(true, |f| f(o)))
            .cloned()
            .collect()
    }

    /// Shrink an open position in place after a partial unwind. The remaining
    /// position can reach zero but never goes negative.
    pub fn reduce_position(&mut self, cid: u64, by_lots: f64) -> Result<&ExecutedOrder, LedgerError> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.cid() == cid)
            .ok_or(LedgerError::UnknownOrder(cid))?;
        if by_lots > order.executed_lots {
            return Err(LedgerError::ExcessiveReduction {
                cid,
                remaining: order.executed_lots,
                requested: by_lots,
            });
        }
        order.executed_lots -= by_lots;
        order.pending.lots = order.executed_lots;
        Ok(order)
    }

    /// Total open lots for one side.
    pub fn total_lots(&self, side: OrderSide) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.side() == side)
            .map(|o| o.executed_lots)
            .sum()
    }

    /// Replace the whole ledger content (snapshot restore).
    pub fn replace_all(&mut self, orders: Vec<ExecutedOrder>) {
        self.next_cid = orders.iter().map(ExecutedOrder::cid).max().unwrap_or(0);
        self.orders = orders;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Commission, OrderSide, PendingOrder};

    fn executed(cid: u64, side: OrderSide, lots: f64) -> ExecutedOrder {
        ExecutedOrder {
            pending: PendingOrder {
                cid,
                side,
                author: "test".into(),
                time: 0,
                price: 100.0,
                lots,
                close: false,
                open_price: None,
                open_id: None,
                sandbox: false,
                learning: false,
                retries: 0,
                reduce: None,
                error: None,
            },
            order_id: format!("srv-{cid}"),
            executed_lots: lots,
            commission: Commission {
                currency: "USD".into(),
                value: 0.0,
            },
        }
    }

    #[test]
    fn cid_sequence_is_monotonic() {
        let mut ledger = OrderLedger::new();
        assert_eq!(ledger.next_cid(), 1);
        assert_eq!(ledger.next_cid(), 2);
    }

    #[test]
    fn add_remove_lookup() {
        let mut ledger = OrderLedger::new();
        ledger.add(executed(1, OrderSide::Buy, 2.0));
        ledger.add(executed(2, OrderSide::Sell, 1.0));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(2).unwrap().side(), OrderSide::Sell);

        let removed = ledger.remove(1).unwrap();
        assert_eq!(removed.cid(), 1);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.remove(1).is_none());
    }

    #[test]
    fn reduce_position_shrinks_in_place() {
        let mut ledger = OrderLedger::new();
        ledger.add(executed(1, OrderSide::Buy, 10.0));
        let order = ledger.reduce_position(1, 4.0).unwrap();
        assert_eq!(order.executed_lots, 6.0);
        assert_eq!(order.pending.lots, 6.0);
    }

    #[test]
    fn reduce_position_rejects_negative_remainder() {
        let mut ledger = OrderLedger::new();
        ledger.add(executed(1, OrderSide::Buy, 3.0));
        let err = ledger.reduce_position(1, 3.5).unwrap_err();
        assert!(matches!(err, LedgerError::ExcessiveReduction { .. }));
        // Original untouched after the failed reduction.
        assert_eq!(ledger.get(1).unwrap().executed_lots, 3.0);
    }

    #[test]
    fn reduce_to_exactly_zero_is_allowed() {
        let mut ledger = OrderLedger::new();
        ledger.add(executed(1, OrderSide::Buy, 3.0));
        let order = ledger.reduce_position(1, 3.0).unwrap();
        assert_eq!(order.executed_lots, 0.0);
    }

    #[test]
    fn matching_honors_filter() {
        let mut ledger = OrderLedger::new();
        ledger.add(executed(1, OrderSide::Buy, 2.0));
        ledger.add(executed(2, OrderSide::Sell, 1.0));
        ledger.add(executed(3, OrderSide::Buy, 4.0));

        let all = ledger.matching(None);
        assert_eq!(all.len(), 3);

        let filter = |o: &ExecutedOrder| o.side() == OrderSide::Buy;
        let buys = ledger.matching(Some(&filter));
        assert_eq!(buys.len(), 2);
        assert!(buys.iter().all(|o| o.side() == OrderSide::Buy));
    }

    #[test]
    fn total_lots_per_side() {
        let mut ledger = OrderLedger::new();
        ledger.add(executed(1, OrderSide::Buy, 2.0));
        ledger.add(executed(2, OrderSide::Buy, 3.0));
        ledger.add(executed(3, OrderSide::Sell, 1.5));
        assert_eq!(ledger.total_lots(OrderSide::Buy), 5.0);
        assert_eq!(ledger.total_lots(OrderSide::Sell), 1.5);
    }

    #[test]
    fn replace_all_resumes_cid_sequence() {
        let mut ledger = OrderLedger::new();
        ledger.replace_all(vec![executed(5, OrderSide::Buy, 1.0)]);
        assert_eq!(ledger.next_cid(), 6);
    }
}
