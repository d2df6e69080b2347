//! Order bookkeeping: the per-instance ledger and atomic transactions.

mod ledger;
mod transaction;

pub use ledger::{LedgerError, OrderLedger};
pub use transaction::Transaction;
