//! Ledger store boundary.
//!
//! The durable system of record for accounts, items, parties, journal entries
//! and the transaction log. Individual calls are atomic; nothing spans calls.
//! Multi-write units of work are coordinated by the submission saga.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{FaultPoint, InMemoryLedgerStore};
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, StoreError, TransactionRecord};
