//! Infrastructure layer: ledger store adapters, stock synchronization, the
//! transaction log, configuration and the submission saga.

pub mod config;
pub mod error;
pub mod inventory_sync;
pub mod store;
pub mod submission;
pub mod transaction_recorder;


pub use config::EngineConfig;
pub use error::{SagaStep, SubmissionError};
pub use inventory_sync::InventorySynchronizer;
pub use store::{
    FaultPoint, InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError,
    TransactionRecord,
};
pub use submission::{PostingReceipt, SubmissionService};
pub use transaction_recorder::{RecordFailure, RecordedLines, TransactionRecorder};
