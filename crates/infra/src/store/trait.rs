use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::sync::Arc;

use stockledger_accounting::{Account, JournalEntry, JournalLine};
use stockledger_core::{ItemId, JournalEntryId, SubmissionKey, TransactionId};
use stockledger_inventory::Item;
use stockledger_orders::OrderKind;
use stockledger_parties::Party;

/// One line of the stock activity log.
///
/// Append-only once the submission that wrote it has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Submission that wrote this record.
    pub submission_key: SubmissionKey,
    pub item_id: ItemId,
    pub kind: OrderKind,
    pub quantity: i64,
    pub counterparty: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger store operation error.
///
/// Infrastructure failures only; business rule failures are `DomainError`s.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Conditional write lost against a concurrent writer.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Connection, query or lock failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Synchronous ledger store.
///
/// Implementations must make `update_item_quantity` a compare-and-swap: the
/// write only happens if the stored quantity still equals `expected`, and a
/// mismatch is reported as [`StoreError::Conflict`].
pub trait LedgerStore: Send + Sync {
    /// All accounts with balances derived from posted journal lines.
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Create a journal entry header; the store assigns id and timestamp.
    fn create_journal_entry(&self, description: &str) -> Result<JournalEntryId, StoreError>;

    fn insert_journal_lines(&self, lines: &[JournalLine]) -> Result<(), StoreError>;

    /// Remove an entry header and all its lines (compensation only).
    fn delete_journal_entry(&self, id: JournalEntryId) -> Result<(), StoreError>;

    /// Entries with their lines, newest first.
    fn list_journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError>;

    fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    fn get_item(&self, id: ItemId) -> Result<Item, StoreError>;

    fn update_item_quantity(
        &self,
        id: ItemId,
        expected: i64,
        new_quantity: i64,
    ) -> Result<(), StoreError>;

    fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError>;

    /// Remove a record written by a submission that did not commit.
    fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError>;

    /// Transaction log, newest first.
    fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError>;

    fn transactions_for_submission(
        &self,
        key: SubmissionKey,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    fn list_customers(&self) -> Result<Vec<Party>, StoreError>;

    fn list_suppliers(&self) -> Result<Vec<Party>, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        (**self).list_accounts()
    }

    fn create_journal_entry(&self, description: &str) -> Result<JournalEntryId, StoreError> {
        (**self).create_journal_entry(description)
    }

    fn insert_journal_lines(&self, lines: &[JournalLine]) -> Result<(), StoreError> {
        (**self).insert_journal_lines(lines)
    }

    fn delete_journal_entry(&self, id: JournalEntryId) -> Result<(), StoreError> {
        (**self).delete_journal_entry(id)
    }

    fn list_journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).list_journal_entries()
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        (**self).list_items()
    }

    fn get_item(&self, id: ItemId) -> Result<Item, StoreError> {
        (**self).get_item(id)
    }

    fn update_item_quantity(
        &self,
        id: ItemId,
        expected: i64,
        new_quantity: i64,
    ) -> Result<(), StoreError> {
        (**self).update_item_quantity(id, expected, new_quantity)
    }

    fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        (**self).insert_transaction(record)
    }

    fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError> {
        (**self).delete_transaction(id)
    }

    fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        (**self).list_transactions()
    }

    fn transactions_for_submission(
        &self,
        key: SubmissionKey,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        (**self).transactions_for_submission(key)
    }

    fn list_customers(&self) -> Result<Vec<Party>, StoreError> {
        (**self).list_customers()
    }

    fn list_suppliers(&self) -> Result<Vec<Party>, StoreError> {
        (**self).list_suppliers()
    }
}
