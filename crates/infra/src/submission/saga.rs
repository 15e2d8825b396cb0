//! Compensation log for one submission.
//!
//! Each completed write pushes its inverse. On failure the inverses run in
//! reverse order; every inverse is attempted even if an earlier one fails.

use tracing::{error, warn};

use stockledger_core::{JournalEntryId, TransactionId};
use stockledger_inventory::StockUpdate;

use crate::error::{SagaStep, SubmissionError};
use crate::inventory_sync::InventorySynchronizer;
use crate::store::{LedgerStore, StoreError};

#[derive(Debug, Clone)]
pub(crate) enum Compensation {
    RestoreStock(Vec<StockUpdate>),
    DeleteJournalEntry(JournalEntryId),
    DeleteTransactions(Vec<TransactionId>),
}

pub(crate) struct CommitSaga<'a, S: ?Sized> {
    store: &'a S,
    max_retries: u32,
    done: Vec<Compensation>,
}

impl<'a, S> CommitSaga<'a, S>
where
    S: LedgerStore + ?Sized,
{
    pub(crate) fn new(store: &'a S, max_retries: u32) -> Self {
        Self {
            store,
            max_retries,
            done: Vec::new(),
        }
    }

    pub(crate) fn completed(&mut self, compensation: Compensation) {
        self.done.push(compensation);
    }

    /// Roll back and turn a failed step into the matching error.
    pub(crate) fn fail(self, step: SagaStep, source: StoreError) -> SubmissionError {
        if self.done.is_empty() {
            return SubmissionError::persistence(step, source);
        }

        match self.compensate() {
            Ok(()) => {
                warn!(%step, error = %source, "submission rolled back");
                SubmissionError::PartialCommit { step, source }
            }
            Err(compensation) => {
                error!(%step, error = %source, ?compensation, "rollback failed, ledger is inconsistent");
                SubmissionError::Inconsistent {
                    failure: format!("{step} failed: {source}"),
                    compensation,
                }
            }
        }
    }

    fn compensate(&self) -> Result<(), Vec<String>> {
        let mut failures = Vec::new();
        for compensation in self.done.iter().rev() {
            match compensation {
                Compensation::RestoreStock(updates) => {
                    let sync = InventorySynchronizer::new(self.store, self.max_retries);
                    if let Err(errs) = sync.restore(updates) {
                        failures.extend(errs);
                    }
                }
                Compensation::DeleteJournalEntry(id) => {
                    if let Err(e) = self.store.delete_journal_entry(*id) {
                        failures.push(format!("delete journal entry {id}: {e}"));
                    }
                }
                Compensation::DeleteTransactions(ids) => {
                    for id in ids.iter().rev() {
                        if let Err(e) = self.store.delete_transaction(*id) {
                            failures.push(format!("delete transaction {id}: {e}"));
                        }
                    }
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}
