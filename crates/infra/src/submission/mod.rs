//! Order submission: one atomic unit over several independent store writes.
//!
//! ```text
//! ReadyToSubmit order
//!   ↓
//! 0. Resolve account mapping, compute journal draft, check accounts exist
//!   ↓                                              (no writes yet)
//! 1. Stock compare-and-swap per item              ⟲ restore quantities
//!   ↓
//! 2. Journal entry header                          ⟲ delete entry
//!   ↓
//! 3. Journal lines                                 (deleted with the entry)
//!   ↓
//! 4. One transaction record per line               ⟲ delete records
//!   ↓
//! Posted (receipt cached under the submission key)
//! ```
//!
//! Any failure after step 1 runs the inverses of completed steps in reverse.

pub mod idempotency;
pub(crate) mod saga;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use stockledger_accounting::{
    FinancialSummary, JournalDraft, ManualLine, PostingEngine, ResolvedAccounts, summarize,
};
use stockledger_core::{AccountId, JournalEntryId, OrderId, SubmissionKey, TransactionId};
use stockledger_inventory::{ShipmentAlert, StockUpdate, evaluate_shipment_alerts_lenient};
use stockledger_orders::{OrderDraft, OrderStatus};

use crate::config::EngineConfig;
use crate::error::{SagaStep, SubmissionError};
use crate::inventory_sync::InventorySynchronizer;
use crate::store::{LedgerStore, StoreError};
use crate::transaction_recorder::TransactionRecorder;

use self::idempotency::{Admission, IdempotencyGuard};
use self::saga::{CommitSaga, Compensation};

/// Outcome of a committed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingReceipt {
    pub submission_key: SubmissionKey,
    pub order_id: OrderId,
    pub entry_id: JournalEntryId,
    /// One per order line, in line order.
    pub transaction_ids: Vec<TransactionId>,
    pub stock: Vec<StockUpdate>,
    pub posted_at: DateTime<Utc>,
}

pub struct SubmissionService<S> {
    store: S,
    config: EngineConfig,
    guard: IdempotencyGuard,
}

impl<S> SubmissionService<S>
where
    S: LedgerStore,
{
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            guard: IdempotencyGuard::with_capacity(config.receipt_cache_capacity),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Post `order` and mark it `Posted`, or mark it `Rejected` and return why.
    ///
    /// Submitting the same submission key again after success returns the
    /// original receipt without writing anything.
    #[instrument(
        skip(self, order),
        fields(
            order_id = %order.id_typed(),
            kind = %order.kind(),
            submission_key = %order.submission_key()
        ),
        err
    )]
    pub fn submit(&self, order: &mut OrderDraft) -> Result<PostingReceipt, SubmissionError> {
        let key = order.submission_key();

        if let Admission::Committed(receipt) = self.guard.begin(key)? {
            info!(entry_id = %receipt.entry_id, "already committed, returning original receipt");
            if order.status() == OrderStatus::ReadyToSubmit {
                order.mark_posted(receipt.entry_id)?;
            }
            return Ok(receipt);
        }

        // The receipt may have been evicted; the transaction log still knows.
        if let Err(err) = self.ensure_not_recorded(key) {
            self.guard.release(key);
            return Err(err);
        }

        match self.commit(order) {
            Ok(receipt) => {
                self.guard.complete(key, receipt.clone());
                order.mark_posted(receipt.entry_id)?;
                info!(
                    entry_id = %receipt.entry_id,
                    lines = receipt.transaction_ids.len(),
                    "order posted"
                );
                Ok(receipt)
            }
            Err(err) => {
                if err.is_clean() {
                    self.guard.release(key);
                } else {
                    self.guard.quarantine(key);
                }
                if order.status() == OrderStatus::ReadyToSubmit {
                    if let Err(e) = order.mark_rejected(err.to_string()) {
                        warn!(error = %e, "could not mark order rejected");
                    }
                }
                Err(err)
            }
        }
    }

    fn commit(&self, order: &OrderDraft) -> Result<PostingReceipt, SubmissionError> {
        if order.status() != OrderStatus::ReadyToSubmit {
            return Err(SubmissionError::Validation(
                "only orders ready to submit can be posted".to_string(),
            ));
        }

        let engine = PostingEngine::new(&self.config.accounts)?;
        let draft = engine.post(order)?;
        self.ensure_mapped_accounts_exist(engine.accounts())?;
        let plan = order.stock_plan()?;

        let retries = self.config.max_stock_retries;
        let mut saga = CommitSaga::new(&self.store, retries);

        let stock = InventorySynchronizer::new(&self.store, retries).apply(&plan)?;
        saga.completed(Compensation::RestoreStock(stock.clone()));

        let entry_id = match self.store.create_journal_entry(&draft.description) {
            Ok(id) => id,
            Err(e) => return Err(saga.fail(SagaStep::JournalEntry, e)),
        };
        saga.completed(Compensation::DeleteJournalEntry(entry_id));

        if let Err(e) = self.store.insert_journal_lines(&draft.lines_for(entry_id)) {
            return Err(saga.fail(SagaStep::JournalLines, e));
        }

        let recorded = match TransactionRecorder::new(&self.store).record(order.submission_key(), order) {
            Ok(recorded) => recorded,
            Err(failure) => {
                saga.completed(Compensation::DeleteTransactions(failure.written));
                return Err(saga.fail(SagaStep::TransactionRecords, failure.source));
            }
        };

        Ok(PostingReceipt {
            submission_key: order.submission_key(),
            order_id: order.id_typed(),
            entry_id,
            transaction_ids: recorded.ids,
            stock,
            posted_at: Utc::now(),
        })
    }

    /// Post a user-composed balanced entry.
    #[instrument(skip(self, lines), fields(line_count = lines.len()), err)]
    pub fn post_manual_entry(
        &self,
        description: &str,
        lines: &[ManualLine],
    ) -> Result<JournalEntryId, SubmissionError> {
        let draft = JournalDraft::manual(description, lines)?;

        let known = self.known_accounts()?;
        if let Some(line) = lines.iter().find(|l| !known.contains(&l.account_id)) {
            return Err(SubmissionError::Validation(format!(
                "unknown account {}",
                line.account_id
            )));
        }

        let mut saga = CommitSaga::new(&self.store, self.config.max_stock_retries);
        let entry_id = match self.store.create_journal_entry(&draft.description) {
            Ok(id) => id,
            Err(e) => return Err(saga.fail(SagaStep::JournalEntry, e)),
        };
        saga.completed(Compensation::DeleteJournalEntry(entry_id));

        if let Err(e) = self.store.insert_journal_lines(&draft.lines_for(entry_id)) {
            return Err(saga.fail(SagaStep::JournalLines, e));
        }

        info!(%entry_id, "manual journal entry posted");
        Ok(entry_id)
    }

    /// Dashboard figures over committed balances.
    pub fn financial_summary(&self) -> Result<FinancialSummary, SubmissionError> {
        let accounts = self
            .store
            .list_accounts()
            .map_err(|e| SubmissionError::persistence(SagaStep::Preflight, e))?;
        Ok(summarize(&accounts, Some(&self.config.accounts))?)
    }

    pub fn shipment_alerts(&self) -> Result<Vec<ShipmentAlert>, StoreError> {
        let items = self.store.list_items()?;
        Ok(evaluate_shipment_alerts_lenient(&items))
    }

    pub fn transactions(&self) -> TransactionRecorder<'_, S> {
        TransactionRecorder::new(&self.store)
    }

    fn ensure_not_recorded(&self, key: SubmissionKey) -> Result<(), SubmissionError> {
        let recorded = self
            .store
            .transactions_for_submission(key)
            .map_err(|e| SubmissionError::persistence(SagaStep::Preflight, e))?;
        if !recorded.is_empty() {
            warn!(records = recorded.len(), "submission key already has recorded transactions");
            return Err(SubmissionError::DuplicateSubmission(key));
        }
        Ok(())
    }

    fn known_accounts(&self) -> Result<HashSet<AccountId>, SubmissionError> {
        let accounts = self
            .store
            .list_accounts()
            .map_err(|e| SubmissionError::persistence(SagaStep::Preflight, e))?;
        Ok(accounts.into_iter().map(|a| a.id).collect())
    }

    fn ensure_mapped_accounts_exist(&self, accounts: &ResolvedAccounts) -> Result<(), SubmissionError> {
        let known = self.known_accounts()?;
        let missing: Vec<String> = accounts
            .iter()
            .filter(|(_, id)| !known.contains(id))
            .map(|(role, id)| format!("{role} ({id})"))
            .collect();
        if !missing.is_empty() {
            return Err(SubmissionError::Configuration(format!(
                "mapped accounts not found in store: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultPoint, InMemoryLedgerStore};
    use rust_decimal_macros::dec;
    use stockledger_accounting::{Account, AccountKind, AccountMapping, AccountRole};
    use stockledger_inventory::Item;
    use stockledger_orders::PaymentMethod;
    use stockledger_parties::Party;

    fn service() -> (SubmissionService<InMemoryLedgerStore>, Item) {
        let store = InMemoryLedgerStore::new();
        let mut mapping = AccountMapping::default();
        for (role, name, kind) in [
            (AccountRole::Cash, "Cash", AccountKind::Asset),
            (AccountRole::Inventory, "Inventory", AccountKind::Asset),
            (AccountRole::Sales, "Sales", AccountKind::Revenue),
            (AccountRole::Cogs, "Cost of Goods Sold", AccountKind::Expense),
            (AccountRole::Receivable, "Accounts Receivable", AccountKind::Asset),
            (AccountRole::Payable, "Accounts Payable", AccountKind::Liability),
        ] {
            let account = Account::new(name, kind);
            mapping.set(role, account.id);
            store.add_account(account).unwrap();
        }
        let widget = Item::new("Widget", "W-1", dec!(6), dec!(10))
            .unwrap()
            .with_quantity(20)
            .unwrap();
        store.add_item(widget.clone()).unwrap();
        (SubmissionService::new(store, EngineConfig::new(mapping)), widget)
    }

    fn sale(item: &Item, qty: i64) -> OrderDraft {
        let mut order = OrderDraft::sale();
        order
            .select_counterparty(Party::customer("Acme Retail").unwrap())
            .unwrap();
        order.select_payment_method(PaymentMethod::Cash).unwrap();
        order.add_line(Some(item), qty, None).unwrap();
        order.mark_ready().unwrap();
        order
    }

    #[test]
    fn successful_submission_marks_order_posted() {
        let (svc, widget) = service();
        let mut order = sale(&widget, 5);

        let receipt = svc.submit(&mut order).unwrap();

        assert_eq!(order.status(), OrderStatus::Posted);
        assert_eq!(order.posted_entry(), Some(receipt.entry_id));
        assert_eq!(receipt.transaction_ids.len(), 1);
        assert_eq!(svc.store().get_item(widget.id).unwrap().quantity, 15);
    }

    #[test]
    fn building_order_is_not_submitted() {
        let (svc, widget) = service();
        let mut order = OrderDraft::sale();
        order.add_line(Some(&widget), 1, None).unwrap();

        let err = svc.submit(&mut order).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(order.status(), OrderStatus::Building);
    }

    #[test]
    fn mapping_to_missing_account_is_configuration_error() {
        let (svc, widget) = service();
        let config = EngineConfig::new(
            svc.config()
                .accounts
                .clone()
                .with(AccountRole::Sales, AccountId::new()),
        );
        let svc = SubmissionService::new(svc.store, config);
        let mut order = sale(&widget, 1);

        let err = svc.submit(&mut order).unwrap_err();

        assert_eq!(err.kind(), "configuration");
        assert_eq!(order.status(), OrderStatus::Rejected);
        assert!(svc.store().list_journal_entries().unwrap().is_empty());
        assert_eq!(svc.store().get_item(widget.id).unwrap().quantity, 20);
    }

    #[test]
    fn failed_header_write_restores_stock() {
        let (svc, widget) = service();
        svc.store().fail_next(FaultPoint::CreateJournalEntry);
        let mut order = sale(&widget, 5);

        let err = svc.submit(&mut order).unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::PartialCommit { step: SagaStep::JournalEntry, .. }
        ));
        assert_eq!(svc.store().get_item(widget.id).unwrap().quantity, 20);
    }

    #[test]
    fn rejected_order_can_be_reopened_and_resubmitted() {
        let (svc, widget) = service();
        svc.store().fail_next(FaultPoint::InsertJournalLines);
        let mut order = sale(&widget, 5);
        let first_key = order.submission_key();

        svc.submit(&mut order).unwrap_err();
        order.reopen().unwrap();
        order.mark_ready().unwrap();
        assert_ne!(order.submission_key(), first_key);

        svc.submit(&mut order).unwrap();
        assert_eq!(svc.store().list_journal_entries().unwrap().len(), 1);
    }

    #[test]
    fn evicted_receipt_still_blocks_a_second_posting() {
        let (svc, widget) = service();
        let config = svc.config().clone().with_receipt_cache_capacity(1);
        let svc = SubmissionService::new(svc.store, config);

        let mut first = sale(&widget, 2);
        let mut replay = first.clone();
        svc.submit(&mut first).unwrap();
        // Pushes the first receipt out of the cache.
        svc.submit(&mut sale(&widget, 1)).unwrap();

        let err = svc.submit(&mut replay).unwrap_err();

        assert_eq!(err, SubmissionError::DuplicateSubmission(replay.submission_key()));
        assert_eq!(replay.status(), OrderStatus::ReadyToSubmit);
        assert_eq!(svc.store().list_journal_entries().unwrap().len(), 2);
        assert_eq!(svc.store().get_item(widget.id).unwrap().quantity, 17);
    }

    #[test]
    fn manual_entry_posts_and_updates_balances() {
        let (svc, _) = service();
        let cash = svc.config().accounts.cash.unwrap();
        let payable = svc.config().accounts.payable.unwrap();

        svc.post_manual_entry(
            "Settle supplier invoice",
            &[
                ManualLine { account_id: payable, debit: dec!(40), credit: dec!(0) },
                ManualLine { account_id: cash, debit: dec!(0), credit: dec!(40) },
            ],
        )
        .unwrap();

        let summary = svc.financial_summary().unwrap();
        assert_eq!(summary.cash, dec!(-40));
        assert_eq!(summary.payables, dec!(-40));
    }

    #[test]
    fn manual_entry_with_unknown_account_writes_nothing() {
        let (svc, _) = service();
        let cash = svc.config().accounts.cash.unwrap();

        let err = svc
            .post_manual_entry(
                "Mystery",
                &[
                    ManualLine { account_id: AccountId::new(), debit: dec!(5), credit: dec!(0) },
                    ManualLine { account_id: cash, debit: dec!(0), credit: dec!(5) },
                ],
            )
            .unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert!(svc.store().list_journal_entries().unwrap().is_empty());
    }
}
