//! Stock activity log: one record per order line.

use chrono::Utc;
use tracing::debug;

use stockledger_core::{ItemId, SubmissionKey, TransactionId};
use stockledger_orders::OrderDraft;

use crate::store::{LedgerStore, StoreError, TransactionRecord};

/// Records written before a failed insert, so the caller can remove them.
#[derive(Debug)]
pub struct RecordFailure {
    pub written: Vec<TransactionId>,
    pub source: StoreError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLines {
    /// One id per order line, in line order.
    pub ids: Vec<TransactionId>,
    /// Ids inserted by this call (a subset of `ids`).
    pub written: Vec<TransactionId>,
}

pub struct TransactionRecorder<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> TransactionRecorder<'a, S>
where
    S: LedgerStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Log every line of `order` under `key`.
    ///
    /// Lines already logged under the same key are matched (item, kind and
    /// quantity) and not written again.
    pub fn record(&self, key: SubmissionKey, order: &OrderDraft) -> Result<RecordedLines, RecordFailure> {
        let mut existing = self
            .store
            .transactions_for_submission(key)
            .map_err(|source| RecordFailure {
                written: Vec::new(),
                source,
            })?;

        let created_at = Utc::now();
        let mut ids = Vec::with_capacity(order.lines().len());
        let mut written = Vec::new();

        for line in order.lines() {
            let already = existing.iter().position(|t| {
                t.item_id == line.item_id && t.kind == order.kind() && t.quantity == line.quantity
            });
            if let Some(pos) = already {
                ids.push(existing.swap_remove(pos).id);
                continue;
            }

            let record = TransactionRecord {
                id: TransactionId::new(),
                submission_key: key,
                item_id: line.item_id,
                kind: order.kind(),
                quantity: line.quantity,
                counterparty: order.counterparty_name().to_string(),
                created_at,
            };
            if let Err(source) = self.store.insert_transaction(&record) {
                return Err(RecordFailure { written, source });
            }
            ids.push(record.id);
            written.push(record.id);
        }

        debug!(submission_key = %key, written = written.len(), "transactions recorded");
        Ok(RecordedLines { ids, written })
    }

    /// Activity for one item, newest first.
    pub fn history_for_item(&self, item_id: ItemId) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .store
            .list_transactions()?
            .into_iter()
            .filter(|t| t.item_id == item_id)
            .collect())
    }

    /// Case-insensitive substring search on counterparty name, newest first.
    pub fn search_by_counterparty(&self, term: &str) -> Result<Vec<TransactionRecord>, StoreError> {
        let term = term.trim().to_lowercase();
        Ok(self
            .store
            .list_transactions()?
            .into_iter()
            .filter(|t| term.is_empty() || t.counterparty.to_lowercase().contains(&term))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultPoint, InMemoryLedgerStore};
    use rust_decimal_macros::dec;
    use stockledger_inventory::Item;
    use stockledger_orders::{OrderKind, PaymentMethod};
    use stockledger_parties::Party;

    fn purchase(items: &[(&Item, i64)]) -> OrderDraft {
        let mut order = OrderDraft::purchase();
        order
            .select_counterparty(Party::supplier("Bolt Supply Co").unwrap())
            .unwrap();
        order.select_payment_method(PaymentMethod::Cash).unwrap();
        for (item, qty) in items {
            order.add_line(Some(item), *qty, None).unwrap();
        }
        order.mark_ready().unwrap();
        order
    }

    fn bolt() -> Item {
        Item::new("Bolt", "B-1", dec!(4), dec!(7)).unwrap()
    }

    #[test]
    fn one_record_per_line() {
        let store = InMemoryLedgerStore::new();
        let (a, b) = (bolt(), Item::new("Nut", "N-1", dec!(1), dec!(2)).unwrap());
        let order = purchase(&[(&a, 10), (&b, 5), (&a, 2)]);
        let key = order.submission_key();

        let recorded = TransactionRecorder::new(&store).record(key, &order).unwrap();

        assert_eq!(recorded.ids.len(), 3);
        let log = store.list_transactions().unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|t| t.kind == OrderKind::Purchase && t.counterparty == "Bolt Supply Co"));
    }

    #[test]
    fn rerun_does_not_double_log() {
        let store = InMemoryLedgerStore::new();
        let order = purchase(&[(&bolt(), 10), (&bolt(), 4)]);
        let key = order.submission_key();
        let recorder = TransactionRecorder::new(&store);

        store.fail_nth(FaultPoint::InsertTransaction, 2);
        let failure = recorder.record(key, &order).unwrap_err();
        assert_eq!(failure.written.len(), 1);

        let recorded = recorder.record(key, &order).unwrap();
        assert_eq!(recorded.ids.len(), 2);
        assert_eq!(recorded.written.len(), 1);
        assert_eq!(store.list_transactions().unwrap().len(), 2);
    }

    #[test]
    fn read_side_filters_by_item_and_counterparty() {
        let store = InMemoryLedgerStore::new();
        let a = bolt();
        let recorder = TransactionRecorder::new(&store);
        let first = purchase(&[(&a, 10)]);
        recorder.record(first.submission_key(), &first).unwrap();
        let second = purchase(&[(&a, 3)]);
        recorder.record(second.submission_key(), &second).unwrap();

        let history = recorder.history_for_item(a.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].quantity, 3);

        assert_eq!(recorder.search_by_counterparty("supply").unwrap().len(), 2);
        assert!(recorder.search_by_counterparty("acme").unwrap().is_empty());
    }
}
