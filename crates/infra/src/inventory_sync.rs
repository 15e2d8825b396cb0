//! Stock synchronization against the ledger store.
//!
//! Quantities are re-fetched right before writing and every write is a
//! compare-and-swap on the fetched value. Losing a swap re-reads and re-checks
//! the item (bounded), so concurrent orders can never jointly overdraw stock.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use stockledger_core::{DomainError, ItemId};
use stockledger_inventory::{StockMovement, StockPlan, StockUpdate, next_quantity};

use crate::error::{SagaStep, SubmissionError};
use crate::store::{LedgerStore, StoreError};

#[derive(Debug)]
enum StockFailure {
    Domain(DomainError),
    Store(StoreError),
}

impl core::fmt::Display for StockFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StockFailure::Domain(e) => write!(f, "{e}"),
            StockFailure::Store(e) => write!(f, "{e}"),
        }
    }
}

pub struct InventorySynchronizer<'a, S: ?Sized> {
    store: &'a S,
    max_retries: u32,
}

impl<'a, S> InventorySynchronizer<'a, S>
where
    S: LedgerStore + ?Sized,
{
    pub fn new(store: &'a S, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// Apply every movement of `plan`, or none of them.
    ///
    /// Returns the writes that were made, for later compensation.
    pub fn apply(&self, plan: &StockPlan) -> Result<Vec<StockUpdate>, SubmissionError> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let mut on_hand: HashMap<ItemId, i64> = HashMap::new();
        for movement in plan.movements() {
            match self.store.get_item(movement.item_id) {
                Ok(item) => {
                    on_hand.insert(item.id, item.quantity);
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(SubmissionError::Validation(format!(
                        "unknown item {}",
                        movement.item_name
                    )));
                }
                Err(e) => return Err(SubmissionError::persistence(SagaStep::Preflight, e)),
            }
        }

        // Whole-order check before the first write.
        plan.updates_against(|id| on_hand.get(&id).copied())?;

        let mut applied = Vec::with_capacity(plan.movements().len());
        for movement in plan.movements() {
            let current = on_hand.get(&movement.item_id).copied().unwrap_or_default();
            match self.apply_one(movement, current) {
                Ok(update) => applied.push(update),
                Err(failure) => return Err(self.abort(&applied, failure)),
            }
        }

        debug!(items = applied.len(), "stock updated");
        Ok(applied)
    }

    /// Undo `applied` in reverse order. Collects every failure instead of
    /// stopping at the first.
    pub fn restore(&self, applied: &[StockUpdate]) -> Result<(), Vec<String>> {
        let failures: Vec<String> = applied
            .iter()
            .rev()
            .filter_map(|update| self.restore_one(update).err())
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    fn apply_one(
        &self,
        movement: &StockMovement,
        mut current: i64,
    ) -> Result<StockUpdate, StockFailure> {
        let mut attempt = 0;
        loop {
            let update = StockPlan::update_for(movement, current).map_err(StockFailure::Domain)?;
            match self
                .store
                .update_item_quantity(update.item_id, update.expected, update.new_quantity)
            {
                Ok(()) => return Ok(update),
                Err(e) if e.is_conflict() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(item = %movement.item_name, attempt, "quantity changed underneath, re-checking");
                    current = self
                        .store
                        .get_item(movement.item_id)
                        .map_err(StockFailure::Store)?
                        .quantity;
                }
                Err(e) => return Err(StockFailure::Store(e)),
            }
        }
    }

    fn restore_one(&self, update: &StockUpdate) -> Result<(), String> {
        let mut current = update.new_quantity;
        let mut attempt = 0;
        loop {
            let target = next_quantity(&update.item_name, current, -update.delta())
                .map_err(|e| restore_failure(update, e))?;
            match self.store.update_item_quantity(update.item_id, current, target) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_conflict() && attempt < self.max_retries => {
                    attempt += 1;
                    current = self
                        .store
                        .get_item(update.item_id)
                        .map_err(|e| restore_failure(update, e))?
                        .quantity;
                }
                Err(e) => return Err(restore_failure(update, e)),
            }
        }
    }

    fn abort(&self, applied: &[StockUpdate], failure: StockFailure) -> SubmissionError {
        if applied.is_empty() {
            return match failure {
                StockFailure::Domain(e) => e.into(),
                StockFailure::Store(e) => SubmissionError::persistence(SagaStep::StockUpdate, e),
            };
        }

        match self.restore(applied) {
            Ok(()) => {
                warn!(restored = applied.len(), error = %failure, "stock update aborted, earlier items restored");
                match failure {
                    StockFailure::Domain(e) => e.into(),
                    StockFailure::Store(source) => SubmissionError::PartialCommit {
                        step: SagaStep::StockUpdate,
                        source,
                    },
                }
            }
            Err(compensation) => {
                error!(error = %failure, ?compensation, "stock restore failed, inventory is inconsistent");
                SubmissionError::Inconsistent {
                    failure: format!("stock update: {failure}"),
                    compensation,
                }
            }
        }
    }
}

fn restore_failure(update: &StockUpdate, err: impl core::fmt::Display) -> String {
    format!("restore stock of {}: {err}", update.item_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultPoint, InMemoryLedgerStore};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockledger_inventory::Item;

    fn seeded(quantities: &[i64]) -> (InMemoryLedgerStore, Vec<Item>) {
        let store = InMemoryLedgerStore::new();
        let items: Vec<Item> = quantities
            .iter()
            .enumerate()
            .map(|(i, q)| {
                Item::new(format!("item-{i}"), format!("SKU-{i}"), dec!(1), dec!(2))
                    .unwrap()
                    .with_quantity(*q)
                    .unwrap()
            })
            .collect();
        for item in &items {
            store.add_item(item.clone()).unwrap();
        }
        (store, items)
    }

    fn quantity(store: &InMemoryLedgerStore, item: &Item) -> i64 {
        store.get_item(item.id).unwrap().quantity
    }

    #[test]
    fn sale_plan_decrements_every_item() {
        let (store, items) = seeded(&[10, 4]);
        let plan = StockPlan::outbound([
            (items[0].id, "item-0", 3),
            (items[1].id, "item-1", 4),
        ])
        .unwrap();

        let applied = InventorySynchronizer::new(&store, 3).apply(&plan).unwrap();

        assert_eq!(applied.len(), 2);
        assert_eq!(quantity(&store, &items[0]), 7);
        assert_eq!(quantity(&store, &items[1]), 0);
    }

    #[test]
    fn one_short_item_aborts_the_whole_plan() {
        let (store, items) = seeded(&[10, 2]);
        let plan = StockPlan::outbound([
            (items[0].id, "item-0", 3),
            (items[1].id, "item-1", 5),
        ])
        .unwrap();

        let err = InventorySynchronizer::new(&store, 3).apply(&plan).unwrap_err();

        assert_eq!(err.kind(), "insufficient_stock");
        assert_eq!(quantity(&store, &items[0]), 10);
        assert_eq!(quantity(&store, &items[1]), 2);
    }

    #[test]
    fn unknown_item_is_a_validation_error() {
        let (store, _) = seeded(&[]);
        let plan = StockPlan::inbound([(ItemId::new(), "ghost", 1)]).unwrap();
        let err = InventorySynchronizer::new(&store, 3).apply(&plan).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn failed_second_write_restores_the_first() {
        let (store, items) = seeded(&[10, 10]);
        store.fail_nth(FaultPoint::UpdateItemQuantity, 2);
        let plan = StockPlan::outbound([
            (items[0].id, "item-0", 3),
            (items[1].id, "item-1", 3),
        ])
        .unwrap();

        let err = InventorySynchronizer::new(&store, 3).apply(&plan).unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::PartialCommit { step: SagaStep::StockUpdate, .. }
        ));
        assert_eq!(quantity(&store, &items[0]), 10);
        assert_eq!(quantity(&store, &items[1]), 10);
    }

    #[test]
    fn store_down_before_first_write_is_plain_persistence() {
        let (store, items) = seeded(&[10]);
        store.fail_always(FaultPoint::UpdateItemQuantity);
        let plan = StockPlan::outbound([(items[0].id, "item-0", 3)]).unwrap();

        let err = InventorySynchronizer::new(&store, 3).apply(&plan).unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::Persistence { step: SagaStep::StockUpdate, .. }
        ));
    }

    #[test]
    fn failed_restore_is_inconsistent() {
        let (store, items) = seeded(&[10, 10]);
        // The second write fails, and so does restoring the first.
        store.fail_from_nth(FaultPoint::UpdateItemQuantity, 2);
        let plan = StockPlan::outbound([
            (items[0].id, "item-0", 3),
            (items[1].id, "item-1", 3),
        ])
        .unwrap();

        let err = InventorySynchronizer::new(&store, 3).apply(&plan).unwrap_err();
        store.clear_faults();

        match err {
            SubmissionError::Inconsistent { compensation, .. } => {
                assert_eq!(compensation.len(), 1);
                assert!(compensation[0].contains("item-0"));
            }
            other => panic!("expected inconsistent, got {other:?}"),
        }
        assert_eq!(quantity(&store, &items[0]), 7);
    }

    #[test]
    fn lost_swap_is_rechecked_against_fresh_quantity() {
        let (store, items) = seeded(&[4]);
        let plan = StockPlan::outbound([(items[0].id, "item-0", 3)]).unwrap();
        let sync = InventorySynchronizer::new(&store, 3);

        // Another order takes 3 after this one read 4.
        let movement = &plan.movements()[0];
        store.update_item_quantity(items[0].id, 4, 1).unwrap();
        let err = sync.apply_one(movement, 4).unwrap_err();

        assert!(matches!(err, StockFailure::Domain(DomainError::InsufficientStock { available: 1, .. })));
        assert_eq!(quantity(&store, &items[0]), 1);
    }

    #[test]
    fn restore_survives_concurrent_movement() {
        let (store, items) = seeded(&[10]);
        let sync = InventorySynchronizer::new(&store, 3);
        let applied = sync
            .apply(&StockPlan::inbound([(items[0].id, "item-0", 5)]).unwrap())
            .unwrap();
        // Someone sells 2 before the rollback runs.
        store.update_item_quantity(items[0].id, 15, 13).unwrap();

        sync.restore(&applied).unwrap();
        assert_eq!(quantity(&store, &items[0]), 8);
    }

    proptest! {
        /// Property: quantities never go negative, whatever sequence of sales
        /// is attempted.
        #[test]
        fn quantities_stay_non_negative(
            start in 0i64..20,
            sales in prop::collection::vec(1i64..8, 1..15),
        ) {
            let (store, items) = seeded(&[start]);
            let sync = InventorySynchronizer::new(&store, 2);
            let mut expected = start;
            for qty in sales {
                let plan = StockPlan::outbound([(items[0].id, "item-0", qty)]).unwrap();
                match sync.apply(&plan) {
                    Ok(_) => expected -= qty,
                    Err(e) => prop_assert_eq!(e.kind(), "insufficient_stock"),
                }
                prop_assert!(quantity(&store, &items[0]) >= 0);
            }
            prop_assert_eq!(quantity(&store, &items[0]), expected);
        }
    }
}
