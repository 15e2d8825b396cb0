//! Stock movement planning.
//!
//! A [`StockPlan`] is the per-item net quantity change of one order. Checking a
//! plan against current quantities is all-or-nothing: either every item can
//! absorb its delta and a full set of [`StockUpdate`]s is returned, or nothing
//! is returned at all.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId};

/// Net quantity change for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub item_id: ItemId,
    pub item_name: String,
    pub delta: i64,
}

/// Conditional quantity write: `expected` is the quantity the check was made
/// against, `new_quantity` the value to store if it is still current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub item_id: ItemId,
    pub item_name: String,
    pub expected: i64,
    pub new_quantity: i64,
}

impl StockUpdate {
    pub fn delta(&self) -> i64 {
        self.new_quantity - self.expected
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPlan {
    movements: Vec<StockMovement>,
}

impl StockPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan removing `quantity` units per line (sales).
    pub fn outbound<'a, I>(lines: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (ItemId, &'a str, i64)>,
    {
        Self::from_lines(lines, -1)
    }

    /// Plan adding `quantity` units per line (purchases).
    pub fn inbound<'a, I>(lines: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (ItemId, &'a str, i64)>,
    {
        Self::from_lines(lines, 1)
    }

    fn from_lines<'a, I>(lines: I, sign: i64) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (ItemId, &'a str, i64)>,
    {
        let mut plan = Self::new();
        for (item_id, item_name, quantity) in lines {
            if quantity <= 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            plan.add(item_id, item_name, sign * quantity)?;
        }
        Ok(plan)
    }

    /// Add a delta, merging with an existing movement for the same item.
    pub fn add(&mut self, item_id: ItemId, item_name: &str, delta: i64) -> DomainResult<()> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        if let Some(existing) = self.movements.iter_mut().find(|m| m.item_id == item_id) {
            existing.delta = existing
                .delta
                .checked_add(delta)
                .ok_or_else(|| DomainError::validation("quantity overflows"))?;
            return Ok(());
        }

        self.movements.push(StockMovement {
            item_id,
            item_name: item_name.to_string(),
            delta,
        });
        Ok(())
    }

    pub fn movements(&self) -> &[StockMovement] {
        &self.movements
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    /// Check one movement against a current quantity.
    pub fn update_for(movement: &StockMovement, current: i64) -> DomainResult<StockUpdate> {
        let new_quantity = next_quantity(&movement.item_name, current, movement.delta)?;
        Ok(StockUpdate {
            item_id: movement.item_id,
            item_name: movement.item_name.clone(),
            expected: current,
            new_quantity,
        })
    }

    /// Check every movement against current quantities.
    ///
    /// `current` returns `None` for unknown items. The first failing movement
    /// aborts the whole check.
    pub fn updates_against<F>(&self, mut current: F) -> DomainResult<Vec<StockUpdate>>
    where
        F: FnMut(ItemId) -> Option<i64>,
    {
        let mut updates = Vec::with_capacity(self.movements.len());
        for movement in &self.movements {
            let on_hand = current(movement.item_id).ok_or_else(|| {
                DomainError::validation(format!("unknown item {}", movement.item_name))
            })?;
            updates.push(Self::update_for(movement, on_hand)?);
        }
        Ok(updates)
    }
}

/// Quantity after applying `delta`; stock cannot go negative.
pub fn next_quantity(item_name: &str, current: i64, delta: i64) -> DomainResult<i64> {
    let next = current
        .checked_add(delta)
        .ok_or_else(|| DomainError::validation("quantity overflows"))?;
    if next < 0 {
        return Err(DomainError::insufficient_stock(item_name, -delta, current));
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn repeated_items_are_merged() {
        let a = ItemId::new();
        let b = ItemId::new();
        let plan = StockPlan::outbound([(a, "A", 2), (b, "B", 1), (a, "A", 3)]).unwrap();

        assert_eq!(plan.movements().len(), 2);
        assert_eq!(plan.movements()[0].delta, -5);
        assert_eq!(plan.movements()[1].delta, -1);
    }

    #[test]
    fn non_positive_line_quantity_is_rejected() {
        let err = StockPlan::inbound([(ItemId::new(), "A", 0)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn check_is_all_or_nothing() {
        let a = ItemId::new();
        let b = ItemId::new();
        let plan = StockPlan::outbound([(a, "A", 1), (b, "B", 4)]).unwrap();
        let stock = HashMap::from([(a, 10), (b, 3)]);

        let err = plan.updates_against(|id| stock.get(&id).copied()).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("B", 4, 3));
    }

    #[test]
    fn merged_lines_are_checked_together() {
        let a = ItemId::new();
        let plan = StockPlan::outbound([(a, "A", 3), (a, "A", 3)]).unwrap();

        let err = plan.updates_against(|_| Some(5)).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { requested: 6, .. }));
    }

    #[test]
    fn unknown_item_is_a_validation_error() {
        let plan = StockPlan::inbound([(ItemId::new(), "Ghost", 1)]).unwrap();
        let err = plan.updates_against(|_| None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn updates_carry_expected_and_new_quantity() {
        let a = ItemId::new();
        let plan = StockPlan::inbound([(a, "A", 10)]).unwrap();
        let updates = plan.updates_against(|_| Some(2)).unwrap();

        assert_eq!(updates[0].expected, 2);
        assert_eq!(updates[0].new_quantity, 12);
        assert_eq!(updates[0].delta(), 10);
    }

    proptest! {
        /// Property: applying any sequence of plans through the check never
        /// leaves a negative quantity.
        #[test]
        fn checked_plans_never_go_negative(
            start in 0i64..50,
            moves in prop::collection::vec((any::<bool>(), 1i64..20), 1..30)
        ) {
            let item = ItemId::new();
            let mut on_hand = start;

            for (is_sale, qty) in moves {
                let plan = if is_sale {
                    StockPlan::outbound([(item, "X", qty)]).unwrap()
                } else {
                    StockPlan::inbound([(item, "X", qty)]).unwrap()
                };
                if let Ok(updates) = plan.updates_against(|_| Some(on_hand)) {
                    on_hand = updates[0].new_quantity;
                }
                prop_assert!(on_hand >= 0);
            }
        }
    }
}
