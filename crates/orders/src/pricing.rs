//! Pricing defaults per order line.
//!
//! Cost basis is always the item's cost when the line is added; price
//! overrides never touch it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Amount, DomainError, DomainResult};
use stockledger_inventory::Item;

use crate::order::OrderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub unit_price: Amount,
    pub cost_basis: Amount,
}

/// Selling price for sales, acquisition cost for purchases.
pub fn default_unit_price(kind: OrderKind, item: &Item) -> Amount {
    match kind {
        OrderKind::Sale => item.selling_price,
        OrderKind::Purchase => item.cost_price,
    }
}

pub fn cost_basis(item: &Item) -> Amount {
    item.cost_price
}

/// Unit price (override or default) plus the frozen cost basis.
pub fn resolve_price(
    kind: OrderKind,
    item: &Item,
    unit_price_override: Option<Amount>,
) -> DomainResult<ResolvedPrice> {
    let unit_price = unit_price_override.unwrap_or_else(|| default_unit_price(kind, item));
    if unit_price <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "unit price for {} must be positive",
            item.name
        )));
    }
    Ok(ResolvedPrice {
        unit_price,
        cost_basis: cost_basis(item),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn widget() -> Item {
        Item::new("Widget", "W-1", dec!(6), dec!(10)).unwrap()
    }

    #[test]
    fn sale_defaults_to_selling_price() {
        let price = resolve_price(OrderKind::Sale, &widget(), None).unwrap();
        assert_eq!(price.unit_price, dec!(10));
        assert_eq!(price.cost_basis, dec!(6));
    }

    #[test]
    fn purchase_defaults_to_cost_price() {
        let price = resolve_price(OrderKind::Purchase, &widget(), None).unwrap();
        assert_eq!(price.unit_price, dec!(6));
    }

    #[test]
    fn override_changes_price_but_not_cost_basis() {
        let price = resolve_price(OrderKind::Sale, &widget(), Some(dec!(12.5))).unwrap();
        assert_eq!(price.unit_price, dec!(12.5));
        assert_eq!(price.cost_basis, dec!(6));
    }

    #[test]
    fn zero_price_is_rejected() {
        let free = Item::new("Sample", "S-1", dec!(0), dec!(0)).unwrap();
        let err = resolve_price(OrderKind::Sale, &free, None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
