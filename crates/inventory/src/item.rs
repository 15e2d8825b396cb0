use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Amount, DomainError, DomainResult, ItemId};

/// Inventory item master record.
///
/// `quantity` is only ever changed through stock synchronization; prices are
/// master data maintained outside the posting engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    /// Most recent acquisition cost per unit.
    pub cost_price: Amount,
    pub selling_price: Amount,
    pub shipment_threshold: i64,
}

impl Item {
    /// New item with zero stock and no shipment threshold.
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        cost_price: Amount,
        selling_price: Amount,
    ) -> DomainResult<Self> {
        let item = Self {
            id: ItemId::new(),
            name: name.into(),
            sku: sku.into(),
            quantity: 0,
            cost_price,
            selling_price,
            shipment_threshold: 0,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> DomainResult<Self> {
        self.quantity = quantity;
        self.validate()?;
        Ok(self)
    }

    pub fn with_shipment_threshold(mut self, threshold: i64) -> DomainResult<Self> {
        self.shipment_threshold = threshold;
        self.validate()?;
        Ok(self)
    }

    /// Master-data invariants.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if self.quantity < 0 {
            return Err(DomainError::invariant(format!(
                "item {} has negative quantity {}",
                self.name, self.quantity
            )));
        }
        if self.cost_price < Decimal::ZERO || self.selling_price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "item {} has a negative price",
                self.name
            )));
        }
        if self.shipment_threshold < 0 {
            return Err(DomainError::validation(format!(
                "item {} has a negative shipment threshold",
                self.name
            )));
        }
        Ok(())
    }

    /// Case-insensitive name/SKU search used by item listings.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.name.to_lowercase().contains(&term)
            || self.sku.to_lowercase().contains(&term)
    }
}
