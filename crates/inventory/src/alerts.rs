//! Shipment readiness alerts for the dashboard.
//!
//! ratio = quantity / shipment_threshold × 100. Items at or above 80% are
//! listed, highest ratio first; 100% or more means a full load is ready.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId};

use crate::item::Item;

const ALERT_PERCENT: i64 = 80;
const READY_PERCENT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentAlert {
    pub item_id: ItemId,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    pub shipment_threshold: i64,
    /// Percentage of the threshold currently on hand.
    pub ratio: Decimal,
    pub ready_to_ship: bool,
}

/// Percentage of the shipment threshold on hand.
pub fn shipment_ratio(item: &Item) -> DomainResult<Decimal> {
    if item.shipment_threshold <= 0 {
        return Err(DomainError::validation(format!(
            "item {} has no positive shipment threshold",
            item.name
        )));
    }
    Decimal::from(item.quantity)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(Decimal::from(item.shipment_threshold)))
        .ok_or_else(|| DomainError::validation("shipment ratio overflows"))
}

fn alert_for(item: &Item, ratio: Decimal) -> Option<ShipmentAlert> {
    if ratio < Decimal::from(ALERT_PERCENT) {
        return None;
    }
    Some(ShipmentAlert {
        item_id: item.id,
        name: item.name.clone(),
        sku: item.sku.clone(),
        quantity: item.quantity,
        shipment_threshold: item.shipment_threshold,
        ratio,
        ready_to_ship: ratio >= Decimal::from(READY_PERCENT),
    })
}

fn sort_alerts(alerts: &mut [ShipmentAlert]) {
    alerts.sort_by(|a, b| b.ratio.cmp(&a.ratio).then_with(|| a.name.cmp(&b.name)));
}

/// Alerts for all items; an item without a positive threshold is an error.
pub fn evaluate_shipment_alerts(items: &[Item]) -> DomainResult<Vec<ShipmentAlert>> {
    let mut alerts = Vec::new();
    for item in items {
        let ratio = shipment_ratio(item)?;
        alerts.extend(alert_for(item, ratio));
    }
    sort_alerts(&mut alerts);
    Ok(alerts)
}

/// Dashboard variant: items with an invalid threshold are skipped.
pub fn evaluate_shipment_alerts_lenient(items: &[Item]) -> Vec<ShipmentAlert> {
    let mut alerts = Vec::new();
    for item in items {
        match shipment_ratio(item) {
            Ok(ratio) => alerts.extend(alert_for(item, ratio)),
            Err(err) => {
                tracing::warn!(item_id = %item.id, item = %item.name, error = %err, "skipping item in shipment alerts");
            }
        }
    }
    sort_alerts(&mut alerts);
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(name: &str, quantity: i64, threshold: i64) -> Item {
        Item::new(name, name, dec!(1), dec!(2))
            .unwrap()
            .with_quantity(quantity)
            .unwrap()
            .with_shipment_threshold(threshold)
            .unwrap()
    }

    #[test]
    fn eighty_five_percent_is_alerted_but_not_ready() {
        let alerts = evaluate_shipment_alerts(&[item("Gravel", 85, 100)]).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].ratio, dec!(85));
        assert!(!alerts[0].ready_to_ship);
    }

    #[test]
    fn over_threshold_is_ready_to_ship() {
        let alerts = evaluate_shipment_alerts(&[item("Gravel", 120, 100)]).unwrap();
        assert_eq!(alerts[0].ratio, dec!(120));
        assert!(alerts[0].ready_to_ship);
    }

    #[test]
    fn below_eighty_percent_is_filtered_and_order_is_descending() {
        let items = [
            item("Sand", 79, 100),
            item("Gravel", 90, 100),
            item("Cement", 50, 40),
            item("Lime", 8, 10),
        ];
        let alerts = evaluate_shipment_alerts(&items).unwrap();
        let names: Vec<_> = alerts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Cement", "Gravel", "Lime"]);
        assert_eq!(alerts[0].ratio, dec!(125));
    }

    #[test]
    fn zero_threshold_is_a_validation_error() {
        let err = evaluate_shipment_alerts(&[item("Sand", 10, 0)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lenient_evaluation_skips_zero_thresholds() {
        let alerts = evaluate_shipment_alerts_lenient(&[item("Sand", 10, 0), item("Gravel", 100, 100)]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].name, "Gravel");
    }
}
