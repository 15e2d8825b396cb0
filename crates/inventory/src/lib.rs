//! Inventory domain module.
//!
//! Item master data, stock movement planning (the pure half of stock
//! synchronization) and shipment-readiness alerts. No IO, no storage.

pub mod alerts;
pub mod item;
pub mod stock;

pub use alerts::{ShipmentAlert, evaluate_shipment_alerts, evaluate_shipment_alerts_lenient, shipment_ratio};
pub use item::Item;
pub use stock::{StockMovement, StockPlan, StockUpdate, next_quantity};
