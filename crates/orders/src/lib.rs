//! Order building domain module (sales and purchase orders).
//!
//! Orders are assembled in memory as an explicit state machine and are never
//! persisted before submission. Pricing defaults come from item master data.

pub mod order;
pub mod pricing;

pub use order::{
    AddLine, EditLine, OrderCommand, OrderDraft, OrderEvent, OrderKind, OrderLine, OrderStatus,
    PaymentMethod,
};
pub use pricing::{ResolvedPrice, cost_basis, default_unit_price, resolve_price};
