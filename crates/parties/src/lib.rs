//! Parties domain module (customers and suppliers).
//!
//! Counterparties are master data owned by the Ledger Store; orders only hold
//! a snapshot of the party they were built against.

pub mod party;

pub use party::{ContactInfo, Party, PartyKind, PartyStatus};
