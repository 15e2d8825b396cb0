//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error taxonomy, money helpers and the aggregate
//! contract used by the order builder.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, ItemId, JournalEntryId, OrderId, PartyId, SubmissionKey, TransactionId};
pub use money::{Amount, line_amount};
