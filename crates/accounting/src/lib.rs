//! Accounting module (double-entry journal, posting rules, reporting).
//!
//! Pure domain logic only: no IO, no persistence concerns. Accounts and
//! their balances are owned by the ledger store and are read-only here.

pub mod account;
pub mod journal;
pub mod mapping;
pub mod posting;
pub mod reports;

pub use account::{Account, AccountKind};
pub use journal::{JournalDraft, JournalEntry, JournalLeg, JournalLine, ManualLine, Side};
pub use mapping::{AccountMapping, AccountRole, ResolvedAccounts};
pub use posting::PostingEngine;
pub use reports::{FinancialSummary, summarize};
