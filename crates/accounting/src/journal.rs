//! Journal entries and the pre-persistence journal draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AccountId, Amount, DomainError, DomainResult, JournalEntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// One side of a persisted journal entry. Exactly one of `debit`/`credit` is
/// nonzero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub entry_id: JournalEntryId,
    pub account_id: AccountId,
    pub debit: Amount,
    pub credit: Amount,
}

impl JournalLine {
    pub fn validate(&self) -> DomainResult<()> {
        validate_sides(self.debit, self.credit)
    }

    pub fn side(&self) -> Side {
        if self.debit > Amount::ZERO {
            Side::Debit
        } else {
            Side::Credit
        }
    }
}

/// Persisted journal entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// (Σdebit, Σcredit)
    pub fn totals(&self) -> DomainResult<(Amount, Amount)> {
        self.lines
            .iter()
            .try_fold((Amount::ZERO, Amount::ZERO), |(d, c), l| {
                Ok((add_total(d, l.debit)?, add_total(c, l.credit)?))
            })
    }

    /// An entry whose totals overflow is never balanced.
    pub fn is_balanced(&self) -> bool {
        matches!(self.totals(), Ok((debits, credits)) if debits == credits)
    }
}

/// A single leg of a draft entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLeg {
    pub account_id: AccountId,
    pub side: Side,
    pub amount: Amount,
}

/// User-entered line of a manual journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualLine {
    pub account_id: AccountId,
    pub debit: Amount,
    pub credit: Amount,
}

/// Journal entry before it has an id: description plus legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDraft {
    pub description: String,
    legs: Vec<JournalLeg>,
}

impl JournalDraft {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            legs: Vec::new(),
        }
    }

    /// Validate a user-composed entry: one-sided lines, at least two, balanced.
    pub fn manual(description: impl Into<String>, lines: &[ManualLine]) -> DomainResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(DomainError::validation("journal entry needs a description"));
        }

        let mut draft = Self::new(description);
        for line in lines {
            validate_sides(line.debit, line.credit)?;
            let (side, amount) = if line.debit > Amount::ZERO {
                (Side::Debit, line.debit)
            } else {
                (Side::Credit, line.credit)
            };
            draft.legs.push(JournalLeg {
                account_id: line.account_id,
                side,
                amount,
            });
        }
        draft.ensure_balanced()?;
        Ok(draft)
    }

    /// Add `amount` on `side` of `account_id`, merging with an existing leg on
    /// the same account and side. Zero amounts add nothing.
    pub fn post(&mut self, account_id: AccountId, side: Side, amount: Amount) -> DomainResult<()> {
        if amount < Amount::ZERO {
            return Err(DomainError::invariant("leg amount cannot be negative"));
        }
        if amount.is_zero() {
            return Ok(());
        }

        if let Some(leg) = self
            .legs
            .iter_mut()
            .find(|l| l.account_id == account_id && l.side == side)
        {
            leg.amount = leg
                .amount
                .checked_add(amount)
                .ok_or_else(|| DomainError::validation("leg amount overflows"))?;
            return Ok(());
        }

        self.legs.push(JournalLeg {
            account_id,
            side,
            amount,
        });
        Ok(())
    }

    pub fn debit(&mut self, account_id: AccountId, amount: Amount) -> DomainResult<()> {
        self.post(account_id, Side::Debit, amount)
    }

    pub fn credit(&mut self, account_id: AccountId, amount: Amount) -> DomainResult<()> {
        self.post(account_id, Side::Credit, amount)
    }

    pub fn legs(&self) -> &[JournalLeg] {
        &self.legs
    }

    /// (Σdebit, Σcredit)
    pub fn totals(&self) -> DomainResult<(Amount, Amount)> {
        self.legs
            .iter()
            .try_fold((Amount::ZERO, Amount::ZERO), |(d, c), l| match l.side {
                Side::Debit => Ok((add_total(d, l.amount)?, c)),
                Side::Credit => Ok((d, add_total(c, l.amount)?)),
            })
    }

    pub fn ensure_balanced(&self) -> DomainResult<()> {
        if self.legs.len() < 2 {
            return Err(DomainError::validation(
                "journal entry must have at least two lines",
            ));
        }
        let (debits, credits) = self.totals()?;
        if debits != credits {
            return Err(DomainError::invariant(format!(
                "debits must equal credits (debits {debits}, credits {credits})"
            )));
        }
        Ok(())
    }

    /// Persistable lines for the entry `entry_id`.
    pub fn lines_for(&self, entry_id: JournalEntryId) -> Vec<JournalLine> {
        self.legs
            .iter()
            .map(|leg| {
                let (debit, credit) = match leg.side {
                    Side::Debit => (leg.amount, Amount::ZERO),
                    Side::Credit => (Amount::ZERO, leg.amount),
                };
                JournalLine {
                    entry_id,
                    account_id: leg.account_id,
                    debit,
                    credit,
                }
            })
            .collect()
    }
}

fn add_total(total: Amount, amount: Amount) -> DomainResult<Amount> {
    total
        .checked_add(amount)
        .ok_or_else(|| DomainError::validation("journal total overflows"))
}

fn validate_sides(debit: Amount, credit: Amount) -> DomainResult<()> {
    if debit < Amount::ZERO || credit < Amount::ZERO {
        return Err(DomainError::validation("debit and credit cannot be negative"));
    }
    if debit.is_zero() == credit.is_zero() {
        return Err(DomainError::validation(
            "exactly one of debit or credit must be nonzero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn legs_on_same_account_and_side_are_merged() {
        let cash = AccountId::new();
        let sales = AccountId::new();
        let mut draft = JournalDraft::new("two sales");
        draft.debit(cash, dec!(20)).unwrap();
        draft.debit(cash, dec!(30)).unwrap();
        draft.credit(sales, dec!(50)).unwrap();

        assert_eq!(draft.legs().len(), 2);
        assert_eq!(draft.legs()[0].amount, dec!(50));
        draft.ensure_balanced().unwrap();
    }

    #[test]
    fn zero_legs_are_omitted() {
        let mut draft = JournalDraft::new("free sample");
        draft.debit(AccountId::new(), dec!(0)).unwrap();
        assert!(draft.legs().is_empty());
    }

    #[test]
    fn unbalanced_draft_is_an_invariant_violation() {
        let mut draft = JournalDraft::new("bad");
        draft.debit(AccountId::new(), dec!(100)).unwrap();
        draft.credit(AccountId::new(), dec!(90)).unwrap();

        match draft.ensure_balanced().unwrap_err() {
            DomainError::InvariantViolation(msg) if msg.contains("debits must equal credits") => {}
            other => panic!("Expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn overflowing_totals_are_a_validation_error() {
        let half = Amount::MAX / dec!(2) + dec!(1000);
        let mut draft = JournalDraft::new("huge");
        draft.debit(AccountId::new(), half).unwrap();
        draft.debit(AccountId::new(), half).unwrap();
        draft.credit(AccountId::new(), half).unwrap();

        assert!(matches!(draft.totals(), Err(DomainError::Validation(_))));
        match draft.ensure_balanced().unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("overflows")),
            other => panic!("Expected validation error, got {other:?}"),
        }

        let entry_id = JournalEntryId::new();
        let entry = JournalEntry {
            id: entry_id,
            description: draft.description.clone(),
            created_at: Utc::now(),
            lines: draft.lines_for(entry_id),
        };
        assert!(entry.totals().is_err());
        assert!(!entry.is_balanced());
    }

    #[test]
    fn manual_entry_rejects_two_sided_lines() {
        let lines = [
            ManualLine {
                account_id: AccountId::new(),
                debit: dec!(10),
                credit: dec!(10),
            },
            ManualLine {
                account_id: AccountId::new(),
                debit: dec!(0),
                credit: dec!(0),
            },
        ];
        let err = JournalDraft::manual("rent", &lines).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn manual_entry_keeps_lines_separate() {
        let rent = AccountId::new();
        let cash = AccountId::new();
        let lines = [
            ManualLine { account_id: rent, debit: dec!(400), credit: dec!(0) },
            ManualLine { account_id: rent, debit: dec!(100), credit: dec!(0) },
            ManualLine { account_id: cash, debit: dec!(0), credit: dec!(500) },
        ];
        let draft = JournalDraft::manual("Warehouse rent", &lines).unwrap();
        assert_eq!(draft.legs().len(), 3);

        let entry_id = JournalEntryId::new();
        let persisted = draft.lines_for(entry_id);
        assert!(persisted.iter().all(|l| l.entry_id == entry_id && l.validate().is_ok()));
        assert_eq!(persisted[2].side(), Side::Credit);
    }

    #[test]
    fn manual_entry_needs_description() {
        let err = JournalDraft::manual("  ", &[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        /// Property: any draft that passes the balance check persists as a
        /// balanced entry.
        #[test]
        fn balanced_drafts_persist_balanced(
            amounts in prop::collection::vec(1i64..1_000_000i64, 1..10)
        ) {
            let accounts: Vec<AccountId> = (0..4).map(|_| AccountId::new()).collect();
            let mut draft = JournalDraft::new("generated");
            for (i, cents) in amounts.iter().enumerate() {
                let amount = Amount::new(*cents, 2);
                draft.debit(accounts[i % 2], amount).unwrap();
                draft.credit(accounts[2 + i % 2], amount).unwrap();
            }
            prop_assert!(draft.ensure_balanced().is_ok());

            let entry = JournalEntry {
                id: JournalEntryId::new(),
                description: draft.description.clone(),
                created_at: Utc::now(),
                lines: draft.lines_for(JournalEntryId::new()),
            };
            prop_assert!(entry.is_balanced());
        }
    }
}
