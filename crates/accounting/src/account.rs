use serde::{Deserialize, Serialize};

use stockledger_core::{AccountId, Amount};

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Revenue,
    Expense,
}

impl AccountKind {
    /// Assets and expenses grow with debits.
    pub fn is_debit_normal(self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Expense)
    }

    /// Balance in this kind's sign convention.
    pub fn signed_balance(self, debits: Amount, credits: Amount) -> Amount {
        if self.is_debit_normal() {
            debits - credits
        } else {
            credits - debits
        }
    }
}

/// Chart-of-accounts entry with its derived balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    pub balance: Amount,
}

impl Account {
    pub fn new(name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id: AccountId::new(),
            name: name.into(),
            kind,
            balance: Amount::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn balance_sign_follows_normal_side() {
        assert_eq!(AccountKind::Asset.signed_balance(dec!(50), dec!(30)), dec!(20));
        assert_eq!(AccountKind::Expense.signed_balance(dec!(30), dec!(0)), dec!(30));
        assert_eq!(AccountKind::Revenue.signed_balance(dec!(0), dec!(50)), dec!(50));
        assert_eq!(AccountKind::Liability.signed_balance(dec!(10), dec!(40)), dec!(30));
    }
}
